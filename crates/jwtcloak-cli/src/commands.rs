//! Command implementations

use std::io::{self, BufRead};
use std::path::Path;

use anyhow::Context;
use jwtcloak::{Claims, IssuerRegistry, ProviderKind, Scopes, TokenVerifier, VerifierSettings};
use serde::Serialize;
use tracing::info;

use crate::cli::{IssuerFileArgs, OutputFormat, VerifyArgs};
use crate::error::{CliError, CliResult};

/// Load an issuer file and build a verifier from it
///
/// # Errors
///
/// Returns an error if the file cannot be read or any issuer entry is invalid.
pub fn load_verifier(path: &Path) -> anyhow::Result<TokenVerifier> {
    let settings = VerifierSettings::load(path)
        .with_context(|| format!("failed to load issuer file {}", path.display()))?;
    let verifier = TokenVerifier::from_settings(&settings)
        .with_context(|| format!("invalid issuer file {}", path.display()))?;

    info!(
        path = %path.display(),
        issuers = verifier.registry().len(),
        "Loaded issuer file"
    );
    Ok(verifier)
}

/// Pick the token from `--token`, `--header`, or the first line of `stdin`
///
/// A stdin line may be a bare token or a full `Bearer ...` header value.
///
/// # Errors
///
/// Returns [`CliError::InvalidArguments`] if no token was given, and
/// [`CliError::Unauthorized`] if a header carries no bearer token.
pub fn resolve_token(args: &VerifyArgs, mut stdin: impl BufRead) -> CliResult<String> {
    if let Some(token) = &args.token {
        let token = token.trim();
        if token.is_empty() {
            return Err(CliError::InvalidArguments("--token is empty".to_string()));
        }
        return Ok(token.to_string());
    }

    if let Some(header) = &args.header {
        return jwtcloak::extract_bearer(header)
            .map(str::to_string)
            .ok_or_else(|| CliError::Unauthorized("no bearer token in header".to_string()));
    }

    let mut line = String::new();
    stdin.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Err(CliError::InvalidArguments(
            "no token given: use --token, --header or pipe it on stdin".to_string(),
        ));
    }
    jwtcloak::extract_bearer(&line)
        .map(str::to_string)
        .ok_or_else(|| CliError::Unauthorized("no bearer token on stdin".to_string()))
}

/// Render verified claims
///
/// # Errors
///
/// Returns [`CliError::Json`] if the claims cannot be serialized.
pub fn render_claims(claims: &Claims, format: OutputFormat) -> CliResult<String> {
    Ok(match format {
        OutputFormat::Human => serde_json::to_string_pretty(claims)?,
        OutputFormat::Json => serde_json::to_string(claims)?,
    })
}

#[derive(Serialize)]
struct IssuerSummary<'a> {
    issuer: &'a str,
    provider: ProviderKind,
    algorithms: Vec<String>,
    default_scopes: &'a Scopes,
}

/// Render the issuers of a registry, in registration order
///
/// # Errors
///
/// Returns [`CliError::Json`] if the summary cannot be serialized.
pub fn describe_issuers(registry: &IssuerRegistry, format: OutputFormat) -> CliResult<String> {
    let summaries: Vec<IssuerSummary<'_>> = registry
        .iter()
        .map(|config| IssuerSummary {
            issuer: &config.issuer,
            provider: config.kind(),
            algorithms: config.algorithms.iter().map(|a| format!("{a:?}")).collect(),
            default_scopes: &config.default_scopes,
        })
        .collect();

    match format {
        OutputFormat::Json => Ok(serde_json::to_string(&summaries)?),
        OutputFormat::Human => {
            let mut out = format!("{} issuer(s)\n", summaries.len());
            for summary in &summaries {
                out.push_str(&format!(
                    "  {}  [{}]  algorithms={}",
                    summary.issuer,
                    summary.provider,
                    summary.algorithms.join(",")
                ));
                if !summary.default_scopes.is_empty() {
                    out.push_str(&format!(
                        "  default_scopes=\"{}\"",
                        summary.default_scopes.to_delimited()
                    ));
                }
                out.push('\n');
            }
            Ok(out)
        }
    }
}

/// `verify`: print normalized claims, or fail with the rejection cause
///
/// # Errors
///
/// Returns an error if the issuer file is invalid, no token was given, or
/// the token is rejected.
pub async fn verify(args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let verifier = load_verifier(&args.issuers.config)?;
    let token = resolve_token(&args, io::stdin().lock())?;

    let claims = verifier
        .try_verify(&token)
        .await
        .map_err(|e| CliError::Unauthorized(e.to_string()))?;

    println!("{}", render_claims(&claims, format)?);
    Ok(())
}

/// `check-config`: validate an issuer file and list its issuers
///
/// # Errors
///
/// Returns an error if the issuer file cannot be loaded or is invalid.
pub fn check_config(args: &IssuerFileArgs, format: OutputFormat) -> anyhow::Result<()> {
    let verifier = load_verifier(&args.config)?;
    print!("{}", describe_issuers(verifier.registry(), format)?);
    Ok(())
}
