//! Local signature verification
//!
//! Verifies a token's signature against either the issuer's static key or a
//! key obtained from its realm key set, with:
//! - Algorithm allow-list enforced before any key is resolved
//! - Exact issuer match (a key is never trusted for another issuer)
//! - Expiration / not-before checks with per-issuer leeway
//! - Optional audience check
//!
//! Every failure is reported as [`VerifyError::SignatureInvalid`] or
//! [`VerifyError::KeyFetch`]; the engine collapses both to `Unauthorized`.

use std::collections::HashMap;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Header, TokenData, Validation, decode};
use tracing::{debug, warn};

use crate::claims::Claims;
use crate::config::{IssuerConfig, ProviderConfig};
use crate::error::{KeyFetchError, VerifyError};
use crate::jwks::{KeyCache, KeyResolver};

/// Signature verifier for `local` and `remote-keyset` issuers
#[derive(Debug, Clone, Default)]
pub struct LocalVerifier {
    /// Issuer -> key resolver, for remote-keyset issuers
    resolvers: HashMap<String, Arc<dyn KeyResolver>>,
    /// Fetched keys, shared across calls
    cache: Arc<KeyCache>,
}

impl LocalVerifier {
    /// Create a verifier with no key resolvers
    pub fn new(cache: Arc<KeyCache>) -> Self {
        Self {
            resolvers: HashMap::new(),
            cache,
        }
    }

    /// Attach the key resolver used for `issuer`
    pub fn add_resolver(&mut self, issuer: impl Into<String>, resolver: Arc<dyn KeyResolver>) {
        self.resolvers.insert(issuer.into(), resolver);
    }

    /// Key cache used by this verifier
    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    /// Verify `token` against `config`
    ///
    /// `header` is the token's untrusted header, already decoded by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SignatureInvalid`] if the algorithm is not
    /// allowed, the signature does not match, the token is expired or not yet
    /// valid, or issuer/audience do not match. Returns
    /// [`VerifyError::KeyFetch`] if the signing key cannot be resolved.
    pub async fn verify(
        &self,
        token: &str,
        header: &Header,
        config: &IssuerConfig,
    ) -> Result<Claims, VerifyError> {
        if !config.algorithms.contains(&header.alg) {
            warn!(
                issuer = %config.issuer,
                algorithm = ?header.alg,
                allowed = ?config.algorithms,
                "JWT algorithm not allowed"
            );
            return Err(VerifyError::SignatureInvalid(format!(
                "algorithm {:?} not allowed",
                header.alg
            )));
        }

        let key = self.resolve_key(header, config).await?;
        let validation = Self::validation(config, header.alg);

        let token_data: TokenData<Claims> = decode(token, &key, &validation).map_err(|e| {
            debug!(issuer = %config.issuer, error = %e, "JWT validation failed");
            VerifyError::SignatureInvalid(e.to_string())
        })?;
        let claims = token_data.claims.strip_reserved();

        if claims.iss != config.issuer {
            return Err(VerifyError::SignatureInvalid(format!(
                "issuer '{}' does not match '{}'",
                claims.iss, config.issuer
            )));
        }

        debug!(
            issuer = %config.issuer,
            subject = ?claims.sub,
            algorithm = ?header.alg,
            "JWT signature verified"
        );
        Ok(config.finish(claims))
    }

    async fn resolve_key(
        &self,
        header: &Header,
        config: &IssuerConfig,
    ) -> Result<DecodingKey, VerifyError> {
        match &config.provider {
            ProviderConfig::Local { key } => Ok(key.decoding_key().clone()),
            ProviderConfig::RemoteKeySet { .. } => {
                let kid = header.kid.as_deref().ok_or(KeyFetchError::MissingKeyId)?;
                let resolver = self.resolvers.get(&config.issuer).ok_or_else(|| {
                    VerifyError::UnknownIssuer(format!("no key resolver for {}", config.issuer))
                })?;
                Ok(self
                    .cache
                    .get_or_fetch(&config.issuer, kid, resolver.as_ref())
                    .await?)
            }
            ProviderConfig::Introspection { .. } => Err(VerifyError::SignatureInvalid(format!(
                "issuer '{}' is verified by introspection",
                config.issuer
            ))),
        }
    }

    fn validation(config: &IssuerConfig, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["iss"]);
        validation.leeway = config.leeway.as_secs();
        validation.validate_nbf = true;
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}
