//! Verification engine
//!
//! [`TokenVerifier`] is the single entry point. Per call it:
//!
//! 1. Decodes the token without trust to read `iss` (and the header)
//! 2. Looks the issuer up in the [`IssuerRegistry`]
//! 3. Dispatches to [`LocalVerifier`] or [`IntrospectionVerifier`] by provider kind
//! 4. Returns the finished claim set (filtered, marked, default scopes merged)
//!
//! Any failure is terminal for the call and is reported to the caller as a
//! plain [`Outcome::Unauthorized`]. The cause is only logged.
//!
//! Remote calls happen only in step 3. Dropping the returned future abandons
//! the in-flight request; a key fetch shared with other callers keeps going
//! for them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::bearer::extract_bearer;
use crate::claims::{Claims, ProviderKind, decode_unverified};
use crate::config::{DEFAULT_REQUEST_TIMEOUT, IssuerConfig, ProviderConfig, VerifierSettings};
use crate::error::{ConfigError, ConfigResult, VerifyError};
use crate::introspection::IntrospectionVerifier;
use crate::jwks::{KeyCache, KeyResolver, RealmKeySetResolver};
use crate::local::LocalVerifier;
use crate::registry::IssuerRegistry;

/// Externally visible result of a verification call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Token verified; claims are normalized and marked authenticated
    Authenticated(Claims),
    /// Token rejected, for whatever reason
    Unauthorized,
}

impl Outcome {
    /// Whether the token was accepted
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Verified claims, if any
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Authenticated(claims) => Some(claims),
            Self::Unauthorized => None,
        }
    }

    /// Consume the outcome, returning the verified claims if any
    pub fn into_claims(self) -> Option<Claims> {
        match self {
            Self::Authenticated(claims) => Some(claims),
            Self::Unauthorized => None,
        }
    }
}

impl From<Result<Claims, VerifyError>> for Outcome {
    fn from(result: Result<Claims, VerifyError>) -> Self {
        match result {
            Ok(claims) => Self::Authenticated(claims),
            Err(_) => Self::Unauthorized,
        }
    }
}

/// Multi-issuer bearer token verifier
///
/// Cheap to share: wrap it in an [`Arc`] and call it from any number of tasks.
///
/// # Example
///
/// ```rust
/// use jwtcloak::{IssuerConfig, SigningKey, TokenVerifier};
///
/// let verifier = TokenVerifier::builder()
///     .issuer(
///         IssuerConfig::local("https://legacy.example.com", SigningKey::secret("shared-secret"))
///             .with_default_scopes(["read"]),
///     )
///     .build()
///     .unwrap();
/// assert_eq!(verifier.registry().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    registry: IssuerRegistry,
    local: LocalVerifier,
    introspection: IntrospectionVerifier,
}

impl TokenVerifier {
    /// Start building a verifier
    pub fn builder() -> VerifierBuilder {
        VerifierBuilder::default()
    }

    /// Build a verifier with default HTTP settings
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any issuer configuration is invalid or
    /// duplicated.
    pub fn new(configs: impl IntoIterator<Item = IssuerConfig>) -> ConfigResult<Self> {
        Self::builder().issuers(configs).build()
    }

    /// Build a verifier from loaded settings
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any issuer entry is invalid or duplicated.
    pub fn from_settings(settings: &VerifierSettings) -> ConfigResult<Self> {
        Self::builder()
            .request_timeout(settings.request_timeout())
            .issuers(settings.issuer_configs()?)
            .build()
    }

    /// Issuer registry
    pub fn registry(&self) -> &IssuerRegistry {
        &self.registry
    }

    /// Cache of fetched realm keys
    pub fn key_cache(&self) -> &Arc<KeyCache> {
        self.local.cache()
    }

    /// Verify `token`, reporting only whether it was accepted
    ///
    /// The cause of a rejection is logged at `warn` level and otherwise
    /// discarded.
    pub async fn verify(&self, token: &str) -> Outcome {
        match self.try_verify(token).await {
            Ok(claims) => Outcome::Authenticated(claims),
            Err(e) => {
                warn!(error = %e, "Rejected bearer token");
                Outcome::Unauthorized
            }
        }
    }

    /// Verify the token carried by an `Authorization` header value
    pub async fn verify_authorization(&self, header: &str) -> Outcome {
        match extract_bearer(header) {
            Some(token) => self.verify(token).await,
            None => {
                debug!("No bearer token in Authorization header");
                Outcome::Unauthorized
            }
        }
    }

    /// Verify `token`, keeping the rejection cause
    ///
    /// For diagnostics only; request handling should use [`Self::verify`] so
    /// causes never reach the client.
    ///
    /// # Errors
    ///
    /// Returns the [`VerifyError`] of the stage that rejected the token.
    pub async fn try_verify(&self, token: &str) -> Result<Claims, VerifyError> {
        let (header, payload) = decode_unverified(token)?;

        let config = self
            .registry
            .lookup(&payload.iss)
            .ok_or_else(|| VerifyError::UnknownIssuer(payload.iss.clone()))?;

        debug!(
            issuer = %config.issuer,
            provider = %config.kind(),
            kid = ?header.kid,
            "Dispatching token verification"
        );

        match config.kind() {
            ProviderKind::Local | ProviderKind::RemoteKeySet => {
                self.local.verify(token, &header, config).await
            }
            ProviderKind::Introspection => self.introspection.verify(token, payload, config).await,
        }
    }
}

/// Builder for [`TokenVerifier`]
#[derive(Debug, Default)]
pub struct VerifierBuilder {
    issuers: Vec<IssuerConfig>,
    resolvers: HashMap<String, Arc<dyn KeyResolver>>,
    request_timeout: Option<Duration>,
    http_client: Option<reqwest::Client>,
    key_cache: Option<Arc<KeyCache>>,
}

impl VerifierBuilder {
    /// Add one issuer
    #[must_use]
    pub fn issuer(mut self, config: IssuerConfig) -> Self {
        self.issuers.push(config);
        self
    }

    /// Add several issuers, in order
    #[must_use]
    pub fn issuers(mut self, configs: impl IntoIterator<Item = IssuerConfig>) -> Self {
        self.issuers.extend(configs);
        self
    }

    /// Replace the realm key set resolver of a `remote-keyset` issuer
    #[must_use]
    pub fn key_resolver(mut self, issuer: impl Into<String>, resolver: Arc<dyn KeyResolver>) -> Self {
        self.resolvers.insert(issuer.into(), resolver);
        self
    }

    /// Bound on key set and introspection calls (default 10 seconds)
    ///
    /// Ignored when a custom HTTP client is supplied.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Use a preconfigured HTTP client for all remote calls
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Share a key cache with other verifiers
    #[must_use]
    pub fn key_cache(mut self, cache: Arc<KeyCache>) -> Self {
        self.key_cache = Some(cache);
        self
    }

    /// Validate the issuers and build the verifier
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an issuer is invalid or duplicated, or the
    /// HTTP client cannot be built.
    pub fn build(self) -> ConfigResult<TokenVerifier> {
        let Self {
            issuers,
            mut resolvers,
            request_timeout,
            http_client,
            key_cache,
        } = self;

        let registry = IssuerRegistry::new(issuers)?;
        let http_client = match http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
                .build()
                .map_err(ConfigError::HttpClient)?,
        };

        let mut local = LocalVerifier::new(key_cache.unwrap_or_default());
        let mut introspection = IntrospectionVerifier::new();

        for config in registry.iter() {
            match &config.provider {
                ProviderConfig::Local { .. } => {}
                ProviderConfig::RemoteKeySet { base_url, realm } => {
                    let resolver: Arc<dyn KeyResolver> = match resolvers.remove(&config.issuer) {
                        Some(resolver) => resolver,
                        None => Arc::new(RealmKeySetResolver::new(
                            &config.issuer,
                            base_url,
                            realm,
                            http_client.clone(),
                        )?),
                    };
                    local.add_resolver(config.issuer.clone(), resolver);
                }
                ProviderConfig::Introspection { .. } => {
                    introspection.register(config, http_client.clone());
                }
            }
        }

        for issuer in resolvers.keys() {
            warn!(issuer = %issuer, "Key resolver supplied for an issuer without a realm key set; ignoring");
        }

        debug!(issuers = registry.len(), "Token verifier ready");
        Ok(TokenVerifier {
            registry,
            local,
            introspection,
        })
    }
}
