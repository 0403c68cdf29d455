//! Issuer Configuration Types
//!
//! Two layers:
//! - [`IssuerConfig`] / [`ProviderConfig`]: validated, typed trust configuration
//!   consumed by the verifier. Each provider kind carries exactly the fields it
//!   needs, so an incomplete issuer cannot reach request time.
//! - [`VerifierSettings`] / [`IssuerSettings`]: the raw, serde-friendly shape of
//!   an issuer file, turned into [`IssuerConfig`] by
//!   [`IssuerSettings::into_config`].
//!
//! # Issuer file
//!
//! ```toml
//! request_timeout_secs = 10
//!
//! [[issuers]]
//! issuer = "https://sso.example.com/realms/acme"
//! provider = "remote-keyset"
//! base_url = "https://sso.example.com"
//! realm = "acme"
//! default_scopes = ["read"]
//!
//! [[issuers]]
//! issuer = "https://legacy.example.com"
//! provider = "local"
//! key = "shared-secret"
//! algorithms = ["HS256"]
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::claims::{Claims, ProviderKind, Scopes};
use crate::error::{ConfigError, ConfigResult};
use crate::jwks::RealmKeySetResolver;

/// Path appended to the issuer to reach its introspection endpoint
pub const INTROSPECTION_PATH: &str = "protocol/openid-connect/token/introspect";

/// Default bound on key set and introspection calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment prefix for settings overrides (`JWTCLOAK__REQUEST_TIMEOUT_SECS`)
pub const ENV_PREFIX: &str = "JWTCLOAK";

/// Issuer-specific transform applied to verified claims
pub type ClaimFilter = Arc<dyn Fn(Claims) -> Claims + Send + Sync>;

/// Key families, used to check an allow-list against a static key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// HMAC shared secret (HS*)
    Hmac,
    /// RSA public key (RS*, PS*)
    Rsa,
    /// Elliptic curve public key (ES*)
    Ec,
    /// Edwards curve public key (EdDSA)
    Ed,
}

impl KeyFamily {
    /// Family an algorithm belongs to
    pub fn of(algorithm: Algorithm) -> Option<Self> {
        #[allow(unreachable_patterns)]
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Some(Self::Hmac),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Some(Self::Rsa),
            Algorithm::ES256 | Algorithm::ES384 => Some(Self::Ec),
            Algorithm::EdDSA => Some(Self::Ed),
            _ => None,
        }
    }

    /// Allow-list used when an issuer does not configure one
    pub fn default_algorithm(self) -> Algorithm {
        match self {
            Self::Hmac => Algorithm::HS256,
            Self::Rsa => Algorithm::RS256,
            Self::Ec => Algorithm::ES256,
            Self::Ed => Algorithm::EdDSA,
        }
    }
}

/// Statically configured verification key
#[derive(Clone)]
pub struct SigningKey {
    key: DecodingKey,
    family: KeyFamily,
}

// Manual Debug impl to keep key material out of logs
impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("family", &self.family)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SigningKey {
    /// HMAC shared secret, raw bytes
    pub fn secret(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            family: KeyFamily::Hmac,
        }
    }

    /// HMAC shared secret, base64 or base64url encoded, padding optional
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] if the value is not valid base64.
    pub fn base64_secret(secret: &str) -> ConfigResult<Self> {
        let normalized: String = secret
            .trim()
            .trim_end_matches('=')
            .chars()
            .map(|c| match c {
                '+' => '-',
                '/' => '_',
                c => c,
            })
            .collect();
        let bytes = URL_SAFE_NO_PAD
            .decode(normalized)
            .map_err(|e| ConfigError::InvalidKey(format!("base64 secret: {e}")))?;
        Ok(Self::secret(bytes))
    }

    /// RSA public key in PEM format
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] if the PEM cannot be parsed.
    pub fn rsa_pem(pem: &[u8]) -> ConfigResult<Self> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| ConfigError::InvalidKey(format!("RSA PEM: {e}")))?;
        Ok(Self {
            key,
            family: KeyFamily::Rsa,
        })
    }

    /// EC public key in PEM format
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] if the PEM cannot be parsed.
    pub fn ec_pem(pem: &[u8]) -> ConfigResult<Self> {
        let key = DecodingKey::from_ec_pem(pem)
            .map_err(|e| ConfigError::InvalidKey(format!("EC PEM: {e}")))?;
        Ok(Self {
            key,
            family: KeyFamily::Ec,
        })
    }

    /// Ed25519 public key in PEM format
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] if the PEM cannot be parsed.
    pub fn ed_pem(pem: &[u8]) -> ConfigResult<Self> {
        let key = DecodingKey::from_ed_pem(pem)
            .map_err(|e| ConfigError::InvalidKey(format!("Ed PEM: {e}")))?;
        Ok(Self {
            key,
            family: KeyFamily::Ed,
        })
    }

    /// Key family
    pub fn family(&self) -> KeyFamily {
        self.family
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

/// Provider-specific verification material
#[derive(Clone)]
pub enum ProviderConfig {
    /// Verify signatures with a static key
    Local {
        /// Verification key
        key: SigningKey,
    },
    /// Verify signatures with keys published in a realm key set
    RemoteKeySet {
        /// Identity server base URL (e.g. `https://sso.example.com`)
        base_url: Url,
        /// Realm name
        realm: String,
    },
    /// Ask the issuer whether the token is active
    Introspection {
        /// Introspection endpoint
        endpoint: Url,
        /// Client ID for HTTP Basic authentication
        client_id: String,
        /// Client secret for HTTP Basic authentication
        client_secret: SecretString,
    },
}

// Manual Debug impl to prevent client_secret exposure in logs
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { key } => f.debug_struct("Local").field("key", key).finish(),
            Self::RemoteKeySet { base_url, realm } => f
                .debug_struct("RemoteKeySet")
                .field("base_url", &base_url.as_str())
                .field("realm", realm)
                .finish(),
            Self::Introspection {
                endpoint,
                client_id,
                ..
            } => f
                .debug_struct("Introspection")
                .field("endpoint", &endpoint.as_str())
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
        }
    }
}

impl ProviderConfig {
    /// Provider kind of this configuration
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Local { .. } => ProviderKind::Local,
            Self::RemoteKeySet { .. } => ProviderKind::RemoteKeySet,
            Self::Introspection { .. } => ProviderKind::Introspection,
        }
    }
}

/// Trust configuration for one issuer
///
/// Built once at startup and read-only afterwards.
#[derive(Clone)]
pub struct IssuerConfig {
    /// Issuer identity, matched exactly against the `iss` claim
    pub issuer: String,
    /// Verification material
    pub provider: ProviderConfig,
    /// Scopes merged into every successful verification
    pub default_scopes: Scopes,
    /// Accepted signing algorithms
    pub algorithms: Vec<Algorithm>,
    /// Required audience, if any
    pub audience: Option<String>,
    /// Clock skew tolerance for `exp`/`nbf`
    pub leeway: Duration,
    /// Transform applied to verified claims
    pub claim_filter: Option<ClaimFilter>,
}

impl fmt::Debug for IssuerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerConfig")
            .field("issuer", &self.issuer)
            .field("provider", &self.provider)
            .field("default_scopes", &self.default_scopes)
            .field("algorithms", &self.algorithms)
            .field("audience", &self.audience)
            .field("leeway", &self.leeway)
            .field("claim_filter", &self.claim_filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl IssuerConfig {
    fn with_provider(issuer: String, provider: ProviderConfig, algorithms: Vec<Algorithm>) -> Self {
        Self {
            issuer,
            provider,
            default_scopes: Scopes::new(),
            algorithms,
            audience: None,
            leeway: Duration::ZERO,
            claim_filter: None,
        }
    }

    /// Issuer verified with a static key
    ///
    /// The allow-list defaults to the key family's standard algorithm.
    pub fn local(issuer: impl Into<String>, key: SigningKey) -> Self {
        let algorithms = vec![key.family().default_algorithm()];
        Self::with_provider(issuer.into(), ProviderConfig::Local { key }, algorithms)
    }

    /// Issuer verified with keys from `<base_url>/realms/<realm>/...`
    ///
    /// The allow-list defaults to `RS256`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if `base_url` is not an absolute URL
    /// that can carry a path.
    pub fn remote_key_set(
        issuer: impl Into<String>,
        base_url: &str,
        realm: impl Into<String>,
    ) -> ConfigResult<Self> {
        let issuer = issuer.into();
        let realm = realm.into();
        let base_url = parse_url(&issuer, base_url)?;
        RealmKeySetResolver::realm_certs_url(&issuer, &base_url, &realm)?;
        Ok(Self::with_provider(
            issuer,
            ProviderConfig::RemoteKeySet { base_url, realm },
            vec![Algorithm::RS256],
        ))
    }

    /// Issuer verified through its introspection endpoint
    ///
    /// The endpoint defaults to `<issuer>/protocol/openid-connect/token/introspect`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if the issuer is not an absolute URL.
    pub fn introspection(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> ConfigResult<Self> {
        let issuer = issuer.into();
        let endpoint = default_introspection_endpoint(&issuer)?;
        Ok(Self::with_provider(
            issuer,
            ProviderConfig::Introspection {
                endpoint,
                client_id: client_id.into(),
                client_secret,
            },
            vec![Algorithm::RS256],
        ))
    }

    /// Set default scopes
    #[must_use]
    pub fn with_default_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.default_scopes = scopes.into_iter().collect();
        self
    }

    /// Set the algorithm allow-list
    #[must_use]
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Require an audience
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Set clock skew tolerance
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Attach a claim filter
    #[must_use]
    pub fn with_claim_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(Claims) -> Claims + Send + Sync + 'static,
    {
        self.claim_filter = Some(Arc::new(filter));
        self
    }

    /// Override the introspection endpoint (introspection issuers only)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if `endpoint` is not an absolute URL.
    pub fn with_introspection_endpoint(mut self, endpoint: &str) -> ConfigResult<Self> {
        let parsed = parse_url(&self.issuer, endpoint)?;
        if let ProviderConfig::Introspection { endpoint, .. } = &mut self.provider {
            *endpoint = parsed;
        }
        Ok(self)
    }

    /// Provider kind
    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    /// Check invariants that cannot be expressed in the types
    ///
    /// # Errors
    ///
    /// Returns an error if the allow-list is empty, or names an algorithm
    /// whose family does not match a static key.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.algorithms.is_empty() {
            return Err(ConfigError::EmptyAlgorithms(self.issuer.clone()));
        }

        if let ProviderConfig::Local { key } = &self.provider
            && let Some(bad) = self
                .algorithms
                .iter()
                .find(|alg| KeyFamily::of(**alg) != Some(key.family()))
        {
            return Err(ConfigError::InvalidAlgorithm {
                issuer: self.issuer.clone(),
                algorithm: format!("{bad:?}"),
            });
        }

        Ok(())
    }

    /// Finish a verified claim set: filter, mark, merge default scopes
    pub(crate) fn finish(&self, claims: Claims) -> Claims {
        let mut claims = match &self.claim_filter {
            Some(filter) => filter(claims),
            None => claims,
        };
        claims.authenticated_by = Some(self.kind());
        claims.scope.merge(&self.default_scopes);
        claims
    }
}

fn parse_url(issuer: &str, value: &str) -> ConfigResult<Url> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        issuer: issuer.to_string(),
        reason: format!("{value}: {e}"),
    })
}

fn default_introspection_endpoint(issuer: &str) -> ConfigResult<Url> {
    let endpoint = format!("{}/{INTROSPECTION_PATH}", issuer.trim_end_matches('/'));
    parse_url(issuer, &endpoint)
}

/// Provider names accepted in issuer files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderSetting {
    /// Static key
    Local,
    /// Realm key set
    #[serde(rename = "remote-keyset")]
    RemoteKeySet,
    /// Introspection endpoint
    Introspection,
    /// Keycloak shorthand: `introspect` selects introspection, otherwise realm key set
    Keycloak,
}

/// Encoding of a static `key`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyFormat {
    /// Raw HMAC secret
    #[default]
    Secret,
    /// Base64url HMAC secret
    Base64Secret,
    /// RSA public key PEM
    RsaPem,
    /// EC public key PEM
    EcPem,
    /// Ed25519 public key PEM
    EdPem,
}

/// Raw issuer entry, as written in an issuer file
#[derive(Debug, Clone, Deserialize)]
pub struct IssuerSettings {
    /// Issuer identity
    pub issuer: String,
    /// Provider kind
    pub provider: ProviderSetting,
    /// Keycloak shorthand only: use introspection instead of the realm key set
    #[serde(default)]
    pub introspect: bool,
    /// Static key (local)
    #[serde(default)]
    pub key: Option<SecretString>,
    /// Static key encoding (local)
    #[serde(default)]
    pub key_format: KeyFormat,
    /// Identity server base URL (remote-keyset)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Realm name (remote-keyset)
    #[serde(default)]
    pub realm: Option<String>,
    /// Client ID (introspection)
    #[serde(default)]
    pub client_id: Option<String>,
    /// Client secret (introspection)
    #[serde(default)]
    pub client_secret: Option<SecretString>,
    /// Endpoint override (introspection)
    #[serde(default)]
    pub introspection_endpoint: Option<String>,
    /// Scopes merged into every successful verification
    #[serde(default)]
    pub default_scopes: Vec<String>,
    /// Algorithm allow-list, e.g. `["RS256"]`
    #[serde(default)]
    pub algorithms: Vec<String>,
    /// Required audience
    #[serde(default)]
    pub audience: Option<String>,
    /// Clock skew tolerance in seconds
    #[serde(default)]
    pub leeway_secs: u64,
}

impl IssuerSettings {
    fn require<T: Clone>(&self, value: &Option<T>, field: &'static str) -> ConfigResult<T> {
        value.clone().ok_or_else(|| ConfigError::MissingField {
            issuer: self.issuer.clone(),
            field,
        })
    }

    /// Provider kind this entry resolves to
    pub fn provider_kind(&self) -> ProviderKind {
        match (self.provider, self.introspect) {
            (ProviderSetting::Local, _) => ProviderKind::Local,
            (ProviderSetting::RemoteKeySet, _) | (ProviderSetting::Keycloak, false) => {
                ProviderKind::RemoteKeySet
            }
            (ProviderSetting::Introspection, _) | (ProviderSetting::Keycloak, true) => {
                ProviderKind::Introspection
            }
        }
    }

    fn signing_key(&self) -> ConfigResult<SigningKey> {
        let key = self.require(&self.key, "key")?;
        let material = key.expose_secret();
        match self.key_format {
            KeyFormat::Secret => Ok(SigningKey::secret(material.as_bytes())),
            KeyFormat::Base64Secret => SigningKey::base64_secret(material),
            KeyFormat::RsaPem => SigningKey::rsa_pem(material.as_bytes()),
            KeyFormat::EcPem => SigningKey::ec_pem(material.as_bytes()),
            KeyFormat::EdPem => SigningKey::ed_pem(material.as_bytes()),
        }
    }

    fn parse_algorithms(&self) -> ConfigResult<Vec<Algorithm>> {
        self.algorithms
            .iter()
            .map(|name| {
                Algorithm::from_str(name).map_err(|_| ConfigError::InvalidAlgorithm {
                    issuer: self.issuer.clone(),
                    algorithm: name.clone(),
                })
            })
            .collect()
    }

    /// Validate this entry and build its typed configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a field required by the provider kind is missing,
    /// key material or URLs cannot be parsed, or the algorithm allow-list is
    /// unusable.
    pub fn into_config(self) -> ConfigResult<IssuerConfig> {
        let mut config = match self.provider_kind() {
            ProviderKind::Local => IssuerConfig::local(self.issuer.clone(), self.signing_key()?),
            ProviderKind::RemoteKeySet => IssuerConfig::remote_key_set(
                self.issuer.clone(),
                &self.require(&self.base_url, "base_url")?,
                self.require(&self.realm, "realm")?,
            )?,
            ProviderKind::Introspection => {
                let config = IssuerConfig::introspection(
                    self.issuer.clone(),
                    self.require(&self.client_id, "client_id")?,
                    self.require(&self.client_secret, "client_secret")?,
                )?;
                match &self.introspection_endpoint {
                    Some(endpoint) => config.with_introspection_endpoint(endpoint)?,
                    None => config,
                }
            }
        };

        if !self.algorithms.is_empty() {
            config.algorithms = self.parse_algorithms()?;
        }
        config.default_scopes = self.default_scopes.iter().collect();
        config.audience = self.audience;
        config.leeway = Duration::from_secs(self.leeway_secs);

        config.validate()?;
        Ok(config)
    }
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

/// Verifier settings, as loaded from an issuer file
#[derive(Debug, Clone, Deserialize)]
pub struct VerifierSettings {
    /// Bound on key set and introspection calls, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Issuer entries, in file order
    #[serde(default)]
    pub issuers: Vec<IssuerSettings>,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            issuers: Vec::new(),
        }
    }
}

impl VerifierSettings {
    /// Load settings from a TOML, YAML or JSON file (by extension), with
    /// `JWTCLOAK__*` environment overrides layered on top
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file cannot be read or does not
    /// match the settings shape.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate every issuer entry, in file order
    ///
    /// # Errors
    ///
    /// Returns the first entry's validation error.
    pub fn issuer_configs(&self) -> ConfigResult<Vec<IssuerConfig>> {
        self.issuers
            .iter()
            .cloned()
            .map(IssuerSettings::into_config)
            .collect()
    }
}
