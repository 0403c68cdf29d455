//! Realm key set fetching and public key caching
//!
//! Fetching and caching are split:
//!
//! - [`KeyResolver`] turns a key id into a verification key. It is stateless
//!   per call; [`RealmKeySetResolver`] implements it against a realm's JWKS
//!   endpoint (`<base>/realms/<realm>/protocol/openid-connect/certs`).
//! - [`KeyCache`] owns the caching policy. Keys are cached per
//!   `(issuer, kid)` for the life of the process and never re-fetched.
//!
//! # Concurrency
//!
//! The first fetch for a given `(issuer, kid)` is single-flight: concurrent
//! callers wait on the same [`OnceCell`] instead of issuing their own request.
//! A failed fetch leaves nothing behind, so the next call tries again.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{ConfigError, ConfigResult, KeyFetchError};

/// Retrieves an issuer's verification key by key id
#[async_trait]
pub trait KeyResolver: Send + Sync + fmt::Debug {
    /// Fetch the key identified by `kid`
    ///
    /// # Errors
    ///
    /// Returns [`KeyFetchError`] on transport failure, non-2xx status,
    /// malformed key material, or when `kid` is not in the key set.
    async fn fetch(&self, kid: &str) -> Result<DecodingKey, KeyFetchError>;
}

/// Key resolver backed by a realm's JWKS endpoint
///
/// # Example
///
/// ```rust
/// use jwtcloak::jwks::RealmKeySetResolver;
/// use url::Url;
///
/// let base = Url::parse("https://sso.example.com").unwrap();
/// let resolver = RealmKeySetResolver::new(
///     "https://sso.example.com/realms/acme",
///     &base,
///     "acme",
///     reqwest::Client::new(),
/// ).unwrap();
/// assert_eq!(
///     resolver.certs_url().as_str(),
///     "https://sso.example.com/realms/acme/protocol/openid-connect/certs"
/// );
/// ```
#[derive(Clone)]
pub struct RealmKeySetResolver {
    /// Realm JWKS endpoint
    certs_url: Url,
    /// HTTP client (carries the request timeout)
    http_client: reqwest::Client,
}

impl fmt::Debug for RealmKeySetResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealmKeySetResolver")
            .field("certs_url", &self.certs_url.as_str())
            .field("http_client", &"<reqwest::Client>")
            .finish()
    }
}

impl RealmKeySetResolver {
    /// Create a resolver for `issuer`, reading `realm` under `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if `base_url` cannot carry a path.
    pub fn new(
        issuer: &str,
        base_url: &Url,
        realm: &str,
        http_client: reqwest::Client,
    ) -> ConfigResult<Self> {
        Ok(Self {
            certs_url: Self::realm_certs_url(issuer, base_url, realm)?,
            http_client,
        })
    }

    /// JWKS endpoint of `realm` under `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if `base_url` cannot carry a path.
    pub fn realm_certs_url(issuer: &str, base_url: &Url, realm: &str) -> ConfigResult<Url> {
        let mut url = base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ConfigError::InvalidUrl {
                issuer: issuer.to_string(),
                reason: format!("{base_url} cannot be a base URL"),
            })?
            .pop_if_empty()
            .extend(["realms", realm, "protocol", "openid-connect", "certs"]);
        Ok(url)
    }

    /// JWKS endpoint this resolver reads
    pub fn certs_url(&self) -> &Url {
        &self.certs_url
    }

    async fn fetch_key_set(&self) -> Result<JwkSet, KeyFetchError> {
        let url = self.certs_url.as_str();
        info!(certs_url = %url, "Fetching realm key set");

        let response = self
            .http_client
            .get(self.certs_url.clone())
            .send()
            .await
            .map_err(|e| {
                error!(certs_url = %url, error = %e, "Failed to fetch key set");
                KeyFetchError::Transport {
                    url: url.to_string(),
                    source: e,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(certs_url = %url, status = %status, "Key set endpoint returned error status");
            return Err(KeyFetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| KeyFetchError::Transport {
            url: url.to_string(),
            source: e,
        })?;

        let jwks: JwkSet = serde_json::from_slice(&body).map_err(|e| {
            error!(certs_url = %url, error = %e, "Failed to parse key set JSON");
            KeyFetchError::InvalidKeySet(e.to_string())
        })?;

        debug!(certs_url = %url, key_count = jwks.keys.len(), "Fetched realm key set");
        Ok(jwks)
    }
}

#[async_trait]
impl KeyResolver for RealmKeySetResolver {
    async fn fetch(&self, kid: &str) -> Result<DecodingKey, KeyFetchError> {
        let jwks = self.fetch_key_set().await?;

        let jwk = jwks.find(kid).ok_or_else(|| {
            warn!(certs_url = %self.certs_url, kid = kid, "Key ID not found in key set");
            KeyFetchError::KeyNotFound(kid.to_string())
        })?;

        DecodingKey::from_jwk(jwk).map_err(|e| KeyFetchError::InvalidKey {
            kid: kid.to_string(),
            reason: e.to_string(),
        })
    }
}

type KeySlot = Arc<OnceCell<DecodingKey>>;

/// Process-lifetime cache of verification keys, keyed by `(issuer, kid)`
#[derive(Default)]
pub struct KeyCache {
    slots: DashMap<(String, String), KeySlot>,
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("cached_keys", &self.len())
            .finish()
    }
}

impl KeyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached key, fetching it through `resolver` on first use
    ///
    /// # Errors
    ///
    /// Returns the resolver's [`KeyFetchError`]. Failures are not cached.
    pub async fn get_or_fetch(
        &self,
        issuer: &str,
        kid: &str,
        resolver: &dyn KeyResolver,
    ) -> Result<DecodingKey, KeyFetchError> {
        let key = (issuer.to_string(), kid.to_string());
        // Clone the slot out so the shard lock is not held across the fetch
        let slot: KeySlot = Arc::clone(self.slots.entry(key.clone()).or_default().value());

        if let Some(cached) = slot.get() {
            debug!(issuer = issuer, kid = kid, "Using cached verification key");
            return Ok(cached.clone());
        }

        match slot.get_or_try_init(|| resolver.fetch(kid)).await {
            Ok(fetched) => Ok(fetched.clone()),
            Err(e) => {
                self.slots.remove_if(&key, |_, slot| !slot.initialized());
                Err(e)
            }
        }
    }

    /// Whether a key is cached for `(issuer, kid)`
    pub fn contains(&self, issuer: &str, kid: &str) -> bool {
        self.slots
            .get(&(issuer.to_string(), kid.to_string()))
            .is_some_and(|slot| slot.initialized())
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.initialized()).count()
    }

    /// Whether the cache holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
