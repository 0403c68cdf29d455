//! OAuth 2.0 Token Introspection (RFC 7662)
//!
//! Verifies a token by asking the issuing realm whether it is currently
//! active. The endpoint's `active` field is the only thing trusted from the
//! response: on success the claims are the token's own (untrusted-decoded)
//! payload, so both verification protocols hand back the same shape.
//!
//! # Example
//!
//! ```rust,no_run
//! use jwtcloak::introspection::IntrospectionClient;
//! use secrecy::SecretString;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = IntrospectionClient::new(
//!     Url::parse("https://sso.example.com/realms/acme/protocol/openid-connect/token/introspect")?,
//!     "orders-api",
//!     SecretString::new("client-secret".to_string()),
//!     reqwest::Client::new(),
//! );
//!
//! if client.introspect("access_token_here").await?.active {
//!     println!("Token is active");
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::header::{AUTHORIZATION, CONNECTION};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::claims::Claims;
use crate::config::{IssuerConfig, ProviderConfig};
use crate::error::{IntrospectionError, VerifyError};

/// Token introspection response per RFC 7662 Section 2.2
///
/// Only `active` is consulted. A response without it is read as inactive.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active
    #[serde(default)]
    pub active: bool,

    /// Everything else the endpoint reported
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Client for one issuer's introspection endpoint
#[derive(Clone)]
pub struct IntrospectionClient {
    /// Introspection endpoint URL
    endpoint: Url,

    /// Client ID for HTTP Basic authentication
    client_id: String,

    /// Client secret for HTTP Basic authentication
    client_secret: SecretString,

    /// HTTP client (carries the request timeout)
    http_client: reqwest::Client,
}

// Manual Debug impl to prevent client_secret exposure in logs
impl fmt::Debug for IntrospectionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrospectionClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("http_client", &"<reqwest::Client>")
            .finish()
    }
}

impl IntrospectionClient {
    /// Create a new introspection client
    pub fn new(
        endpoint: Url,
        client_id: impl Into<String>,
        client_secret: SecretString,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            endpoint,
            client_id: client_id.into(),
            client_secret,
            http_client,
        }
    }

    /// Endpoint this client posts to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn basic_credentials(&self) -> String {
        let pair = format!("{}:{}", self.client_id, self.client_secret.expose_secret());
        format!("Basic {}", STANDARD.encode(pair))
    }

    /// Introspect a token
    ///
    /// Sends `token=<token>` form-encoded, authenticated with HTTP Basic.
    ///
    /// # Errors
    ///
    /// Returns [`IntrospectionError`] if:
    /// - The request fails or times out
    /// - The endpoint answers with a non-2xx status
    /// - The body is not a JSON object
    pub async fn introspect(&self, token: &str) -> Result<IntrospectionResponse, IntrospectionError> {
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, self.basic_credentials())
            .header(CONNECTION, "keep-alive")
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| {
                error!(endpoint = %self.endpoint, error = %e, "Introspection request failed");
                IntrospectionError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint = %self.endpoint, status = %status, "Introspection endpoint returned error status");
            return Err(IntrospectionError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            warn!(endpoint = %self.endpoint, error = %e, "Failed to parse introspection response");
            IntrospectionError::InvalidResponse(e.to_string())
        })
    }
}

/// Verifier for `introspection` issuers
#[derive(Debug, Clone, Default)]
pub struct IntrospectionVerifier {
    /// Issuer -> endpoint client
    clients: HashMap<String, IntrospectionClient>,
}

impl IntrospectionVerifier {
    /// Create a verifier with no clients
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the endpoint client for `config`, if it is an introspection issuer
    pub fn register(&mut self, config: &IssuerConfig, http_client: reqwest::Client) {
        if let ProviderConfig::Introspection {
            endpoint,
            client_id,
            client_secret,
        } = &config.provider
        {
            self.clients.insert(
                config.issuer.clone(),
                IntrospectionClient::new(
                    endpoint.clone(),
                    client_id.clone(),
                    client_secret.clone(),
                    http_client,
                ),
            );
        }
    }

    /// Verify `token` against `config`
    ///
    /// `payload` is the token's untrusted-decoded claim set. It becomes the
    /// verified claim set only if the endpoint reports the token active.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::IntrospectionInactive`] when the endpoint says
    /// the token is not active, and [`VerifyError::IntrospectionTransport`]
    /// when the endpoint cannot be asked.
    pub async fn verify(
        &self,
        token: &str,
        payload: Claims,
        config: &IssuerConfig,
    ) -> Result<Claims, VerifyError> {
        let client = self.clients.get(&config.issuer).ok_or_else(|| {
            VerifyError::UnknownIssuer(format!("no introspection client for {}", config.issuer))
        })?;

        let response = client.introspect(token).await?;
        if !response.active {
            debug!(issuer = %config.issuer, "Token reported inactive");
            return Err(VerifyError::IntrospectionInactive);
        }

        debug!(issuer = %config.issuer, subject = ?payload.sub, "Token reported active");
        Ok(config.finish(payload))
    }
}
