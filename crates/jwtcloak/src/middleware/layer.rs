//! Tower Layer for bearer authentication

use std::sync::Arc;
use tower::Layer;

use crate::verifier::TokenVerifier;

use super::BearerAuthConfig;
use super::service::BearerAuthService;

/// Tower Layer that adds bearer token verification to services
///
/// This layer wraps inner services with [`BearerAuthService`].
#[derive(Debug, Clone)]
pub struct BearerAuthLayer {
    verifier: Arc<TokenVerifier>,
    config: BearerAuthConfig,
}

impl BearerAuthLayer {
    /// Create a new layer with default configuration
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self::with_config(verifier, BearerAuthConfig::default())
    }

    /// Create a new layer with custom configuration
    pub fn with_config(verifier: Arc<TokenVerifier>, config: BearerAuthConfig) -> Self {
        Self { verifier, config }
    }

    /// Let requests without a valid token through
    #[must_use]
    pub fn allow_anonymous(mut self) -> Self {
        self.config.allow_anonymous = true;
        self
    }

    /// Skip verification for a request path
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.config.bypass_paths.push(path.into());
        self
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService::new(inner, Arc::clone(&self.verifier), self.config.clone())
    }
}
