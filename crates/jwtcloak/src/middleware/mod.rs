//! # Tower Middleware
//!
//! Puts a [`TokenVerifier`](crate::TokenVerifier) in front of any
//! `http::Request` service.
//!
//! - [`BearerAuthLayer`] - Tower Layer wrapping services with bearer authentication
//! - [`BearerAuthService`] - Tower Service that verifies the `Authorization` header
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tower::ServiceBuilder;
//! use jwtcloak::middleware::BearerAuthLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(BearerAuthLayer::new(Arc::new(verifier)).bypass_path("/healthz"))
//!     .service(my_http_handler);
//! ```
//!
//! ## Request Extensions
//!
//! On success the verified [`Claims`](crate::Claims) are inserted into the
//! request's extensions:
//!
//! ```rust,ignore
//! if let Some(claims) = req.extensions().get::<jwtcloak::Claims>() {
//!     println!("Authenticated subject: {:?}", claims.sub);
//! }
//! ```
//!
//! Otherwise the request is answered with `401 Unauthorized` and
//! `WWW-Authenticate: Bearer`, unless anonymous requests are allowed. The
//! response never says why the token was rejected.

mod layer;
mod service;

pub use layer::BearerAuthLayer;
pub use service::{BearerAuthFuture, BearerAuthService};

/// Configuration for the bearer auth layer
#[derive(Debug, Clone, Default)]
pub struct BearerAuthConfig {
    /// Let requests without a valid token through, without claims attached
    pub allow_anonymous: bool,
    /// Request paths that skip verification entirely (e.g. "/healthz")
    pub bypass_paths: Vec<String>,
}

impl BearerAuthConfig {
    /// Config that lets unauthenticated requests through
    #[must_use]
    pub fn allow_anonymous() -> Self {
        Self {
            allow_anonymous: true,
            ..Default::default()
        }
    }

    /// Add a path to the bypass list
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.bypass_paths.push(path.into());
        self
    }

    /// Check if a request path should bypass verification
    #[must_use]
    pub fn should_bypass(&self, path: &str) -> bool {
        self.bypass_paths.iter().any(|p| p == path)
    }
}
