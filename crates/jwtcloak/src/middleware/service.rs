//! Tower Service for bearer authentication
//!
//! Works with any `http::Request<B>` service (Axum, Tower-HTTP, hyper):
//! - Extracts the token from the `Authorization` header
//! - Verifies it with the shared [`TokenVerifier`]
//! - Inserts the verified [`Claims`] into the request's extensions
//! - Answers `401 Unauthorized` itself on rejection, unless anonymous access is allowed

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderValue, Request, Response, StatusCode};
use tower_service::Service;
use tracing::debug;

use crate::claims::Claims;
use crate::verifier::{Outcome, TokenVerifier};

use super::BearerAuthConfig;

/// Tower Service that performs bearer token verification
#[derive(Debug, Clone)]
pub struct BearerAuthService<S> {
    inner: S,
    verifier: Arc<TokenVerifier>,
    config: BearerAuthConfig,
}

impl<S> BearerAuthService<S> {
    /// Create a new bearer auth service
    pub fn new(inner: S, verifier: Arc<TokenVerifier>, config: BearerAuthConfig) -> Self {
        Self {
            inner,
            verifier,
            config,
        }
    }

    /// Get a reference to the inner service
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner service
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

/// Future type for [`BearerAuthService`] responses
pub type BearerAuthFuture<T, E> = BoxFuture<'static, Result<T, E>>;

fn unauthorized<ResBody: Default>() -> Response<ResBody> {
    let mut response = Response::new(ResBody::default());
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

impl<S, B, ResBody> Service<Request<B>> for BearerAuthService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BearerAuthFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if self.config.should_bypass(req.uri().path()) {
            return Box::pin(inner.call(req));
        }

        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let verifier = Arc::clone(&self.verifier);
        let allow_anonymous = self.config.allow_anonymous;

        Box::pin(async move {
            let outcome = match header {
                Some(header) => verifier.verify_authorization(&header).await,
                None => Outcome::Unauthorized,
            };

            match outcome {
                Outcome::Authenticated(claims) => {
                    req.extensions_mut().insert::<Claims>(claims);
                    inner.call(req).await
                }
                Outcome::Unauthorized if allow_anonymous => {
                    debug!(path = %req.uri().path(), "Passing unauthenticated request through");
                    inner.call(req).await
                }
                Outcome::Unauthorized => Ok(unauthorized()),
            }
        })
    }
}
