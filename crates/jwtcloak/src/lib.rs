//! # jwtcloak - Multi-Issuer Bearer Token Verification
//!
//! Verifies bearer tokens issued by any number of trusted issuers, each with
//! its own trust configuration, and hands back one normalized claim set.
//!
//! ## Design Principles
//!
//! - **Closed provider set**: every issuer is `local`, `remote-keyset` or
//!   `introspection`, with the fields each one needs checked at startup
//! - **Exact issuer binding**: a key or endpoint is only ever used for the
//!   issuer it was configured for
//! - **Opaque rejections**: callers see [`Outcome::Unauthorized`] and nothing
//!   more; the cause goes to the log
//!
//! ## Architecture
//!
//! - [`registry`] - Issuer identity to trust configuration
//! - [`local`] - Signature verification (static key or realm key set)
//! - [`jwks`] - Realm key set fetching and the process-wide key cache
//! - [`introspection`] - RFC 7662 token introspection
//! - [`verifier`] - The engine: decode, look up, dispatch, normalize
//! - [`config`] - Typed issuer configuration and issuer file loading
//! - `middleware` - Tower layer (feature `middleware`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jwtcloak::{IssuerConfig, Outcome, SigningKey, TokenVerifier};
//! use secrecy::SecretString;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = TokenVerifier::new([
//!     IssuerConfig::local("https://legacy.example.com", SigningKey::secret("shared-secret")),
//!     IssuerConfig::remote_key_set(
//!         "https://sso.example.com/realms/acme",
//!         "https://sso.example.com",
//!         "acme",
//!     )?
//!     .with_default_scopes(["read"]),
//!     IssuerConfig::introspection(
//!         "https://sso.example.com/realms/partners",
//!         "orders-api",
//!         SecretString::new("client-secret".to_string()),
//!     )?,
//! ])?;
//!
//! match verifier.verify_authorization("Bearer eyJhbGciOi...").await {
//!     Outcome::Authenticated(claims) => println!("scopes: {:?}", claims.scope),
//!     Outcome::Unauthorized => println!("401"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `middleware` (default) - Tower `BearerAuthLayer` for `http` services
//! - `full` - All features enabled

pub mod bearer;
pub mod claims;
pub mod config;
pub mod error;
pub mod introspection;
pub mod jwks;
pub mod local;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod registry;
pub mod verifier;

#[doc(inline)]
pub use bearer::extract_bearer;

#[doc(inline)]
pub use claims::{Claims, ProviderKind, Scopes, decode_unverified};

#[doc(inline)]
pub use config::{
    ClaimFilter, IssuerConfig, IssuerSettings, KeyFamily, ProviderConfig, SigningKey,
    VerifierSettings,
};

#[doc(inline)]
pub use error::{ConfigError, ConfigResult, IntrospectionError, KeyFetchError, VerifyError};

#[doc(inline)]
pub use jwks::{KeyCache, KeyResolver, RealmKeySetResolver};

#[doc(inline)]
pub use registry::IssuerRegistry;

#[doc(inline)]
pub use verifier::{Outcome, TokenVerifier, VerifierBuilder};

#[cfg(feature = "middleware")]
pub use middleware::{BearerAuthConfig, BearerAuthLayer, BearerAuthService};
