//! Error types for jwtcloak
//!
//! Follows a 3-tier error hierarchy:
//! - Verification: per-call failures ([`VerifyError`]), always collapsed to
//!   [`Outcome::Unauthorized`](crate::Outcome::Unauthorized) at the trust boundary
//! - Remote: key set and introspection endpoint failures ([`KeyFetchError`],
//!   [`IntrospectionError`]), converted into [`VerifyError`] automatically
//! - Configuration: issuer file and registry validation ([`ConfigError`]),
//!   raised once at construction time

use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Why a single verification call failed
///
/// Callers outside the verifier never see these variants directly: the
/// engine logs the cause and reports a plain `Unauthorized`. They are exposed
/// through [`TokenVerifier::try_verify`](crate::TokenVerifier::try_verify) for
/// diagnostics.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum VerifyError {
    /// Token could not be decoded (segments, base64, JSON, missing `iss`)
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Claimed issuer has no registry entry
    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),

    /// Local cryptographic check failed (wrong key, algorithm, expired, tampered)
    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Remote key retrieval failed
    #[error("key fetch failed: {0}")]
    KeyFetch(#[from] KeyFetchError),

    /// Introspection endpoint unreachable or answered with garbage
    #[error("introspection request failed: {0}")]
    IntrospectionTransport(#[from] IntrospectionError),

    /// Introspection endpoint reported the token as not active
    #[error("token reported inactive by introspection endpoint")]
    IntrospectionInactive,
}

/// Remote key set retrieval errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum KeyFetchError {
    /// Token header has no `kid`, so there is nothing to look up
    #[error("token header carries no kid")]
    MissingKeyId,

    /// HTTP request failed (connect, timeout, body read)
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Key set URL
        url: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// Key set endpoint answered with a non-2xx status
    #[error("{url} returned status {status}")]
    Status {
        /// Key set URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Response body is not a JSON Web Key Set
    #[error("invalid key set document: {0}")]
    InvalidKeySet(String),

    /// Key set does not contain the requested key id
    #[error("key id '{0}' not present in key set")]
    KeyNotFound(String),

    /// Key was found but cannot be turned into a verification key
    #[error("unusable key material for kid '{kid}': {reason}")]
    InvalidKey {
        /// Key id
        kid: String,
        /// Why the JWK was rejected
        reason: String,
    },
}

/// Token introspection (RFC 7662) call errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IntrospectionError {
    /// HTTP request failed (connect, timeout, body read)
    #[error("introspection transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Endpoint answered with a non-2xx status
    #[error("introspection endpoint returned status {0}")]
    Status(u16),

    /// Body was not a JSON introspection response
    #[error("invalid introspection response: {0}")]
    InvalidResponse(String),
}

/// Configuration errors, raised while building the issuer registry
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Two entries share the same issuer identity
    #[error("issuer '{0}' is configured more than once")]
    DuplicateIssuer(String),

    /// A provider-specific field is required but absent
    #[error("issuer '{issuer}': missing required field '{field}'")]
    MissingField {
        /// Issuer identity
        issuer: String,
        /// Settings field name
        field: &'static str,
    },

    /// Static key material could not be parsed
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Algorithm name unknown, or incompatible with the configured key
    #[error("issuer '{issuer}': algorithm '{algorithm}' is not usable here")]
    InvalidAlgorithm {
        /// Issuer identity
        issuer: String,
        /// Offending algorithm name
        algorithm: String,
    },

    /// Allow-list is empty, so no token could ever verify
    #[error("issuer '{0}': algorithm allow-list is empty")]
    EmptyAlgorithms(String),

    /// Base URL or endpoint is not a usable absolute URL
    #[error("issuer '{issuer}': invalid URL: {reason}")]
    InvalidUrl {
        /// Issuer identity
        issuer: String,
        /// Parse failure
        reason: String,
    },

    /// HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// Issuer file could not be read or deserialized
    #[error("failed to load settings: {0}")]
    Load(#[from] ::config::ConfigError),
}
