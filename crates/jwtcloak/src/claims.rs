//! Token claims and scope normalization
//!
//! [`Claims`] is the single claim-set shape returned by every verification
//! protocol. Registered claims from RFC 7519 get typed fields; everything else
//! is kept verbatim in [`Claims::additional`].
//!
//! # Scope handling
//!
//! Issuers disagree on how `scope` is encoded. Keycloak sends a space
//! delimited string, others send an array, and many tokens carry no scope at
//! all. [`Scopes`] accepts all three and always exposes an ordered list with
//! no duplicates.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Header, decode_header};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::VerifyError;

/// Claim name carrying the authenticated marker in serialized claims
pub const AUTHENTICATED_BY_CLAIM: &str = "authenticated_by";

/// Which verification protocol vouched for a claim set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Signature checked against a statically configured key
    Local,
    /// Signature checked against a key fetched from the issuer's realm key set
    #[serde(rename = "remote-keyset")]
    RemoteKeySet,
    /// Token reported active by the issuer's introspection endpoint
    Introspection,
}

impl ProviderKind {
    /// Settings name of this provider kind
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::RemoteKeySet => "remote-keyset",
            Self::Introspection => "introspection",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, duplicate-free set of scope strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Scopes(Vec<String>);

impl Scopes {
    /// Create an empty scope set
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a space delimited scope string, keeping first occurrences
    pub fn from_delimited(value: &str) -> Self {
        value.split_whitespace().collect()
    }

    /// Union `other` into this set: existing scopes first, then new ones
    pub fn merge<'a, I>(&mut self, other: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for scope in other {
            if !self.contains(scope) {
                self.0.push(scope.clone());
            }
        }
    }

    /// Whether the set contains `scope`
    pub fn contains(&self, scope: &str) -> bool {
        self.0.iter().any(|s| s == scope)
    }

    /// Number of scopes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate scopes in order
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Borrow the scopes as a slice
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Space delimited form, as used on the wire by OAuth 2.0
    pub fn to_delimited(&self) -> String {
        self.0.join(" ")
    }
}

impl<S: AsRef<str>> FromIterator<S> for Scopes {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut scopes = Self::new();
        for scope in iter {
            let scope = scope.as_ref();
            if !scope.is_empty() && !scopes.contains(scope) {
                scopes.0.push(scope.to_string());
            }
        }
        scopes
    }
}

impl<'a> IntoIterator for &'a Scopes {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for Scopes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawScope {
            Delimited(String),
            List(Vec<String>),
        }

        Ok(match Option::<RawScope>::deserialize(deserializer)? {
            None => Self::new(),
            Some(RawScope::Delimited(value)) => Self::from_delimited(&value),
            Some(RawScope::List(values)) => values.into_iter().collect(),
        })
    }
}

/// NumericDate claim: whole or fractional seconds, truncated to whole seconds
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDate {
        Whole(u64),
        Fractional(f64),
    }

    match Option::<RawDate>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawDate::Whole(secs)) => Ok(Some(secs)),
        Some(RawDate::Fractional(secs)) if secs.is_finite() && secs >= 0.0 => {
            Ok(Some(secs.trunc() as u64))
        }
        Some(RawDate::Fractional(secs)) => Err(serde::de::Error::custom(format!(
            "invalid NumericDate {secs}"
        ))),
    }
}

/// Normalized claim set
///
/// `iss` is mandatory: a token without an issuer cannot be routed to a trust
/// configuration and is treated as malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer (iss)
    pub iss: String,

    /// Subject (sub)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience (aud), either a string or an array
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,

    /// Expiration Time (exp) - Unix timestamp
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<u64>,

    /// Not Before (nbf) - Unix timestamp
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub nbf: Option<u64>,

    /// Issued At (iat) - Unix timestamp
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<u64>,

    /// Granted scopes, normalized
    #[serde(default)]
    pub scope: Scopes,

    /// Set once a verification protocol has vouched for these claims
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub authenticated_by: Option<ProviderKind>,

    /// All other claims
    #[serde(flatten)]
    pub additional: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    /// Create a claim set for `issuer` with nothing else populated
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            iss: issuer.into(),
            sub: None,
            aud: None,
            exp: None,
            nbf: None,
            iat: None,
            scope: Scopes::new(),
            authenticated_by: None,
            additional: serde_json::Map::new(),
        }
    }

    /// Whether a verification protocol vouched for these claims
    pub fn is_authenticated(&self) -> bool {
        self.authenticated_by.is_some()
    }

    /// Look up a non-registered claim
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.additional.get(name)
    }

    /// Drop claims a token must never be able to set on its own
    pub(crate) fn strip_reserved(mut self) -> Self {
        self.additional.remove(AUTHENTICATED_BY_CLAIM);
        self
    }
}

/// Decode header and payload without verifying anything
///
/// Used to route a token to its issuer's trust configuration. The result must
/// never be treated as authenticated on its own.
///
/// # Errors
///
/// Returns [`VerifyError::MalformedToken`] if:
/// - The header is not a valid JOSE header
/// - The token does not have exactly 3 segments
/// - The payload is not base64url JSON
/// - The payload has no `iss` claim
pub fn decode_unverified(token: &str) -> Result<(Header, Claims), VerifyError> {
    let header = decode_header(token)
        .map_err(|e| VerifyError::MalformedToken(format!("invalid JWT header: {e}")))?;

    let mut segments = token.split('.');
    let payload = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(VerifyError::MalformedToken(
                "JWT must have 3 segments".to_string(),
            ));
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| VerifyError::MalformedToken(format!("invalid payload encoding: {e}")))?;

    let claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|e| VerifyError::MalformedToken(format!("invalid claims: {e}")))?;

    Ok((header, claims.strip_reserved()))
}
