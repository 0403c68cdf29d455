//! Common test utilities for integration tests
//!
//! Provides a mock identity server (realm key sets and introspection
//! endpoints) and helpers for minting HS256 test tokens.

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// HMAC secret published as an `oct` key by the mock realm
pub const REALM_SECRET: &[u8] = b"realm-signing-secret-for-integration-tests-00001";

/// Key id of [`REALM_SECRET`] in the mock realm key set
pub const REALM_KID: &str = "realm-key-1";

/// Mock identity server hosting any number of realms
pub struct MockRealmServer {
    pub server: MockServer,
}

impl MockRealmServer {
    /// Start a new mock identity server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL, as configured in `base_url`
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Issuer identity of `realm` on this server
    pub fn issuer(&self, realm: &str) -> String {
        format!("{}/realms/{}", self.server.uri(), realm)
    }

    /// Path of the realm key set endpoint
    pub fn certs_path(realm: &str) -> String {
        format!("/realms/{realm}/protocol/openid-connect/certs")
    }

    /// Path of the realm introspection endpoint
    pub fn introspection_path(realm: &str) -> String {
        format!("/realms/{realm}/protocol/openid-connect/token/introspect")
    }

    /// Mock the realm key set, expecting exactly `calls` fetches
    pub async fn mock_certs(&self, realm: &str, keys: Vec<serde_json::Value>, calls: u64) {
        Mock::given(method("GET"))
            .and(path(Self::certs_path(realm)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Mock the realm key set endpoint with an arbitrary response
    pub async fn mock_certs_response(&self, realm: &str, response: ResponseTemplate, calls: u64) {
        Mock::given(method("GET"))
            .and(path(Self::certs_path(realm)))
            .respond_with(response)
            .expect(calls)
            .mount(&self.server)
            .await;
    }
}

/// `oct` JWK publishing an HMAC secret
pub fn oct_jwk(kid: &str, secret: &[u8]) -> serde_json::Value {
    json!({
        "kty": "oct",
        "kid": kid,
        "use": "sig",
        "alg": "HS256",
        "k": URL_SAFE_NO_PAD.encode(secret),
    })
}

/// Mint an HS256 token, optionally carrying a `kid`
pub fn mint_hs256(claims: &serde_json::Value, secret: &[u8], kid: Option<&str>) -> String {
    mint(Algorithm::HS256, claims, secret, kid)
}

/// Mint an HMAC token with any HS* algorithm
pub fn mint(
    algorithm: Algorithm,
    claims: &serde_json::Value,
    secret: &[u8],
    kid: Option<&str>,
) -> String {
    let mut header = Header::new(algorithm);
    header.typ = Some("JWT".to_string());
    header.kid = kid.map(str::to_string);

    encode(&header, claims, &EncodingKey::from_secret(secret)).expect("Failed to encode test JWT")
}

/// Token with arbitrary header and payload and a junk signature
pub fn forge(header: &serde_json::Value, claims: &serde_json::Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap()),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap()),
        URL_SAFE_NO_PAD.encode(b"not-a-signature"),
    )
}

/// Get current Unix timestamp
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Standard claims for `iss`, valid for `exp_offset_secs` from now
pub fn test_claims(iss: &str, sub: &str, exp_offset_secs: i64) -> serde_json::Value {
    let now = current_timestamp();
    json!({
        "iss": iss,
        "sub": sub,
        "exp": (now as i64 + exp_offset_secs) as u64,
        "iat": now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_issuer() {
        let mock = MockRealmServer::start().await;
        assert!(mock.issuer("acme").ends_with("/realms/acme"));
    }

    #[test]
    fn test_current_timestamp() {
        let ts = current_timestamp();
        assert!(ts > 1700000000); // After Nov 2023
    }
}
