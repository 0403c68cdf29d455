//! Introspection verification against a mock realm
//!
//! Tests cover:
//! - Wire format: form body, HTTP Basic credentials, endpoint path
//! - `active` true / false / missing
//! - Transport failures: error status, garbage body, refused connection, timeout
//! - Claims come from the token, never from the introspection response

mod common;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::{MockRealmServer, forge, mint_hs256, test_claims};
use jwtcloak::{IntrospectionError, IssuerConfig, Outcome, ProviderKind, TokenVerifier, VerifyError};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, ResponseTemplate};

const REALM: &str = "partners";
const CLIENT_ID: &str = "orders-api";
const CLIENT_SECRET: &str = "orders-api-secret";

fn config(mock: &MockRealmServer) -> IssuerConfig {
    IssuerConfig::introspection(
        mock.issuer(REALM),
        CLIENT_ID,
        SecretString::new(CLIENT_SECRET.to_string()),
    )
    .unwrap()
    .with_default_scopes(["read"])
}

fn verifier(mock: &MockRealmServer) -> TokenVerifier {
    TokenVerifier::builder()
        .issuer(config(mock))
        .request_timeout(Duration::from_millis(500))
        .build()
        .unwrap()
}

fn token(mock: &MockRealmServer) -> String {
    let mut claims = test_claims(&mock.issuer(REALM), "alice", 300);
    claims["scope"] = json!("orders:read");
    // Introspection issuers are not checked locally, any signature will do
    mint_hs256(&claims, b"not-known-to-the-verifier", None)
}

async fn mock_introspection(mock: &MockRealmServer, response: ResponseTemplate, calls: u64) {
    Mock::given(method("POST"))
        .and(path(MockRealmServer::introspection_path(REALM)))
        .respond_with(response)
        .expect(calls)
        .mount(&mock.server)
        .await;
}

#[tokio::test]
async fn test_request_wire_format() {
    let mock = MockRealmServer::start().await;
    let token = token(&mock);
    let basic = format!(
        "Basic {}",
        STANDARD.encode(format!("{CLIENT_ID}:{CLIENT_SECRET}"))
    );

    Mock::given(method("POST"))
        .and(path(MockRealmServer::introspection_path(REALM)))
        .and(header("authorization", basic.as_str()))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(header("connection", "keep-alive"))
        .and(body_string(format!("token={token}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"active": true})))
        .expect(1)
        .mount(&mock.server)
        .await;

    assert!(verifier(&mock).verify(&token).await.is_authenticated());
}

#[tokio::test]
async fn test_active_token_returns_token_claims() {
    let mock = MockRealmServer::start().await;
    mock_introspection(
        &mock,
        ResponseTemplate::new(200).set_body_json(json!({
            "active": true,
            "sub": "someone-else",
            "scope": "admin"
        })),
        1,
    )
    .await;

    let claims = verifier(&mock)
        .verify(&token(&mock))
        .await
        .into_claims()
        .unwrap();

    assert_eq!(claims.sub.as_deref(), Some("alice"));
    assert_eq!(claims.scope.as_slice(), ["orders:read", "read"]);
    assert_eq!(claims.authenticated_by, Some(ProviderKind::Introspection));
}

#[tokio::test]
async fn test_inactive_token_rejected() {
    let mock = MockRealmServer::start().await;
    mock_introspection(
        &mock,
        ResponseTemplate::new(200).set_body_json(json!({"active": false})),
        2,
    )
    .await;
    let verifier = verifier(&mock);
    let token = token(&mock);

    assert_eq!(verifier.verify(&token).await, Outcome::Unauthorized);
    assert!(matches!(
        verifier.try_verify(&token).await,
        Err(VerifyError::IntrospectionInactive)
    ));
}

#[tokio::test]
async fn test_missing_active_field_rejected() {
    let mock = MockRealmServer::start().await;
    mock_introspection(
        &mock,
        ResponseTemplate::new(200).set_body_json(json!({"sub": "alice"})),
        1,
    )
    .await;

    assert_eq!(
        verifier(&mock).verify(&token(&mock)).await,
        Outcome::Unauthorized
    );
}

#[tokio::test]
async fn test_error_status_rejected() {
    let mock = MockRealmServer::start().await;
    mock_introspection(&mock, ResponseTemplate::new(500), 1).await;

    assert!(matches!(
        verifier(&mock).try_verify(&token(&mock)).await,
        Err(VerifyError::IntrospectionTransport(IntrospectionError::Status(500)))
    ));
}

#[tokio::test]
async fn test_garbage_body_rejected() {
    let mock = MockRealmServer::start().await;
    mock_introspection(
        &mock,
        ResponseTemplate::new(200).set_body_string("{\"active\": tru"),
        1,
    )
    .await;

    assert!(matches!(
        verifier(&mock).try_verify(&token(&mock)).await,
        Err(VerifyError::IntrospectionTransport(
            IntrospectionError::InvalidResponse(_)
        ))
    ));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let mock = MockRealmServer::start().await;
    mock_introspection(
        &mock,
        ResponseTemplate::new(200)
            .set_body_json(json!({"active": true}))
            .set_delay(Duration::from_secs(3)),
        1,
    )
    .await;

    assert!(matches!(
        verifier(&mock).try_verify(&token(&mock)).await,
        Err(VerifyError::IntrospectionTransport(
            IntrospectionError::Transport(_)
        ))
    ));
}

#[tokio::test]
async fn test_unreachable_endpoint_rejected() {
    let mock = MockRealmServer::start().await;
    let config = config(&mock)
        .with_introspection_endpoint("http://127.0.0.1:1/introspect")
        .unwrap();
    let verifier = TokenVerifier::builder()
        .issuer(config)
        .request_timeout(Duration::from_millis(500))
        .build()
        .unwrap();

    assert!(matches!(
        verifier.try_verify(&token(&mock)).await,
        Err(VerifyError::IntrospectionTransport(
            IntrospectionError::Transport(_)
        ))
    ));
}

#[tokio::test]
async fn test_unknown_issuer_never_reaches_endpoint() {
    let mock = MockRealmServer::start().await;
    mock_introspection(
        &mock,
        ResponseTemplate::new(200).set_body_json(json!({"active": true})),
        0,
    )
    .await;

    let stranger = mint_hs256(
        &test_claims(&mock.issuer("strangers"), "alice", 300),
        b"whatever",
        None,
    );
    assert!(matches!(
        verifier(&mock).try_verify(&stranger).await,
        Err(VerifyError::UnknownIssuer(_))
    ));
}

#[tokio::test]
async fn test_malformed_token_never_reaches_endpoint() {
    let mock = MockRealmServer::start().await;
    mock_introspection(
        &mock,
        ResponseTemplate::new(200).set_body_json(json!({"active": true})),
        0,
    )
    .await;

    let no_issuer = forge(&json!({"alg": "HS256"}), &json!({"sub": "alice"}));
    assert_eq!(
        verifier(&mock).verify(&no_issuer).await,
        Outcome::Unauthorized
    );
}
