//! Realm key set verification and key caching
//!
//! Tests cover:
//! - Lazy fetch on first use, then cache hits with no further requests
//! - Unknown key ids, endpoint failures and malformed key sets
//! - Single-flight fetch under concurrent first use
//! - Request timeouts

mod common;

use common::{MockRealmServer, REALM_KID, REALM_SECRET, mint_hs256, oct_jwk, test_claims};
use jsonwebtoken::Algorithm;
use jwtcloak::{
    IssuerConfig, KeyFetchError, Outcome, ProviderKind, TokenVerifier, VerifyError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::ResponseTemplate;

const REALM: &str = "acme";

fn config(mock: &MockRealmServer, realm: &str) -> IssuerConfig {
    IssuerConfig::remote_key_set(mock.issuer(realm), &mock.base_url(), realm)
        .unwrap()
        .with_algorithms(vec![Algorithm::HS256])
}

fn verifier(mock: &MockRealmServer) -> TokenVerifier {
    TokenVerifier::builder()
        .issuer(config(mock, REALM).with_default_scopes(["read"]))
        .request_timeout(Duration::from_millis(500))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_key_fetched_once_then_cached() {
    let mock = MockRealmServer::start().await;
    mock.mock_certs(REALM, vec![oct_jwk(REALM_KID, REALM_SECRET)], 1)
        .await;
    let verifier = verifier(&mock);

    let token = mint_hs256(
        &test_claims(&mock.issuer(REALM), "alice", 300),
        REALM_SECRET,
        Some(REALM_KID),
    );

    let first = verifier.verify(&token).await;
    let second = verifier.verify(&token).await;

    let claims = first.claims().unwrap();
    assert_eq!(claims.authenticated_by, Some(ProviderKind::RemoteKeySet));
    assert_eq!(claims.scope.as_slice(), ["read"]);
    assert_eq!(first, second);
    assert!(verifier.key_cache().contains(&mock.issuer(REALM), REALM_KID));
    // MockServer verifies `.expect(1)` on drop
}

#[tokio::test]
async fn test_cached_key_serves_other_tokens() {
    let mock = MockRealmServer::start().await;
    mock.mock_certs(REALM, vec![oct_jwk(REALM_KID, REALM_SECRET)], 1)
        .await;
    let verifier = verifier(&mock);

    for subject in ["alice", "bob", "carol"] {
        let token = mint_hs256(
            &test_claims(&mock.issuer(REALM), subject, 300),
            REALM_SECRET,
            Some(REALM_KID),
        );
        let claims = verifier.verify(&token).await.into_claims().unwrap();
        assert_eq!(claims.sub.as_deref(), Some(subject));
    }
}

#[tokio::test]
async fn test_unknown_kid_rejected_and_not_cached() {
    let mock = MockRealmServer::start().await;
    mock.mock_certs(REALM, vec![oct_jwk(REALM_KID, REALM_SECRET)], 2)
        .await;
    let verifier = verifier(&mock);

    let token = mint_hs256(
        &test_claims(&mock.issuer(REALM), "alice", 300),
        REALM_SECRET,
        Some("rotated-away"),
    );

    assert!(matches!(
        verifier.try_verify(&token).await,
        Err(VerifyError::KeyFetch(KeyFetchError::KeyNotFound(kid))) if kid == "rotated-away"
    ));
    // A failed lookup leaves nothing behind, so the next call asks again
    assert_eq!(verifier.verify(&token).await, Outcome::Unauthorized);
    assert!(verifier.key_cache().is_empty());
}

#[tokio::test]
async fn test_missing_kid_makes_no_request() {
    let mock = MockRealmServer::start().await;
    mock.mock_certs(REALM, vec![oct_jwk(REALM_KID, REALM_SECRET)], 0)
        .await;

    let token = mint_hs256(
        &test_claims(&mock.issuer(REALM), "alice", 300),
        REALM_SECRET,
        None,
    );
    assert!(matches!(
        verifier(&mock).try_verify(&token).await,
        Err(VerifyError::KeyFetch(KeyFetchError::MissingKeyId))
    ));
}

#[tokio::test]
async fn test_key_set_server_error_rejected() {
    let mock = MockRealmServer::start().await;
    mock.mock_certs_response(REALM, ResponseTemplate::new(500), 1)
        .await;

    let token = mint_hs256(
        &test_claims(&mock.issuer(REALM), "alice", 300),
        REALM_SECRET,
        Some(REALM_KID),
    );
    assert!(matches!(
        verifier(&mock).try_verify(&token).await,
        Err(VerifyError::KeyFetch(KeyFetchError::Status { status: 500, .. }))
    ));
}

#[tokio::test]
async fn test_malformed_key_set_rejected() {
    let mock = MockRealmServer::start().await;
    mock.mock_certs_response(
        REALM,
        ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"),
        1,
    )
    .await;

    let token = mint_hs256(
        &test_claims(&mock.issuer(REALM), "alice", 300),
        REALM_SECRET,
        Some(REALM_KID),
    );
    assert!(matches!(
        verifier(&mock).try_verify(&token).await,
        Err(VerifyError::KeyFetch(KeyFetchError::InvalidKeySet(_)))
    ));
}

#[tokio::test]
async fn test_slow_key_set_times_out() {
    let mock = MockRealmServer::start().await;
    mock.mock_certs_response(
        REALM,
        ResponseTemplate::new(200)
            .set_body_json(json!({"keys": [oct_jwk(REALM_KID, REALM_SECRET)]}))
            .set_delay(Duration::from_secs(3)),
        1,
    )
    .await;

    let token = mint_hs256(
        &test_claims(&mock.issuer(REALM), "alice", 300),
        REALM_SECRET,
        Some(REALM_KID),
    );
    assert!(matches!(
        verifier(&mock).try_verify(&token).await,
        Err(VerifyError::KeyFetch(KeyFetchError::Transport { .. }))
    ));
}

#[tokio::test]
async fn test_wrong_key_in_key_set_rejected() {
    let mock = MockRealmServer::start().await;
    mock.mock_certs(
        REALM,
        vec![oct_jwk(REALM_KID, b"some-other-secret-that-does-not-match!!!")],
        1,
    )
    .await;

    let token = mint_hs256(
        &test_claims(&mock.issuer(REALM), "alice", 300),
        REALM_SECRET,
        Some(REALM_KID),
    );
    assert!(matches!(
        verifier(&mock).try_verify(&token).await,
        Err(VerifyError::SignatureInvalid(_))
    ));
}

#[tokio::test]
async fn test_keys_are_scoped_per_issuer() {
    // Two realms on one server publish the same kid with different secrets
    let mock = MockRealmServer::start().await;
    let other_secret: &[u8] = b"second-realm-signing-secret-for-tests-000001";
    mock.mock_certs("acme", vec![oct_jwk(REALM_KID, REALM_SECRET)], 1)
        .await;
    mock.mock_certs("globex", vec![oct_jwk(REALM_KID, other_secret)], 1)
        .await;

    let verifier = TokenVerifier::new([config(&mock, "acme"), config(&mock, "globex")]).unwrap();

    let acme = mint_hs256(
        &test_claims(&mock.issuer("acme"), "alice", 300),
        REALM_SECRET,
        Some(REALM_KID),
    );
    let globex = mint_hs256(
        &test_claims(&mock.issuer("globex"), "bob", 300),
        other_secret,
        Some(REALM_KID),
    );
    // Claims globex but signed with acme's key
    let confused = mint_hs256(
        &test_claims(&mock.issuer("globex"), "mallory", 300),
        REALM_SECRET,
        Some(REALM_KID),
    );

    assert!(verifier.verify(&acme).await.is_authenticated());
    assert!(verifier.verify(&globex).await.is_authenticated());
    assert_eq!(verifier.verify(&confused).await, Outcome::Unauthorized);
    assert_eq!(verifier.key_cache().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_fetches_once() {
    let mock = MockRealmServer::start().await;
    mock.mock_certs_response(
        REALM,
        ResponseTemplate::new(200)
            .set_body_json(json!({"keys": [oct_jwk(REALM_KID, REALM_SECRET)]}))
            .set_delay(Duration::from_millis(100)),
        1,
    )
    .await;
    let verifier = Arc::new(verifier(&mock));

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..32 {
        let verifier = Arc::clone(&verifier);
        let token = mint_hs256(
            &test_claims(&mock.issuer(REALM), &format!("user-{i}"), 300),
            REALM_SECRET,
            Some(REALM_KID),
        );
        tasks.spawn(async move { verifier.verify(&token).await.is_authenticated() });
    }

    while let Some(result) = tasks.join_next().await {
        assert!(result.unwrap());
    }
}
