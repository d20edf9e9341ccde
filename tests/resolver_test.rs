// Integration tests for credential resolution
//
// A mockito server stands in for the Viridem API; `expect(n)` on each mock
// pins down how many network round-trips a resolution makes.

use mockito::{Matcher, Mock, Server, ServerGuard};
use reqwest::Method;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use viridem_auth::{
    auth::{CredentialRecord, CredentialResolver},
    cache::{now_millis, AuthKind, CacheConfigOverrides, TokenCache},
    error::{ApiError, AuthError},
    http_client::{build_client, ViridemHttpClient},
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

const CLIENT_BASIC: &str = "Basic Y2lkOnNlY3JldA==";
const USER_BASIC: &str = "Basic YWxpY2U6cHc=";

fn credentials(base_url: &str) -> CredentialRecord {
    CredentialRecord {
        base_url: Some(base_url.to_string()),
        username: Some("alice".to_string()),
        password: Some("pw".to_string()),
        client_id: Some("cid".to_string()),
        client_secret: Some("secret".to_string()),
    }
}

fn create_resolver() -> (Arc<TokenCache>, CredentialResolver) {
    let cache = Arc::new(TokenCache::new());
    let client = build_client(5, 5).expect("Failed to create HTTP client");
    let resolver = CredentialResolver::new(cache.clone(), client);
    (cache, resolver)
}

async fn mock_token(server: &mut ServerGuard, status: usize, body: &str, hits: usize) -> Mock {
    server
        .mock("POST", "/api/oauth/token")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_header("authorization", CLIENT_BASIC)
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "password".into()),
            Matcher::UrlEncoded("client_id".into(), "cid".into()),
            Matcher::UrlEncoded("client_secret".into(), "secret".into()),
            Matcher::UrlEncoded("username".into(), "alice".into()),
            Matcher::UrlEncoded("password".into(), "pw".into()),
        ]))
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

async fn mock_probe(server: &mut ServerGuard, status: usize, hits: usize) -> Mock {
    server
        .mock("GET", "/api/v1/viridem/versions")
        .match_header("authorization", USER_BASIC)
        .match_header("content-type", "application/json")
        .with_status(status)
        .with_body(r#"{"versions":["v1"]}"#)
        .expect(hits)
        .create_async()
        .await
}

// ==================================================================================================
// OAuth2 Path
// ==================================================================================================

#[tokio::test]
async fn test_oauth_success_is_cached() {
    let mut server = Server::new_async().await;
    let token = mock_token(
        &mut server,
        200,
        r#"{"access_token":"abc","expires_in":3600}"#,
        1,
    )
    .await;
    let probe = mock_probe(&mut server, 200, 0).await;

    let (cache, resolver) = create_resolver();
    let creds = credentials(&server.url());

    let header = assert_ok!(resolver.resolve_authorization_header(&creds).await);
    assert_eq!(header, "Bearer abc");

    // Second call is served from the cache
    let header = assert_ok!(resolver.resolve_authorization_header(&creds).await);
    assert_eq!(header, "Bearer abc");

    token.assert_async().await;
    probe.assert_async().await;

    let entry = cache.get(&resolver.cache_key(&creds)).unwrap();
    assert_eq!(entry.auth_kind, AuthKind::OAuth);
    assert_eq!(entry.credential_value, "abc");
    let expected = now_millis() + 3_600_000 - 60_000;
    assert!((entry.expires_at_epoch_millis - expected).abs() < 5_000);
}

#[tokio::test]
async fn test_float_expires_in_keeps_oauth_grant() {
    let mut server = Server::new_async().await;
    let token = mock_token(
        &mut server,
        200,
        r#"{"access_token":"abc","expires_in":3600.0}"#,
        1,
    )
    .await;
    let probe = mock_probe(&mut server, 401, 0).await;

    let (cache, resolver) = create_resolver();
    let creds = credentials(&server.url());

    let header = assert_ok!(resolver.resolve_authorization_header(&creds).await);
    assert_eq!(header, "Bearer abc");

    token.assert_async().await;
    probe.assert_async().await;

    let entry = cache.get(&resolver.cache_key(&creds)).unwrap();
    assert_eq!(entry.auth_kind, AuthKind::OAuth);
    let expected = now_millis() + 3_600_000 - 60_000;
    assert!((entry.expires_at_epoch_millis - expected).abs() < 5_000);
}

#[tokio::test]
async fn test_trailing_slash_in_base_url() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 200, r#"{"access_token":"abc"}"#, 1).await;

    let (_cache, resolver) = create_resolver();
    let creds = credentials(&format!("{}/", server.url()));

    let header = assert_ok!(resolver.resolve_authorization_header(&creds).await);
    assert_eq!(header, "Bearer abc");
    token.assert_async().await;
}

#[tokio::test]
async fn test_expired_token_triggers_new_exchange() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 200, r#"{"access_token":"abc","expires_in":1}"#, 2).await;

    let (cache, resolver) = create_resolver();
    // Buffer swallows the whole lifetime, so every entry is born stale
    cache.register_cache_config(
        "viridem-api",
        CacheConfigOverrides {
            expiry_buffer_millis: Some(1_000),
            minimum_cache_duration_millis: Some(0),
            ..Default::default()
        },
    );
    let creds = credentials(&server.url());

    assert_ok!(resolver.resolve_authorization_header(&creds).await);
    assert_ok!(resolver.resolve_authorization_header(&creds).await);

    token.assert_async().await;
}

// ==================================================================================================
// Basic Auth Fallback
// ==================================================================================================

#[tokio::test]
async fn test_oauth_rejected_falls_back_to_basic() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 401, r#"{"error":"invalid_client"}"#, 1).await;
    let probe = mock_probe(&mut server, 200, 1).await;

    let (cache, resolver) = create_resolver();
    let creds = credentials(&server.url());

    let header = assert_ok!(resolver.resolve_authorization_header(&creds).await);
    assert_eq!(header, USER_BASIC);

    // Cached header is reused as-is
    let header = assert_ok!(resolver.resolve_authorization_header(&creds).await);
    assert_eq!(header, USER_BASIC);

    token.assert_async().await;
    probe.assert_async().await;

    let entry = cache.get(&resolver.cache_key(&creds)).unwrap();
    assert_eq!(entry.auth_kind, AuthKind::Basic);
    assert_eq!(entry.credential_value, USER_BASIC);
    let expected = now_millis() + 3_600_000;
    assert!((entry.expires_at_epoch_millis - expected).abs() < 5_000);
}

#[tokio::test]
async fn test_error_field_in_2xx_falls_back_to_basic() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 200, r#"{"error":"invalid_grant"}"#, 1).await;
    let probe = mock_probe(&mut server, 200, 1).await;

    let (_cache, resolver) = create_resolver();
    let header = assert_ok!(
        resolver
            .resolve_authorization_header(&credentials(&server.url()))
            .await
    );
    assert_eq!(header, USER_BASIC);

    token.assert_async().await;
    probe.assert_async().await;
}

#[tokio::test]
async fn test_missing_access_token_falls_back_to_basic() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 200, r#"{"token_type":"bearer"}"#, 1).await;
    let probe = mock_probe(&mut server, 204, 1).await;

    let (_cache, resolver) = create_resolver();
    let header = assert_ok!(
        resolver
            .resolve_authorization_header(&credentials(&server.url()))
            .await
    );
    assert_eq!(header, USER_BASIC);

    token.assert_async().await;
    probe.assert_async().await;
}

#[tokio::test]
async fn test_oauth_server_error_still_falls_back() {
    // Fallback is deliberately broad: a transient 5xx from the token endpoint
    // also moves on to Basic Auth rather than failing the call
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 500, "internal error", 1).await;
    let probe = mock_probe(&mut server, 200, 1).await;

    let (_cache, resolver) = create_resolver();
    let header = assert_ok!(
        resolver
            .resolve_authorization_header(&credentials(&server.url()))
            .await
    );
    assert_eq!(header, USER_BASIC);

    token.assert_async().await;
    probe.assert_async().await;
}

// ==================================================================================================
// Terminal Failures
// ==================================================================================================

#[tokio::test]
async fn test_both_paths_fail() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 401, r#"{"error":"invalid_client"}"#, 1).await;
    let probe = mock_probe(&mut server, 403, 1).await;

    let (cache, resolver) = create_resolver();
    let creds = credentials(&server.url());

    let err = assert_err!(resolver.resolve_authorization_header(&creds).await);
    assert!(matches!(err, AuthError::Authentication { .. }));

    let message = err.to_string();
    assert!(message.contains("OAuth2 failed: HTTP 401"), "{}", message);
    assert!(message.contains("invalid_client"), "{}", message);
    assert!(message.contains("Basic Auth failed: HTTP 403"), "{}", message);

    token.assert_async().await;
    probe.assert_async().await;

    assert!(!cache.has(&resolver.cache_key(&creds)));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_unreachable_server_fails_both_paths() {
    let (cache, resolver) = create_resolver();

    // Nothing listens on the discard port
    let err = assert_err!(
        resolver
            .resolve_authorization_header(&credentials("http://127.0.0.1:9"))
            .await
    );

    let message = err.to_string();
    assert_eq!(message.matches("transport error").count(), 2, "{}", message);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_missing_client_secret_makes_no_network_call() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 200, r#"{"access_token":"abc"}"#, 0).await;
    let probe = mock_probe(&mut server, 200, 0).await;

    let (cache, resolver) = create_resolver();
    let mut creds = credentials(&server.url());
    creds.client_secret = None;

    let err = assert_err!(resolver.resolve_authorization_header(&creds).await);
    match &err {
        AuthError::Validation { missing } => assert_eq!(missing, &vec!["client_secret"]),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(err.to_string().contains("client_secret"));

    token.assert_async().await;
    probe.assert_async().await;
    assert!(cache.is_empty());
}

// ==================================================================================================
// Connection Test
// ==================================================================================================

#[tokio::test]
async fn test_connection_success_does_not_cache() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 200, r#"{"access_token":"abc"}"#, 1).await;

    let (cache, resolver) = create_resolver();
    assert_ok!(resolver.test_connection(&credentials(&server.url())).await);

    token.assert_async().await;
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_connection_does_not_fall_back() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 401, r#"{"error":"invalid_client"}"#, 1).await;
    let probe = mock_probe(&mut server, 200, 0).await;

    let (_cache, resolver) = create_resolver();
    let err = assert_err!(resolver.test_connection(&credentials(&server.url())).await);

    let message = err.to_string();
    assert!(message.contains("invalid_client"), "{}", message);
    assert!(!message.contains("Basic Auth"), "{}", message);

    token.assert_async().await;
    probe.assert_async().await;
}

// ==================================================================================================
// Outbound Calls
// ==================================================================================================

#[tokio::test]
async fn test_outbound_request_carries_resolved_header() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 200, r#"{"access_token":"abc"}"#, 1).await;
    let items = server
        .mock("GET", "/api/v1/items")
        .match_header("authorization", "Bearer abc")
        .with_status(200)
        .with_body(r#"{"items":[]}"#)
        .expect(2)
        .create_async()
        .await;

    let (_cache, resolver) = create_resolver();
    let http = ViridemHttpClient::new(build_client(5, 5).unwrap(), Arc::new(resolver));
    let creds = credentials(&server.url());

    for _ in 0..2 {
        let response = assert_ok!(http.request(&creds, Method::GET, "/api/v1/items").await);
        assert_eq!(response.text().await.unwrap(), r#"{"items":[]}"#);
    }

    token.assert_async().await;
    items.assert_async().await;
}

#[tokio::test]
async fn test_outbound_401_invalidates_cached_credentials() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 200, r#"{"access_token":"abc"}"#, 1).await;
    let items = server
        .mock("GET", "/api/v1/items")
        .with_status(401)
        .with_body("token revoked")
        .expect(1)
        .create_async()
        .await;

    let (cache, resolver) = create_resolver();
    let http = ViridemHttpClient::new(build_client(5, 5).unwrap(), Arc::new(resolver));
    let creds = credentials(&server.url());

    let err = assert_err!(http.request(&creds, Method::GET, "/api/v1/items").await);
    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "token revoked");
        }
        other => panic!("expected status error, got {:?}", other),
    }

    token.assert_async().await;
    items.assert_async().await;
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_outbound_request_surfaces_auth_failure() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 401, r#"{"error":"invalid_client"}"#, 1).await;
    let probe = mock_probe(&mut server, 401, 1).await;
    let items = server
        .mock("GET", "/api/v1/items")
        .expect(0)
        .create_async()
        .await;

    let (_cache, resolver) = create_resolver();
    let http = ViridemHttpClient::new(build_client(5, 5).unwrap(), Arc::new(resolver));

    let err = assert_err!(
        http.request(&credentials(&server.url()), Method::GET, "/api/v1/items")
            .await
    );
    assert!(matches!(err, ApiError::Auth(AuthError::Authentication { .. })));

    token.assert_async().await;
    probe.assert_async().await;
    items.assert_async().await;
}
