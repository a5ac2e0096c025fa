//! Error scenario and edge case tests
//!
//! Run with: cargo test --test error_scenarios_tests
//! Covers:
//! - Configuration errors
//! - Invalid request bodies and paths
//! - Error response shape

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::IntoResponse;
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use cinema::api::{create_router, AppState};
use cinema::auth::{InMemoryUserStore, RuleTable, SystemClock};
use cinema::config::{load_config_from_path, Config, RuleConfig, SameSite};
use cinema::error::Error;

// ============================================================================
// Configuration Error Tests
// ============================================================================

#[test]
fn test_error_config_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let result = load_config_from_path(&temp_dir.path().join("missing.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound));
    assert!(err.to_string().contains("cinema init"));
    println!("✓ ConfigNotFound error: {}", err);
}

#[test]
fn test_error_config_invalid_toml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cinema.toml");
    fs::write(&path, "this is [ not valid toml").unwrap();

    let err = load_config_from_path(&path).unwrap_err();
    assert!(matches!(err, Error::TomlParse(_)));
    assert!(err.to_string().contains("TOML"));
}

#[test]
fn test_error_config_unknown_role() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cinema.toml");
    fs::write(
        &path,
        r#"
[security]
jwt_secret = "x"

[[security.rules]]
pattern = "/x/**"
roles = ["SUPERUSER"]
"#,
    )
    .unwrap();

    assert!(load_config_from_path(&path).is_err());
}

#[tokio::test]
async fn test_error_missing_secret_refuses_to_start() {
    let err = AppState::from_config(&Config::default()).await.err().unwrap();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("jwt_secret"));
}

#[test]
fn test_error_same_site_none_needs_secure() {
    let mut config = Config::default();
    config.security.jwt_secret = "0123456789abcdef0123456789abcdef".into();
    config.security.cookie.same_site = SameSite::None;
    config.security.cookie.secure = false;
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn test_error_rule_with_two_access_forms() {
    let mut config = Config::default();
    config.security.rules.push(RuleConfig {
        pattern: "/x".into(),
        method: None,
        permit_all: true,
        authenticated: true,
        roles: vec![],
    });
    let err = RuleTable::from_config(&config.security).unwrap_err();
    assert!(err.to_string().contains("exactly one"));
}

#[test]
fn test_error_rule_with_bad_method() {
    let mut config = Config::default();
    config.security.rules.push(RuleConfig {
        pattern: "/x".into(),
        method: Some("GE T".into()),
        permit_all: true,
        authenticated: false,
        roles: vec![],
    });
    assert!(RuleTable::from_config(&config.security).is_err());
}

// ============================================================================
// Error Response Tests
// ============================================================================

#[tokio::test]
async fn test_error_response_hides_internal_detail() {
    let response = Error::Other("connection string with password".into()).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Internal server error");
}

// ============================================================================
// Invalid Request Tests
// ============================================================================

fn router() -> (axum::Router, String) {
    let mut config = Config::default();
    config.security.jwt_secret = "error-tests-secret-0123456789abcdef".into();
    let state = AppState::build(
        &config,
        Arc::new(InMemoryUserStore::new()),
        Arc::new(SystemClock),
    )
    .unwrap();
    // Validly signed, but the store has no such user
    let token = state.auth.codec.issue("nobody").unwrap();
    (create_router(state), format!("JwtCookie={}", token))
}

async fn call(router: &axum::Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_error_unknown_entity_id() {
    let (router, _) = router();
    let id = uuid::Uuid::new_v4();
    let (status, body) = call(&router, Method::GET, &format!("/movies/{}", id), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], format!("movie '{}' not found", id));
}

#[tokio::test]
async fn test_error_malformed_entity_id() {
    let (router, _) = router();
    let (status, body) = call(&router, Method::GET, "/movies/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().starts_with("Validation failed"));
}

#[tokio::test]
async fn test_error_malformed_login_body() {
    let (router, _) = router();
    let (status, body) = call(&router, Method::POST, "/login", Some("{\"username\": ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["data"].is_null());
    assert!(body["error"].as_str().unwrap().starts_with("Validation failed"));
}

#[tokio::test]
async fn test_error_body_with_wrong_shape_or_type() {
    let (router, _) = router();
    let (status, body) = call(&router, Method::POST, "/registration", Some("{\"username\": 7}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("alice:secret"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_error_registration_validation() {
    let (router, _) = router();
    let cases = [
        json!({"username": "ab", "password": "long-enough-pw"}),
        json!({"username": "has space", "password": "long-enough-pw"}),
        json!({"username": "valid_name", "password": "short"}),
        json!({"username": "valid_name", "password": "long-enough-pw", "email": "nope"}),
    ];

    for case in cases {
        let body = case.to_string();
        let (status, response) = call(&router, Method::POST, "/registration", Some(&body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert!(response["error"].as_str().unwrap().starts_with("Validation failed"));
    }
}

#[tokio::test]
async fn test_error_token_for_unknown_user_is_anonymous() {
    let (router, cookie) = router();
    let request = Request::builder()
        .uri("/users/me")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_error_recovery_reset_with_weak_password() {
    let (router, _) = router();
    let body = json!({"username": "bob", "code": "ABC", "new_password": "short"}).to_string();
    let (status, _) = call(&router, Method::PUT, "/password-recovery", Some(&body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
