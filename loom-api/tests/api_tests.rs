//! HTTP API integration tests
//!
//! Drives the full router with an in-memory database and a stub AI gateway
//! for the background pipeline. Mail and AI credentials are absent, so the
//! tests also cover the unconfigured-deployment paths.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use loom_api::services::ai::{AiError, AiGateway, DreamAnalysis, DreamIntelligence};
use loom_api::services::email::OtpMailer;
use loom_api::services::pipeline::DreamProcessor;
use loom_api::ws::StatusRegistry;
use loom_api::{build_router, AppState};
use loom_common::config::{AppConfig, TomlConfig};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceExt;

/// Always-succeeding gateway so spawned pipeline runs complete instantly
struct InstantGateway;

#[async_trait]
impl DreamIntelligence for InstantGateway {
    async fn interpret(&self, _raw_text: &str) -> Result<DreamAnalysis, AiError> {
        Ok(DreamAnalysis {
            poetic_narrative: "narrative".to_string(),
            meaning: "meaning".to_string(),
            symbols: json!("flight, glass"),
            emotions: json!("wonder"),
            image_prompt: "prompt".to_string(),
        })
    }

    async fn generate_image(&self, _prompt: &str, _dream_text: &str) -> Result<String, AiError> {
        Ok("https://img.example/dream.png".to_string())
    }
}

struct TestApp {
    app: Router,
    pool: SqlitePool,
}

async fn test_app() -> TestApp {
    let pool = loom_common::db::init_memory_database().await.unwrap();
    let registry = Arc::new(StatusRegistry::new());
    let processor = DreamProcessor::new(pool.clone(), registry.clone(), Arc::new(InstantGateway));

    let config = AppConfig::resolve(TomlConfig::default());
    let state = AppState {
        pool: pool.clone(),
        registry,
        gateway: Arc::new(AiGateway::new(None, None)),
        processor,
        mailer: Arc::new(OtpMailer::new(&config)),
        http_client: reqwest::Client::new(),
    };

    TestApp {
        app: build_router(state, &config.cors_origins),
        pool,
    }
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Register and verify an account, returning a bearer token
async fn register_and_verify(test: &TestApp, email: &str) -> String {
    let (status, body) = send_json(
        &test.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "email": email,
            "password": "correct horse",
            "first_name": "Ada",
            "last_name": "Lovelace",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {}", body);
    // No mail configured in tests
    assert_eq!(body["otp_sent"], json!(false));

    // Pull the OTP straight from the database, as an operator would
    let (otp_code,): (String,) = sqlx::query_as("SELECT otp_code FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(&test.pool)
        .await
        .unwrap();

    let (status, body) = send_json(
        &test.app,
        "POST",
        "/auth/verify-otp",
        None,
        Some(json!({ "email": email, "otp_code": otp_code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "verify failed: {}", body);
    body["access_token"].as_str().unwrap().to_string()
}

/// Poll until the background pipeline persists the interpretation
async fn wait_for_interpretation(pool: &SqlitePool, dream_id: i64) {
    for _ in 0..100 {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM dream_interpretations WHERE dream_id = ?")
                .bind(dream_id)
                .fetch_one(pool)
                .await
                .unwrap();
        if count > 0 {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("dream {} never got an interpretation", dream_id);
}

#[tokio::test]
async fn test_health_endpoints_are_public() {
    let test = test_app().await;

    let (status, body) = send_json(&test.app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send_json(&test.app, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Lucid Loom API");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let test = test_app().await;

    let (status, _) = send_json(&test.app, "GET", "/user/info", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(&test.app, "GET", "/dreams", Some("bogus-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_verify_and_fetch_user_info() {
    let test = test_app().await;
    let token = register_and_verify(&test, "ada@example.com").await;

    let (status, body) = send_json(&test.app, "GET", "/user/info", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["username"], "adalovelace");
    assert_eq!(body["email_verified"], json!(true));
}

#[tokio::test]
async fn test_register_twice_after_verification_rejected() {
    let test = test_app().await;
    register_and_verify(&test, "ada@example.com").await;

    let (status, body) = send_json(
        &test.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "email": "ada@example.com",
            "password": "other",
            "first_name": "Ada",
            "last_name": "Lovelace",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("already registered"));
}

#[tokio::test]
async fn test_login_with_form_credentials() {
    let test = test_app().await;
    register_and_verify(&test, "ada@example.com").await;

    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "username=Ada%40example.com&password=correct%20horse",
        ))
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "case-insensitive email login should succeed"
    );

    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("username=ada%40example.com&password=wrong"))
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dream_lifecycle() {
    let test = test_app().await;
    let token = register_and_verify(&test, "ada@example.com").await;

    // Create returns immediately, interpretation pending
    let (status, body) = send_json(
        &test.app,
        "POST",
        "/dreams",
        Some(&token),
        Some(json!({
            "title": "Glass city",
            "raw_text": "I was flying over a city of glass",
            "generate_image": false,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["interpretation"].is_null());
    let dream_id = body["id"].as_i64().unwrap();

    wait_for_interpretation(&test.pool, dream_id).await;

    // Re-fetch carries the stored interpretation
    let (status, body) = send_json(
        &test.app,
        "GET",
        &format!("/dreams/{}", dream_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interpretation"]["symbols"], "flight, glass");
    assert!(body["interpretation"]["image_url"].is_null());

    // Edit title only
    let (status, body) = send_json(
        &test.app,
        "PUT",
        &format!("/dreams/{}", dream_id),
        Some(&token),
        Some(json!({ "title": "Glass city, revisited" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Glass city, revisited");
    assert_eq!(body["raw_text"], "I was flying over a city of glass");

    // Delete removes the dream and its interpretation
    let (status, _) = send_json(
        &test.app,
        "DELETE",
        &format!("/dreams/{}", dream_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &test.app,
        "GET",
        &format!("/dreams/{}", dream_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_regenerate_replaces_interpretation() {
    let test = test_app().await;
    let token = register_and_verify(&test, "ada@example.com").await;

    let (_, body) = send_json(
        &test.app,
        "POST",
        "/dreams",
        Some(&token),
        Some(json!({ "title": "t", "raw_text": "a tide returning" })),
    )
    .await;
    let dream_id = body["id"].as_i64().unwrap();
    wait_for_interpretation(&test.pool, dream_id).await;

    let (status, body) = send_json(
        &test.app,
        "POST",
        &format!("/dreams/{}/regenerate", dream_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dream_id"], dream_id);

    wait_for_interpretation(&test.pool, dream_id).await;
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM dream_interpretations WHERE dream_id = ?")
            .bind(dream_id)
            .fetch_one(&test.pool)
            .await
            .unwrap();
    assert_eq!(count, 1, "regenerate must never stack interpretations");
}

#[tokio::test]
async fn test_dreams_are_owner_scoped() {
    let test = test_app().await;
    let token_a = register_and_verify(&test, "ada@example.com").await;
    let token_b = register_and_verify(&test, "grace@example.com").await;

    let (_, body) = send_json(
        &test.app,
        "POST",
        "/dreams",
        Some(&token_a),
        Some(json!({ "title": "private", "raw_text": "secret garden" })),
    )
    .await;
    let dream_id = body["id"].as_i64().unwrap();

    let (status, _) = send_json(
        &test.app,
        "GET",
        &format!("/dreams/{}", dream_id),
        Some(&token_b),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "other users see a 404, not a leak");
}

#[tokio::test]
async fn test_patterns_requires_two_dreams() {
    let test = test_app().await;
    let token = register_and_verify(&test, "ada@example.com").await;

    let (status, body) =
        send_json(&test.app, "POST", "/analytics/patterns", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("at least 2 dreams"));
}

#[tokio::test]
async fn test_analytics_summary_counts_terms() {
    let test = test_app().await;
    let token = register_and_verify(&test, "ada@example.com").await;

    for text in ["first dream", "second dream"] {
        let (_, body) = send_json(
            &test.app,
            "POST",
            "/dreams",
            Some(&token),
            Some(json!({ "title": "t", "raw_text": text })),
        )
        .await;
        wait_for_interpretation(&test.pool, body["id"].as_i64().unwrap()).await;
    }

    let (status, body) =
        send_json(&test.app, "GET", "/analytics/summary", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_dreams"], 2);
    assert_eq!(body["dreams_with_images"], 0);
    // Both stub interpretations contribute "flight" and "glass"
    let top_symbols = body["top_symbols"].as_array().unwrap();
    assert!(top_symbols
        .iter()
        .any(|s| s["symbol"] == "flight" && s["count"] == 2));
    assert_eq!(body["dreams_with_dates"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_image_proxy_rejects_unlisted_domains() {
    let test = test_app().await;
    let token = register_and_verify(&test, "ada@example.com").await;

    let (status, _) = send_json(
        &test.app,
        "GET",
        "/api/images/proxy?url=https%3A%2F%2Fevil.example%2Fx.png",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send_json(&test.app, "GET", "/api/images/proxy", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let test = test_app().await;
    register_and_verify(&test, "ada@example.com").await;

    let (status, _) = send_json(
        &test.app,
        "POST",
        "/auth/forgot-password",
        None,
        Some(json!({ "email": "ada@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (otp_code,): (String,) =
        sqlx::query_as("SELECT otp_code FROM users WHERE email = 'ada@example.com'")
            .fetch_one(&test.pool)
            .await
            .unwrap();

    let (status, body) = send_json(
        &test.app,
        "POST",
        "/auth/verify-reset-otp",
        None,
        Some(json!({ "email": "ada@example.com", "otp_code": otp_code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reset_token = body["reset_token"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        &test.app,
        "POST",
        "/auth/reset-password",
        None,
        Some(json!({ "token": reset_token, "new_password": "new password" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Old password no longer works, new one does
    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "username=ada%40example.com&password=new%20password",
        ))
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_forgot_password_does_not_reveal_accounts() {
    let test = test_app().await;

    let (status, body) = send_json(
        &test.app,
        "POST",
        "/auth/forgot-password",
        None,
        Some(json!({ "email": "nobody@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("If that email exists"));
}

#[tokio::test]
async fn test_delete_account_cascades() {
    let test = test_app().await;
    let token = register_and_verify(&test, "ada@example.com").await;

    let (_, body) = send_json(
        &test.app,
        "POST",
        "/dreams",
        Some(&token),
        Some(json!({ "title": "t", "raw_text": "gone soon" })),
    )
    .await;
    wait_for_interpretation(&test.pool, body["id"].as_i64().unwrap()).await;

    let (status, _) = send_json(
        &test.app,
        "DELETE",
        "/user/account",
        Some(&token),
        Some(json!({ "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for table in ["users", "dreams", "dream_interpretations", "sessions"] {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&test.pool)
            .await
            .unwrap();
        assert_eq!(count, 0, "table {} should be empty after account deletion", table);
    }
}
