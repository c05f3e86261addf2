//! Web API Auth Tests
//!
//! Integration tests for Telegram login, bot login codes and the current
//! user endpoints.

mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{bearer, create_test_app, error_code, login, signed_login};
use nidrive::auth::bind_code;
use nidrive::TelegramProfile;

// ============================================================================
// Telegram Login Tests
// ============================================================================

#[tokio::test]
async fn test_telegram_login_success() {
    let app = create_test_app().await;
    let now = chrono::Utc::now().timestamp();

    let response = app
        .server
        .post("/api/v1/auth/telegram-login")
        .json(&signed_login(4242, "Ada", now))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["token_type"], "bearer");
    assert!(body["data"]["access_token"].as_str().unwrap().len() > 20);
    assert_eq!(body["data"]["user"]["telegram_id"], 4242);
    assert_eq!(body["data"]["user"]["first_name"], "Ada");
    assert_eq!(body["data"]["user"]["used_space"], 0);
    assert_eq!(
        body["data"]["user"]["quota"],
        app.config.storage.default_quota_bytes()
    );
    assert!(body["data"]["user"]["last_login"].is_string());
}

#[tokio::test]
async fn test_telegram_login_twice_keeps_user() {
    let app = create_test_app().await;

    let (_, first_id) = login(&app.server, 4242, "Ada").await;
    let (_, second_id) = login(&app.server, 4242, "Ada L.").await;
    assert_eq!(first_id, second_id);
}

#[tokio::test]
async fn test_telegram_login_bad_signature() {
    let app = create_test_app().await;
    let now = chrono::Utc::now().timestamp();

    let mut payload = signed_login(4242, "Ada", now);
    payload["first_name"] = json!("Mallory");

    let response = app
        .server
        .post("/api/v1/auth/telegram-login")
        .json(&payload)
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(error_code(&body), "UNAUTHORIZED");
}

#[tokio::test]
async fn test_telegram_login_expired_data() {
    let app = create_test_app().await;
    let two_days_ago = chrono::Utc::now().timestamp() - 2 * 86400;

    let response = app
        .server
        .post("/api/v1/auth/telegram-login")
        .json(&signed_login(4242, "Ada", two_days_ago))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_telegram_login_malformed_body() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/api/v1/auth/telegram-login")
        .json(&json!({ "first_name": "NoId" }))
        .await;

    assert!(response.status_code().is_client_error());
}

// ============================================================================
// Login Code Tests
// ============================================================================

#[tokio::test]
async fn test_login_code_flow() {
    let app = create_test_app().await;
    let code = "browser-login-0001";

    let response = app
        .server
        .post("/api/v1/auth/register-code")
        .json(&json!({ "code": code }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["code"], code);
    assert!(body["data"]["expires_at"].as_str().unwrap().ends_with('Z'));

    // Not yet confirmed in the bot
    let response = app
        .server
        .get("/api/v1/auth/check-code")
        .add_query_param("code", code)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "pending");
    assert!(body["data"].get("access_token").map_or(true, Value::is_null));

    // The bot binds the code on /start <code>
    let profile = TelegramProfile::new(777).with_first_name("Grace");
    bind_code(app.db.pool(), code, &profile, 1024)
        .await
        .expect("Failed to bind code");

    let response = app
        .server
        .get("/api/v1/auth/check-code")
        .add_query_param("code", code)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "authorized");
    assert_eq!(body["data"]["user"]["telegram_id"], 777);
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    // The token works
    let response = app
        .server
        .get("/api/v1/users/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["first_name"], "Grace");

    // The code is consumed
    let response = app
        .server
        .get("/api/v1/auth/check-code")
        .add_query_param("code", code)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_code_too_short() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/api/v1/auth/register-code")
        .json(&json!({ "code": "abc" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
    assert!(body["error"]["details"]["code"].is_array());
}

#[tokio::test]
async fn test_check_unknown_code() {
    let app = create_test_app().await;

    let response = app
        .server
        .get("/api/v1/auth/check-code")
        .add_query_param("code", "never-registered")
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(error_code(&response.json::<Value>()), "NOT_FOUND");
}

// ============================================================================
// Current User Tests
// ============================================================================

#[tokio::test]
async fn test_me_requires_token() {
    let app = create_test_app().await;

    let response = app.server.get("/api/v1/users/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .get("/api/v1/users/me")
        .add_header(AUTHORIZATION, bearer("not-a-jwt"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_me() {
    let app = create_test_app().await;
    let (token, _) = login(&app.server, 4242, "Ada").await;

    let response = app
        .server
        .put("/api/v1/users/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "first_name": "Augusta", "username": "countess" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["first_name"], "Augusta");
    assert_eq!(body["data"]["username"], "countess");

    let response = app
        .server
        .put("/api/v1/users/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "photo_url": "not a url" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"]["details"]["photo_url"].is_array());
}

#[tokio::test]
async fn test_stats_and_storage_usage() {
    let app = create_test_app().await;
    let (token, _) = login(&app.server, 4242, "Ada").await;
    common::upload_ok(&app.server, &token, "hello.txt", b"hello world").await;

    let response = app
        .server
        .get("/api/v1/users/me/stats")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["total_files"], 1);
    assert_eq!(body["data"]["total_folders"], 0);
    assert_eq!(body["data"]["used_space"], 11);

    let response = app
        .server
        .get("/api/v1/storage/usage")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["used"], 11);
    assert_eq!(body["data"]["total"], app.config.storage.default_quota_bytes());
}

#[tokio::test]
async fn test_health_and_openapi() {
    let app = create_test_app().await;

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "OK");

    let response = app.server.get("/api-docs/openapi.json").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["paths"]["/api/v1/auth/telegram-login"].is_object());
}
