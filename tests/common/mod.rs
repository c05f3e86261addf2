//! Test helpers for the Web API tests.
//!
//! Provides a TestServer over the full router and helpers to log in with
//! signed Telegram widget data and upload files.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use tempfile::TempDir;

use nidrive::auth::{sign_login_data, TelegramLoginData};
use nidrive::{Config, Database, FileStorage, WebServer};

/// Bot token used to sign login widget payloads.
pub const BOT_TOKEN: &str = "123456:test-bot-token";

/// JWT secret of the test server.
pub const JWT_SECRET: &str = "test-secret-key-for-testing-only";

/// Telegram ID configured as administrator.
pub const ADMIN_TELEGRAM_ID: i64 = 1000;

/// Public URL used in generated links.
pub const PUBLIC_URL: &str = "https://drive.test";

/// A running test application.
pub struct TestApp {
    pub server: TestServer,
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    _storage_dir: TempDir,
}

/// Create a test configuration.
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.web.host = "127.0.0.1".to_string();
    config.web.port = 0;
    config.web.jwt_secret = JWT_SECRET.to_string();
    config.web.login_rate_limit = 100;
    config.web.api_rate_limit = 1000;
    config.web.serve_static = false;
    config.telegram.bot_token = BOT_TOKEN.to_string();
    config.storage.public_url = PUBLIC_URL.to_string();
    config.admin.telegram_ids = vec![ADMIN_TELEGRAM_ID];
    config
}

/// Create a test application with the default test configuration.
pub async fn create_test_app() -> TestApp {
    create_test_app_with(create_test_config()).await
}

/// Create a test application with an in-memory database.
pub async fn create_test_app_with(config: Config) -> TestApp {
    let storage_dir = TempDir::new().expect("Failed to create storage dir");
    let storage = FileStorage::new(storage_dir.path()).expect("Failed to create storage");

    let db = Arc::new(
        Database::open_in_memory()
            .await
            .expect("Failed to create test database"),
    );
    let config = Arc::new(config);

    let web_server = WebServer::new(config.clone(), db.clone(), storage)
        .expect("Failed to create web server");
    let server = TestServer::new(web_server.router()).expect("Failed to create test server");

    TestApp {
        server,
        db,
        config,
        _storage_dir: storage_dir,
    }
}

/// Widget payload for a Telegram account, signed with [`BOT_TOKEN`].
pub fn signed_login(telegram_id: i64, first_name: &str, auth_date: i64) -> Value {
    let mut data = TelegramLoginData {
        id: telegram_id,
        first_name: Some(first_name.to_string()),
        auth_date,
        ..Default::default()
    };
    data.hash = sign_login_data(&data, BOT_TOKEN);

    json!({
        "id": data.id,
        "first_name": first_name,
        "auth_date": data.auth_date,
        "hash": data.hash,
    })
}

/// Log in as a Telegram account and return `(access_token, user_id)`.
pub async fn login(server: &TestServer, telegram_id: i64, first_name: &str) -> (String, i64) {
    let now = chrono::Utc::now().timestamp();
    let response = server
        .post("/api/v1/auth/telegram-login")
        .json(&signed_login(telegram_id, first_name, now))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let token = body["data"]["access_token"]
        .as_str()
        .expect("missing access token")
        .to_string();
    let user_id = body["data"]["user"]["id"].as_i64().expect("missing user id");
    (token, user_id)
}

/// Authorization header value for a token.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Upload a file through the multipart endpoint.
pub async fn upload(
    server: &TestServer,
    token: &str,
    filename: &str,
    content: &[u8],
    folder_id: Option<i64>,
) -> TestResponse {
    let mut form = MultipartForm::new().add_part(
        "file",
        Part::bytes(content.to_vec()).file_name(filename.to_string()),
    );
    if let Some(folder_id) = folder_id {
        form = form.add_text("folder_id", folder_id.to_string());
    }

    server
        .post("/api/v1/files")
        .add_header(AUTHORIZATION, bearer(token))
        .multipart(form)
        .await
}

/// Upload a file and return its ID.
pub async fn upload_ok(server: &TestServer, token: &str, filename: &str, content: &[u8]) -> i64 {
    let response = upload(server, token, filename, content, None).await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["data"]["id"]
        .as_i64()
        .expect("missing file id")
}

/// Create a folder and return its ID.
pub async fn create_folder(
    server: &TestServer,
    token: &str,
    name: &str,
    parent_id: Option<i64>,
) -> i64 {
    let response = server
        .post("/api/v1/folders")
        .add_header(AUTHORIZATION, bearer(token))
        .json(&json!({ "name": name, "parent_id": parent_id }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["data"]["id"]
        .as_i64()
        .expect("missing folder id")
}

/// Error code of an error response.
pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
