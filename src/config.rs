//! Configuration module for NIDrive.

use serde::Deserialize;
use std::path::Path;

use crate::{NidriveError, Result};

/// Bytes per megabyte.
const MB: u64 = 1024 * 1024;

/// General service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Service name shown by the bot.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Timezone for displaying dates (e.g., "Europe/Moscow", "UTC").
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_server_name() -> String {
    "NIDrive".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            timezone: default_timezone(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/nidrive.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the blob storage directory.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Maximum size of a single upload in megabytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size_mb: u64,
    /// Quota assigned to new users in megabytes.
    #[serde(default = "default_quota")]
    pub default_quota_mb: u64,
    /// Externally reachable base URL used for public and share links.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

fn default_storage_path() -> String {
    "data/files".to_string()
}

fn default_max_file_size() -> u64 {
    200
}

fn default_quota() -> u64 {
    1024
}

fn default_public_url() -> String {
    "http://localhost:8000".to_string()
}

impl StorageConfig {
    /// Maximum upload size in bytes.
    pub fn max_file_size_bytes(&self) -> i64 {
        (self.max_file_size_mb * MB) as i64
    }

    /// Default quota in bytes.
    pub fn default_quota_bytes(&self) -> i64 {
        (self.default_quota_mb * MB) as i64
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_file_size_mb: default_max_file_size(),
            default_quota_mb: default_quota(),
            public_url: default_public_url(),
        }
    }
}

/// Web API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Whether the Web API is enabled.
    #[serde(default = "default_web_enabled")]
    pub enabled: bool,
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number for the Web API.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// JWT secret key (must be set if enabled).
    #[serde(default)]
    pub jwt_secret: String,
    /// Access token expiry in seconds.
    #[serde(default = "default_jwt_access_expiry")]
    pub jwt_access_token_expiry_secs: u64,
    /// Whether to serve the frontend build.
    #[serde(default)]
    pub serve_static: bool,
    /// Path to static files directory.
    #[serde(default = "default_static_path")]
    pub static_path: String,
    /// Rate limit for auth endpoints (requests per minute).
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
    /// Rate limit for general API endpoints (requests per minute).
    #[serde(default = "default_api_rate_limit")]
    pub api_rate_limit: u32,
}

fn default_web_enabled() -> bool {
    true
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    8000
}

fn default_jwt_access_expiry() -> u64 {
    60 * 60 * 24 * 7 // 7 days
}

fn default_static_path() -> String {
    "web/dist".to_string()
}

fn default_login_rate_limit() -> u32 {
    20
}

fn default_api_rate_limit() -> u32 {
    300
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: default_web_enabled(),
            host: default_web_host(),
            port: default_web_port(),
            cors_origins: vec![],
            jwt_secret: String::new(),
            jwt_access_token_expiry_secs: default_jwt_access_expiry(),
            serve_static: false,
            static_path: default_static_path(),
            login_rate_limit: default_login_rate_limit(),
            api_rate_limit: default_api_rate_limit(),
        }
    }
}

/// Telegram configuration shared by the login widget and the bot.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by @BotFather.
    #[serde(default)]
    pub bot_token: String,
    /// Whether to run the companion bot.
    #[serde(default)]
    pub bot_enabled: bool,
    /// Maximum age of login widget data in seconds.
    #[serde(default = "default_auth_max_age")]
    pub auth_max_age_secs: u64,
    /// Long polling timeout for getUpdates in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// URL of the web frontend, shown as a button in the bot.
    #[serde(default)]
    pub web_app_url: String,
    /// Bot API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_auth_max_age() -> u64 {
    86400
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            bot_enabled: false,
            auth_max_age_secs: default_auth_max_age(),
            poll_timeout_secs: default_poll_timeout(),
            web_app_url: String::new(),
            api_base_url: default_api_base_url(),
        }
    }
}

/// Bot auth-code configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of a login code in seconds.
    #[serde(default = "default_code_ttl")]
    pub code_ttl_secs: u64,
}

fn default_code_ttl() -> u64 {
    600
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: default_code_ttl(),
        }
    }
}

/// Administrator configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Telegram IDs with access to the admin API.
    #[serde(default)]
    pub telegram_ids: Vec<i64>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/nidrive.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// General configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// File storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Web API configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Telegram configuration.
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Auth-code configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Administrator configuration.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(NidriveError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| NidriveError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `NIDRIVE_JWT_SECRET`
    /// - `NIDRIVE_TELEGRAM_BOT_TOKEN`
    /// - `NIDRIVE_PUBLIC_URL`
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(secret) = non_empty_env("NIDRIVE_JWT_SECRET") {
            self.web.jwt_secret = secret;
        }
        if let Some(token) = non_empty_env("NIDRIVE_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(public_url) = non_empty_env("NIDRIVE_PUBLIC_URL") {
            self.storage.public_url = public_url;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.web.enabled && self.web.jwt_secret.is_empty() {
            return Err(NidriveError::Validation(
                "Web API is enabled but jwt_secret is not set. \
                 Set it in config.toml or via NIDRIVE_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }

        if self.telegram.bot_enabled && self.telegram.bot_token.is_empty() {
            return Err(NidriveError::Validation(
                "Telegram bot is enabled but bot_token is not set. \
                 Set it in config.toml or via NIDRIVE_TELEGRAM_BOT_TOKEN environment variable."
                    .to_string(),
            ));
        }

        match url::Url::parse(&self.storage.public_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => {
                return Err(NidriveError::Validation(format!(
                    "storage.public_url must be an absolute http(s) URL: {}",
                    self.storage.public_url
                )));
            }
        }

        Ok(())
    }

    /// Check whether a Telegram user is a configured administrator.
    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.admin.telegram_ids.contains(&telegram_id)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.name, "NIDrive");
        assert_eq!(config.server.timezone, "UTC");

        assert_eq!(config.database.path, "data/nidrive.db");

        assert_eq!(config.storage.path, "data/files");
        assert_eq!(config.storage.max_file_size_mb, 200);
        assert_eq!(config.storage.default_quota_mb, 1024);
        assert_eq!(config.storage.max_file_size_bytes(), 200 * 1024 * 1024);
        assert_eq!(config.storage.default_quota_bytes(), 1024 * 1024 * 1024);

        assert!(config.web.enabled);
        assert_eq!(config.web.port, 8000);
        assert!(config.web.jwt_secret.is_empty());
        assert_eq!(config.web.jwt_access_token_expiry_secs, 604800);

        assert!(!config.telegram.bot_enabled);
        assert_eq!(config.telegram.auth_max_age_secs, 86400);
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.telegram.api_base_url, "https://api.telegram.org");

        assert_eq!(config.auth.code_ttl_secs, 600);
        assert!(config.admin.telegram_ids.is_empty());

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/nidrive.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
name = "My Drive"
timezone = "Europe/Moscow"

[database]
path = "custom/db.sqlite"

[storage]
path = "custom/files"
max_file_size_mb = 50
default_quota_mb = 2048
public_url = "https://drive.example.com"

[web]
enabled = true
host = "127.0.0.1"
port = 3000
cors_origins = ["http://localhost:5173"]
jwt_secret = "test-secret-key"
jwt_access_token_expiry_secs = 600
serve_static = true
static_path = "public"

[telegram]
bot_token = "123:abc"
bot_enabled = true
auth_max_age_secs = 3600
poll_timeout_secs = 10
web_app_url = "https://drive.example.com"

[auth]
code_ttl_secs = 120

[admin]
telegram_ids = [1001, 1002]

[logging]
level = "debug"
file = "custom/logs/app.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.name, "My Drive");
        assert_eq!(config.server.timezone, "Europe/Moscow");
        assert_eq!(config.database.path, "custom/db.sqlite");

        assert_eq!(config.storage.path, "custom/files");
        assert_eq!(config.storage.max_file_size_mb, 50);
        assert_eq!(config.storage.default_quota_mb, 2048);
        assert_eq!(config.storage.public_url, "https://drive.example.com");

        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.web.port, 3000);
        assert_eq!(config.web.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.web.jwt_secret, "test-secret-key");
        assert_eq!(config.web.jwt_access_token_expiry_secs, 600);
        assert!(config.web.serve_static);
        assert_eq!(config.web.static_path, "public");

        assert_eq!(config.telegram.bot_token, "123:abc");
        assert!(config.telegram.bot_enabled);
        assert_eq!(config.telegram.auth_max_age_secs, 3600);
        assert_eq!(config.telegram.poll_timeout_secs, 10);

        assert_eq!(config.auth.code_ttl_secs, 120);
        assert!(config.is_admin(1001));
        assert!(!config.is_admin(42));

        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[storage]
default_quota_mb = 10
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.storage.default_quota_mb, 10);
        assert_eq!(config.storage.max_file_size_mb, 200);
        assert_eq!(config.database.path, "data/nidrive.db");
        assert_eq!(config.web.port, 8000);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        assert!(result.is_err());
        if let Err(NidriveError::Validation(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Validation error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(NidriveError::Io(_))));
    }

    #[test]
    fn test_apply_env_overrides() {
        let original = std::env::var("NIDRIVE_TELEGRAM_BOT_TOKEN").ok();

        std::env::set_var("NIDRIVE_TELEGRAM_BOT_TOKEN", "env-bot-token");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.telegram.bot_token, "env-bot-token");

        std::env::set_var("NIDRIVE_TELEGRAM_BOT_TOKEN", "");
        let mut config = Config::default();
        config.telegram.bot_token = "from-file".to_string();
        config.apply_env_overrides();
        assert_eq!(config.telegram.bot_token, "from-file");

        match original {
            Some(val) => std::env::set_var("NIDRIVE_TELEGRAM_BOT_TOKEN", val),
            None => std::env::remove_var("NIDRIVE_TELEGRAM_BOT_TOKEN"),
        }
    }

    #[test]
    fn test_validate_web_enabled_no_secret() {
        let config = Config::default();

        let result = config.validate();
        if let Err(NidriveError::Validation(msg)) = result {
            assert!(msg.contains("jwt_secret"));
        } else {
            panic!("Expected Validation error");
        }
    }

    #[test]
    fn test_validate_bot_enabled_no_token() {
        let mut config = Config::default();
        config.web.jwt_secret = "secret".to_string();
        config.telegram.bot_enabled = true;

        let result = config.validate();
        if let Err(NidriveError::Validation(msg)) = result {
            assert!(msg.contains("bot_token"));
        } else {
            panic!("Expected Validation error");
        }
    }

    #[test]
    fn test_validate_public_url() {
        let mut config = Config::default();
        config.web.jwt_secret = "secret".to_string();
        assert!(config.validate().is_ok());

        config.storage.public_url = "drive.example.com".to_string();
        assert!(config.validate().is_err());

        config.storage.public_url = "ftp://drive.example.com".to_string();
        assert!(config.validate().is_err());
    }
}
