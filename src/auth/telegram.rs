//! Telegram Login Widget verification.
//!
//! The widget signs the user's profile with a key derived from the bot
//! token: `HMAC-SHA256(key = SHA256(bot_token), data = check_string)`.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::{TelegramProfile, User, UserRepository};
use crate::{NidriveError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Default maximum age of widget data (24 hours).
pub const DEFAULT_AUTH_MAX_AGE_SECS: i64 = 86400;

/// Data sent by the Telegram Login Widget.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramLoginData {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub photo_url: Option<String>,
    pub auth_date: i64,
    pub hash: String,
}

impl TelegramLoginData {
    /// Sorted `key=value` lines of every non-empty field except `hash`.
    pub fn check_string(&self) -> String {
        let mut fields: Vec<(&str, String)> = vec![
            ("auth_date", self.auth_date.to_string()),
            ("id", self.id.to_string()),
        ];
        let optional = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("username", &self.username),
            ("photo_url", &self.photo_url),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                fields.push((key, value.to_string()));
            }
        }
        fields.sort_by(|a, b| a.0.cmp(b.0));

        fields
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Profile fields to store on the user.
    pub fn profile(&self) -> TelegramProfile {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        TelegramProfile {
            telegram_id: self.id,
            username: non_empty(&self.username),
            first_name: non_empty(&self.first_name),
            last_name: non_empty(&self.last_name),
            photo_url: non_empty(&self.photo_url),
        }
    }
}

/// Check the widget signature and freshness.
///
/// `now` is a Unix timestamp in seconds.
pub fn verify_telegram_login(
    data: &TelegramLoginData,
    bot_token: &str,
    max_age_secs: i64,
    now: i64,
) -> Result<()> {
    if bot_token.is_empty() {
        return Err(NidriveError::Config(
            "telegram bot token is not configured".to_string(),
        ));
    }

    let signature = hex::decode(data.hash.trim())
        .map_err(|_| NidriveError::Auth("malformed hash".to_string()))?;

    let secret = Sha256::digest(bot_token.as_bytes());
    let mut mac = HmacSha256::new_from_slice(&secret)
        .map_err(|e| NidriveError::Auth(e.to_string()))?;
    mac.update(data.check_string().as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| NidriveError::Auth("invalid telegram signature".to_string()))?;

    if now - data.auth_date > max_age_secs {
        return Err(NidriveError::Auth("telegram login data expired".to_string()));
    }

    Ok(())
}

/// Log a user in with widget data.
///
/// The user is created with `default_quota` bytes on first login, otherwise
/// the profile is refreshed. Returns the user with `last_login` updated.
pub async fn login_with_widget(
    pool: &SqlitePool,
    data: &TelegramLoginData,
    bot_token: &str,
    max_age_secs: i64,
    default_quota: i64,
) -> Result<User> {
    if let Err(e) = verify_telegram_login(data, bot_token, max_age_secs, Utc::now().timestamp()) {
        warn!("Rejected telegram login for {}: {}", data.id, e);
        return Err(e);
    }

    let repo = UserRepository::new(pool);
    let user = repo.upsert_from_telegram(&data.profile(), default_quota).await?;
    if !user.is_active {
        return Err(NidriveError::Permission("account is disabled".to_string()));
    }

    repo.update_last_login(user.id).await?;
    info!("User {} logged in via telegram widget", user.id);

    repo.get_by_id(user.id)
        .await?
        .ok_or_else(|| NidriveError::NotFound("user".to_string()))
}

/// Compute the widget hash for login data.
///
/// Used by tests and tooling that need to produce valid payloads.
pub fn sign_login_data(data: &TelegramLoginData, bot_token: &str) -> String {
    let secret = Sha256::digest(bot_token.as_bytes());
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(&secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(data.check_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    const TOKEN: &str = "123456:TEST-bot-token";

    fn sample() -> TelegramLoginData {
        TelegramLoginData {
            id: 4242,
            first_name: Some("Ada".to_string()),
            last_name: None,
            username: Some("ada_l".to_string()),
            photo_url: Some(String::new()),
            auth_date: 1_700_000_000,
            hash: String::new(),
        }
    }

    #[test]
    fn test_check_string_sorted_and_skips_empty() {
        assert_eq!(
            sample().check_string(),
            "auth_date=1700000000\nfirst_name=Ada\nid=4242\nusername=ada_l"
        );
    }

    #[test]
    fn test_known_signature() {
        let mut data = sample();
        data.hash = "96e00616519a04d8fb91e23315efa680e4425a61251bc9e8e38805f411f39ab2".to_string();

        assert_eq!(sign_login_data(&data, TOKEN), data.hash);
        assert!(verify_telegram_login(&data, TOKEN, 86400, 1_700_000_100).is_ok());

        // hex comparison is case-insensitive
        data.hash = data.hash.to_uppercase();
        assert!(verify_telegram_login(&data, TOKEN, 86400, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_tampered_data_rejected() {
        let mut data = sample();
        data.hash = sign_login_data(&data, TOKEN);
        data.username = Some("mallory".to_string());

        let result = verify_telegram_login(&data, TOKEN, 86400, 1_700_000_100);
        assert!(matches!(result, Err(NidriveError::Auth(_))));
    }

    #[test]
    fn test_wrong_token_rejected() {
        let mut data = sample();
        data.hash = sign_login_data(&data, "other:token");

        assert!(verify_telegram_login(&data, TOKEN, 86400, 1_700_000_100).is_err());
    }

    #[test]
    fn test_expired_data_rejected() {
        let mut data = sample();
        data.hash = sign_login_data(&data, TOKEN);

        assert!(verify_telegram_login(&data, TOKEN, 86400, 1_700_086_400).is_ok());
        let result = verify_telegram_login(&data, TOKEN, 86400, 1_700_086_401);
        assert!(matches!(result, Err(NidriveError::Auth(_))));
    }

    #[test]
    fn test_malformed_hash_rejected() {
        let mut data = sample();
        data.hash = "not-hex".to_string();
        assert!(matches!(
            verify_telegram_login(&data, TOKEN, 86400, 1_700_000_000),
            Err(NidriveError::Auth(_))
        ));
    }

    #[test]
    fn test_profile_drops_empty_fields() {
        let profile = sample().profile();
        assert_eq!(profile.telegram_id, 4242);
        assert_eq!(profile.username.as_deref(), Some("ada_l"));
        assert!(profile.photo_url.is_none());
    }

    #[tokio::test]
    async fn test_login_with_widget_creates_then_updates_user() {
        let db = Database::open_in_memory().await.unwrap();

        let mut data = sample();
        data.auth_date = Utc::now().timestamp();
        data.hash = sign_login_data(&data, TOKEN);

        let user = login_with_widget(db.pool(), &data, TOKEN, 86400, 1024)
            .await
            .unwrap();
        assert_eq!(user.telegram_id, 4242);
        assert_eq!(user.quota, 1024);
        assert!(user.last_login.is_some());

        data.first_name = Some("Augusta".to_string());
        data.hash = sign_login_data(&data, TOKEN);
        let again = login_with_widget(db.pool(), &data, TOKEN, 86400, 1024)
            .await
            .unwrap();
        assert_eq!(again.id, user.id);
        assert_eq!(again.first_name.as_deref(), Some("Augusta"));
    }

    #[tokio::test]
    async fn test_login_with_bad_hash_creates_nothing() {
        let db = Database::open_in_memory().await.unwrap();

        let mut data = sample();
        data.auth_date = Utc::now().timestamp();
        data.hash = "00".repeat(32);

        assert!(login_with_widget(db.pool(), &data, TOKEN, 86400, 1024).await.is_err());
        assert_eq!(UserRepository::new(db.pool()).count().await.unwrap(), 0);
    }
}
