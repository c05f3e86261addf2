//! Login through the bot with a one-time code.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::datetime::sqlite_after_secs;
use crate::db::{AuthCode, AuthCodeRepository, TelegramProfile, User, UserRepository};
use crate::{NidriveError, Result};

/// Minimum length of a login code.
pub const MIN_CODE_LENGTH: usize = 6;

/// Maximum length of a login code.
pub const MAX_CODE_LENGTH: usize = 64;

/// Default lifetime of a login code (10 minutes).
pub const DEFAULT_CODE_TTL_SECS: u64 = 600;

/// State of a login code as seen by the polling browser.
#[derive(Debug, Clone)]
pub enum CodeStatus {
    /// Waiting for the user to open the bot.
    Pending,
    /// Bound and consumed; the browser may now act as this user.
    Authorized(User),
}

/// Check that a code is 6 to 64 characters of `[A-Za-z0-9_-]`.
pub fn validate_code(code: &str) -> Result<()> {
    let len = code.len();
    if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&len) {
        return Err(NidriveError::Validation(format!(
            "code must be {MIN_CODE_LENGTH} to {MAX_CODE_LENGTH} characters"
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(NidriveError::Validation(
            "code may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

/// Register a code chosen by the browser.
///
/// Registering an active code again returns the existing row.
pub async fn register_code(pool: &SqlitePool, code: &str, ttl_secs: u64) -> Result<AuthCode> {
    validate_code(code)?;
    let auth_code = AuthCodeRepository::new(pool)
        .register(code, &sqlite_after_secs(ttl_secs))
        .await?;

    debug!("Registered login code expiring at {}", auth_code.expires_at);
    Ok(auth_code)
}

/// Attach a Telegram account to a code. Called by the bot on `/start <code>`.
///
/// The user is created with `default_quota` bytes if this is their first visit.
pub async fn bind_code(
    pool: &SqlitePool,
    code: &str,
    profile: &TelegramProfile,
    default_quota: i64,
) -> Result<User> {
    validate_code(code)?;

    let user = UserRepository::new(pool)
        .upsert_from_telegram(profile, default_quota)
        .await?;
    if !user.is_active {
        return Err(NidriveError::Permission("account is disabled".to_string()));
    }

    let bound = AuthCodeRepository::new(pool)
        .bind(code, profile.telegram_id, user.id)
        .await?;
    if !bound {
        return Err(NidriveError::NotFound("login code".to_string()));
    }

    info!("Login code bound to user {}", user.id);
    Ok(user)
}

/// Poll a code.
///
/// A bound code is consumed by the first check that sees it; later checks
/// report it as not found.
pub async fn check_code(pool: &SqlitePool, code: &str) -> Result<CodeStatus> {
    validate_code(code)?;
    let codes = AuthCodeRepository::new(pool);

    if let Some(consumed) = codes.consume(code).await? {
        let user_id = consumed
            .user_id
            .ok_or_else(|| NidriveError::NotFound("login code".to_string()))?;

        let users = UserRepository::new(pool);
        users.update_last_login(user_id).await?;
        let user = users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| NidriveError::NotFound("user".to_string()))?;

        info!("User {} logged in via bot code", user.id);
        return Ok(CodeStatus::Authorized(user));
    }

    match codes.get_active(code).await? {
        Some(_) => Ok(CodeStatus::Pending),
        None => Err(NidriveError::NotFound("login code".to_string())),
    }
}
