//! Login codes for signing in to the web app through the bot.
//!
//! The browser registers a random code and opens `t.me/<bot>?start=<code>`.
//! The bot binds the Telegram account to the code, and the browser polls
//! until it can exchange the bound code for an access token exactly once.

use super::{DbPool, SQL_NOW};
use crate::{NidriveError, Result};

/// Login code entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthCode {
    /// Row ID.
    pub id: i64,
    /// Code string chosen by the browser.
    pub code: String,
    /// Telegram ID bound by the bot.
    pub telegram_id: Option<i64>,
    /// User bound by the bot.
    pub user_id: Option<i64>,
    /// Creation timestamp.
    pub created_at: String,
    /// Expiration timestamp.
    pub expires_at: String,
    /// Used timestamp (None if not used).
    pub used_at: Option<String>,
}

impl AuthCode {
    /// Check whether the bot has bound an account to this code.
    pub fn is_bound(&self) -> bool {
        self.user_id.is_some()
    }

    /// Check if the code has been exchanged for a token.
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

const CODE_COLUMNS: &str = "id, code, telegram_id, user_id, created_at, expires_at, used_at";

/// Repository for login code operations.
pub struct AuthCodeRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> AuthCodeRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Get a code that is neither expired nor used.
    pub async fn get_active(&self, code: &str) -> Result<Option<AuthCode>> {
        let sql = format!(
            "SELECT {CODE_COLUMNS} FROM auth_codes
             WHERE code = $1 AND used_at IS NULL AND expires_at > {SQL_NOW}"
        );
        let found = sqlx::query_as::<_, AuthCode>(&sql)
            .bind(code)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(found)
    }

    /// Register a code, or return the existing one if it is still active.
    ///
    /// A stale row with the same code (expired or used) is replaced.
    pub async fn register(&self, code: &str, expires_at: &str) -> Result<AuthCode> {
        if let Some(existing) = self.get_active(code).await? {
            return Ok(existing);
        }

        let delete_sql = format!(
            "DELETE FROM auth_codes
             WHERE code = $1 AND (used_at IS NOT NULL OR expires_at <= {SQL_NOW})"
        );
        sqlx::query(&delete_sql)
            .bind(code)
            .execute(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        let insert_sql = format!(
            "INSERT INTO auth_codes (code, expires_at) VALUES ($1, $2)
             ON CONFLICT(code) DO UPDATE SET code = excluded.code
             RETURNING {CODE_COLUMNS}"
        );
        let created = sqlx::query_as::<_, AuthCode>(&insert_sql)
            .bind(code)
            .bind(expires_at)
            .fetch_one(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Attach a Telegram account to an active code.
    ///
    /// Returns false if the code is unknown, expired or already used.
    pub async fn bind(&self, code: &str, telegram_id: i64, user_id: i64) -> Result<bool> {
        let sql = format!(
            "UPDATE auth_codes SET telegram_id = $1, user_id = $2
             WHERE code = $3 AND used_at IS NULL AND expires_at > {SQL_NOW}"
        );
        let result = sqlx::query(&sql)
            .bind(telegram_id)
            .bind(user_id)
            .bind(code)
            .execute(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a bound, active code as used and return it.
    ///
    /// Only one caller can consume a code, even with concurrent requests.
    pub async fn consume(&self, code: &str) -> Result<Option<AuthCode>> {
        let sql = format!(
            "UPDATE auth_codes SET used_at = {SQL_NOW}
             WHERE code = $1
               AND user_id IS NOT NULL
               AND used_at IS NULL
               AND expires_at > {SQL_NOW}
             RETURNING {CODE_COLUMNS}"
        );
        let consumed = sqlx::query_as::<_, AuthCode>(&sql)
            .bind(code)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(consumed)
    }

    /// Delete expired and used codes.
    pub async fn cleanup(&self) -> Result<u64> {
        let sql = format!(
            "DELETE FROM auth_codes WHERE expires_at <= {SQL_NOW} OR used_at IS NOT NULL"
        );
        let result = sqlx::query(&sql)
            .execute(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::sqlite_after_secs;
    use crate::Database;

    async fn setup_db() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let user_id: i64 =
            sqlx::query_scalar("INSERT INTO users (telegram_id, quota) VALUES (1001, 100) RETURNING id")
                .fetch_one(db.pool())
                .await
                .unwrap();
        (db, user_id)
    }

    const PAST: &str = "2000-01-01 00:00:00";

    #[tokio::test]
    async fn test_register_returns_existing_active_code() {
        let (db, _) = setup_db().await;
        let repo = AuthCodeRepository::new(db.pool());

        let first = repo.register("code-abc123", &sqlite_after_secs(600)).await.unwrap();
        let second = repo.register("code-abc123", &sqlite_after_secs(900)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.expires_at, second.expires_at);
        assert!(!first.is_bound());
    }

    #[tokio::test]
    async fn test_register_replaces_expired_code() {
        let (db, _) = setup_db().await;
        let repo = AuthCodeRepository::new(db.pool());

        let stale = repo.register("code-abc123", PAST).await.unwrap();
        assert!(repo.get_active("code-abc123").await.unwrap().is_none());

        let fresh = repo.register("code-abc123", &sqlite_after_secs(600)).await.unwrap();
        assert_ne!(stale.id, fresh.id);
        assert!(repo.get_active("code-abc123").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_bind_and_consume_once() {
        let (db, user_id) = setup_db().await;
        let repo = AuthCodeRepository::new(db.pool());

        repo.register("code-abc123", &sqlite_after_secs(600)).await.unwrap();

        // not bound yet
        assert!(repo.consume("code-abc123").await.unwrap().is_none());

        assert!(repo.bind("code-abc123", 1001, user_id).await.unwrap());

        let consumed = repo.consume("code-abc123").await.unwrap().unwrap();
        assert_eq!(consumed.user_id, Some(user_id));
        assert_eq!(consumed.telegram_id, Some(1001));
        assert!(consumed.is_used());

        assert!(repo.consume("code-abc123").await.unwrap().is_none());
        assert!(!repo.bind("code-abc123", 1001, user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_bind_expired_code_fails() {
        let (db, user_id) = setup_db().await;
        let repo = AuthCodeRepository::new(db.pool());

        repo.register("old-code-1", PAST).await.unwrap();
        assert!(!repo.bind("old-code-1", 1001, user_id).await.unwrap());
        assert!(!repo.bind("missing-code", 1001, user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup() {
        let (db, user_id) = setup_db().await;
        let repo = AuthCodeRepository::new(db.pool());

        repo.register("expired-1", PAST).await.unwrap();
        repo.register("used-code", &sqlite_after_secs(600)).await.unwrap();
        repo.bind("used-code", 1001, user_id).await.unwrap();
        repo.consume("used-code").await.unwrap();
        repo.register("active-1", &sqlite_after_secs(600)).await.unwrap();

        assert_eq!(repo.cleanup().await.unwrap(), 2);
        assert!(repo.get_active("active-1").await.unwrap().is_some());
    }
}
