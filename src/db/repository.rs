//! User repository.
//!
//! CRUD operations for users plus the quota bookkeeping on `used_space`.

use sqlx::{QueryBuilder, SqlitePool};

use super::user::{NewUser, TelegramProfile, User, UserUpdate};
use crate::{NidriveError, Result};

const USER_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, photo_url,
    used_space, quota, created_at, last_login, is_active";

/// Repository for user CRUD operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let profile = &new_user.profile;
        let result = sqlx::query(
            "INSERT INTO users (telegram_id, username, first_name, last_name, photo_url, quota)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(profile.telegram_id)
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.photo_url)
        .bind(new_user.quota)
        .execute(self.pool)
        .await
        .map_err(|e| NidriveError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| NidriveError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(user)
    }

    /// Get a user by Telegram ID.
    pub async fn get_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(telegram_id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(user)
    }

    /// Create the user for a Telegram account, or refresh their profile.
    ///
    /// The quota is only applied when the user is created. A missing avatar
    /// in the incoming profile keeps the stored one.
    pub async fn upsert_from_telegram(&self, profile: &TelegramProfile, quota: i64) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (telegram_id, username, first_name, last_name, photo_url, quota)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(telegram_id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                photo_url = COALESCE(excluded.photo_url, users.photo_url)
             RETURNING {USER_COLUMNS}"
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(profile.telegram_id)
            .bind(&profile.username)
            .bind(&profile.first_name)
            .bind(&profile.last_name)
            .bind(&profile.photo_url)
            .bind(quota)
            .fetch_one(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(user)
    }

    /// Update a user by ID.
    ///
    /// Only fields that are set in the update are modified.
    /// Returns the updated user, or None if not found.
    pub async fn update(&self, id: i64, update: &UserUpdate) -> Result<Option<User>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut separated = query.separated(", ");

        if let Some(ref username) = update.username {
            separated.push("username = ");
            separated.push_bind_unseparated(username.clone());
        }
        if let Some(ref first_name) = update.first_name {
            separated.push("first_name = ");
            separated.push_bind_unseparated(first_name.clone());
        }
        if let Some(ref last_name) = update.last_name {
            separated.push("last_name = ");
            separated.push_bind_unseparated(last_name.clone());
        }
        if let Some(ref photo_url) = update.photo_url {
            separated.push("photo_url = ");
            separated.push_bind_unseparated(photo_url.clone());
        }
        if let Some(quota) = update.quota {
            separated.push("quota = ");
            separated.push_bind_unseparated(quota);
        }
        if let Some(is_active) = update.is_active {
            separated.push("is_active = ");
            separated.push_bind_unseparated(is_active);
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query
            .build()
            .execute(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Update the last login timestamp for a user.
    pub async fn update_last_login(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;
        Ok(())
    }

    /// Reserve `bytes` of the user's quota.
    ///
    /// The check and the increment happen in one statement, so concurrent
    /// uploads cannot overshoot the quota. Returns false when the
    /// reservation does not fit.
    pub async fn reserve_space(&self, id: i64, bytes: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET used_space = used_space + ?
             WHERE id = ? AND used_space + ? <= quota",
        )
        .bind(bytes)
        .bind(id)
        .bind(bytes)
        .execute(self.pool)
        .await
        .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Return `bytes` to the user's quota. `used_space` never drops below 0.
    pub async fn release_space(&self, id: i64, bytes: i64) -> Result<()> {
        sqlx::query("UPDATE users SET used_space = MAX(0, used_space - ?) WHERE id = ?")
            .bind(bytes)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;
        Ok(())
    }

    /// Recompute `used_space` from the user's live files.
    ///
    /// Returns the new value, or None if the user does not exist.
    pub async fn recalculate_used_space(&self, id: i64) -> Result<Option<i64>> {
        let used: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET used_space = (
                SELECT COALESCE(SUM(size), 0) FROM files
                WHERE files.owner_id = users.id AND files.is_deleted = 0
             )
             WHERE id = ?
             RETURNING used_space",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(used)
    }

    /// List users ordered by ID.
    pub async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT ? OFFSET ?");
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(users)
    }

    /// Count all users.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;
        Ok(count)
    }
}
