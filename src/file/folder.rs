//! Folder types and repository.

use sqlx::{QueryBuilder, SqlitePool};

use crate::{NidriveError, Result};

/// A folder in a user's drive.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Folder {
    /// Unique folder ID.
    pub id: i64,
    /// Owning user.
    pub owner_id: i64,
    /// Folder name.
    pub name: String,
    /// Parent folder ID (None for top-level folders).
    pub parent_id: Option<i64>,
    /// When the folder was created.
    pub created_at: String,
    /// When the folder was last renamed or moved.
    pub updated_at: String,
    /// Soft delete flag.
    pub is_deleted: bool,
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    /// Owning user.
    pub owner_id: i64,
    /// Folder name.
    pub name: String,
    /// Parent folder ID (None for top-level folders).
    pub parent_id: Option<i64>,
}

impl NewFolder {
    /// Create a new top-level folder.
    pub fn new(owner_id: i64, name: impl Into<String>) -> Self {
        Self {
            owner_id,
            name: name.into(),
            parent_id: None,
        }
    }

    /// Set the parent folder.
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Builder for updating a folder.
#[derive(Debug, Clone, Default)]
pub struct FolderUpdate {
    /// New folder name.
    pub name: Option<String>,
    /// New parent folder ID.
    pub parent_id: Option<Option<i64>>,
}

impl FolderUpdate {
    /// Create a new FolderUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the parent folder ID.
    pub fn parent_id(mut self, parent_id: Option<i64>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent_id.is_none()
    }
}

const FOLDER_COLUMNS: &str = "id, owner_id, name, parent_id, created_at, updated_at, is_deleted";

/// Stored blob of a file removed together with its folder.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RemovedBlob {
    /// Stored name in blob storage.
    pub stored_name: String,
    /// Size in bytes.
    pub size: i64,
}

/// Repository for folder operations.
///
/// Deleted folders are invisible to every lookup.
pub struct FolderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FolderRepository<'a> {
    /// Create a new FolderRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new folder.
    pub async fn create(&self, folder: &NewFolder) -> Result<Folder> {
        let sql = format!(
            "INSERT INTO folders (owner_id, name, parent_id) VALUES (?, ?, ?)
             RETURNING {FOLDER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Folder>(&sql)
            .bind(folder.owner_id)
            .bind(&folder.name)
            .bind(folder.parent_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Get a folder by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Folder>> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ? AND is_deleted = 0");
        let folder = sqlx::query_as::<_, Folder>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(folder)
    }

    /// List a user's folders directly under `parent_id` (None for top level).
    pub async fn list_by_parent(&self, owner_id: i64, parent_id: Option<i64>) -> Result<Vec<Folder>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE owner_id = ? AND parent_id IS ? AND is_deleted = 0
             ORDER BY name COLLATE NOCASE, id"
        );
        let folders = sqlx::query_as::<_, Folder>(&sql)
            .bind(owner_id)
            .bind(parent_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(folders)
    }

    /// List all folders of a user.
    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Folder>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE owner_id = ? AND is_deleted = 0
             ORDER BY name COLLATE NOCASE, id"
        );
        let folders = sqlx::query_as::<_, Folder>(&sql)
            .bind(owner_id)
            .fetch_all(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(folders)
    }

    /// Find a top-level folder of a user by exact name.
    pub async fn find_top_level_by_name(&self, owner_id: i64, name: &str) -> Result<Option<Folder>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE owner_id = ? AND parent_id IS NULL AND name = ? AND is_deleted = 0
             ORDER BY id LIMIT 1"
        );
        let folder = sqlx::query_as::<_, Folder>(&sql)
            .bind(owner_id)
            .bind(name)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(folder)
    }

    /// Most recently created folders of a user.
    pub async fn recent(&self, owner_id: i64, limit: i64) -> Result<Vec<Folder>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE owner_id = ? AND is_deleted = 0
             ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        let folders = sqlx::query_as::<_, Folder>(&sql)
            .bind(owner_id)
            .bind(limit)
            .fetch_all(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(folders)
    }

    /// Update a folder.
    pub async fn update(&self, id: i64, update: &FolderUpdate) -> Result<Option<Folder>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE folders SET ");
        let mut separated = query.separated(", ");

        if let Some(ref name) = update.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name.clone());
        }

        if let Some(parent_id) = update.parent_id {
            separated.push("parent_id = ");
            separated.push_bind_unseparated(parent_id);
        }

        separated.push("updated_at = datetime('now')");

        query.push(" WHERE is_deleted = 0 AND id = ");
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

    /// Get the depth of a folder (0 for top level).
    pub async fn get_depth(&self, id: i64) -> Result<usize> {
        Ok(self.get_path(id).await?.len().saturating_sub(1))
    }

    /// Get the path from the top level down to a folder.
    pub async fn get_path(&self, id: i64) -> Result<Vec<Folder>> {
        let mut path = Vec::new();
        let mut current_id = Some(id);

        while let Some(folder_id) = current_id {
            // A corrupted parent chain must not loop forever.
            if path.len() > super::MAX_FOLDER_DEPTH {
                break;
            }
            match self.get_by_id(folder_id).await? {
                Some(folder) => {
                    current_id = folder.parent_id;
                    path.push(folder);
                }
                None => break,
            }
        }

        path.reverse();
        Ok(path)
    }

    /// IDs of a folder and all of its live descendants.
    pub async fn subtree_ids(&self, id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "WITH RECURSIVE subtree(id) AS (
                SELECT id FROM folders WHERE id = ? AND is_deleted = 0
                UNION
                SELECT f.id FROM folders f JOIN subtree s ON f.parent_id = s.id
                WHERE f.is_deleted = 0
             )
             SELECT id FROM subtree",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(ids)
    }

    /// Number of levels below a folder (0 for a folder without children).
    pub async fn subtree_height(&self, id: i64) -> Result<usize> {
        let height: Option<i64> = sqlx::query_scalar(
            "WITH RECURSIVE subtree(id, level) AS (
                SELECT id, 0 FROM folders WHERE id = ? AND is_deleted = 0
                UNION
                SELECT f.id, s.level + 1 FROM folders f JOIN subtree s ON f.parent_id = s.id
                WHERE f.is_deleted = 0 AND s.level < 64
             )
             SELECT MAX(level) FROM subtree",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(height.unwrap_or(0).max(0) as usize)
    }

    /// Soft delete a folder with all descendant folders and their files.
    ///
    /// Runs in one transaction, which also returns the size of the deleted
    /// files to the owner's `used_space` (never below 0). Returns the blobs
    /// of those files so the caller can remove them from storage.
    pub async fn soft_delete_recursive(&self, id: i64) -> Result<Vec<RemovedBlob>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        let subtree = "WITH RECURSIVE subtree(id) AS (
                SELECT id FROM folders WHERE id = ? AND is_deleted = 0
                UNION
                SELECT f.id FROM folders f JOIN subtree s ON f.parent_id = s.id
                WHERE f.is_deleted = 0
             )";

        let files_sql = format!(
            "{subtree}
             UPDATE files SET is_deleted = 1, updated_at = datetime('now')
             WHERE is_deleted = 0 AND folder_id IN (SELECT id FROM subtree)
             RETURNING stored_name, size"
        );
        let removed = sqlx::query_as::<_, RemovedBlob>(&files_sql)
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        let folders_sql = format!(
            "{subtree}
             UPDATE folders SET is_deleted = 1, updated_at = datetime('now')
             WHERE id IN (SELECT id FROM subtree)"
        );
        sqlx::query(&folders_sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        let freed: i64 = removed.iter().map(|blob| blob.size).sum();
        if freed > 0 {
            sqlx::query(
                "UPDATE users SET used_space = MAX(0, used_space - ?)
                 WHERE id = (SELECT owner_id FROM folders WHERE id = ?)",
            )
            .bind(freed)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(removed)
    }

    /// Count live folders of a user.
    pub async fn count_by_owner(&self, owner_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM folders WHERE owner_id = ? AND is_deleted = 0")
                .bind(owner_id)
                .fetch_one(self.pool)
                .await
                .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Count live files directly in a folder.
    pub async fn count_files(&self, folder_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE folder_id = ? AND is_deleted = 0")
                .bind(folder_id)
                .fetch_one(self.pool)
                .await
                .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(count)
    }
}
