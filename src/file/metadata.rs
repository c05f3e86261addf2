//! File metadata types and repository.

use sqlx::{QueryBuilder, SqlitePool};

use super::FileCategory;
use crate::{NidriveError, Result};

/// Metadata for a file in a user's drive.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileMetadata {
    /// Unique file ID.
    pub id: i64,
    /// Owning user.
    pub owner_id: i64,
    /// Folder ID (None for the root of the drive).
    pub folder_id: Option<i64>,
    /// Display name.
    pub filename: String,
    /// Name of the blob in storage.
    pub stored_name: String,
    /// File size in bytes.
    pub size: i64,
    /// MIME type.
    pub mime_type: String,
    /// Whether anyone may download the file.
    pub is_public: bool,
    /// Share link token.
    pub share_token: Option<String>,
    /// Number of times downloaded.
    pub downloads: i64,
    /// When the file was uploaded.
    pub created_at: String,
    /// When the file metadata last changed.
    pub updated_at: String,
    /// Soft delete flag.
    pub is_deleted: bool,
}

/// Data for creating a new file entry.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub owner_id: i64,
    pub folder_id: Option<i64>,
    pub filename: String,
    pub stored_name: String,
    pub size: i64,
    pub mime_type: String,
    pub is_public: bool,
}

impl NewFile {
    /// Create a new private file entry in the root folder.
    pub fn new(
        owner_id: i64,
        filename: impl Into<String>,
        stored_name: impl Into<String>,
        size: i64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            owner_id,
            folder_id: None,
            filename: filename.into(),
            stored_name: stored_name.into(),
            size,
            mime_type: mime_type.into(),
            is_public: false,
        }
    }

    /// Place the file in a folder.
    pub fn with_folder(mut self, folder_id: Option<i64>) -> Self {
        self.folder_id = folder_id;
        self
    }

    /// Set the visibility.
    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }
}

/// Builder for updating file metadata.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    /// New filename.
    pub filename: Option<String>,
    /// New folder (Some(None) moves the file to the root).
    pub folder_id: Option<Option<i64>>,
    /// New visibility.
    pub is_public: Option<bool>,
}

impl FileUpdate {
    /// Create a new FileUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filename.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the folder.
    pub fn folder_id(mut self, folder_id: Option<i64>) -> Self {
        self.folder_id = Some(folder_id);
        self
    }

    /// Set the visibility.
    pub fn is_public(mut self, is_public: bool) -> Self {
        self.is_public = Some(is_public);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.filename.is_none() && self.folder_id.is_none() && self.is_public.is_none()
    }
}

/// Which part of a drive to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FolderScope {
    /// Every file of the owner.
    #[default]
    All,
    /// Only files outside any folder.
    Root,
    /// Files directly inside a folder.
    Folder(i64),
}

/// Search filters. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct FileSearch {
    /// Case-insensitive substring of the filename.
    pub query: Option<String>,
    pub category: Option<FileCategory>,
    /// Inclusive lower bound on `created_at`, in storage format.
    pub created_from: Option<String>,
    /// Inclusive upper bound on `created_at`, in storage format.
    pub created_to: Option<String>,
    pub is_public: Option<bool>,
}

const FILE_COLUMNS: &str = "id, owner_id, folder_id, filename, stored_name, size, mime_type,
    is_public, share_token, downloads, created_at, updated_at, is_deleted";

/// Repository for file metadata operations.
///
/// Deleted files are invisible to every lookup.
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    /// Create a new FileRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new file entry.
    pub async fn create(&self, file: &NewFile) -> Result<FileMetadata> {
        let sql = format!(
            "INSERT INTO files (owner_id, folder_id, filename, stored_name, size, mime_type, is_public)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {FILE_COLUMNS}"
        );
        let created = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(file.owner_id)
            .bind(file.folder_id)
            .bind(&file.filename)
            .bind(&file.stored_name)
            .bind(file.size)
            .bind(&file.mime_type)
            .bind(file.is_public)
            .fetch_one(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Get a file by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<FileMetadata>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ? AND is_deleted = 0");
        let file = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(file)
    }

    /// Get a file by its share token.
    pub async fn get_by_share_token(&self, token: &str) -> Result<Option<FileMetadata>> {
        let sql =
            format!("SELECT {FILE_COLUMNS} FROM files WHERE share_token = ? AND is_deleted = 0");
        let file = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(token)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(file)
    }

    /// List a user's files, newest first.
    pub async fn list(&self, owner_id: i64, scope: FolderScope) -> Result<Vec<FileMetadata>> {
        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {FILE_COLUMNS} FROM files WHERE is_deleted = 0"));
        query.push(" AND owner_id = ");
        query.push_bind(owner_id);
        Self::push_scope(&mut query, scope);
        query.push(" ORDER BY created_at DESC, id DESC");

        let files = query
            .build_query_as::<FileMetadata>()
            .fetch_all(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(files)
    }

    /// Count a user's files in a scope.
    pub async fn count(&self, owner_id: i64, scope: FolderScope) -> Result<i64> {
        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM files WHERE is_deleted = 0 AND owner_id = ");
        query.push_bind(owner_id);
        Self::push_scope(&mut query, scope);

        let count: i64 = query
            .build_query_scalar()
            .fetch_one(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(count)
    }

    fn push_scope(query: &mut QueryBuilder<'_, sqlx::Sqlite>, scope: FolderScope) {
        match scope {
            FolderScope::All => {}
            FolderScope::Root => {
                query.push(" AND folder_id IS NULL");
            }
            FolderScope::Folder(folder_id) => {
                query.push(" AND folder_id = ");
                query.push_bind(folder_id);
            }
        }
    }

    /// Most recently uploaded files of a user.
    pub async fn recent(&self, owner_id: i64, limit: i64) -> Result<Vec<FileMetadata>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ? AND is_deleted = 0
             ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        let files = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(owner_id)
            .bind(limit)
            .fetch_all(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(files)
    }

    /// Most downloaded files of a user.
    pub async fn popular(&self, owner_id: i64, limit: i64) -> Result<Vec<FileMetadata>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ? AND is_deleted = 0
             ORDER BY downloads DESC, created_at DESC, id DESC LIMIT ?"
        );
        let files = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(owner_id)
            .bind(limit)
            .fetch_all(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(files)
    }

    /// Search a user's files.
    pub async fn search(
        &self,
        owner_id: i64,
        search: &FileSearch,
        limit: i64,
    ) -> Result<Vec<FileMetadata>> {
        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {FILE_COLUMNS} FROM files WHERE is_deleted = 0"));
        query.push(" AND owner_id = ");
        query.push_bind(owner_id);

        if let Some(ref text) = search.query {
            query.push(" AND instr(lower(filename), lower(");
            query.push_bind(text.clone());
            query.push(")) > 0");
        }

        if let Some(category) = search.category {
            query.push(" AND (");
            let mut any = query.separated(" OR ");
            for prefix in category.mime_prefixes() {
                any.push("lower(mime_type) LIKE ");
                any.push_bind_unseparated(format!("{prefix}%"));
            }
            for ext in category.extensions() {
                any.push("lower(filename) LIKE ");
                any.push_bind_unseparated(format!("%.{ext}"));
            }
            query.push(")");
        }

        if let Some(ref from) = search.created_from {
            query.push(" AND created_at >= ");
            query.push_bind(from.clone());
        }
        if let Some(ref to) = search.created_to {
            query.push(" AND created_at <= ");
            query.push_bind(to.clone());
        }
        if let Some(is_public) = search.is_public {
            query.push(" AND is_public = ");
            query.push_bind(is_public);
        }

        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(limit);

        let files = query
            .build_query_as::<FileMetadata>()
            .fetch_all(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(files)
    }

    /// Find a user's file by name.
    ///
    /// An exact match wins, otherwise the newest case-insensitive substring
    /// match is returned.
    pub async fn find_by_name(&self, owner_id: i64, name: &str) -> Result<Option<FileMetadata>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ? AND is_deleted = 0 AND instr(lower(filename), lower(?)) > 0
             ORDER BY filename = ? DESC, created_at DESC, id DESC LIMIT 1"
        );
        let file = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(owner_id)
            .bind(name)
            .bind(name)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(file)
    }

    /// Update file metadata.
    pub async fn update(&self, id: i64, update: &FileUpdate) -> Result<Option<FileMetadata>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE files SET ");
        let mut separated = query.separated(", ");

        if let Some(ref filename) = update.filename {
            separated.push("filename = ");
            separated.push_bind_unseparated(filename.clone());
        }
        if let Some(folder_id) = update.folder_id {
            separated.push("folder_id = ");
            separated.push_bind_unseparated(folder_id);
        }
        if let Some(is_public) = update.is_public {
            separated.push("is_public = ");
            separated.push_bind_unseparated(is_public);
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

    /// Flip the visibility of a file.
    pub async fn toggle_public(&self, id: i64) -> Result<Option<FileMetadata>> {
        let sql = format!(
            "UPDATE files SET is_public = NOT is_public, updated_at = datetime('now')
             WHERE id = ? AND is_deleted = 0
             RETURNING {FILE_COLUMNS}"
        );
        let file = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(file)
    }

    /// Give a file a share token unless it already has one, and make it public.
    ///
    /// Returns the file with whichever token it ends up with.
    pub async fn ensure_share_token(&self, id: i64, token: &str) -> Result<Option<FileMetadata>> {
        let sql = format!(
            "UPDATE files SET
                share_token = COALESCE(share_token, ?),
                is_public = 1,
                updated_at = datetime('now')
             WHERE id = ? AND is_deleted = 0
             RETURNING {FILE_COLUMNS}"
        );
        let file = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(token)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(file)
    }

    /// Remove the share token of a file.
    pub async fn clear_share_token(&self, id: i64) -> Result<Option<FileMetadata>> {
        let sql = format!(
            "UPDATE files SET share_token = NULL, updated_at = datetime('now')
             WHERE id = ? AND is_deleted = 0
             RETURNING {FILE_COLUMNS}"
        );
        let file = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(file)
    }

    /// Increment the download count for a file.
    pub async fn increment_downloads(&self, id: i64) -> Result<i64> {
        let downloads: Option<i64> = sqlx::query_scalar(
            "UPDATE files SET downloads = downloads + 1 WHERE id = ? RETURNING downloads",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| NidriveError::Database(e.to_string()))?;

        downloads.ok_or_else(|| NidriveError::NotFound("file".to_string()))
    }

    /// Soft delete a file.
    ///
    /// Returns the deleted row, or None if it was already gone.
    pub async fn soft_delete(&self, id: i64) -> Result<Option<FileMetadata>> {
        let sql = format!(
            "UPDATE files SET is_deleted = 1, updated_at = datetime('now')
             WHERE id = ? AND is_deleted = 0
             RETURNING {FILE_COLUMNS}"
        );
        let file = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| NidriveError::Database(e.to_string()))?;

        Ok(file)
    }
}
