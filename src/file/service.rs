//! Drive service.
//!
//! High-level operations on a user's drive:
//! - Upload with size checks and atomic quota reservation
//! - Ownership checks on every file and folder access
//! - Visibility, share links and download access rules
//! - Folder moves, recursive deletion and the folder tree

use std::collections::HashMap;

use rand::distr::Alphanumeric;
use rand::Rng;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::UserRepository;
use crate::{NidriveError, Result};

use super::folder::{Folder, FolderRepository, FolderUpdate, NewFolder};
use super::metadata::{FileMetadata, FileRepository, FileSearch, FileUpdate, FolderScope, NewFile};
use super::storage::FileStorage;
use super::{
    sanitize_filename, validate_folder_name, MAX_FOLDER_DEPTH, MAX_RECENT_LIMIT,
    MAX_SEARCH_RESULTS, SHARE_TOKEN_LENGTH,
};

/// Upload limit used when none is configured (200 MB).
const DEFAULT_MAX_FILE_SIZE: i64 = 200 * 1024 * 1024;

/// Request data for a file upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Filename as sent by the client.
    pub filename: String,
    /// File content.
    pub content: Vec<u8>,
    /// MIME type sent by the client, guessed from the name when absent.
    pub mime_type: Option<String>,
    /// Target folder (None for the root).
    pub folder_id: Option<i64>,
    /// Initial visibility.
    pub is_public: bool,
}

impl UploadRequest {
    /// Create a private upload into the root folder.
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
            mime_type: None,
            folder_id: None,
            is_public: false,
        }
    }

    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the target folder.
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

/// Storage statistics of one user.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveStats {
    pub total_files: i64,
    pub total_folders: i64,
    pub used_space: i64,
    pub quota: i64,
    pub usage_percent: f64,
    pub free_space: i64,
}

/// A folder with its subfolders and files.
#[derive(Debug, Clone)]
pub struct FolderNode {
    pub folder: Folder,
    pub children: Vec<FolderNode>,
    pub files: Vec<FileMetadata>,
}

/// The whole drive of a user.
#[derive(Debug, Clone, Default)]
pub struct FolderTree {
    /// Top-level folders.
    pub folders: Vec<FolderNode>,
    /// Files outside any folder.
    pub files: Vec<FileMetadata>,
}

/// Drive service for a database and blob storage.
pub struct DriveService<'a> {
    pool: &'a SqlitePool,
    storage: &'a FileStorage,
    max_file_size: i64,
}

impl<'a> DriveService<'a> {
    /// Create a new DriveService.
    pub fn new(pool: &'a SqlitePool, storage: &'a FileStorage) -> Self {
        Self {
            pool,
            storage,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Set the upload size limit in bytes.
    pub fn with_max_file_size(mut self, max_file_size: i64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Upload size limit in bytes.
    pub fn max_file_size(&self) -> i64 {
        self.max_file_size
    }

    // ---------------------------------------------------------------------
    // Files
    // ---------------------------------------------------------------------

    /// Upload a file.
    ///
    /// Quota is reserved before the blob is written and released again if
    /// the blob or the metadata row cannot be stored.
    pub async fn upload(&self, owner_id: i64, request: UploadRequest) -> Result<FileMetadata> {
        let filename = sanitize_filename(&request.filename)?;
        let size = request.content.len() as i64;

        if size == 0 {
            return Err(NidriveError::Validation("file is empty".to_string()));
        }
        if size > self.max_file_size {
            return Err(NidriveError::PayloadTooLarge(format!(
                "file exceeds the {} MB limit",
                self.max_file_size / 1024 / 1024
            )));
        }

        if let Some(folder_id) = request.folder_id {
            self.owned_folder(owner_id, folder_id).await?;
        }

        let users = UserRepository::new(self.pool);
        if !users.reserve_space(owner_id, size).await? {
            let user = users
                .get_by_id(owner_id)
                .await?
                .ok_or_else(|| NidriveError::NotFound("user".to_string()))?;
            return Err(NidriveError::QuotaExceeded(format!(
                "{} bytes requested, {} bytes free",
                size,
                user.free_space()
            )));
        }

        let mime_type = request
            .mime_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(&filename)
                    .first_or_octet_stream()
                    .to_string()
            });

        let stored_name = match self.storage.save(&request.content, &filename).await {
            Ok(name) => name,
            Err(e) => {
                users.release_space(owner_id, size).await?;
                return Err(e);
            }
        };

        let new_file = NewFile::new(owner_id, &filename, &stored_name, size, mime_type)
            .with_folder(request.folder_id)
            .with_public(request.is_public);

        match FileRepository::new(self.pool).create(&new_file).await {
            Ok(file) => {
                info!(
                    "User {} uploaded '{}' ({} bytes) as file {}",
                    owner_id, file.filename, file.size, file.id
                );
                Ok(file)
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&stored_name).await {
                    warn!("Failed to remove orphaned blob {}: {}", stored_name, cleanup);
                }
                users.release_space(owner_id, size).await?;
                Err(e)
            }
        }
    }

    /// Get a file owned by the user.
    pub async fn get_file(&self, owner_id: i64, file_id: i64) -> Result<FileMetadata> {
        let file = FileRepository::new(self.pool)
            .get_by_id(file_id)
            .await?
            .ok_or_else(|| NidriveError::NotFound("file".to_string()))?;

        if file.owner_id != owner_id {
            return Err(NidriveError::Permission(
                "file belongs to another user".to_string(),
            ));
        }
        Ok(file)
    }

    /// List the user's files, newest first.
    pub async fn list_files(&self, owner_id: i64, scope: FolderScope) -> Result<Vec<FileMetadata>> {
        if let FolderScope::Folder(folder_id) = scope {
            self.owned_folder(owner_id, folder_id).await?;
        }
        FileRepository::new(self.pool).list(owner_id, scope).await
    }

    /// Rename, move or change the visibility of a file.
    pub async fn update_file(
        &self,
        owner_id: i64,
        file_id: i64,
        mut update: FileUpdate,
    ) -> Result<FileMetadata> {
        self.get_file(owner_id, file_id).await?;

        if let Some(ref filename) = update.filename {
            update.filename = Some(sanitize_filename(filename)?);
        }
        if let Some(Some(folder_id)) = update.folder_id {
            self.owned_folder(owner_id, folder_id).await?;
        }

        FileRepository::new(self.pool)
            .update(file_id, &update)
            .await?
            .ok_or_else(|| NidriveError::NotFound("file".to_string()))
    }

    /// Make a file public or private.
    pub async fn set_visibility(
        &self,
        owner_id: i64,
        file_id: i64,
        is_public: bool,
    ) -> Result<FileMetadata> {
        self.update_file(owner_id, file_id, FileUpdate::new().is_public(is_public))
            .await
    }

    /// Flip the visibility of a file.
    pub async fn toggle_visibility(&self, owner_id: i64, file_id: i64) -> Result<FileMetadata> {
        self.get_file(owner_id, file_id).await?;
        FileRepository::new(self.pool)
            .toggle_public(file_id)
            .await?
            .ok_or_else(|| NidriveError::NotFound("file".to_string()))
    }

    /// Create a share link for a file, or return the existing one.
    ///
    /// Sharing also makes the file public.
    pub async fn share(&self, owner_id: i64, file_id: i64) -> Result<FileMetadata> {
        self.get_file(owner_id, file_id).await?;
        let token = generate_share_token();
        let file = FileRepository::new(self.pool)
            .ensure_share_token(file_id, &token)
            .await?
            .ok_or_else(|| NidriveError::NotFound("file".to_string()))?;

        info!("User {} shared file {}", owner_id, file_id);
        Ok(file)
    }

    /// Revoke the share link of a file.
    pub async fn unshare(&self, owner_id: i64, file_id: i64) -> Result<FileMetadata> {
        self.get_file(owner_id, file_id).await?;
        FileRepository::new(self.pool)
            .clear_share_token(file_id)
            .await?
            .ok_or_else(|| NidriveError::NotFound("file".to_string()))
    }

    /// Delete a file, remove its blob and release its quota.
    pub async fn delete_file(&self, owner_id: i64, file_id: i64) -> Result<()> {
        self.get_file(owner_id, file_id).await?;

        let Some(file) = FileRepository::new(self.pool).soft_delete(file_id).await? else {
            return Err(NidriveError::NotFound("file".to_string()));
        };

        UserRepository::new(self.pool)
            .release_space(owner_id, file.size)
            .await?;
        self.remove_blob(&file.stored_name).await;

        info!("User {} deleted file {}", owner_id, file_id);
        Ok(())
    }

    /// Newest uploads of the user.
    pub async fn recent_files(&self, owner_id: i64, limit: i64) -> Result<Vec<FileMetadata>> {
        check_limit(limit, MAX_RECENT_LIMIT)?;
        FileRepository::new(self.pool).recent(owner_id, limit).await
    }

    /// Most downloaded files of the user.
    pub async fn popular_files(&self, owner_id: i64, limit: i64) -> Result<Vec<FileMetadata>> {
        check_limit(limit, MAX_SEARCH_RESULTS)?;
        FileRepository::new(self.pool).popular(owner_id, limit).await
    }

    /// Search the user's files. At most 100 results are returned.
    pub async fn search(&self, owner_id: i64, search: &FileSearch) -> Result<Vec<FileMetadata>> {
        FileRepository::new(self.pool)
            .search(owner_id, search, MAX_SEARCH_RESULTS)
            .await
    }

    /// Find one of the user's files by name.
    pub async fn find_file_by_name(&self, owner_id: i64, name: &str) -> Result<FileMetadata> {
        FileRepository::new(self.pool)
            .find_by_name(owner_id, name)
            .await?
            .ok_or_else(|| NidriveError::NotFound("file".to_string()))
    }

    // ---------------------------------------------------------------------
    // Downloads
    // ---------------------------------------------------------------------

    /// Decide whether `viewer` may download `file`.
    ///
    /// Owners and anyone for public files are allowed. Anonymous viewers of
    /// private files get an auth error, other users a permission error.
    pub fn check_download_access(file: &FileMetadata, viewer: Option<i64>) -> Result<()> {
        if file.is_public || viewer == Some(file.owner_id) {
            return Ok(());
        }
        match viewer {
            None => Err(NidriveError::Auth("login required".to_string())),
            Some(_) => Err(NidriveError::Permission(
                "file belongs to another user".to_string(),
            )),
        }
    }

    /// Look up a file for `/files/{id}/download` and check access.
    pub async fn file_for_download(&self, file_id: i64, viewer: Option<i64>) -> Result<FileMetadata> {
        let file = FileRepository::new(self.pool)
            .get_by_id(file_id)
            .await?
            .ok_or_else(|| NidriveError::NotFound("file".to_string()))?;

        Self::check_download_access(&file, viewer)?;
        Ok(file)
    }

    /// Look up a public file.
    pub async fn public_file(&self, file_id: i64) -> Result<FileMetadata> {
        FileRepository::new(self.pool)
            .get_by_id(file_id)
            .await?
            .filter(|f| f.is_public)
            .ok_or_else(|| NidriveError::NotFound("file".to_string()))
    }

    /// Look up a file by share token.
    pub async fn shared_file(&self, token: &str) -> Result<FileMetadata> {
        FileRepository::new(self.pool)
            .get_by_share_token(token)
            .await?
            .ok_or_else(|| NidriveError::NotFound("file".to_string()))
    }

    /// Read the content of a file and count the download.
    pub async fn read_content(&self, file: &FileMetadata) -> Result<Vec<u8>> {
        let content = self.storage.load(&file.stored_name).await?;
        FileRepository::new(self.pool)
            .increment_downloads(file.id)
            .await?;
        Ok(content)
    }

    // ---------------------------------------------------------------------
    // Folders
    // ---------------------------------------------------------------------

    /// Create a folder.
    pub async fn create_folder(
        &self,
        owner_id: i64,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Folder> {
        let name = validate_folder_name(name)?;

        let mut new_folder = NewFolder::new(owner_id, name);
        if let Some(parent_id) = parent_id {
            self.owned_folder(owner_id, parent_id).await?;
            let depth = FolderRepository::new(self.pool).get_depth(parent_id).await?;
            if depth + 1 >= MAX_FOLDER_DEPTH {
                return Err(NidriveError::Validation(format!(
                    "folders cannot be nested more than {MAX_FOLDER_DEPTH} levels deep"
                )));
            }
            new_folder = new_folder.with_parent(parent_id);
        }

        let folder = FolderRepository::new(self.pool).create(&new_folder).await?;
        info!("User {} created folder {} '{}'", owner_id, folder.id, folder.name);
        Ok(folder)
    }

    /// List the user's folders under a parent (None for top level).
    pub async fn list_folders(&self, owner_id: i64, parent_id: Option<i64>) -> Result<Vec<Folder>> {
        if let Some(parent_id) = parent_id {
            self.owned_folder(owner_id, parent_id).await?;
        }
        FolderRepository::new(self.pool)
            .list_by_parent(owner_id, parent_id)
            .await
    }

    /// Get a folder owned by the user.
    pub async fn get_folder(&self, owner_id: i64, folder_id: i64) -> Result<Folder> {
        self.owned_folder(owner_id, folder_id).await
    }

    /// Rename or move a folder.
    ///
    /// A folder cannot become its own parent or move below one of its
    /// descendants.
    pub async fn update_folder(
        &self,
        owner_id: i64,
        folder_id: i64,
        mut update: FolderUpdate,
    ) -> Result<Folder> {
        self.owned_folder(owner_id, folder_id).await?;
        let repo = FolderRepository::new(self.pool);

        if let Some(ref name) = update.name {
            update.name = Some(validate_folder_name(name)?);
        }

        if let Some(Some(parent_id)) = update.parent_id {
            if parent_id == folder_id {
                return Err(NidriveError::Validation(
                    "a folder cannot be its own parent".to_string(),
                ));
            }
            self.owned_folder(owner_id, parent_id).await?;

            if repo.subtree_ids(folder_id).await?.contains(&parent_id) {
                return Err(NidriveError::Validation(
                    "a folder cannot be moved into its own subfolder".to_string(),
                ));
            }

            let parent_depth = repo.get_depth(parent_id).await?;
            let height = repo.subtree_height(folder_id).await?;
            if parent_depth + 1 + height >= MAX_FOLDER_DEPTH {
                return Err(NidriveError::Validation(format!(
                    "folders cannot be nested more than {MAX_FOLDER_DEPTH} levels deep"
                )));
            }
        }

        repo.update(folder_id, &update)
            .await?
            .ok_or_else(|| NidriveError::NotFound("folder".to_string()))
    }

    /// Delete a folder with everything below it.
    ///
    /// Returns the number of files removed.
    pub async fn delete_folder(&self, owner_id: i64, folder_id: i64) -> Result<usize> {
        self.owned_folder(owner_id, folder_id).await?;

        let removed = FolderRepository::new(self.pool)
            .soft_delete_recursive(folder_id)
            .await?;

        let freed: i64 = removed.iter().map(|blob| blob.size).sum();
        for blob in &removed {
            self.remove_blob(&blob.stored_name).await;
        }

        info!(
            "User {} deleted folder {} with {} files ({} bytes)",
            owner_id,
            folder_id,
            removed.len(),
            freed
        );
        Ok(removed.len())
    }

    /// Most recently created folders of the user.
    pub async fn recent_folders(&self, owner_id: i64, limit: i64) -> Result<Vec<Folder>> {
        check_limit(limit, MAX_RECENT_LIMIT)?;
        FolderRepository::new(self.pool).recent(owner_id, limit).await
    }

    /// Find a top-level folder by name, creating it if missing.
    pub async fn top_level_folder(&self, owner_id: i64, name: &str) -> Result<Folder> {
        let name = validate_folder_name(name)?;
        let repo = FolderRepository::new(self.pool);

        if let Some(folder) = repo.find_top_level_by_name(owner_id, &name).await? {
            return Ok(folder);
        }
        repo.create(&NewFolder::new(owner_id, name)).await
    }

    /// The user's folders arranged as a tree, plus the files at the root.
    pub async fn folder_tree(&self, owner_id: i64) -> Result<FolderTree> {
        let folders = FolderRepository::new(self.pool)
            .list_by_owner(owner_id)
            .await?;
        let files = FileRepository::new(self.pool)
            .list(owner_id, FolderScope::All)
            .await?;

        let mut folders_by_parent: HashMap<Option<i64>, Vec<Folder>> = HashMap::new();
        for folder in folders {
            folders_by_parent
                .entry(folder.parent_id)
                .or_default()
                .push(folder);
        }

        let mut files_by_folder: HashMap<Option<i64>, Vec<FileMetadata>> = HashMap::new();
        for file in files {
            files_by_folder.entry(file.folder_id).or_default().push(file);
        }

        let roots = build_nodes(None, &mut folders_by_parent, &mut files_by_folder);
        Ok(FolderTree {
            folders: roots,
            files: files_by_folder.remove(&None).unwrap_or_default(),
        })
    }

    // ---------------------------------------------------------------------
    // Statistics
    // ---------------------------------------------------------------------

    /// Storage statistics of a user.
    pub async fn stats(&self, owner_id: i64) -> Result<DriveStats> {
        let user = UserRepository::new(self.pool)
            .get_by_id(owner_id)
            .await?
            .ok_or_else(|| NidriveError::NotFound("user".to_string()))?;

        let total_files = FileRepository::new(self.pool)
            .count(owner_id, FolderScope::All)
            .await?;
        let total_folders = FolderRepository::new(self.pool)
            .count_by_owner(owner_id)
            .await?;

        Ok(DriveStats {
            total_files,
            total_folders,
            used_space: user.used_space,
            quota: user.quota,
            usage_percent: user.usage_percent(),
            free_space: user.free_space(),
        })
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    async fn owned_folder(&self, owner_id: i64, folder_id: i64) -> Result<Folder> {
        let folder = FolderRepository::new(self.pool)
            .get_by_id(folder_id)
            .await?
            .ok_or_else(|| NidriveError::NotFound("folder".to_string()))?;

        if folder.owner_id != owner_id {
            return Err(NidriveError::Permission(
                "folder belongs to another user".to_string(),
            ));
        }
        Ok(folder)
    }

    async fn remove_blob(&self, stored_name: &str) {
        if let Err(e) = self.storage.delete(stored_name).await {
            warn!("Failed to remove blob {}: {}", stored_name, e);
        }
    }
}

fn build_nodes(
    parent_id: Option<i64>,
    folders_by_parent: &mut HashMap<Option<i64>, Vec<Folder>>,
    files_by_folder: &mut HashMap<Option<i64>, Vec<FileMetadata>>,
) -> Vec<FolderNode> {
    let Some(folders) = folders_by_parent.remove(&parent_id) else {
        return Vec::new();
    };

    folders
        .into_iter()
        .map(|folder| {
            let children = build_nodes(Some(folder.id), folders_by_parent, files_by_folder);
            let files = files_by_folder.remove(&Some(folder.id)).unwrap_or_default();
            FolderNode {
                folder,
                children,
                files,
            }
        })
        .collect()
}

fn check_limit(limit: i64, max: i64) -> Result<()> {
    if !(1..=max).contains(&limit) {
        return Err(NidriveError::Validation(format!(
            "limit must be between 1 and {max}"
        )));
    }
    Ok(())
}

/// Random URL-safe token for share links.
pub fn generate_share_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
