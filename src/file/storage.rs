//! Blob storage for uploaded files.
//!
//! Every file lives under a UUID name in one sharded directory tree.
//! Visibility is metadata only, so a blob never moves after it is written.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::{NidriveError, Result};

/// Longest extension kept on stored names.
const MAX_STORED_EXTENSION: usize = 16;

/// Blob storage rooted at a base directory.
///
/// Layout:
/// ```text
/// {base_path}/
/// ├── 3f/
/// │   └── 3f2b9c4e-0d1a-4f7e-9c55-1a2b3c4d5e6f.pdf
/// └── a0/
///     └── a07c1d22-9e8f-4b3a-8d21-7f6e5d4c3b2a.bin
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a storage rooted at `base_path`, creating the directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write `content` under a fresh stored name and return that name.
    pub async fn save(&self, content: &[u8], original_name: &str) -> Result<String> {
        let stored_name = Self::generate_stored_name(original_name);
        self.save_with_name(content, &stored_name).await?;
        Ok(stored_name)
    }

    /// Write `content` under a given stored name.
    pub async fn save_with_name(&self, content: &[u8], stored_name: &str) -> Result<()> {
        let file_path = self.resolve(stored_name)?;

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&file_path, content).await?;

        debug!("Stored blob {} ({} bytes)", stored_name, content.len());
        Ok(())
    }

    /// Read a blob.
    pub async fn load(&self, stored_name: &str) -> Result<Vec<u8>> {
        let file_path = self.resolve(stored_name)?;

        match fs::read(&file_path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(NidriveError::NotFound(format!("blob {stored_name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a blob.
    ///
    /// Returns false if it did not exist.
    pub async fn delete(&self, stored_name: &str) -> Result<bool> {
        let file_path = self.resolve(stored_name)?;

        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if a blob exists.
    pub async fn exists(&self, stored_name: &str) -> bool {
        match self.resolve(stored_name) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Size of a blob in bytes.
    pub async fn file_size(&self, stored_name: &str) -> Result<u64> {
        let file_path = self.resolve(stored_name)?;

        match fs::metadata(&file_path).await {
            Ok(m) => Ok(m.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(NidriveError::NotFound(format!("blob {stored_name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Path of a blob: `{base_path}/{shard}/{stored_name}`.
    ///
    /// Names that could escape the base directory are rejected.
    pub fn resolve(&self, stored_name: &str) -> Result<PathBuf> {
        let valid = !stored_name.is_empty()
            && !stored_name.starts_with('.')
            && stored_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
        if !valid {
            return Err(NidriveError::Validation(format!(
                "invalid stored name: {stored_name}"
            )));
        }

        Ok(self
            .base_path
            .join(Self::shard(stored_name))
            .join(stored_name))
    }

    /// Shard directory of a stored name: its first two characters.
    fn shard(stored_name: &str) -> &str {
        stored_name.get(..2).unwrap_or(stored_name)
    }

    /// Extension to keep on the stored name, lowercased.
    ///
    /// Falls back to "bin" when the original has no usable extension.
    fn stored_extension(original_name: &str) -> String {
        super::file_extension(original_name)
            .filter(|ext| {
                ext.len() <= MAX_STORED_EXTENSION && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .unwrap_or_else(|| "bin".to_string())
    }

    /// Generate a new UUID-based stored name for an original filename.
    pub fn generate_stored_name(original_name: &str) -> String {
        format!("{}.{}", Uuid::new_v4(), Self::stored_extension(original_name))
    }

    /// Remove shard directories left empty by deletions.
    pub async fn cleanup_empty_dirs(&self) -> Result<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let mut children = fs::read_dir(&path).await?;
            if children.next_entry().await?.is_none() && fs::remove_dir(&path).await.is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }
}
