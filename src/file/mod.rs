//! Drive module for NIDrive.
//!
//! This module provides the personal drive of each user:
//! - Owner-scoped folder hierarchy with recursive soft delete
//! - File metadata, visibility and share links
//! - Sharded blob storage with UUID naming
//! - Quota accounting around uploads and deletions

mod folder;
mod metadata;
mod service;
mod storage;

pub use folder::{Folder, FolderRepository, FolderUpdate, NewFolder};
pub use metadata::{FileMetadata, FileRepository, FileSearch, FileUpdate, FolderScope, NewFile};
pub use service::{DriveService, DriveStats, FolderNode, FolderTree, UploadRequest};
pub use storage::FileStorage;

use crate::{NidriveError, Result};

/// Maximum length for a filename (in characters).
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Maximum length for a folder name (in characters).
pub const MAX_FOLDER_NAME_LENGTH: usize = 255;

/// Maximum folder depth (levels below the root).
pub const MAX_FOLDER_DEPTH: usize = 32;

/// Default number of items for the "recent" listings.
pub const DEFAULT_RECENT_LIMIT: i64 = 5;

/// Upper bound for the "recent" listings.
pub const MAX_RECENT_LIMIT: i64 = 50;

/// Default number of items for the popular files listing.
pub const DEFAULT_POPULAR_LIMIT: i64 = 10;

/// Maximum number of search results.
pub const MAX_SEARCH_RESULTS: i64 = 100;

/// Length of generated share tokens.
pub const SHARE_TOKEN_LENGTH: usize = 32;

/// Coarse file category used by search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Image,
    Video,
    Audio,
    Document,
    Archive,
}

impl FileCategory {
    /// Parse a category name as accepted by the search endpoint.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "document" => Ok(Self::Document),
            "archive" => Ok(Self::Archive),
            other => Err(NidriveError::Validation(format!(
                "unknown file type '{other}', expected one of image, video, audio, document, archive"
            ))),
        }
    }

    /// MIME type prefixes belonging to the category.
    pub fn mime_prefixes(&self) -> &'static [&'static str] {
        match self {
            Self::Image => &["image/"],
            Self::Video => &["video/"],
            Self::Audio => &["audio/"],
            Self::Document => &[
                "text/",
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument",
                "application/vnd.ms-",
                "application/vnd.oasis.opendocument",
                "application/rtf",
            ],
            Self::Archive => &[
                "application/zip",
                "application/x-rar",
                "application/vnd.rar",
                "application/x-7z-compressed",
                "application/x-tar",
                "application/gzip",
                "application/x-bzip2",
                "application/x-xz",
            ],
        }
    }

    /// File extensions belonging to the category (lowercase, without dot).
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Image => &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "heic"],
            Self::Video => &["mp4", "mkv", "avi", "mov", "webm", "wmv"],
            Self::Audio => &["mp3", "wav", "ogg", "flac", "m4a", "aac", "opus"],
            Self::Document => &[
                "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "txt", "rtf",
                "md", "csv",
            ],
            Self::Archive => &["zip", "rar", "7z", "tar", "gz", "bz2", "xz"],
        }
    }

    /// Check whether a file belongs to the category.
    pub fn matches(&self, mime_type: &str, filename: &str) -> bool {
        let mime = mime_type.to_ascii_lowercase();
        if self.mime_prefixes().iter().any(|p| mime.starts_with(p)) {
            return true;
        }
        match file_extension(filename) {
            Some(ext) => self.extensions().contains(&ext.as_str()),
            None => false,
        }
    }
}

/// Lowercase extension of a filename, if it has one.
///
/// A leading dot does not start an extension (`.bashrc` has none).
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Clean up a client-supplied filename.
///
/// Directory components are stripped, control characters removed and the
/// result is cut to [`MAX_FILENAME_LENGTH`] characters.
pub fn sanitize_filename(name: &str) -> Result<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(NidriveError::Validation("filename is empty".to_string()));
    }
    Ok(cleaned)
}

/// Validate a folder name and return it trimmed.
pub fn validate_folder_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NidriveError::Validation(
            "folder name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LENGTH {
        return Err(NidriveError::Validation(format!(
            "folder name must be at most {MAX_FOLDER_NAME_LENGTH} characters"
        )));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(NidriveError::Validation(
            "folder name contains control characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Absolute URL of a public file.
pub fn public_file_url(base_url: &str, file_id: i64) -> String {
    format!("{}/api/v1/public/{file_id}", base_url.trim_end_matches('/'))
}

/// Absolute URL of a share link.
pub fn share_url(base_url: &str, token: &str) -> String {
    format!("{}/api/v1/shared/{token}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_filename("  notes.txt  ").unwrap(), "notes.txt");
    }

    #[test]
    fn test_sanitize_filename_removes_control_chars() {
        assert_eq!(sanitize_filename("bad\u{0}na\nme.txt").unwrap(), "badname.txt");
    }

    #[test]
    fn test_sanitize_filename_rejects_empty() {
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("dir/").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("\n\t").is_err());
    }

    #[test]
    fn test_sanitize_filename_truncates() {
        let long = format!("{}.txt", "a".repeat(300));
        let cleaned = sanitize_filename(&long).unwrap();
        assert_eq!(cleaned.chars().count(), MAX_FILENAME_LENGTH);
    }

    #[test]
    fn test_validate_folder_name() {
        assert_eq!(validate_folder_name("  Photos ").unwrap(), "Photos");
        assert!(validate_folder_name("   ").is_err());
        assert!(validate_folder_name("a\u{7}b").is_err());
        assert!(validate_folder_name(&"x".repeat(256)).is_err());
        assert!(validate_folder_name(&"x".repeat(255)).is_ok());
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".bashrc"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(FileCategory::parse("Image").unwrap(), FileCategory::Image);
        assert_eq!(FileCategory::parse("archive").unwrap(), FileCategory::Archive);
        assert!(matches!(
            FileCategory::parse("spreadsheet"),
            Err(NidriveError::Validation(_))
        ));
    }

    #[test]
    fn test_category_matches_mime_or_extension() {
        assert!(FileCategory::Image.matches("image/png", "a.bin"));
        assert!(FileCategory::Image.matches("application/octet-stream", "a.jpeg"));
        assert!(FileCategory::Document.matches("application/pdf", "x"));
        assert!(FileCategory::Archive.matches("application/octet-stream", "backup.7z"));
        assert!(!FileCategory::Video.matches("audio/mpeg", "song.mp3"));
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            public_file_url("https://drive.example.com/", 7),
            "https://drive.example.com/api/v1/public/7"
        );
        assert_eq!(
            share_url("http://localhost:8000", "abc"),
            "http://localhost:8000/api/v1/shared/abc"
        );
    }
}
