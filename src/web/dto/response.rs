//! Response DTOs for Web API.

use serde::Serialize;
use utoipa::ToSchema;

use crate::datetime::to_rfc3339;
use crate::db::User;
use crate::file::{
    public_file_url, share_url, DriveStats, FileMetadata, Folder, FolderNode, FolderTree,
};

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Offset-paginated list.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, skip: i64, limit: i64, total: i64) -> Self {
        Self {
            data,
            meta: PaginationMeta { skip, limit, total },
        }
    }
}

/// Pagination metadata.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Items skipped.
    pub skip: i64,
    /// Page size.
    pub limit: i64,
    /// Total number of items.
    pub total: i64,
}

// ============================================================================
// Auth & Users
// ============================================================================

/// User profile.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
    /// Bytes in use.
    pub used_space: i64,
    /// Quota in bytes.
    pub quota: i64,
    pub created_at: String,
    pub last_login: Option<String>,
    pub is_active: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            telegram_id: user.telegram_id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            photo_url: user.photo_url,
            used_space: user.used_space,
            quota: user.quota,
            created_at: to_rfc3339(&user.created_at),
            last_login: user.last_login.as_deref().map(to_rfc3339),
            is_active: user.is_active,
        }
    }
}

/// Login response.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Access token (JWT).
    pub access_token: String,
    /// Always `bearer`.
    pub token_type: String,
    /// Access token expiry in seconds.
    pub expires_in: u64,
    pub user: UserResponse,
}

/// Login code as registered.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterCodeResponse {
    pub code: String,
    pub expires_at: String,
}

/// Result of polling a login code.
#[derive(Debug, Serialize, ToSchema)]
pub struct CodeStatusResponse {
    /// `pending` or `authorized`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

impl CodeStatusResponse {
    pub fn pending() -> Self {
        Self {
            status: "pending".to_string(),
            access_token: None,
            token_type: None,
            expires_in: None,
            user: None,
        }
    }

    pub fn authorized(login: LoginResponse) -> Self {
        Self {
            status: "authorized".to_string(),
            access_token: Some(login.access_token),
            token_type: Some(login.token_type),
            expires_in: Some(login.expires_in),
            user: Some(login.user),
        }
    }
}

/// Drive statistics of the current user.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub total_files: i64,
    pub total_folders: i64,
    pub used_space: i64,
    pub quota: i64,
    pub usage_percent: f64,
    pub free_space: i64,
}

impl From<DriveStats> for StatsResponse {
    fn from(stats: DriveStats) -> Self {
        Self {
            total_files: stats.total_files,
            total_folders: stats.total_folders,
            used_space: stats.used_space,
            quota: stats.quota,
            usage_percent: stats.usage_percent,
            free_space: stats.free_space,
        }
    }
}

/// Simplified storage usage.
#[derive(Debug, Serialize, ToSchema)]
pub struct StorageUsageResponse {
    pub used: i64,
    pub total: i64,
    pub percentage: f64,
}

impl From<&User> for StorageUsageResponse {
    fn from(user: &User) -> Self {
        Self {
            used: user.used_space,
            total: user.quota,
            percentage: user.usage_percent(),
        }
    }
}

/// User as listed for administrators.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub total_files: i64,
    pub total_folders: i64,
    pub usage_percent: f64,
}

/// Result of a usage recalculation.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecalculateResponse {
    pub user_id: i64,
    pub used_space: i64,
}

// ============================================================================
// Files & Folders
// ============================================================================

/// File metadata.
#[derive(Debug, Serialize, ToSchema)]
pub struct FileResponse {
    pub id: i64,
    pub filename: String,
    pub folder_id: Option<i64>,
    pub size: i64,
    pub mime_type: String,
    pub is_public: bool,
    /// Direct link, only for public files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
    pub downloads: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl FileResponse {
    /// Build the response, deriving links from `base_url`.
    pub fn from_metadata(file: FileMetadata, base_url: &str) -> Self {
        Self {
            public_url: file.is_public.then(|| public_file_url(base_url, file.id)),
            share_url: file.share_token.as_deref().map(|t| share_url(base_url, t)),
            id: file.id,
            filename: file.filename,
            folder_id: file.folder_id,
            size: file.size,
            mime_type: file.mime_type,
            is_public: file.is_public,
            downloads: file.downloads,
            created_at: to_rfc3339(&file.created_at),
            updated_at: to_rfc3339(&file.updated_at),
        }
    }

    pub fn list(files: Vec<FileMetadata>, base_url: &str) -> Vec<Self> {
        files
            .into_iter()
            .map(|f| Self::from_metadata(f, base_url))
            .collect()
    }
}

/// Share link of a file.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShareResponse {
    pub file_id: i64,
    pub share_token: String,
    pub share_url: String,
}

/// Folder.
#[derive(Debug, Serialize, ToSchema)]
pub struct FolderResponse {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Folder> for FolderResponse {
    fn from(folder: Folder) -> Self {
        Self {
            id: folder.id,
            name: folder.name,
            parent_id: folder.parent_id,
            created_at: to_rfc3339(&folder.created_at),
            updated_at: to_rfc3339(&folder.updated_at),
        }
    }
}

/// Folder with its subfolders and files.
#[derive(Debug, Serialize, ToSchema)]
pub struct FolderNodeResponse {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_at: String,
    pub children: Vec<FolderNodeResponse>,
    pub files: Vec<FileResponse>,
}

impl FolderNodeResponse {
    fn from_node(node: FolderNode, base_url: &str) -> Self {
        Self {
            id: node.folder.id,
            name: node.folder.name,
            parent_id: node.folder.parent_id,
            created_at: to_rfc3339(&node.folder.created_at),
            children: node
                .children
                .into_iter()
                .map(|child| Self::from_node(child, base_url))
                .collect(),
            files: FileResponse::list(node.files, base_url),
        }
    }
}

/// The user's whole drive.
#[derive(Debug, Serialize, ToSchema)]
pub struct FolderTreeResponse {
    /// Top-level folders.
    pub folders: Vec<FolderNodeResponse>,
    /// Files outside any folder.
    pub files: Vec<FileResponse>,
}

impl FolderTreeResponse {
    pub fn from_tree(tree: FolderTree, base_url: &str) -> Self {
        Self {
            folders: tree
                .folders
                .into_iter()
                .map(|node| FolderNodeResponse::from_node(node, base_url))
                .collect(),
            files: FileResponse::list(tree.files, base_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file(is_public: bool, share_token: Option<&str>) -> FileMetadata {
        FileMetadata {
            id: 9,
            owner_id: 1,
            folder_id: None,
            filename: "report.pdf".to_string(),
            stored_name: "ab12.pdf".to_string(),
            size: 2048,
            mime_type: "application/pdf".to_string(),
            is_public,
            share_token: share_token.map(str::to_string),
            downloads: 3,
            created_at: "2026-01-02 03:04:05".to_string(),
            updated_at: "2026-01-02 03:04:05".to_string(),
            is_deleted: false,
        }
    }

    #[test]
    fn test_file_response_links() {
        let resp = FileResponse::from_metadata(sample_file(true, None), "https://drive.example/");
        assert_eq!(
            resp.public_url.as_deref(),
            Some("https://drive.example/api/v1/public/9")
        );
        assert!(resp.share_url.is_none());
        assert_eq!(resp.created_at, "2026-01-02T03:04:05Z");

        let resp =
            FileResponse::from_metadata(sample_file(false, Some("tok")), "https://drive.example");
        assert!(resp.public_url.is_none());
        assert_eq!(
            resp.share_url.as_deref(),
            Some("https://drive.example/api/v1/shared/tok")
        );
    }

    #[test]
    fn test_private_file_omits_public_url() {
        let resp = FileResponse::from_metadata(sample_file(false, None), "http://localhost");
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("public_url").is_none());
        assert_eq!(json["is_public"], false);
    }

    #[test]
    fn test_code_status_pending_shape() {
        let json = serde_json::to_value(CodeStatusResponse::pending()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "pending"}));
    }
}
