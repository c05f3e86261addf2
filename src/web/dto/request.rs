//! Request DTOs for Web API.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::TelegramLoginData;
use crate::file::{FileUpdate, FolderUpdate};

use super::validation::{no_control_chars, not_empty_trimmed};

/// Telegram Login Widget payload.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TelegramLoginRequest {
    /// Telegram user ID.
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Unix time the widget signed the data.
    pub auth_date: i64,
    /// Hex HMAC-SHA256 signature.
    pub hash: String,
}

impl From<TelegramLoginRequest> for TelegramLoginData {
    fn from(req: TelegramLoginRequest) -> Self {
        Self {
            id: req.id,
            first_name: req.first_name,
            last_name: req.last_name,
            username: req.username,
            photo_url: req.photo_url,
            auth_date: req.auth_date,
            hash: req.hash,
        }
    }
}

/// Register a browser-chosen login code.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterCodeRequest {
    #[validate(length(min = 6, max = 64, message = "Code must be 6-64 characters"))]
    pub code: String,
}

/// Query for polling a login code.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CheckCodeQuery {
    pub code: String,
}

/// Profile update for the current user.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMeRequest {
    #[validate(length(max = 64), custom(function = "no_control_chars"))]
    pub username: Option<String>,
    #[validate(length(max = 128), custom(function = "no_control_chars"))]
    pub first_name: Option<String>,
    #[validate(length(max = 128), custom(function = "no_control_chars"))]
    pub last_name: Option<String>,
    #[validate(url(message = "Must be a valid URL"))]
    pub photo_url: Option<String>,
}

/// Folder creation request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateFolderRequest {
    #[validate(
        length(min = 1, max = 255, message = "Name must be 1-255 characters"),
        custom(function = "not_empty_trimmed"),
        custom(function = "no_control_chars")
    )]
    pub name: String,
    /// Parent folder; omitted for a top-level folder.
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// Folder rename/move request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateFolderRequest {
    #[validate(
        length(min = 1, max = 255, message = "Name must be 1-255 characters"),
        custom(function = "not_empty_trimmed"),
        custom(function = "no_control_chars")
    )]
    pub name: Option<String>,
    /// New parent folder.
    #[serde(default)]
    pub parent_id: Option<i64>,
    /// Move the folder to the top level.
    #[serde(default)]
    pub move_to_root: bool,
}

impl UpdateFolderRequest {
    pub fn into_update(self) -> FolderUpdate {
        let mut update = FolderUpdate::new();
        if let Some(name) = self.name {
            update = update.name(name.trim());
        }
        if self.move_to_root {
            update = update.parent_id(None);
        } else if let Some(parent_id) = self.parent_id {
            update = update.parent_id(Some(parent_id));
        }
        update
    }
}

/// File rename/move/visibility request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateFileRequest {
    #[validate(length(min = 1, max = 255, message = "Filename must be 1-255 characters"))]
    pub filename: Option<String>,
    /// Target folder.
    #[serde(default)]
    pub folder_id: Option<i64>,
    /// Move the file to the root.
    #[serde(default)]
    pub clear_folder: bool,
    pub is_public: Option<bool>,
}

impl UpdateFileRequest {
    pub fn into_update(self) -> FileUpdate {
        let mut update = FileUpdate::new();
        if let Some(filename) = self.filename {
            update = update.filename(filename);
        }
        if self.clear_folder {
            update = update.folder_id(None);
        } else if let Some(folder_id) = self.folder_id {
            update = update.folder_id(Some(folder_id));
        }
        if let Some(is_public) = self.is_public {
            update = update.is_public(is_public);
        }
        update
    }
}

/// Visibility change request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VisibilityRequest {
    pub is_public: bool,
}

/// Admin quota update.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuotaRequest {
    /// New quota in megabytes.
    #[validate(range(min = 0, message = "Quota must not be negative"))]
    pub quota_mb: i64,
}

/// Multipart form accepted by the upload endpoint.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub folder_id: Option<i64>,
    pub is_public: Option<bool>,
}

/// Query for listing files.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListFilesQuery {
    /// Only files in this folder.
    pub folder_id: Option<i64>,
    /// Only files in the root.
    #[serde(default)]
    pub root_only: bool,
}

/// Query for listing folders.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListFoldersQuery {
    /// Parent folder; omitted for top-level folders.
    pub parent_id: Option<i64>,
}

/// Query with an optional result limit.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// Query for file search.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive filename substring.
    pub query: Option<String>,
    /// One of image, video, audio, document, archive.
    pub file_type: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339, inclusive.
    pub date_from: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339, inclusive.
    pub date_to: Option<String>,
    pub is_public: Option<bool>,
}

/// Offset pagination for admin listings.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SkipLimitQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_admin_limit")]
    pub limit: i64,
}

fn default_admin_limit() -> i64 {
    100
}
