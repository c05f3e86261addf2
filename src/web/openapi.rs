//! OpenAPI document for the HTTP API.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::dto::{
    AdminUserResponse, CodeStatusResponse, CreateFolderRequest, FileResponse,
    FolderNodeResponse, FolderResponse, FolderTreeResponse, LoginResponse, PaginationMeta,
    RecalculateResponse, RegisterCodeRequest, RegisterCodeResponse, ShareResponse,
    StatsResponse, StorageUsageResponse, TelegramLoginRequest, UpdateFileRequest,
    UpdateFolderRequest, UpdateMeRequest, UpdateQuotaRequest, UploadForm, UserResponse,
    VisibilityRequest,
};
use super::error::{ErrorBody, ErrorCode, ErrorDetail};
use super::handlers::{admin, auth, file, folder, public, user};

#[derive(OpenApi)]
#[openapi(
    info(title = "NIDrive API", description = "Personal cloud storage with Telegram login"),
    paths(
        auth::telegram_login,
        auth::register_code,
        auth::check_code,
        user::get_me,
        user::update_me,
        user::get_stats,
        user::storage_usage,
        file::upload_file,
        file::list_files,
        file::recent_files,
        file::popular_files,
        file::search_files,
        file::get_file,
        file::update_file,
        file::delete_file,
        file::download_file,
        file::preview_file,
        file::set_visibility,
        file::toggle_visibility,
        file::share_file,
        file::unshare_file,
        folder::create_folder,
        folder::list_folders,
        folder::folder_tree,
        folder::recent_folders,
        folder::get_folder,
        folder::update_folder,
        folder::delete_folder,
        public::public_file,
        public::shared_file,
        admin::list_users,
        admin::update_quota,
        admin::recalculate_usage,
    ),
    components(schemas(
        ErrorBody,
        ErrorDetail,
        ErrorCode,
        TelegramLoginRequest,
        RegisterCodeRequest,
        UpdateMeRequest,
        CreateFolderRequest,
        UpdateFolderRequest,
        UpdateFileRequest,
        UploadForm,
        VisibilityRequest,
        UpdateQuotaRequest,
        UserResponse,
        LoginResponse,
        RegisterCodeResponse,
        CodeStatusResponse,
        StatsResponse,
        StorageUsageResponse,
        AdminUserResponse,
        RecalculateResponse,
        PaginationMeta,
        FileResponse,
        ShareResponse,
        FolderResponse,
        FolderNodeResponse,
        FolderTreeResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Telegram login and bot login codes"),
        (name = "users", description = "Current user and storage usage"),
        (name = "files", description = "Upload, download and manage files"),
        (name = "folders", description = "Folder hierarchy"),
        (name = "public", description = "Public and shared links"),
        (name = "admin", description = "User and quota administration"),
    )
)]
pub struct ApiDoc;

/// Registers the bearer JWT scheme referenced by `security(("bearer_auth" = []))`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/api/v1/files/{id}/download"));
        assert!(doc.paths.paths.contains_key("/api/v1/admin/users/{id}/quota"));

        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("FileResponse"));
    }
}
