//! Folder handlers for Web API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::file::DEFAULT_RECENT_LIMIT;
use crate::web::dto::{
    ApiResponse, CreateFolderRequest, FolderResponse, FolderTreeResponse, LimitQuery,
    ListFoldersQuery, UpdateFolderRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// POST /api/v1/folders - Create a folder.
#[utoipa::path(
    post,
    path = "/api/v1/folders",
    tag = "folders",
    request_body = CreateFolderRequest,
    responses(
        (status = 201, description = "Folder created", body = FolderResponse),
        (status = 400, description = "Invalid name or nesting too deep"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Parent belongs to another user"),
        (status = 404, description = "Parent not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateFolderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FolderResponse>>), ApiError> {
    let user = state.current_user(&claims).await?;
    let folder = state
        .drive()
        .create_folder(user.id, &req.name, req.parent_id)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(folder.into()))))
}

/// GET /api/v1/folders - List folders under a parent.
#[utoipa::path(
    get,
    path = "/api/v1/folders",
    tag = "folders",
    params(ListFoldersQuery),
    responses(
        (status = 200, description = "Folders ordered by name", body = Vec<FolderResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Parent belongs to another user"),
        (status = 404, description = "Parent not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_folders(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<ListFoldersQuery>,
) -> Result<Json<ApiResponse<Vec<FolderResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let folders = state.drive().list_folders(user.id, query.parent_id).await?;

    Ok(Json(ApiResponse::new(
        folders.into_iter().map(FolderResponse::from).collect(),
    )))
}

/// GET /api/v1/folders/tree - All folders with their files.
#[utoipa::path(
    get,
    path = "/api/v1/folders/tree",
    tag = "folders",
    responses(
        (status = 200, description = "Folder tree", body = FolderTreeResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn folder_tree(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<FolderTreeResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let tree = state.drive().folder_tree(user.id).await?;

    Ok(Json(ApiResponse::new(FolderTreeResponse::from_tree(
        tree,
        state.public_url(),
    ))))
}

/// GET /api/v1/folders/recent - Most recently created folders.
#[utoipa::path(
    get,
    path = "/api/v1/folders/recent",
    tag = "folders",
    params(LimitQuery),
    responses(
        (status = 200, description = "Recent folders", body = Vec<FolderResponse>),
        (status = 400, description = "Limit out of range"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn recent_folders(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<FolderResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let folders = state
        .drive()
        .recent_folders(user.id, query.limit.unwrap_or(DEFAULT_RECENT_LIMIT))
        .await?;

    Ok(Json(ApiResponse::new(
        folders.into_iter().map(FolderResponse::from).collect(),
    )))
}

/// GET /api/v1/folders/{id} - Folder details.
#[utoipa::path(
    get,
    path = "/api/v1/folders/{id}",
    tag = "folders",
    params(("id" = i64, Path, description = "Folder ID")),
    responses(
        (status = 200, description = "Folder", body = FolderResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(folder_id): Path<i64>,
) -> Result<Json<ApiResponse<FolderResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let folder = state.drive().get_folder(user.id, folder_id).await?;
    Ok(Json(ApiResponse::new(folder.into())))
}

/// PUT /api/v1/folders/{id} - Rename or move a folder.
#[utoipa::path(
    put,
    path = "/api/v1/folders/{id}",
    tag = "folders",
    params(("id" = i64, Path, description = "Folder ID")),
    request_body = UpdateFolderRequest,
    responses(
        (status = 200, description = "Updated folder", body = FolderResponse),
        (status = 400, description = "Invalid name, cycle or nesting too deep"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(folder_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateFolderRequest>,
) -> Result<Json<ApiResponse<FolderResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let drive = state.drive();

    let update = req.into_update();
    let folder = if update.is_empty() {
        drive.get_folder(user.id, folder_id).await?
    } else {
        drive.update_folder(user.id, folder_id, update).await?
    };

    Ok(Json(ApiResponse::new(folder.into())))
}

/// DELETE /api/v1/folders/{id} - Delete a folder and everything in it.
#[utoipa::path(
    delete,
    path = "/api/v1/folders/{id}",
    tag = "folders",
    params(("id" = i64, Path, description = "Folder ID")),
    responses(
        (status = 204, description = "Folder deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(folder_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = state.current_user(&claims).await?;
    let removed = state.drive().delete_folder(user.id, folder_id).await?;
    tracing::debug!("Folder {} deleted with {} files", folder_id, removed);
    Ok(StatusCode::NO_CONTENT)
}
