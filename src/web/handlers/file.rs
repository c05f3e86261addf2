//! File handlers for Web API.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::datetime::parse_search_bound;
use crate::file::{
    share_url, FileCategory, FileMetadata, FileSearch, FolderScope, UploadRequest,
    DEFAULT_POPULAR_LIMIT, DEFAULT_RECENT_LIMIT,
};
use crate::web::dto::{
    ApiResponse, FileResponse, LimitQuery, ListFilesQuery, SearchQuery, ShareResponse,
    UpdateFileRequest, UploadForm, ValidatedJson, VisibilityRequest,
};
use crate::web::error::{ApiError, ErrorCode};
use crate::web::handlers::AppState;
use crate::web::middleware::{AuthUser, OptionalAuthUser};

/// Build a Content-Disposition value that is safe for any filename.
///
/// Control characters are dropped, and `"` and `\` are replaced in the
/// quoted fallback. Non-ASCII names add an RFC 5987 `filename*` parameter.
pub(crate) fn content_disposition(filename: &str, inline: bool) -> String {
    let kind = if inline { "inline" } else { "attachment" };
    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            c => c,
        })
        .collect();

    if fallback == filename {
        return format!("{kind}; filename=\"{fallback}\"");
    }

    format!(
        "{kind}; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

/// Serve a file's content and count the download.
pub(crate) async fn serve_file(
    state: &AppState,
    file: FileMetadata,
    inline: bool,
) -> Result<Response, ApiError> {
    let content = state.drive().read_content(&file).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &file.mime_type)
        .header(header::CONTENT_LENGTH, content.len())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&file.filename, inline),
        )
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build download response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::new(ErrorCode::PayloadTooLarge, "Upload exceeds the size limit");
    }
    ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text()))
}

fn parse_bool(value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(ApiError::bad_request(format!("Invalid boolean: {other}"))),
    }
}

/// POST /api/v1/files - Upload a file (multipart: file, folder_id?, is_public?).
#[utoipa::path(
    post,
    path = "/api/v1/files",
    tag = "files",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File uploaded", body = FileResponse),
        (status = 400, description = "Missing or empty file"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Folder not found"),
        (status = 413, description = "File too large or quota exceeded")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>), ApiError> {
    let user = state.current_user(&claims).await?;

    let mut upload: Option<UploadRequest> = None;
    let mut folder_id: Option<i64> = None;
    let mut is_public = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::bad_request("File field has no filename"))?;
                let content_type = field.content_type().map(str::to_string);
                let content = field.bytes().await.map_err(multipart_error)?;

                let mut request = UploadRequest::new(filename, content.to_vec());
                if let Some(mime) = content_type.filter(|m| m != "application/octet-stream") {
                    request = request.with_mime_type(mime);
                }
                upload = Some(request);
            }
            "folder_id" => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.trim().is_empty() {
                    folder_id = Some(
                        text.trim()
                            .parse()
                            .map_err(|_| ApiError::bad_request("Invalid folder_id"))?,
                    );
                }
            }
            "is_public" => {
                let text = field.text().await.map_err(multipart_error)?;
                is_public = parse_bool(&text)?;
            }
            _ => {}
        }
    }

    let request = upload
        .ok_or_else(|| ApiError::bad_request("No file provided"))?
        .with_folder(folder_id)
        .with_public(is_public);

    let file = state.drive().upload(user.id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(FileResponse::from_metadata(
            file,
            state.public_url(),
        ))),
    ))
}

/// GET /api/v1/files - List files.
#[utoipa::path(
    get,
    path = "/api/v1/files",
    tag = "files",
    params(ListFilesQuery),
    responses(
        (status = 200, description = "Files, newest first", body = Vec<FileResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Folder belongs to another user"),
        (status = 404, description = "Folder not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;

    let scope = match (query.folder_id, query.root_only) {
        (Some(folder_id), _) => FolderScope::Folder(folder_id),
        (None, true) => FolderScope::Root,
        (None, false) => FolderScope::All,
    };
    let files = state.drive().list_files(user.id, scope).await?;

    Ok(Json(ApiResponse::new(FileResponse::list(
        files,
        state.public_url(),
    ))))
}

/// GET /api/v1/files/recent - Most recent uploads.
#[utoipa::path(
    get,
    path = "/api/v1/files/recent",
    tag = "files",
    params(LimitQuery),
    responses(
        (status = 200, description = "Recent files", body = Vec<FileResponse>),
        (status = 400, description = "Limit out of range"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn recent_files(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let files = state
        .drive()
        .recent_files(user.id, query.limit.unwrap_or(DEFAULT_RECENT_LIMIT))
        .await?;

    Ok(Json(ApiResponse::new(FileResponse::list(
        files,
        state.public_url(),
    ))))
}

/// GET /api/v1/files/popular - Most downloaded files.
#[utoipa::path(
    get,
    path = "/api/v1/files/popular",
    tag = "files",
    params(LimitQuery),
    responses(
        (status = 200, description = "Popular files", body = Vec<FileResponse>),
        (status = 400, description = "Limit out of range"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn popular_files(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let files = state
        .drive()
        .popular_files(user.id, query.limit.unwrap_or(DEFAULT_POPULAR_LIMIT))
        .await?;

    Ok(Json(ApiResponse::new(FileResponse::list(
        files,
        state.public_url(),
    ))))
}

/// GET /api/v1/files/search - Search files.
#[utoipa::path(
    get,
    path = "/api/v1/files/search",
    tag = "files",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching files, newest first", body = Vec<FileResponse>),
        (status = 400, description = "Unknown file type or invalid date"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn search_files(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let user = state.current_user(&claims).await?;

    let bound = |value: Option<&str>, upper: bool| -> Result<Option<String>, ApiError> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(v) => parse_search_bound(v, upper)
                .map(Some)
                .ok_or_else(|| ApiError::bad_request(format!("Invalid date: {v}"))),
        }
    };

    let search = FileSearch {
        query: query.query.filter(|q| !q.trim().is_empty()),
        category: query
            .file_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(FileCategory::parse)
            .transpose()?,
        created_from: bound(query.date_from.as_deref(), false)?,
        created_to: bound(query.date_to.as_deref(), true)?,
        is_public: query.is_public,
    };
    let files = state.drive().search(user.id, &search).await?;

    Ok(Json(ApiResponse::new(FileResponse::list(
        files,
        state.public_url(),
    ))))
}

/// GET /api/v1/files/{id} - File metadata.
#[utoipa::path(
    get,
    path = "/api/v1/files/{id}",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let file = state.drive().get_file(user.id, file_id).await?;
    Ok(Json(ApiResponse::new(FileResponse::from_metadata(
        file,
        state.public_url(),
    ))))
}

/// PUT /api/v1/files/{id} - Rename, move or change visibility.
#[utoipa::path(
    put,
    path = "/api/v1/files/{id}",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    request_body = UpdateFileRequest,
    responses(
        (status = 200, description = "Updated file", body = FileResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File or folder not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateFileRequest>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let file = state
        .drive()
        .update_file(user.id, file_id, req.into_update())
        .await?;
    Ok(Json(ApiResponse::new(FileResponse::from_metadata(
        file,
        state.public_url(),
    ))))
}

/// DELETE /api/v1/files/{id} - Delete a file.
#[utoipa::path(
    delete,
    path = "/api/v1/files/{id}",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = state.current_user(&claims).await?;
    state.drive().delete_file(user.id, file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/files/{id}/download - Download a file.
///
/// Public files need no token. The token may also be passed as `?token=`.
#[utoipa::path(
    get,
    path = "/api/v1/files/{id}/download",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID"),
        ("token" = Option<String>, Query, description = "Access token for plain links")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 401, description = "Private file and no token, or disabled account"),
        (status = 403, description = "Private file of another user"),
        (status = 404, description = "File not found")
    )
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    OptionalAuthUser(claims): OptionalAuthUser,
    Path(file_id): Path<i64>,
) -> Result<Response, ApiError> {
    let viewer = state.viewer_id(claims.as_ref()).await?;
    let file = state.drive().file_for_download(file_id, viewer).await?;
    serve_file(&state, file, false).await
}

/// GET /api/v1/files/{id}/preview - View a file inline.
#[utoipa::path(
    get,
    path = "/api/v1/files/{id}/preview",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID"),
        ("token" = Option<String>, Query, description = "Access token for plain links")
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 401, description = "Private file and no token, or disabled account"),
        (status = 403, description = "Private file of another user"),
        (status = 404, description = "File not found")
    )
)]
pub async fn preview_file(
    State(state): State<Arc<AppState>>,
    OptionalAuthUser(claims): OptionalAuthUser,
    Path(file_id): Path<i64>,
) -> Result<Response, ApiError> {
    let viewer = state.viewer_id(claims.as_ref()).await?;
    let file = state.drive().file_for_download(file_id, viewer).await?;
    serve_file(&state, file, true).await
}

/// PATCH /api/v1/files/{id}/visibility - Make a file public or private.
#[utoipa::path(
    patch,
    path = "/api/v1/files/{id}/visibility",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    request_body = VisibilityRequest,
    responses(
        (status = 200, description = "Updated file", body = FileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_visibility(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<i64>,
    Json(req): Json<VisibilityRequest>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let file = state
        .drive()
        .set_visibility(user.id, file_id, req.is_public)
        .await?;
    Ok(Json(ApiResponse::new(FileResponse::from_metadata(
        file,
        state.public_url(),
    ))))
}

/// POST /api/v1/files/{id}/toggle-visibility - Flip public/private.
#[utoipa::path(
    post,
    path = "/api/v1/files/{id}/toggle-visibility",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "Updated file", body = FileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn toggle_visibility(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let file = state.drive().toggle_visibility(user.id, file_id).await?;
    Ok(Json(ApiResponse::new(FileResponse::from_metadata(
        file,
        state.public_url(),
    ))))
}

/// POST /api/v1/files/{id}/share - Create or return the share link.
#[utoipa::path(
    post,
    path = "/api/v1/files/{id}/share",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "Share link", body = ShareResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn share_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<ShareResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let file = state.drive().share(user.id, file_id).await?;

    let share_token = file.share_token.ok_or_else(|| {
        tracing::error!("File {} has no share token after sharing", file.id);
        ApiError::internal("Failed to share file")
    })?;

    Ok(Json(ApiResponse::new(ShareResponse {
        file_id: file.id,
        share_url: share_url(state.public_url(), &share_token),
        share_token,
    })))
}

/// DELETE /api/v1/files/{id}/share - Revoke the share link.
#[utoipa::path(
    delete,
    path = "/api/v1/files/{id}/share",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "Updated file", body = FileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn unshare_file(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let file = state.drive().unshare(user.id, file_id).await?;
    Ok(Json(ApiResponse::new(FileResponse::from_metadata(
        file,
        state.public_url(),
    ))))
}
