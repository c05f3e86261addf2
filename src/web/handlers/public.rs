//! Unauthenticated file access.

use axum::{
    extract::{Path, State},
    response::Response,
};
use std::sync::Arc;

use crate::web::error::ApiError;
use crate::web::handlers::file::serve_file;
use crate::web::handlers::AppState;

/// GET /api/v1/public/{id} - Download a public file.
#[utoipa::path(
    get,
    path = "/api/v1/public/{id}",
    tag = "public",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "No public file with this ID")
    )
)]
pub async fn public_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
) -> Result<Response, ApiError> {
    let file = state.drive().public_file(file_id).await?;
    serve_file(&state, file, false).await
}

/// GET /api/v1/shared/{token} - Download a file through its share link.
#[utoipa::path(
    get,
    path = "/api/v1/shared/{token}",
    tag = "public",
    params(("token" = String, Path, description = "Share token")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown share token")
    )
)]
pub async fn shared_file(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let file = state.drive().shared_file(&token).await?;
    serve_file(&state, file, false).await
}
