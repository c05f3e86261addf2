//! User handlers for Web API.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::db::{UserRepository, UserUpdate};
use crate::web::dto::{
    ApiResponse, StatsResponse, StorageUsageResponse, UpdateMeRequest, UserResponse,
    ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET /api/v1/users/me - Current user profile.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    Ok(Json(ApiResponse::new(user.into())))
}

/// PUT /api/v1/users/me - Update the current user's profile.
#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    tag = "users",
    request_body = UpdateMeRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateMeRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;

    let mut update = UserUpdate::new();
    if let Some(username) = req.username {
        update = update.username(Some(username));
    }
    if let Some(first_name) = req.first_name {
        update = update.first_name(Some(first_name));
    }
    if let Some(last_name) = req.last_name {
        update = update.last_name(Some(last_name));
    }
    if let Some(photo_url) = req.photo_url {
        update = update.photo_url(Some(photo_url));
    }
    if update.is_empty() {
        return Ok(Json(ApiResponse::new(user.into())));
    }

    let updated = UserRepository::new(state.db.pool())
        .update(user.id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::new(updated.into())))
}

/// GET /api/v1/users/me/stats - Drive statistics.
#[utoipa::path(
    get,
    path = "/api/v1/users/me/stats",
    tag = "users",
    responses(
        (status = 200, description = "Drive statistics", body = StatsResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<StatsResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    let stats = state.drive().stats(user.id).await?;
    Ok(Json(ApiResponse::new(stats.into())))
}

/// GET /api/v1/storage/usage - Used and total storage.
#[utoipa::path(
    get,
    path = "/api/v1/storage/usage",
    tag = "users",
    responses(
        (status = 200, description = "Storage usage", body = StorageUsageResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn storage_usage(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<StorageUsageResponse>>, ApiError> {
    let user = state.current_user(&claims).await?;
    Ok(Json(ApiResponse::new(StorageUsageResponse::from(&user))))
}
