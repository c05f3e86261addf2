//! Admin handlers for Web API.
//!
//! Admins are the users whose Telegram IDs are listed in `admin.telegram_ids`.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::db::{UserRepository, UserUpdate};
use crate::web::dto::{
    AdminUserResponse, ApiResponse, PaginatedResponse, RecalculateResponse, SkipLimitQuery,
    UpdateQuotaRequest, UserResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// Largest page of users an admin can request.
const MAX_USER_PAGE: i64 = 1000;

/// GET /api/v1/admin/users - List users with their drive statistics.
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    tag = "admin",
    params(SkipLimitQuery),
    responses(
        (status = 200, description = "Users ordered by ID", body = Vec<AdminUserResponse>),
        (status = 400, description = "Invalid skip or limit"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<SkipLimitQuery>,
) -> Result<Json<PaginatedResponse<AdminUserResponse>>, ApiError> {
    state.require_admin(&claims).await?;

    if query.skip < 0 {
        return Err(ApiError::bad_request("skip must not be negative"));
    }
    if !(1..=MAX_USER_PAGE).contains(&query.limit) {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_USER_PAGE}"
        )));
    }

    let repo = UserRepository::new(state.db.pool());
    let users = repo.list(query.skip, query.limit).await?;
    let total = repo.count().await?;

    let drive = state.drive();
    let mut responses = Vec::with_capacity(users.len());
    for user in users {
        let stats = drive.stats(user.id).await?;
        responses.push(AdminUserResponse {
            user: user.into(),
            total_files: stats.total_files,
            total_folders: stats.total_folders,
            usage_percent: stats.usage_percent,
        });
    }

    Ok(Json(PaginatedResponse::new(
        responses,
        query.skip,
        query.limit,
        total,
    )))
}

/// PUT /api/v1/admin/users/{id}/quota - Set a user's quota.
#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/quota",
    tag = "admin",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateQuotaRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Negative quota"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_quota(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(user_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateQuotaRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let admin = state.require_admin(&claims).await?;

    let quota = req
        .quota_mb
        .checked_mul(1024 * 1024)
        .ok_or_else(|| ApiError::bad_request("Quota is too large"))?;

    let user = UserRepository::new(state.db.pool())
        .update(user_id, &UserUpdate::new().quota(quota))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(
        "Admin {} set quota of user {} to {} MB",
        admin.id,
        user_id,
        req.quota_mb
    );
    Ok(Json(ApiResponse::new(user.into())))
}

/// POST /api/v1/admin/users/{id}/recalculate - Recompute used space from files.
#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/recalculate",
    tag = "admin",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "New used space", body = RecalculateResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn recalculate_usage(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResponse<RecalculateResponse>>, ApiError> {
    state.require_admin(&claims).await?;

    let used_space = UserRepository::new(state.db.pool())
        .recalculate_used_space(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::new(RecalculateResponse {
        user_id,
        used_space,
    })))
}
