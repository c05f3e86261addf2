//! Authentication handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::auth::{self, CodeStatus, TelegramLoginData};
use crate::db::{User, UserRepository};
use crate::file::{DriveService, FileStorage};
use crate::web::dto::{
    ApiResponse, CheckCodeQuery, CodeStatusResponse, LoginResponse, RegisterCodeRequest,
    RegisterCodeResponse, TelegramLoginRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::{JwtClaims, JwtState};
use crate::{Config, Database};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    /// Blob storage for uploaded files.
    pub storage: FileStorage,
    pub config: Arc<Config>,
    pub jwt_state: Arc<JwtState>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(db: Arc<Database>, storage: FileStorage, config: Arc<Config>) -> Self {
        let jwt_state = Arc::new(JwtState::new(&config.web.jwt_secret));
        Self {
            db,
            storage,
            config,
            jwt_state,
        }
    }

    /// Drive service bound to this state's pool and storage.
    pub fn drive(&self) -> DriveService<'_> {
        DriveService::new(self.db.pool(), &self.storage)
            .with_max_file_size(self.config.storage.max_file_size_bytes())
    }

    /// Base URL used for public and share links.
    pub fn public_url(&self) -> &str {
        &self.config.storage.public_url
    }

    /// Issue an access token for a user.
    pub fn login_response(&self, user: User) -> Result<LoginResponse, ApiError> {
        let expires_in = self.config.web.jwt_access_token_expiry_secs;
        let claims = JwtClaims::new(user.id, user.telegram_id, expires_in);
        let access_token = self.jwt_state.issue(&claims)?;

        Ok(LoginResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in,
            user: user.into(),
        })
    }

    /// Load the user behind a token.
    ///
    /// Tokens of deleted or disabled accounts are rejected.
    pub async fn current_user(&self, claims: &JwtClaims) -> Result<User, ApiError> {
        let user = UserRepository::new(self.db.pool())
            .get_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("User not found"))?;

        if !user.is_active {
            return Err(ApiError::unauthorized("Account is disabled"));
        }
        Ok(user)
    }

    /// User ID of an optional viewer.
    ///
    /// A token of a deleted or disabled account is rejected like on any
    /// authenticated route instead of being treated as anonymous.
    pub async fn viewer_id(&self, claims: Option<&JwtClaims>) -> Result<Option<i64>, ApiError> {
        match claims {
            Some(claims) => Ok(Some(self.current_user(claims).await?.id)),
            None => Ok(None),
        }
    }

    /// Load the user behind a token and require admin rights.
    pub async fn require_admin(&self, claims: &JwtClaims) -> Result<User, ApiError> {
        let user = self.current_user(claims).await?;
        if !self.config.is_admin(user.telegram_id) {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(user)
    }
}

/// POST /api/v1/auth/telegram-login - Log in with Telegram Login Widget data.
#[utoipa::path(
    post,
    path = "/api/v1/auth/telegram-login",
    tag = "auth",
    request_body = TelegramLoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid or outdated widget data"),
        (status = 403, description = "Account is disabled"),
        (status = 429, description = "Too many login attempts")
    )
)]
pub async fn telegram_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TelegramLoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let data: TelegramLoginData = req.into();
    let config = &state.config;

    let user = auth::login_with_widget(
        state.db.pool(),
        &data,
        &config.telegram.bot_token,
        i64::try_from(config.telegram.auth_max_age_secs).unwrap_or(i64::MAX),
        config.storage.default_quota_bytes(),
    )
    .await?;

    Ok(Json(ApiResponse::new(state.login_response(user)?)))
}

/// POST /api/v1/auth/register-code - Register a code for bot login.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register-code",
    tag = "auth",
    request_body = RegisterCodeRequest,
    responses(
        (status = 201, description = "Code registered", body = RegisterCodeResponse),
        (status = 400, description = "Invalid code")
    )
)]
pub async fn register_code(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterCodeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegisterCodeResponse>>), ApiError> {
    let code = auth::register_code(state.db.pool(), &req.code, state.config.auth.code_ttl_secs)
        .await?;

    let response = RegisterCodeResponse {
        code: code.code,
        expires_at: crate::datetime::to_rfc3339(&code.expires_at),
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::new(response))))
}

/// GET /api/v1/auth/check-code - Poll a bot login code.
#[utoipa::path(
    get,
    path = "/api/v1/auth/check-code",
    tag = "auth",
    params(CheckCodeQuery),
    responses(
        (status = 200, description = "Pending or authorized", body = CodeStatusResponse),
        (status = 404, description = "Unknown, expired or already used code")
    )
)]
pub async fn check_code(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CheckCodeQuery>,
) -> Result<Json<ApiResponse<CodeStatusResponse>>, ApiError> {
    let response = match auth::check_code(state.db.pool(), &query.code).await? {
        CodeStatus::Pending => CodeStatusResponse::pending(),
        CodeStatus::Authorized(user) => {
            CodeStatusResponse::authorized(state.login_response(user)?)
        }
    };

    Ok(Json(ApiResponse::new(response)))
}

