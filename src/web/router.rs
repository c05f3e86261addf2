//! Router configuration for Web API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{admin, auth, file, folder, public, user, AppState};
use super::middleware::{
    api_rate_limit, create_cors_layer, jwt_auth, login_rate_limit, security_headers,
    RateLimitState,
};
use super::openapi::ApiDoc;

/// Room for multipart framing on top of the largest allowed file.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Create the `/api/v1` router.
pub fn create_router(app_state: Arc<AppState>, rate_limit: Arc<RateLimitState>) -> Router {
    let login_limiter = rate_limit.clone();
    let auth_routes = Router::new()
        .route("/telegram-login", post(auth::telegram_login))
        .route("/register-code", post(auth::register_code))
        .route("/check-code", get(auth::check_code))
        .layer(middleware::from_fn(move |req, next| {
            login_rate_limit(login_limiter.clone(), req, next)
        }));

    let user_routes = Router::new()
        .route("/me", get(user::get_me).put(user::update_me))
        .route("/me/stats", get(user::get_stats));

    let file_routes = Router::new()
        .route("/", post(file::upload_file).get(file::list_files))
        .route("/recent", get(file::recent_files))
        .route("/search", get(file::search_files))
        .route("/popular", get(file::popular_files))
        .route(
            "/:id",
            get(file::get_file)
                .put(file::update_file)
                .delete(file::delete_file),
        )
        .route("/:id/download", get(file::download_file))
        .route("/:id/preview", get(file::preview_file))
        .route("/:id/visibility", patch(file::set_visibility))
        .route("/:id/toggle-visibility", post(file::toggle_visibility))
        .route(
            "/:id/share",
            post(file::share_file).delete(file::unshare_file),
        );

    let folder_routes = Router::new()
        .route("/", post(folder::create_folder).get(folder::list_folders))
        .route("/tree", get(folder::folder_tree))
        .route("/recent", get(folder::recent_folders))
        .route(
            "/:id",
            get(folder::get_folder)
                .put(folder::update_folder)
                .delete(folder::delete_folder),
        );

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/:id/quota", put(admin::update_quota))
        .route("/users/:id/recalculate", post(admin::recalculate_usage));

    let api_limiter = rate_limit;
    let api_routes = Router::new()
        .nest("/users", user_routes)
        .route("/storage/usage", get(user::storage_usage))
        .nest("/files", file_routes)
        .nest("/folders", folder_routes)
        .route("/public/:id", get(public::public_file))
        .route("/shared/:token", get(public::shared_file))
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn(move |req, next| {
            api_rate_limit(api_limiter.clone(), req, next)
        }))
        .nest("/auth", auth_routes);

    let body_limit = usize::try_from(app_state.config.storage.max_file_size_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    let jwt_state = app_state.jwt_state.clone();
    let cors_origins = app_state.config.web.cors_origins.clone();

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(middleware::from_fn(move |req, next| {
                    jwt_auth(jwt_state.clone(), req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Swagger UI at `/swagger-ui`, document at `/api-docs/openapi.json`.
pub fn create_swagger_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

/// Serve the web app from `static_path`, falling back to its `index.html`.
///
/// Returns None if the directory does not exist.
pub fn create_static_router(static_path: &str) -> Option<Router> {
    let dir = Path::new(static_path);
    if !dir.is_dir() {
        tracing::warn!("Static path {} not found, not serving the web app", static_path);
        return None;
    }

    let serve = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
    Some(Router::new().fallback_service(serve))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
