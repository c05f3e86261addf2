//! Web server for NIDrive.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::db::AuthCodeRepository;
use crate::file::FileStorage;
use crate::{Config, Database, NidriveError, Result};

use super::handlers::AppState;
use super::middleware::RateLimitState;
use super::router::{
    create_health_router, create_router, create_static_router, create_swagger_router,
};

/// Interval of the background cleanup task.
const CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Web server for the API.
pub struct WebServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
    rate_limit: Arc<RateLimitState>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: Arc<Config>, db: Arc<Database>, storage: FileStorage) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port)
            .parse()
            .map_err(|e| NidriveError::Config(format!("invalid web server address: {e}")))?;

        let rate_limit = Arc::new(RateLimitState::new(
            config.web.login_rate_limit,
            config.web.api_rate_limit,
        ));
        let app_state = Arc::new(AppState::new(db, storage, config));

        Ok(Self {
            addr,
            app_state,
            rate_limit,
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build the complete application router.
    pub fn router(&self) -> Router {
        let web_config = &self.app_state.config.web;

        let mut router = create_router(self.app_state.clone(), self.rate_limit.clone())
            .merge(create_health_router())
            .merge(create_swagger_router());

        if web_config.serve_static {
            if let Some(static_router) = create_static_router(&web_config.static_path) {
                router = router.merge(static_router);
            }
        }

        router.layer(CompressionLayer::new())
    }

    /// Start the periodic cleanup task.
    ///
    /// Removes expired and used login codes, empty blob shard directories
    /// and idle rate-limit state.
    fn start_cleanup_task(app_state: Arc<AppState>, rate_limit: Arc<RateLimitState>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));
            interval.tick().await;

            loop {
                interval.tick().await;

                match AuthCodeRepository::new(app_state.db.pool()).cleanup().await {
                    Ok(0) => tracing::debug!("No login codes to clean up"),
                    Ok(count) => {
                        tracing::info!(deleted_count = count, "Cleaned up expired login codes")
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to clean up login codes"),
                }

                match app_state.storage.cleanup_empty_dirs().await {
                    Ok(0) => {}
                    Ok(count) => {
                        tracing::debug!(removed = count, "Removed empty storage directories")
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to clean up storage directories"),
                }

                rate_limit.cleanup();
            }
        });
    }

    async fn bind(&self) -> Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        Ok((listener, local_addr))
    }

    /// Run the web server until Ctrl+C.
    pub async fn run(self) -> Result<()> {
        let (listener, local_addr) = self.bind().await?;
        let router = self.router();

        Self::start_cleanup_task(self.app_state.clone(), self.rate_limit.clone());
        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }

    /// Run the server in the background and return the bound address.
    ///
    /// Binding to port 0 picks a free port.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let (listener, local_addr) = self.bind().await?;
        let router = self.router();

        Self::start_cleanup_task(self.app_state.clone(), self.rate_limit.clone());
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.web.host = "127.0.0.1".to_string();
        config.web.port = 0;
        config.web.jwt_secret = "test-secret-key".to_string();
        config
    }

    async fn test_server(config: Config, temp_dir: &TempDir) -> WebServer {
        let db = Database::open_in_memory().await.unwrap();
        let storage = FileStorage::new(temp_dir.path()).unwrap();
        WebServer::new(Arc::new(config), Arc::new(db), storage).unwrap()
    }

    #[tokio::test]
    async fn test_web_server_new() {
        let temp_dir = TempDir::new().unwrap();
        let server = test_server(test_config(), &temp_dir).await;
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config();
        config.web.host = "not an address".to_string();

        let db = Database::open_in_memory().await.unwrap();
        let storage = FileStorage::new(temp_dir.path()).unwrap();
        let result = WebServer::new(Arc::new(config), Arc::new(db), storage);
        assert!(matches!(result, Err(NidriveError::Config(_))));
    }

    #[tokio::test]
    async fn test_web_server_run() {
        let temp_dir = TempDir::new().unwrap();
        let server = test_server(test_config(), &temp_dir).await;
        let addr = server.run_with_addr().await.unwrap();

        let client = reqwest::Client::new();
        let resp = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap();

        assert!(resp.status().is_success());
        assert_eq!(resp.text().await.unwrap(), "OK");

        let resp = client
            .get(format!("http://{}/api/v1/users/me", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 401);
    }
}
