//! Per-client rate limiting.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

use crate::web::error::ApiError;

/// Rate limiter keyed by client IP.
pub type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Limiters for the login endpoints and for the rest of the API.
pub struct RateLimitState {
    login: KeyedLimiter,
    api: KeyedLimiter,
}

impl RateLimitState {
    /// Create limiters allowing the given number of requests per minute.
    ///
    /// A limit of 0 is treated as 1.
    pub fn new(login_per_minute: u32, api_per_minute: u32) -> Self {
        let quota = |n: u32| Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN));
        Self {
            login: RateLimiter::keyed(quota(login_per_minute)),
            api: RateLimiter::keyed(quota(api_per_minute)),
        }
    }

    /// Check if a login request from `ip` is allowed.
    pub fn check_login(&self, ip: &str) -> bool {
        self.login.check_key(&ip.to_string()).is_ok()
    }

    /// Check if an API request from `ip` is allowed.
    pub fn check_api(&self, ip: &str) -> bool {
        self.api.check_key(&ip.to_string()).is_ok()
    }

    /// Drop state of clients whose quota has fully replenished.
    pub fn cleanup(&self) {
        self.login.retain_recent();
        self.api.retain_recent();
    }

    /// Periodically clean up limiter state.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                self.cleanup();
            }
        });
    }
}

/// Client IP, honoring reverse proxy headers.
fn client_ip(req: &Request<Body>) -> String {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    };

    if let Some(first) = header("X-Forwarded-For")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
    {
        return first;
    }
    if let Some(real_ip) = header("X-Real-IP").filter(|ip| !ip.is_empty()) {
        return real_ip;
    }
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    "unknown".to_string()
}

/// Rate limiting middleware for the login endpoints.
pub async fn login_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req);

    if !state.check_login(&ip) {
        tracing::warn!(ip = %ip, "Login rate limit exceeded");
        return ApiError::too_many_requests("Too many login attempts. Please try again later.")
            .into_response();
    }

    next.run(req).await
}

/// Rate limiting middleware for the API.
pub async fn api_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req);

    if !state.check_api(&ip) {
        tracing::warn!(ip = %ip, "API rate limit exceeded");
        return ApiError::too_many_requests("Too many requests. Please try again later.")
            .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_limit_is_per_ip() {
        let state = RateLimitState::new(2, 100);

        assert!(state.check_login("10.0.0.1"));
        assert!(state.check_login("10.0.0.1"));
        assert!(!state.check_login("10.0.0.1"));

        assert!(state.check_login("10.0.0.2"));
    }

    #[test]
    fn test_api_limit_independent_of_login() {
        let state = RateLimitState::new(1, 3);

        assert!(state.check_login("10.0.0.1"));
        assert!(!state.check_login("10.0.0.1"));

        for _ in 0..3 {
            assert!(state.check_api("10.0.0.1"));
        }
        assert!(!state.check_api("10.0.0.1"));
    }

    #[test]
    fn test_zero_limit_allows_one() {
        let state = RateLimitState::new(0, 0);
        assert!(state.check_api("10.0.0.1"));
        assert!(!state.check_api("10.0.0.1"));
    }

    #[test]
    fn test_client_ip_sources() {
        let req = Request::builder()
            .header("X-Forwarded-For", "203.0.113.5, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.5");

        let req = Request::builder()
            .header("X-Real-IP", "198.51.100.7")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "198.51.100.7");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), "unknown");
    }
}
