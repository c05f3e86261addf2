//! HTTP API for NIDrive.
//!
//! JSON endpoints under `/api/v1` for the web app, plus public and shared
//! download links, a health check and Swagger UI.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
