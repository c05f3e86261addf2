//! API handlers.

pub mod admin;
pub mod auth;
pub mod file;
pub mod folder;
pub mod public;
pub mod user;

pub use auth::AppState;
