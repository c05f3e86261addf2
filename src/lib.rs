//! NIDrive - personal cloud storage with Telegram login.
//!
//! Users sign in with their Telegram account, upload files into a folder
//! hierarchy, share them by link and manage everything either through the
//! HTTP API or the companion Telegram bot.

pub mod auth;
pub mod bot;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod web;

pub use auth::{
    bind_code, check_code, login_with_widget, register_code, sign_login_data,
    verify_telegram_login, CodeStatus, TelegramLoginData,
};
pub use bot::TelegramBot;
pub use config::Config;
pub use db::{Database, TelegramProfile, User, UserRepository, UserUpdate};
pub use error::{NidriveError, Result};
pub use file::{DriveService, FileMetadata, FileStorage, Folder, UploadRequest};
pub use web::WebServer;
