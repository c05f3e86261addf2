//! Error types for NIDrive.

use thiserror::Error;

/// Common error type for NIDrive.
#[derive(Error, Debug)]
pub enum NidriveError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Permission denied error.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The owner's storage quota cannot hold the upload.
    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// A single upload is larger than the configured limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Telegram Bot API error.
    #[error("telegram error: {0}")]
    Telegram(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for NidriveError {
    fn from(e: sqlx::Error) -> Self {
        NidriveError::Database(e.to_string())
    }
}

/// Result type alias for NIDrive operations.
pub type Result<T> = std::result::Result<T, NidriveError>;
