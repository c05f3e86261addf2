//! Authentication module for NIDrive.
//!
//! Users never have passwords. They prove their identity either with the
//! Telegram Login Widget or by opening the bot with a one-time code.

mod code;
mod telegram;

pub use code::{
    bind_code, check_code, register_code, validate_code, CodeStatus, DEFAULT_CODE_TTL_SECS,
    MAX_CODE_LENGTH, MIN_CODE_LENGTH,
};
pub use telegram::{
    login_with_widget, sign_login_data, verify_telegram_login, TelegramLoginData,
    DEFAULT_AUTH_MAX_AGE_SECS,
};
