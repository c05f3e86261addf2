//! Companion Telegram bot for NIDrive.
//!
//! The bot runs inside the server process and talks to the database and
//! blob storage directly:
//! - `/start <code>` completes a web login started in the browser
//! - Files sent to the bot are stored in the sender's drive
//! - Inline keyboards browse folders, share and delete files

mod api;
mod command;
mod format;
mod handler;
mod runner;

pub use api::{
    Attachment, CallbackQuery, Chat, IncomingFile, InlineKeyboardButton, InlineKeyboardMarkup,
    Message, TelegramApi, TelegramFile, TelegramUser, Update,
};
pub use command::{parse_command, BotCommand, CallbackAction, FolderTarget};
pub use format::{escape_html, format_size, progress_bar, top_extensions};
pub use handler::{error_text, folder_from_caption, BotHandler, CallbackReply, Reply, FILES_PER_PAGE};
pub use runner::TelegramBot;
