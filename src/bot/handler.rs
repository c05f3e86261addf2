//! Bot conversation logic.
//!
//! Everything here works on the database and blob storage directly and
//! returns the text to show, so it can be tested without Telegram.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::bind_code;
use crate::datetime::format_datetime;
use crate::db::{TelegramProfile, User, UserRepository};
use crate::file::{
    share_url, DriveService, FileMetadata, FileRepository, FileStorage, FolderRepository,
    FolderScope, UploadRequest,
};
use crate::{Config, Database, NidriveError, Result};

use super::api::{IncomingFile, InlineKeyboardButton, InlineKeyboardMarkup, TelegramUser};
use super::command::{BotCommand, CallbackAction, FolderTarget};
use super::format::{escape_html, format_size, progress_bar, top_extensions, truncate};

/// Files shown per page of a folder.
pub const FILES_PER_PAGE: usize = 5;

/// Extensions listed in the stats message.
const TOP_EXTENSIONS: usize = 5;

/// Characters of a filename shown on a button.
const BUTTON_NAME_CHARS: usize = 20;

const ROOT_LABEL: &str = "Root";

/// Upload time shown in file details.
const UPLOADED_FORMAT: &str = "%Y-%m-%d %H:%M";

const NO_SPACE: &str = "Not enough storage space. Delete some files and try again.";

/// A message to send, or the new content of an edited message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// HTML text.
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Outcome of a button press.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackReply {
    /// Toast shown by `answerCallbackQuery`.
    pub notice: Option<String>,
    /// Show the notice as an alert.
    pub alert: bool,
    /// New content for the message holding the button.
    pub edit: Option<Reply>,
}

impl CallbackReply {
    fn edit(reply: Reply) -> Self {
        Self {
            edit: Some(reply),
            ..Default::default()
        }
    }

    fn notice(text: impl Into<String>) -> Self {
        Self {
            notice: Some(text.into()),
            ..Default::default()
        }
    }

    /// An alert for a failed action.
    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            notice: Some(text.into()),
            alert: true,
            edit: None,
        }
    }
}

/// User-facing text for an error.
pub fn error_text(error: &NidriveError) -> String {
    match error {
        NidriveError::Validation(msg) => format!("❌ {msg}"),
        NidriveError::NotFound(what) => format!("❌ The {what} was not found."),
        NidriveError::Permission(_) | NidriveError::Auth(_) => "❌ Access denied.".to_string(),
        NidriveError::QuotaExceeded(_) => format!("❌ {NO_SPACE}"),
        NidriveError::PayloadTooLarge(_) => "❌ The file is too large.".to_string(),
        _ => "❌ Something went wrong. Please try again later.".to_string(),
    }
}

/// Folder name from a `folder:<name>` caption.
pub fn folder_from_caption(caption: &str) -> Option<&str> {
    caption
        .trim()
        .strip_prefix("folder:")
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

fn telegram_profile(from: &TelegramUser) -> TelegramProfile {
    let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
    TelegramProfile {
        telegram_id: from.id,
        username: non_empty(&from.username),
        first_name: non_empty(&from.first_name),
        last_name: non_empty(&from.last_name),
        photo_url: None,
    }
}

fn back_to_files() -> InlineKeyboardButton {
    InlineKeyboardButton::callback("📂 My files", CallbackAction::ListFiles)
}

/// Handles commands, button presses and uploads for bot users.
#[derive(Clone)]
pub struct BotHandler {
    db: Arc<Database>,
    storage: FileStorage,
    config: Arc<Config>,
}

impl BotHandler {
    pub fn new(db: Arc<Database>, storage: FileStorage, config: Arc<Config>) -> Self {
        Self {
            db,
            storage,
            config,
        }
    }

    /// Upload size limit in bytes.
    pub fn max_file_size(&self) -> i64 {
        self.config.storage.max_file_size_bytes()
    }

    fn drive(&self) -> DriveService<'_> {
        DriveService::new(self.db.pool(), &self.storage)
            .with_max_file_size(self.max_file_size())
    }

    /// Create or refresh the user behind a Telegram account.
    pub async fn ensure_user(&self, from: &TelegramUser) -> Result<User> {
        let user = UserRepository::new(self.db.pool())
            .upsert_from_telegram(
                &telegram_profile(from),
                self.config.storage.default_quota_bytes(),
            )
            .await?;

        if !user.is_active {
            return Err(NidriveError::Permission("account is disabled".to_string()));
        }
        Ok(user)
    }

    /// Answer a slash command. The replies are sent in order.
    pub async fn handle_command(
        &self,
        from: &TelegramUser,
        command: BotCommand,
    ) -> Result<Vec<Reply>> {
        let user = self.ensure_user(from).await?;
        debug!("Bot command {:?} from user {}", command, user.id);

        let replies = match command {
            BotCommand::Start(code) => {
                let mut replies = Vec::with_capacity(2);
                if let Some(code) = code {
                    replies.push(self.bind_login_code(from, &code).await?);
                }
                replies.push(self.welcome(&user));
                replies
            }
            BotCommand::Help => vec![self.help()],
            BotCommand::Files => vec![self.folder_list(&user).await?],
            BotCommand::Stats => vec![self.stats(&user).await?],
            BotCommand::Link(name) => vec![self.link_by_name(&user, &name).await?],
            BotCommand::Unknown(_) => vec![Reply::text(
                "Unknown command. Use /help to see what I can do.",
            )],
        };
        Ok(replies)
    }

    /// Answer a button press.
    pub async fn handle_callback(&self, from: &TelegramUser, data: &str) -> Result<CallbackReply> {
        let user = self.ensure_user(from).await?;
        let action = CallbackAction::parse(data);
        debug!("Bot callback {:?} from user {}", action, user.id);

        let reply = match action {
            CallbackAction::ListFiles => CallbackReply::edit(self.folder_list(&user).await?),
            CallbackAction::Stats => CallbackReply::edit(self.stats(&user).await?),
            CallbackAction::Folder(folder) => {
                CallbackReply::edit(self.folder_page(&user, folder, 0).await?)
            }
            CallbackAction::Page { page, folder } => {
                CallbackReply::edit(self.folder_page(&user, folder, page).await?)
            }
            CallbackAction::File(id) => CallbackReply::edit(self.file_details(&user, id).await?),
            CallbackAction::Link(id) => {
                let file = self.drive().share(user.id, id).await?;
                CallbackReply::edit(self.link_message(&file, CallbackAction::File(id)))
            }
            CallbackAction::Delete(id) => {
                let drive = self.drive();
                let file = drive.get_file(user.id, id).await?;
                drive.delete_file(user.id, id).await?;

                let folder = file.folder_id.map_or(FolderTarget::Root, FolderTarget::Folder);
                let mut reply = CallbackReply::edit(self.folder_page(&user, folder, 0).await?);
                reply.notice = Some("File deleted".to_string());
                reply
            }
            CallbackAction::Unknown(_) => CallbackReply::notice("Unknown command"),
        };
        Ok(reply)
    }

    /// Reject an upload of `size` bytes before downloading it.
    ///
    /// Returns the message to show, or None if the upload may proceed.
    pub fn check_upload(&self, user: &User, size: Option<u64>) -> Option<Reply> {
        let size = i64::try_from(size?).unwrap_or(i64::MAX);
        let max = self.max_file_size();

        if size > max {
            return Some(Reply::text(format!(
                "File is too large. Maximum size: {}.",
                format_size(max)
            )));
        }
        if size > user.free_space() {
            return Some(Reply::text(NO_SPACE));
        }
        None
    }

    /// Store a file received from Telegram.
    pub async fn store_upload(
        &self,
        user: &User,
        incoming: &IncomingFile,
        content: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<Reply> {
        let drive = self.drive();

        let folder = match caption.and_then(folder_from_caption) {
            Some(name) => Some(drive.top_level_folder(user.id, name).await?),
            None => None,
        };

        let mut request = UploadRequest::new(&incoming.filename, content)
            .with_folder(folder.as_ref().map(|f| f.id));
        if let Some(mime_type) = &incoming.mime_type {
            request = request.with_mime_type(mime_type);
        }
        let file = drive.upload(user.id, request).await?;

        info!("Stored bot upload {} for user {}", file.id, user.id);

        let folder_name = folder.map_or_else(|| ROOT_LABEL.to_string(), |f| f.name);
        let text = format!(
            "✅ File uploaded!\n\n📄 <b>{}</b>\n📦 Size: {}\n📁 Folder: {}",
            escape_html(&file.filename),
            format_size(file.size),
            escape_html(&folder_name)
        );
        let keyboard = InlineKeyboardMarkup::new()
            .row(vec![InlineKeyboardButton::callback(
                "🔗 Get link",
                CallbackAction::Link(file.id),
            )])
            .row(vec![back_to_files()]);

        Ok(Reply::text(text).with_keyboard(keyboard))
    }

    async fn bind_login_code(&self, from: &TelegramUser, code: &str) -> Result<Reply> {
        let result = bind_code(
            self.db.pool(),
            code,
            &telegram_profile(from),
            self.config.storage.default_quota_bytes(),
        )
        .await;

        match result {
            Ok(_) => Ok(Reply::text(
                "✅ Login successful! Your Telegram account is now linked to the NIDrive web app.\n\n\
                 You can return to your browser.",
            )),
            Err(NidriveError::Validation(_)) | Err(NidriveError::NotFound(_)) => Ok(Reply::text(
                "❌ This login code is invalid or expired.\n\nYou can still use the bot.",
            )),
            Err(e) => Err(e),
        }
    }

    fn welcome(&self, user: &User) -> Reply {
        let text = format!(
            "Hello, {}! 👋\n\n\
             Welcome to <b>NIDrive</b>, your personal file storage.\n\n\
             Send me any file and I will save it to your storage. \
             You can browse and manage your files here or in the web app.",
            escape_html(&user.display_name())
        );

        let mut keyboard = InlineKeyboardMarkup::new().row(vec![
            back_to_files(),
            InlineKeyboardButton::callback("📊 Stats", CallbackAction::Stats),
        ]);
        let web_app_url = self.config.telegram.web_app_url.trim();
        if !web_app_url.is_empty() {
            keyboard = keyboard.row(vec![InlineKeyboardButton::url(
                "🌐 Open web app",
                web_app_url,
            )]);
        }

        Reply::text(text).with_keyboard(keyboard)
    }

    fn help(&self) -> Reply {
        Reply::text(format!(
            "Here is what I can do:\n\n\
             📤 Send me any file and I will save it to your storage.\n\
             Add the caption <code>folder:Name</code> to put it in a folder.\n\
             📂 /files - browse your files\n\
             📊 /stats - check your storage usage\n\
             🔗 /link &lt;name&gt; - get a link to a file\n\
             ❓ /help - show this message\n\n\
             You have up to {} of storage.",
            format_size(self.config.storage.default_quota_bytes())
        ))
    }

    async fn folder_list(&self, user: &User) -> Result<Reply> {
        let pool = self.db.pool();
        let folders = self.drive().list_folders(user.id, None).await?;
        let files = FileRepository::new(pool);
        let total_files = files.count(user.id, FolderScope::All).await?;

        if folders.is_empty() && total_files == 0 {
            return Ok(Reply::text(
                "You have no files yet. Send me a file to upload it.",
            ));
        }

        let root_count = files.count(user.id, FolderScope::Root).await?;
        let mut keyboard = InlineKeyboardMarkup::new().row(vec![InlineKeyboardButton::callback(
            format!("📁 {ROOT_LABEL} ({root_count} files)"),
            CallbackAction::Folder(FolderTarget::Root),
        )]);

        let folder_repo = FolderRepository::new(pool);
        for folder in folders {
            let count = folder_repo.count_files(folder.id).await?;
            keyboard = keyboard.row(vec![InlineKeyboardButton::callback(
                format!("📁 {} ({count} files)", folder.name),
                CallbackAction::Folder(FolderTarget::Folder(folder.id)),
            )]);
        }

        Ok(Reply::text("Choose a folder to view its files:").with_keyboard(keyboard))
    }

    /// One page of a folder. Out-of-range pages are clamped.
    async fn folder_page(&self, user: &User, target: FolderTarget, page: usize) -> Result<Reply> {
        let drive = self.drive();
        let (name, scope) = match target {
            FolderTarget::Root => (ROOT_LABEL.to_string(), FolderScope::Root),
            FolderTarget::Folder(id) => {
                let folder = drive.get_folder(user.id, id).await?;
                (folder.name, FolderScope::Folder(id))
            }
        };
        let files = drive.list_files(user.id, scope).await?;

        if files.is_empty() {
            let text = format!("📁 <b>{}</b>\n\nThis folder is empty.", escape_html(&name));
            let keyboard = InlineKeyboardMarkup::new().row(vec![back_to_folders()]);
            return Ok(Reply::text(text).with_keyboard(keyboard));
        }

        let total_pages = files.len().div_ceil(FILES_PER_PAGE);
        let page = page.min(total_pages - 1);
        let start = page * FILES_PER_PAGE;
        let current = &files[start..files.len().min(start + FILES_PER_PAGE)];

        let mut text = format!("📁 <b>{}</b> ({} files):\n\n", escape_html(&name), files.len());
        for (i, file) in current.iter().enumerate() {
            text.push_str(&format!(
                "{}. {} ({})\n",
                start + i + 1,
                escape_html(&file.filename),
                format_size(file.size)
            ));
        }
        if total_pages > 1 {
            text.push_str(&format!("\nPage {} of {}", page + 1, total_pages));
        }

        let mut keyboard = InlineKeyboardMarkup::new();
        for (i, file) in current.iter().enumerate() {
            keyboard = keyboard.row(vec![InlineKeyboardButton::callback(
                format!("{}. {}", start + i + 1, truncate(&file.filename, BUTTON_NAME_CHARS)),
                CallbackAction::File(file.id),
            )]);
        }

        let mut navigation = Vec::with_capacity(3);
        if page > 0 {
            navigation.push(InlineKeyboardButton::callback(
                "⬅️ Back",
                CallbackAction::Page {
                    page: page - 1,
                    folder: target,
                },
            ));
        }
        navigation.push(back_to_folders());
        if page + 1 < total_pages {
            navigation.push(InlineKeyboardButton::callback(
                "➡️ Next",
                CallbackAction::Page {
                    page: page + 1,
                    folder: target,
                },
            ));
        }
        keyboard = keyboard.row(navigation);

        Ok(Reply::text(text).with_keyboard(keyboard))
    }

    async fn file_details(&self, user: &User, file_id: i64) -> Result<Reply> {
        let drive = self.drive();
        let file = drive.get_file(user.id, file_id).await?;

        let (folder_name, target) = match file.folder_id {
            Some(id) => {
                let name = drive.get_folder(user.id, id).await?.name;
                (name, FolderTarget::Folder(id))
            }
            None => (ROOT_LABEL.to_string(), FolderTarget::Root),
        };

        let text = format!(
            "📄 <b>{}</b>\n\n📦 Size: {}\n📅 Uploaded: {}\n📁 Folder: {}\n",
            escape_html(&file.filename),
            format_size(file.size),
            format_datetime(
                &file.created_at,
                &self.config.server.timezone,
                UPLOADED_FORMAT
            ),
            escape_html(&folder_name)
        );
        let keyboard = InlineKeyboardMarkup::new()
            .row(vec![
                InlineKeyboardButton::callback("🔗 Get link", CallbackAction::Link(file.id)),
                InlineKeyboardButton::callback("🗑️ Delete", CallbackAction::Delete(file.id)),
            ])
            .row(vec![InlineKeyboardButton::callback(
                "🔙 Back",
                CallbackAction::Folder(target),
            )]);

        Ok(Reply::text(text).with_keyboard(keyboard))
    }

    fn link_message(&self, file: &FileMetadata, back: CallbackAction) -> Reply {
        let url = file
            .share_token
            .as_deref()
            .map(|token| share_url(&self.config.storage.public_url, token))
            .unwrap_or_default();

        let text = format!(
            "🔗 <b>Link to file:</b>\n{}\n\n<code>{}</code>",
            escape_html(&file.filename),
            escape_html(&url)
        );
        let keyboard =
            InlineKeyboardMarkup::new().row(vec![InlineKeyboardButton::callback("🔙 Back", back)]);
        Reply::text(text).with_keyboard(keyboard)
    }

    async fn link_by_name(&self, user: &User, name: &str) -> Result<Reply> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Reply::text("Usage: /link &lt;file name&gt;"));
        }

        let drive = self.drive();
        let file = match drive.find_file_by_name(user.id, name).await {
            Ok(file) => file,
            Err(NidriveError::NotFound(_)) => {
                return Ok(Reply::text(format!(
                    "No file matching \"{}\" was found.",
                    escape_html(name)
                )));
            }
            Err(e) => return Err(e),
        };

        let file = drive.share(user.id, file.id).await?;
        Ok(self.link_message(&file, CallbackAction::File(file.id)))
    }

    async fn stats(&self, user: &User) -> Result<Reply> {
        let drive = self.drive();
        let stats = drive.stats(user.id).await?;
        let files = drive.list_files(user.id, FolderScope::All).await?;

        let mut text = format!(
            "📊 <b>Storage statistics</b>\n\n\
             💾 Used: {} of {}\n\
             📈 Filled: {:.1}%\n\
             {}\n\n\
             📑 Total files: {}\n",
            format_size(stats.used_space),
            format_size(stats.quota),
            stats.usage_percent,
            progress_bar(stats.usage_percent),
            stats.total_files
        );

        let extensions = top_extensions(files.iter().map(|f| f.filename.as_str()), TOP_EXTENSIONS);
        if !extensions.is_empty() {
            text.push_str("\n<b>File types:</b>\n");
            for (ext, count) in extensions {
                text.push_str(&format!("- .{}: {count} files\n", escape_html(&ext)));
            }
        }

        let keyboard = InlineKeyboardMarkup::new().row(vec![back_to_files()]);
        Ok(Reply::text(text).with_keyboard(keyboard))
    }
}

fn back_to_folders() -> InlineKeyboardButton {
    InlineKeyboardButton::callback("🔙 Folders", CallbackAction::ListFiles)
}
