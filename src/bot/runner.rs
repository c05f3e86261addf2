//! Long polling loop of the companion bot.

use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::db::User;
use crate::file::FileStorage;
use crate::{Config, Database, NidriveError, Result};

use super::api::{CallbackQuery, IncomingFile, Message, TelegramApi, Update};
use super::command::parse_command;
use super::handler::{error_text, BotHandler, CallbackReply, Reply};

/// Pause after a failed `getUpdates` call.
const RETRY_DELAY_SECS: u64 = 5;

/// The Telegram bot: polls for updates and answers them.
pub struct TelegramBot {
    api: TelegramApi,
    handler: BotHandler,
    poll_timeout_secs: u64,
}

impl TelegramBot {
    /// Create the bot from configuration.
    pub fn new(config: Arc<Config>, db: Arc<Database>, storage: FileStorage) -> Result<Self> {
        let telegram = &config.telegram;
        if telegram.bot_token.trim().is_empty() {
            return Err(NidriveError::Config(
                "telegram.bot_token is required to run the bot".to_string(),
            ));
        }

        let api = TelegramApi::new(
            &telegram.api_base_url,
            telegram.bot_token.trim(),
            telegram.poll_timeout_secs,
        )?;
        let poll_timeout_secs = telegram.poll_timeout_secs;

        Ok(Self {
            api,
            handler: BotHandler::new(db, storage, config),
            poll_timeout_secs,
        })
    }

    /// Poll for updates forever.
    ///
    /// A failed update is logged and skipped; a failed poll is retried
    /// after a short pause.
    pub async fn run(self) {
        info!(
            "Telegram bot started (long polling timeout: {} seconds)",
            self.poll_timeout_secs
        );

        let mut offset = 0;
        loop {
            let updates = match self.api.get_updates(offset, self.poll_timeout_secs).await {
                Ok(updates) => updates,
                Err(e) => {
                    error!("Failed to fetch Telegram updates: {}", e);
                    sleep(Duration::from_secs(RETRY_DELAY_SECS)).await;
                    continue;
                }
            };

            for update in updates {
                let update_id = update.update_id;
                offset = offset.max(update_id + 1);

                if let Err(e) = self.process_update(update).await {
                    warn!(update_id, error = %e, "Failed to handle Telegram update");
                }
            }
        }
    }

    async fn process_update(&self, update: Update) -> Result<()> {
        debug!("Processing Telegram update {}", update.update_id);

        if let Some(query) = update.callback_query {
            return self.process_callback(query).await;
        }
        if let Some(message) = update.message {
            return self.process_message(message).await;
        }
        Ok(())
    }

    async fn process_message(&self, message: Message) -> Result<()> {
        let chat_id = message.chat.id;
        let Some(from) = message.from.as_ref().filter(|u| !u.is_bot) else {
            return Ok(());
        };

        if let Some(file) = message.incoming_file() {
            return self.process_upload(&message, file).await;
        }

        let Some(command) = message.text.as_deref().and_then(parse_command) else {
            self.send(
                chat_id,
                &Reply::text("Send me a file to store it, or use /help to see what I can do."),
            )
            .await?;
            return Ok(());
        };

        match self.handler.handle_command(from, command).await {
            Ok(replies) => {
                for reply in &replies {
                    self.send(chat_id, reply).await?;
                }
            }
            Err(e) => {
                warn!("Bot command from {} failed: {}", from.id, e);
                self.send(chat_id, &Reply::text(error_text(&e))).await?;
            }
        }
        Ok(())
    }

    async fn process_upload(&self, message: &Message, file: IncomingFile) -> Result<()> {
        let chat_id = message.chat.id;
        let Some(from) = message.from.as_ref() else {
            return Ok(());
        };

        let user = match self.handler.ensure_user(from).await {
            Ok(user) => user,
            Err(e) => {
                self.send(chat_id, &Reply::text(error_text(&e))).await?;
                return Ok(());
            }
        };

        if let Some(rejection) = self.handler.check_upload(&user, file.size) {
            self.send(chat_id, &rejection).await?;
            return Ok(());
        }

        let status = self
            .send(
                chat_id,
                &Reply::text("⬇️ Downloading the file. This may take a while..."),
            )
            .await?;

        let result = self.download_and_store(&user, message, &file, status.message_id).await;
        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Bot upload of '{}' for user {} failed: {}", file.filename, user.id, e);
                Reply::text(format!("Upload failed. {}", error_text(&e)))
            }
        };

        self.api
            .edit_message_text(chat_id, status.message_id, &reply.text, reply.keyboard.as_ref())
            .await
    }

    async fn download_and_store(
        &self,
        user: &User,
        message: &Message,
        file: &IncomingFile,
        status_message_id: i64,
    ) -> Result<Reply> {
        let limit = user.free_space().min(self.handler.max_file_size());
        let max_size = u64::try_from(limit).unwrap_or(0);

        let telegram_file = self.api.get_file(&file.file_id).await?;
        let content = self.api.download_file(&telegram_file, max_size).await?;

        self.api
            .edit_message_text(
                message.chat.id,
                status_message_id,
                "⬆️ Saving the file to your storage...",
                None,
            )
            .await?;

        self.handler
            .store_upload(user, file, content, message.caption.as_deref())
            .await
    }

    async fn process_callback(&self, query: CallbackQuery) -> Result<()> {
        let data = query.data.as_deref().unwrap_or_default();

        let reply = match self.handler.handle_callback(&query.from, data).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Bot callback '{}' from {} failed: {}", data, query.from.id, e);
                CallbackReply::alert(error_text(&e))
            }
        };

        self.api
            .answer_callback_query(&query.id, reply.notice.as_deref(), reply.alert)
            .await?;

        let Some(edit) = reply.edit else {
            return Ok(());
        };
        match &query.message {
            Some(message) => {
                self.api
                    .edit_message_text(
                        message.chat.id,
                        message.message_id,
                        &edit.text,
                        edit.keyboard.as_ref(),
                    )
                    .await
            }
            None => self.send(query.from.id, &edit).await.map(|_| ()),
        }
    }

    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<Message> {
        self.api
            .send_message(chat_id, &reply.text, reply.keyboard.as_ref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn bot_with_token(token: &str) -> Result<TelegramBot> {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().await.unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        let mut config = Config::default();
        config.telegram.bot_token = token.to_string();
        TelegramBot::new(Arc::new(config), Arc::new(db), storage)
    }

    #[tokio::test]
    async fn test_new_requires_token() {
        assert!(matches!(
            bot_with_token("  ").await,
            Err(NidriveError::Config(_))
        ));
        assert!(bot_with_token("123:ABC").await.is_ok());
    }
}
