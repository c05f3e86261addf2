//! Minimal Telegram Bot API client.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{NidriveError, Result};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Extra time allowed on top of the long polling timeout.
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 30;

/// User agent for Bot API requests.
const USER_AGENT: &str = "NIDrive/1.0 (Telegram Bot)";

/// A Telegram account.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Any downloadable attachment: document, photo size, video, audio or voice.
#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Attachment of a message, with a filename to store it under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub file_id: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub document: Option<Attachment>,
    #[serde(default)]
    pub photo: Option<Vec<Attachment>>,
    #[serde(default)]
    pub video: Option<Attachment>,
    #[serde(default)]
    pub audio: Option<Attachment>,
    #[serde(default)]
    pub voice: Option<Attachment>,
}

impl Message {
    /// The file carried by this message, if any.
    ///
    /// Photos use their largest size. Attachments without a name get one
    /// derived from the kind and the message time.
    pub fn incoming_file(&self) -> Option<IncomingFile> {
        let (attachment, default_name) = if let Some(doc) = &self.document {
            (doc, format!("document_{}", self.date))
        } else if let Some(photo) = self.photo.as_ref().and_then(|sizes| sizes.last()) {
            (photo, format!("photo_{}.jpg", self.date))
        } else if let Some(video) = &self.video {
            (video, format!("video_{}.mp4", self.date))
        } else if let Some(audio) = &self.audio {
            (audio, format!("audio_{}.mp3", self.date))
        } else if let Some(voice) = &self.voice {
            (voice, format!("voice_{}.ogg", self.date))
        } else {
            return None;
        };

        let filename = attachment
            .file_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(default_name);

        Some(IncomingFile {
            file_id: attachment.file_id.clone(),
            filename,
            mime_type: attachment.mime_type.clone(),
            size: attachment.file_size,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// Result of `getFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramFile {
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineKeyboardButton {
    /// Button that sends callback data back to the bot.
    pub fn callback(text: impl Into<String>, data: impl ToString) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.to_string()),
            url: None,
        }
    }

    /// Button that opens a URL.
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row, skipping empty ones.
    pub fn row(mut self, buttons: Vec<InlineKeyboardButton>) -> Self {
        if !buttons.is_empty() {
            self.inline_keyboard.push(buttons);
        }
        self
    }

    /// All buttons, row by row.
    pub fn buttons(&self) -> impl Iterator<Item = &InlineKeyboardButton> {
        self.inline_keyboard.iter().flatten()
    }
}

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// Bot API client for one bot token.
#[derive(Clone)]
pub struct TelegramApi {
    client: Client,
    base_url: String,
    token: String,
}

impl TelegramApi {
    /// Create a client.
    ///
    /// `poll_timeout_secs` is the long polling timeout; requests may take
    /// that long plus a margin.
    pub fn new(base_url: &str, token: &str, poll_timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(
                poll_timeout_secs + REQUEST_TIMEOUT_MARGIN_SECS,
            ))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| NidriveError::Telegram(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base_url, self.token, file_path)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&params)
            .send()
            .await
            .map_err(|e| NidriveError::Telegram(format!("{method} request failed: {}", e.without_url())))?;

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| NidriveError::Telegram(format!("{method} returned invalid JSON: {}", e.without_url())))?;

        if !body.ok {
            return Err(NidriveError::Telegram(format!(
                "{method} failed: {}",
                body.description.unwrap_or_else(|| "unknown error".to_string())
            )));
        }
        body.result
            .ok_or_else(|| NidriveError::Telegram(format!("{method} returned no result")))
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    /// Send an HTML message.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message> {
        let mut params = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Some(keyboard) = keyboard {
            params["reply_markup"] = json!(keyboard);
        }
        self.call("sendMessage", params).await
    }

    /// Replace the text and keyboard of a message sent by the bot.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let mut params = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Some(keyboard) = keyboard {
            params["reply_markup"] = json!(keyboard);
        }
        // the result is either the edited message or `true`
        let _: serde_json::Value = self.call("editMessageText", params).await?;
        Ok(())
    }

    /// Acknowledge a button press, optionally with a toast or alert.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        let mut params = json!({ "callback_query_id": callback_query_id });
        if let Some(text) = text {
            params["text"] = json!(text);
            params["show_alert"] = json!(show_alert);
        }
        let _: bool = self.call("answerCallbackQuery", params).await?;
        Ok(())
    }

    /// Look up the download path of a file.
    pub async fn get_file(&self, file_id: &str) -> Result<TelegramFile> {
        self.call("getFile", json!({ "file_id": file_id })).await
    }

    /// Download a file, refusing anything larger than `max_size` bytes.
    pub async fn download_file(&self, file: &TelegramFile, max_size: u64) -> Result<Vec<u8>> {
        let file_path = file
            .file_path
            .as_deref()
            .ok_or_else(|| NidriveError::Telegram("file is not available for download".to_string()))?;

        let response = self
            .client
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|e| NidriveError::Telegram(format!("download failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            return Err(NidriveError::Telegram(format!(
                "download failed: HTTP {}",
                response.status()
            )));
        }

        if let Some(length) = response.content_length() {
            if length > max_size {
                return Err(NidriveError::PayloadTooLarge(format!(
                    "{length} bytes (max {max_size} bytes)"
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NidriveError::Telegram(format!("download failed: {}", e.without_url())))?;

        if bytes.len() as u64 > max_size {
            return Err(NidriveError::PayloadTooLarge(format!(
                "{} bytes (max {max_size} bytes)",
                bytes.len()
            )));
        }
        Ok(bytes.to_vec())
    }
}
