//! Telegram Bot API request/response types

use serde::{Deserialize, Serialize};

/// Telegram Bot API base URL
pub(crate) const API_BASE: &str = "https://api.telegram.org/bot";

/// Telegram getUpdates request
#[derive(Serialize)]
pub(crate) struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: Vec<String>,
}

/// Telegram sendMessage request
#[derive(Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}

/// Telegram pinChatMessage request
#[derive(Serialize)]
pub(crate) struct PinChatMessageRequest {
    pub chat_id: i64,
    pub message_id: i64,
    pub disable_notification: bool,
}

/// Telegram unpinChatMessage request
#[derive(Serialize)]
pub(crate) struct UnpinChatMessageRequest {
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}

/// Telegram getChat request
#[derive(Serialize)]
pub(crate) struct GetChatRequest {
    pub chat_id: i64,
}

/// A single update from getUpdates
#[derive(Debug, Deserialize)]
pub(crate) struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

/// Message payload of an update (only the fields the bot reads)
#[derive(Debug, Deserialize)]
pub(crate) struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

/// Chat reference inside a message
#[derive(Debug, Deserialize)]
pub(crate) struct Chat {
    pub id: i64,
}

/// Full chat info from getChat
#[derive(Debug, Deserialize)]
pub(crate) struct ChatInfo {
    pub pinned_message: Option<Box<Message>>,
}

/// Error parameters attached to a failed call
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResponseParameters {
    pub retry_after: Option<u64>,
}

/// Telegram API response wrapper
#[derive(Debug, Deserialize)]
pub(crate) struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<u16>,
    pub parameters: Option<ResponseParameters>,
}
