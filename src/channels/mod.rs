//! Messaging transport
//!
//! The bot talks to its chat backend exclusively through the `Transport` trait.

mod telegram;

use async_trait::async_trait;

pub use telegram::TelegramTransport;
pub use telegram::retry;

use crate::Result;

/// Conversation identifier in the transport's id space
///
/// Group conversations have non-positive ids, one-to-one chats positive ones.
pub type ChatId = i64;

/// A single update pulled from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Monotonic update identifier, used as the poll cursor
    pub update_id: i64,

    /// Conversation the message was posted in
    pub chat_id: ChatId,

    /// Text payload; `None` for stickers, photos, service messages, ...
    pub text: Option<String>,
}

impl IncomingMessage {
    /// Create a text message
    #[must_use]
    pub fn text(update_id: i64, chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            update_id,
            chat_id,
            text: Some(text.into()),
        }
    }

    /// Create an update without a text payload
    #[must_use]
    pub const fn without_text(update_id: i64, chat_id: ChatId) -> Self {
        Self {
            update_id,
            chat_id,
            text: None,
        }
    }
}

/// A message accepted by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// Whether a conversation id denotes a group rather than a private chat
#[must_use]
pub const fn is_group(chat_id: ChatId) -> bool {
    chat_id <= 0
}

/// Chat backend used by the bot
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logging
    fn name(&self) -> &'static str;

    /// Fetch updates with an id of at least `offset`, waiting up to
    /// `timeout_secs` when none are pending
    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64)
    -> Result<Vec<IncomingMessage>>;

    /// Send a text message to a conversation
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<SentMessage>;

    /// Pin a previously sent message
    async fn pin_message(&self, chat_id: ChatId, message_id: i64) -> Result<()>;

    /// Unpin the currently pinned message, if any
    async fn unpin_message(&self, chat_id: ChatId, message_id: Option<i64>) -> Result<()>;

    /// Text of the currently pinned message
    async fn pinned_message_text(&self, chat_id: ChatId) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_ids_are_non_positive() {
        assert!(is_group(-1_001_234));
        assert!(is_group(0));
        assert!(!is_group(42));
    }
}
