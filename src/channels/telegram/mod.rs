//! Telegram transport
//!
//! Long-polls the Bot API for updates and sends/pins messages

mod api;
pub mod retry;
mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::SecretString;

use super::{ChatId, IncomingMessage, SentMessage, Transport};
use crate::Result;

/// Grace added on top of the long-poll timeout before the HTTP request is abandoned
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Timeout for non-polling calls
const CALL_TIMEOUT: Duration = Duration::from_secs(20);

/// Telegram Bot API transport
#[derive(Clone)]
pub struct TelegramTransport {
    token: SecretString,
    client: Client,
}

impl TelegramTransport {
    /// Create a new Telegram transport
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<IncomingMessage>> {
        let updates = self.fetch_updates(offset, timeout_secs).await?;

        Ok(updates
            .into_iter()
            .map(|update| IncomingMessage {
                update_id: update.update_id,
                chat_id: update.message.as_ref().map_or(0, |m| m.chat.id),
                text: update.message.and_then(|m| m.text),
            })
            .collect())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<SentMessage> {
        let message_id = self.send_text(chat_id, text).await?;
        tracing::debug!(chat_id, message_id, "Telegram message sent");
        Ok(SentMessage {
            chat_id,
            message_id,
        })
    }

    async fn pin_message(&self, chat_id: ChatId, message_id: i64) -> Result<()> {
        self.pin_chat_message(chat_id, message_id).await
    }

    async fn unpin_message(&self, chat_id: ChatId, message_id: Option<i64>) -> Result<()> {
        self.unpin_chat_message(chat_id, message_id).await
    }

    async fn pinned_message_text(&self, chat_id: ChatId) -> Result<Option<String>> {
        let chat = self.get_chat(chat_id).await?;
        Ok(chat.pinned_message.and_then(|m| m.text))
    }
}
