//! Best-effort fan-out of messages to known conversations

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::channels::{ChatId, SentMessage, Transport};
use crate::conversations::ConversationRegistry;
use crate::{Error, Result};

/// Default per-recipient send timeout
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of a fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Sends messages through the transport, isolating per-recipient failures
#[derive(Clone)]
pub struct Broadcaster {
    transport: Arc<dyn Transport>,
    send_timeout: Duration,
}

impl Broadcaster {
    /// Create a broadcaster over a transport
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Override the per-recipient timeout
    #[must_use]
    pub const fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Underlying transport
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Send to one conversation, swallowing recipient-scoped failures
    ///
    /// Returns `Ok(None)` when the transport rejected the message for this
    /// recipient only (blocked bot, malformed content, vanished chat).
    ///
    /// # Errors
    ///
    /// Returns transient and fatal transport errors, and a transient error
    /// when the send timed out
    pub async fn try_send(&self, chat_id: ChatId, text: &str) -> Result<Option<SentMessage>> {
        let sent = tokio::time::timeout(self.send_timeout, self.transport.send_message(chat_id, text))
            .await
            .map_err(|_| Error::transient(format!("send to chat {chat_id} timed out")))?;

        match sent {
            Ok(message) => Ok(Some(message)),
            Err(e) if e.is_recipient_scoped() => {
                tracing::warn!(chat_id, error = %e, "message not delivered");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Send to one conversation, logging and swallowing every failure
    pub async fn send(&self, chat_id: ChatId, text: &str) -> Option<SentMessage> {
        match self.try_send(chat_id, text).await {
            Ok(sent) => sent,
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "send failed");
                None
            }
        }
    }

    /// Send to every listed conversation concurrently
    pub async fn broadcast(&self, recipients: &[ChatId], text: &str) -> BroadcastReport {
        let results = join_all(recipients.iter().map(|&chat_id| self.send(chat_id, text))).await;

        let delivered = results.iter().filter(|r| r.is_some()).count();
        let report = BroadcastReport {
            delivered,
            failed: results.len() - delivered,
        };

        tracing::debug!(
            delivered = report.delivered,
            failed = report.failed,
            "broadcast finished"
        );
        report
    }

    /// Send to every known conversation except `excluded`
    ///
    /// # Errors
    ///
    /// Returns error only if the conversation registry cannot be read
    pub async fn broadcast_except(
        &self,
        registry: &ConversationRegistry,
        text: &str,
        excluded: Option<ChatId>,
    ) -> Result<BroadcastReport> {
        let recipients = registry.all_except(excluded)?;
        Ok(self.broadcast(&recipients, text).await)
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("transport", &self.transport.name())
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}
