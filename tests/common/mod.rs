//! Shared test utilities
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use mariusz::channels::{ChatId, IncomingMessage, SentMessage, Transport};
use mariusz::config::DaemonConfig;
use mariusz::{ConversationRegistry, DbPool, Error, MemoryConversationStore, Result, db};
use tokio::sync::Mutex;

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Registry over an in-memory store holding `ids`
pub fn registry_with(ids: &[ChatId], home: Option<ChatId>) -> ConversationRegistry {
    ConversationRegistry::new(
        Arc::new(MemoryConversationStore::with_ids(ids.iter().copied())),
        home,
    )
}

/// Daemon settings with no waiting anywhere
pub fn fast_settings() -> DaemonConfig {
    DaemonConfig {
        poll_timeout: std::time::Duration::ZERO,
        network_backoff: std::time::Duration::ZERO,
        crash_cooldown: std::time::Duration::ZERO,
        send_timeout: std::time::Duration::from_secs(1),
    }
}

/// Mock transport recording every call
#[derive(Default)]
pub struct MockTransport {
    batches: Mutex<VecDeque<Vec<IncomingMessage>>>,
    poll_failures: Mutex<VecDeque<Error>>,
    revoked: Mutex<HashSet<ChatId>>,
    pinned: Mutex<HashMap<ChatId, String>>,
    pub offsets: Arc<Mutex<Vec<Option<i64>>>>,
    pub sent: Arc<Mutex<Vec<(ChatId, String)>>>,
    pub pins: Arc<Mutex<Vec<(ChatId, i64)>>>,
    pub unpins: Arc<Mutex<Vec<ChatId>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue one `get_updates` result
    pub async fn push_updates(&self, updates: Vec<IncomingMessage>) {
        self.batches.lock().await.push_back(updates);
    }

    /// Make the next `get_updates` call fail
    pub async fn fail_next_poll(&self, err: Error) {
        self.poll_failures.lock().await.push_back(err);
    }

    /// Sends to `chat_id` fail as if the bot was blocked
    pub async fn revoke(&self, chat_id: ChatId) {
        self.revoked.lock().await.insert(chat_id);
    }

    /// Undo `revoke`
    pub async fn restore(&self, chat_id: ChatId) {
        self.revoked.lock().await.remove(&chat_id);
    }

    pub async fn set_pinned(&self, chat_id: ChatId, text: &str) {
        self.pinned.lock().await.insert(chat_id, text.to_string());
    }

    pub async fn pinned(&self, chat_id: ChatId) -> Option<String> {
        self.pinned.lock().await.get(&chat_id).cloned()
    }

    pub async fn sent_messages(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().await.clone()
    }

    /// Recipients of messages with exactly `text`, sorted
    pub async fn recipients_of(&self, text: &str) -> Vec<ChatId> {
        let mut ids: Vec<ChatId> = self
            .sent
            .lock()
            .await
            .iter()
            .filter(|(_, t)| t == text)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub async fn requested_offsets(&self) -> Vec<Option<i64>> {
        self.offsets.lock().await.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        _timeout_secs: u64,
    ) -> Result<Vec<IncomingMessage>> {
        self.offsets.lock().await.push(offset);

        if let Some(err) = self.poll_failures.lock().await.pop_front() {
            return Err(err);
        }

        Ok(self.batches.lock().await.pop_front().unwrap_or_default())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<SentMessage> {
        if self.revoked.lock().await.contains(&chat_id) {
            return Err(Error::AuthorizationRevoked { chat_id });
        }

        let mut sent = self.sent.lock().await;
        sent.push((chat_id, text.to_string()));
        let message_id = i64::try_from(sent.len()).expect("message count");
        Ok(SentMessage {
            chat_id,
            message_id,
        })
    }

    async fn pin_message(&self, chat_id: ChatId, message_id: i64) -> Result<()> {
        self.pins.lock().await.push((chat_id, message_id));

        // Message ids are handed out sequentially from 1
        let index = usize::try_from(message_id - 1).expect("message id");
        let text = self.sent.lock().await[index].1.clone();
        self.pinned.lock().await.insert(chat_id, text);
        Ok(())
    }

    async fn unpin_message(&self, chat_id: ChatId, _message_id: Option<i64>) -> Result<()> {
        self.unpins.lock().await.push(chat_id);
        if self.pinned.lock().await.remove(&chat_id).is_none() {
            return Err(Error::DeliveryRejected {
                chat_id,
                reason: "Bad Request: message to unpin not found".to_string(),
            });
        }
        Ok(())
    }

    async fn pinned_message_text(&self, chat_id: ChatId) -> Result<Option<String>> {
        if self.revoked.lock().await.contains(&chat_id) {
            return Err(Error::AuthorizationRevoked { chat_id });
        }
        Ok(self.pinned.lock().await.get(&chat_id).cloned())
    }
}
