//! Registry of conversations the bot has ever exchanged messages with

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::Result;
use crate::channels::{ChatId, is_group};

/// Persistent set of known conversations
pub trait ConversationStore: Send + Sync {
    /// Add a conversation; returns `true` when it was not known before
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    fn add(&self, chat_id: ChatId) -> Result<bool>;

    /// All known conversations
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    fn list_all(&self) -> Result<Vec<ChatId>>;
}

/// Process-local store, used when no database path is configured
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    ids: Mutex<BTreeSet<ChatId>>,
}

impl MemoryConversationStore {
    /// Create a store pre-populated with conversations
    #[must_use]
    pub fn with_ids(ids: impl IntoIterator<Item = ChatId>) -> Self {
        Self {
            ids: Mutex::new(ids.into_iter().collect()),
        }
    }
}

impl ConversationStore for MemoryConversationStore {
    fn add(&self, chat_id: ChatId) -> Result<bool> {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        Ok(ids.insert(chat_id))
    }

    fn list_all(&self) -> Result<Vec<ChatId>> {
        let ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        Ok(ids.iter().copied().collect())
    }
}

/// Known conversations plus the identity of the home conversation
#[derive(Clone)]
pub struct ConversationRegistry {
    store: Arc<dyn ConversationStore>,
    home: Option<ChatId>,
}

impl ConversationRegistry {
    /// Create a registry over a store
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>, home: Option<ChatId>) -> Self {
        Self { store, home }
    }

    /// Registry backed by a fresh in-memory store
    #[must_use]
    pub fn in_memory(home: Option<ChatId>) -> Self {
        Self::new(Arc::new(MemoryConversationStore::default()), home)
    }

    /// The configured home conversation
    #[must_use]
    pub const fn home(&self) -> Option<ChatId> {
        self.home
    }

    /// Whether `chat_id` is the home conversation
    #[must_use]
    pub fn is_home(&self, chat_id: ChatId) -> bool {
        self.home == Some(chat_id)
    }

    /// Record a conversation (idempotent)
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub fn register(&self, chat_id: ChatId) -> Result<()> {
        if self.store.add(chat_id)? {
            tracing::info!(chat_id, "new conversation registered");
        }
        Ok(())
    }

    /// All known conversations
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub fn all(&self) -> Result<Vec<ChatId>> {
        self.store.list_all()
    }

    /// All known conversations except `excluded`
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub fn all_except(&self, excluded: Option<ChatId>) -> Result<Vec<ChatId>> {
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .filter(|id| Some(*id) != excluded)
            .collect())
    }

    /// Known group conversations
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub fn groups(&self) -> Result<Vec<ChatId>> {
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .filter(|id| is_group(*id))
            .collect())
    }
}

impl std::fmt::Debug for ConversationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationRegistry")
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let registry = ConversationRegistry::in_memory(None);
        registry.register(7).unwrap();
        registry.register(7).unwrap();
        assert_eq!(registry.all().unwrap(), vec![7]);
    }

    #[test]
    fn all_except_drops_home() {
        let store = Arc::new(MemoryConversationStore::with_ids([-10, 1, 2]));
        let registry = ConversationRegistry::new(store, Some(-10));

        assert!(registry.is_home(-10));
        assert_eq!(registry.all_except(registry.home()).unwrap(), vec![1, 2]);
        assert_eq!(registry.all_except(None).unwrap(), vec![-10, 1, 2]);
    }

    #[test]
    fn groups_are_non_positive_ids() {
        let store = Arc::new(MemoryConversationStore::with_ids([-300, -5, 0, 9]));
        let registry = ConversationRegistry::new(store, None);
        assert_eq!(registry.groups().unwrap(), vec![-300, -5, 0]);
    }
}
