//! Known-conversation repository

use super::DbPool;
use crate::channels::ChatId;
use crate::conversations::ConversationStore;
use crate::{Error, Result};

/// `SQLite`-backed set of conversations the bot has spoken with
#[derive(Debug, Clone)]
pub struct SqliteConversationStore {
    pool: DbPool,
}

impl SqliteConversationStore {
    /// Create a new store
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ConversationStore for SqliteConversationStore {
    fn add(&self, chat_id: ChatId) -> Result<bool> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        // Ids are stored as text to stay readable by older releases
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO chat_ids (chat_id) VALUES (?1)",
            [chat_id.to_string()],
        )?;

        Ok(inserted > 0)
    }

    fn list_all(&self) -> Result<Vec<ChatId>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare("SELECT DISTINCT chat_id FROM chat_ids")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            let raw = row?;
            match raw.trim().parse::<ChatId>() {
                Ok(id) => ids.push(id),
                Err(e) => tracing::warn!(value = %raw, error = %e, "skipping unparsable chat id"),
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }
}
