//! Error types for the Mariusz bot

use std::time::Duration;

use thiserror::Error;

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the bot
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Network hiccup talking to the transport; retried after a backoff
    #[error("transient network error: {message}")]
    TransientNetwork {
        message: String,
        /// Delay requested by the remote side, if any
        retry_after: Option<Duration>,
    },

    /// The bot was removed from, or blocked in, a conversation
    #[error("authorization revoked for chat {chat_id}")]
    AuthorizationRevoked { chat_id: i64 },

    /// The transport refused a single message
    #[error("delivery to chat {chat_id} rejected: {reason}")]
    DeliveryRejected { chat_id: i64, reason: String },

    /// External data source could not be reached
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// External feed was reachable but unreadable
    #[error("malformed feed: {0}")]
    MalformedFeed(String),

    /// Unrecoverable error; the process should exit and be restarted
    #[error("fatal: {0}")]
    Fatal(String),

    /// Trigger pattern failed to compile
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build a transient error without a server-provided delay
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientNetwork {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Whether the failure is worth retrying without losing state
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork { .. })
    }

    /// Whether the failure only concerns a single conversation
    #[must_use]
    pub const fn is_recipient_scoped(&self) -> bool {
        matches!(
            self,
            Self::AuthorizationRevoked { .. } | Self::DeliveryRejected { .. }
        )
    }

    /// Whether a notification source failed in a way that means "no data"
    #[must_use]
    pub const fn is_source_failure(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_) | Self::MalformedFeed(_))
    }

    /// Delay requested by the remote side before retrying
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::TransientNetwork { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
