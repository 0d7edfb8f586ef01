//! Mariusz - hackerspace chat bot
//!
//! This library provides the core functionality of the bot:
//! - Pattern-triggered reactions to chat messages
//! - Periodic notification checks (next meetup, wiki edits, voice-server occupancy)
//! - Telegram transport and the store of known conversations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Daemon                          │
//! │   checks: event │ wiki │ occupancy   →  Broadcaster   │
//! │   poll offset   →  PatternRouter    →  reactions     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Transport (Telegram Bot API)  │  Conversations     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod broadcast;
pub mod channels;
pub mod config;
pub mod conversations;
pub mod daemon;
pub mod db;
pub mod error;
pub mod notify;
pub mod reactions;
pub mod router;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use config::Config;
pub use conversations::{ConversationRegistry, ConversationStore, MemoryConversationStore};
pub use daemon::{Daemon, PollOffset};
pub use db::DbPool;
pub use error::{Error, Result};
pub use router::{Action, Handler, Pattern, PatternRouter, StaticReply};
