//! Database module for the known-conversation store

pub mod conversation;
mod schema;

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::{Error, Result};

pub use conversation::SqliteConversationStore;
pub use schema::SCHEMA_VERSION;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Open the chat database at `path`, migrating it if needed
///
/// # Errors
///
/// Returns error if database cannot be opened or initialized
pub fn init<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    let pool = open(SqliteConnectionManager::file(path), 2)?;
    tracing::info!(version = SCHEMA_VERSION, "database initialized");
    Ok(pool)
}

/// In-memory database; every connection would see a fresh database, so the pool holds one
///
/// # Errors
///
/// Returns error if database cannot be initialized
pub fn init_memory() -> Result<DbPool> {
    open(SqliteConnectionManager::memory(), 1)
}

fn open(manager: SqliteConnectionManager, max_size: u32) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&*pool.get().map_err(|e| Error::Database(e.to_string()))?)?;
    Ok(pool)
}
