//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    // Same layout as chat databases written by earlier bot releases
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS chat_ids (chat_id TEXT);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Older files may carry duplicate rows
        DELETE FROM chat_ids
        WHERE rowid NOT IN (SELECT MIN(rowid) FROM chat_ids GROUP BY chat_id);

        CREATE UNIQUE INDEX IF NOT EXISTS idx_chat_ids_chat_id ON chat_ids(chat_id);

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2");
    Ok(())
}
