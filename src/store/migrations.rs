//! Schema migrations for the memory store.

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i32 = 1;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            memory TEXT NOT NULL,
            chunk TEXT NOT NULL DEFAULT '',
            user_id TEXT NOT NULL,
            vector BLOB NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            memory_type TEXT NOT NULL,
            hash TEXT NOT NULL,
            superseded_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_memories_user_id ON memories(user_id);
        CREATE INDEX IF NOT EXISTS idx_memories_user_hash ON memories(user_id, hash);
        CREATE INDEX IF NOT EXISTS idx_memories_user_type ON memories(user_id, memory_type);
        CREATE INDEX IF NOT EXISTS idx_memories_superseded ON memories(superseded_by);

        INSERT INTO schema_version (version) VALUES (1);
        "#,
    )?;
    Ok(())
}
