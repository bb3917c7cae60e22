//! SQLite schema and migrations for the prompt history store.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Create or migrate the schema idempotently. Applies PRAGMAs (WAL when
/// requested, synchronous NORMAL, temp store in memory) before creating
/// tables and indexes.
pub fn initialize_schema(conn: &Connection, wal_mode: bool) -> SqliteResult<()> {
    if wal_mode {
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_info (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_info", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    if current_version < 1 {
        apply_v1_schema(conn)?;
    }

    Ok(())
}

fn apply_v1_schema(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS prompt_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            original_idea TEXT NOT NULL,
            context TEXT DEFAULT '',
            improved_prompt TEXT NOT NULL,
            role TEXT NOT NULL,
            directive TEXT NOT NULL,
            framework TEXT NOT NULL,
            guardrails TEXT NOT NULL,
            reasoning TEXT,
            confidence REAL CHECK (confidence IS NULL OR (confidence >= 0 AND confidence <= 1)),
            backend TEXT NOT NULL,
            model TEXT NOT NULL,
            provider TEXT NOT NULL,
            latency_ms INTEGER CHECK (latency_ms IS NULL OR latency_ms >= 0)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_prompt_history_created_at ON prompt_history(created_at DESC)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_prompt_history_backend ON prompt_history(backend)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_prompt_history_provider ON prompt_history(provider)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_prompt_history_confidence ON prompt_history(confidence)",
        [],
    )?;

    conn.execute("INSERT INTO schema_info (version) VALUES (1)", [])?;

    Ok(())
}

/// Whether the schema has already been created on this connection.
pub fn is_initialized(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='prompt_history'",
        [],
        |row| row.get::<_, i32>(0),
    )
    .map(|count| count > 0)
    .unwrap_or(false)
}

/// Read back the current schema version.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_info", [], |row| {
        row.get(0)
    })
}
