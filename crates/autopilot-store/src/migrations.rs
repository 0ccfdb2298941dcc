//! Database schema migrations.
//!
//! Applies the initial schema: runs, TTL cache, embedding cache, and
//! knowledge-chunk tables, plus the schema_migrations tracking table.

use rusqlite::Connection;
use tracing::info;

use autopilot_core::error::AutopilotError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), AutopilotError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| AutopilotError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| AutopilotError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), AutopilotError> {
    conn.execute_batch(
        "
        -- One durable record per pipeline execution.
        CREATE TABLE IF NOT EXISTS runs (
            run_id          TEXT PRIMARY KEY NOT NULL,
            run_type        TEXT NOT NULL DEFAULT 'autopilot'
                            CHECK (run_type IN ('autopilot', 'voice_schedule')),
            input_type      TEXT NOT NULL
                            CHECK (input_type IN ('audio', 'text')),
            raw_input       TEXT NOT NULL DEFAULT '',
            transcript      TEXT,
            extracted_json  TEXT,
            evidence_json   TEXT,
            reply_draft_json TEXT,
            actions_json    TEXT,
            outcomes_json   TEXT,
            status          TEXT NOT NULL DEFAULT 'pending'
                            CHECK (status IN ('pending', 'transcribed', 'extracted',
                                              'drafted', 'previewed', 'executed', 'error')),
            error           TEXT,
            created_at      INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_runs_created_at
            ON runs (created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_runs_status
            ON runs (status, created_at DESC);

        -- General key/value cache with read-time TTL expiry.
        CREATE TABLE IF NOT EXISTS cache (
            key         TEXT PRIMARY KEY NOT NULL,
            value_json  TEXT NOT NULL,
            created_at  INTEGER NOT NULL,
            ttl_seconds INTEGER NOT NULL DEFAULT 3600
        );

        -- Embedding cache keyed by content hash. No TTL, never evicted.
        CREATE TABLE IF NOT EXISTS embed_cache (
            content_hash    TEXT PRIMARY KEY NOT NULL,
            embedding_json  TEXT NOT NULL,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        -- Knowledge chunks with their normalized embeddings. Replaced
        -- wholesale on each ingestion.
        CREATE TABLE IF NOT EXISTS kb_chunks (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            document_name   TEXT NOT NULL,
            chunk_index     INTEGER NOT NULL,
            text            TEXT NOT NULL,
            embedding_json  TEXT NOT NULL
        );
        ",
    )
    .map_err(|e| AutopilotError::Storage(format!("Migration v1 failed: {}", e)))?;

    conn.execute(
        "INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema')",
        [],
    )
    .map_err(|e| AutopilotError::Storage(format!("Failed to record migration: {}", e)))?;

    Ok(())
}
