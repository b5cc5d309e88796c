// crates/ai-sprint-store-sqlite/src/schema.rs
// ============================================================================
// Module: Schema
// Description: Connection setup, pragmas, and DDL for the five entity tables.
// Purpose: Own the on-disk shape, carried over column-for-column from the
//          source's SCHEMA_SQL/INDEXES_SQL.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! Table and index definitions match the source's `state_manager.py`
//! `SCHEMA_SQL`/`INDEXES_SQL` verbatim in column shape; only the
//! `schema_version` bookkeeping and pragma application are this crate's own.

use std::path::Path;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::error::OpenError;

/// Schema version this build writes and expects to read.
const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS features (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    spec_path TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('ready', 'in_progress', 'done', 'failed')),
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS convoys (
    id TEXT PRIMARY KEY,
    feature_id TEXT NOT NULL REFERENCES features(id),
    story TEXT NOT NULL,
    priority TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('available', 'in_progress', 'done', 'blocked')),
    files TEXT NOT NULL,
    dependencies TEXT NOT NULL,
    assignee TEXT,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    convoy_id TEXT NOT NULL REFERENCES convoys(id),
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    file_path TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('todo', 'in_progress', 'in_review', 'in_tests', 'in_docs', 'done')),
    priority TEXT NOT NULL,
    assignee TEXT,
    acceptance_criteria TEXT NOT NULL,
    validation_results TEXT,
    failure_reason TEXT,
    failure_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'processing', 'done', 'failed')),
    created_at TEXT NOT NULL,
    processed_at TEXT
);

CREATE TABLE IF NOT EXISTS agent_sessions (
    agent_id TEXT PRIMARY KEY,
    agent_type TEXT NOT NULL CHECK (agent_type IN ('manager', 'cab', 'refinery', 'librarian', 'developer', 'tester')),
    convoy_id TEXT REFERENCES convoys(id),
    current_task TEXT REFERENCES tasks(id),
    worktree TEXT,
    status TEXT NOT NULL CHECK (status IN ('active', 'crashed', 'hung', 'stuck')),
    last_heartbeat TEXT NOT NULL,
    started_at TEXT NOT NULL,
    crashed_at TEXT
);
";

const INDEXES_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_events_agent_pending ON events(agent_id, status) WHERE status = 'pending';
CREATE INDEX IF NOT EXISTS idx_convoys_feature_status ON convoys(feature_id, status);
CREATE INDEX IF NOT EXISTS idx_convoys_assignee ON convoys(assignee);
CREATE INDEX IF NOT EXISTS idx_tasks_convoy ON tasks(convoy_id);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_agent_sessions_status ON agent_sessions(status);
CREATE INDEX IF NOT EXISTS idx_agent_sessions_heartbeat ON agent_sessions(last_heartbeat);
";

/// Opens (creating if absent) an `SQLite` connection at `path` with WAL mode,
/// foreign keys, and a busy timeout, then ensures the schema is present.
///
/// # Errors
///
/// Returns [`OpenError`] if the path cannot be opened, a pragma fails to
/// apply, or an on-disk schema version is newer than this build supports.
pub(crate) fn open(path: &Path, busy_timeout_ms: u64) -> Result<Connection, OpenError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| OpenError::Path(err.to_string()))?;
        }
    }
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let mut connection =
        Connection::open_with_flags(path, flags).map_err(|err| OpenError::Db(err.to_string()))?;
    apply_pragmas(&connection, busy_timeout_ms)?;
    initialize(&mut connection)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection, busy_timeout_ms: u64) -> Result<(), OpenError> {
    connection
        .execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
        .map_err(|err| OpenError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(busy_timeout_ms))
        .map_err(|err| OpenError::Db(err.to_string()))?;
    Ok(())
}

fn initialize(connection: &mut Connection) -> Result<(), OpenError> {
    let tx = connection.transaction().map_err(|err| OpenError::Db(err.to_string()))?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|err| OpenError::Db(err.to_string()))?;
    let existing: Option<i64> = tx
        .query_row("SELECT MAX(version) FROM schema_version", params![], |row| row.get(0))
        .optional()
        .map_err(|err| OpenError::Db(err.to_string()))?
        .flatten();
    match existing {
        None => {
            tx.execute_batch(SCHEMA_SQL).map_err(|err| OpenError::Db(err.to_string()))?;
            tx.execute_batch(INDEXES_SQL).map_err(|err| OpenError::Db(err.to_string()))?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(|err| OpenError::Db(err.to_string()))?;
        }
        Some(found) if found > SCHEMA_VERSION => {
            return Err(OpenError::UnsupportedSchemaVersion { found, supported: SCHEMA_VERSION });
        }
        Some(_) => {
            tx.execute_batch(SCHEMA_SQL).map_err(|err| OpenError::Db(err.to_string()))?;
            tx.execute_batch(INDEXES_SQL).map_err(|err| OpenError::Db(err.to_string()))?;
        }
    }
    tx.commit().map_err(|err| OpenError::Db(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_twice_at_the_same_path_does_not_reset_data() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.db");
        {
            let conn = open(&path, 1_000).expect("first open");
            conn.execute(
                "INSERT INTO features (id, name, spec_path, status, created_at) VALUES ('f1', 'n', 'p', 'ready', 'now')",
                params![],
            )
            .expect("insert");
        }
        let conn = open(&path, 1_000).expect("second open");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM features", params![], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }
}
