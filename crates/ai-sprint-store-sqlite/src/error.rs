// crates/ai-sprint-store-sqlite/src/error.rs
// ============================================================================
// Module: Store Error Mapping
// Description: Translates rusqlite failures into the shared core taxonomy.
// Purpose: Keep every trait impl in this crate returning CoreError/QueueError
//          directly, with no crate-local error type leaking to callers.
// Dependencies: ai-sprint-core, ai-sprint-queue, rusqlite, thiserror
// ============================================================================

//! ## Overview
//! This crate does not define its own public error enum. `CoreError` already
//! distinguishes the cases a caller needs to branch on (not-found, conflict,
//! integrity violation, ...); an unexpected driver or I/O failure has no
//! dedicated variant, so it is folded into [`CoreError::ToolError`] the same
//! way an external gate tool's crash is.

use ai_sprint_core::errors::CoreError;
use ai_sprint_queue::QueueError;

/// Wraps an unexpected `rusqlite` failure as a [`CoreError::ToolError`].
pub(crate) fn core_err(err: rusqlite::Error) -> CoreError {
    CoreError::ToolError(format!("sqlite error: {err}"))
}

/// Wraps an unexpected `rusqlite` failure as a [`QueueError::Storage`].
pub(crate) fn queue_err(err: rusqlite::Error) -> QueueError {
    QueueError::Storage(format!("sqlite error: {err}"))
}

/// Errors raised while opening or initializing the store itself, before any
/// trait method is reachable.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// The configured path could not be created or opened.
    #[error("could not open store at the configured path: {0}")]
    Path(String),
    /// The underlying `SQLite` driver failed.
    #[error("sqlite error: {0}")]
    Db(String),
    /// An on-disk schema version newer than this build understands.
    #[error("schema version {found} is newer than the {supported} this build supports")]
    UnsupportedSchemaVersion {
        /// Version found on disk.
        found: i64,
        /// Highest version this build knows how to read.
        supported: i64,
    },
}
