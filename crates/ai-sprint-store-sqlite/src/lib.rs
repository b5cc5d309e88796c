// crates/ai-sprint-store-sqlite/src/lib.rs
// ============================================================================
// Crate: ai-sprint-store-sqlite
// Description: SQLite-backed implementation of every state-store trait.
// Purpose: The one shipped durable backend for the coordination plane.
// Dependencies: ai-sprint-core, ai-sprint-queue, rusqlite
// ============================================================================

//! ## Overview
//! This crate owns the on-disk schema and every SQL statement in the
//! workspace. It implements [`ai_sprint_core::store::FeatureStore`],
//! [`ai_sprint_core::store::ConvoyStore`], [`ai_sprint_core::store::TaskStore`],
//! [`ai_sprint_core::store::SessionStore`], and [`ai_sprint_queue::EventQueue`]
//! on one [`SqliteStore`] type backed by a single WAL-mode connection.

#![deny(unsafe_code)]

mod codec;
mod error;
mod schema;
mod store;

pub use ai_sprint_core::SUPERVISOR_AGENT_ID;
pub use error::OpenError;
pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
