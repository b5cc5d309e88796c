// crates/ai-sprint-core/src/lib.rs
// ============================================================================
// Crate: ai-sprint-core
// Description: The coordination plane's data model, event vocabulary, task
//              state machine, error taxonomy, and external interface seams.
// Purpose: Give every other crate in the workspace one shared domain model.
// Dependencies: serde, serde_json, thiserror, time, uuid
// ============================================================================

//! ## Overview
//! `ai-sprint-core` has no I/O of its own. It defines the five entities a
//! feature is built from (§3), the closed event vocabulary workers exchange
//! (§4.4), the legal task-state transitions (§4.3), the cross-cutting error
//! taxonomy (§7), the state store traits a storage backend must implement,
//! and the trait seams for the process host, VCS host, and telemetry sink
//! that every other crate builds on.

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod identifiers;
pub mod interfaces;
pub mod model;
pub mod state_machine;
pub mod store;
pub mod telemetry;
pub mod timestamp;

pub use errors::CoreError;
pub use events::EventPayload;
pub use identifiers::AgentId;
pub use identifiers::CAB_AGENT_ID;
pub use identifiers::ConvoyId;
pub use identifiers::EventId;
pub use identifiers::FeatureId;
pub use identifiers::LIBRARIAN_AGENT_ID;
pub use identifiers::REFINERY_AGENT_ID;
pub use identifiers::SUPERVISOR_AGENT_ID;
pub use identifiers::TaskId;
pub use model::AgentSession;
pub use model::Convoy;
pub use model::Event;
pub use model::Feature;
pub use model::Task;
pub use store::ConvoyStore;
pub use store::FeatureStore;
pub use store::RejectOutcome;
pub use store::SessionStore;
pub use store::TaskStore;
pub use timestamp::Timestamp;
