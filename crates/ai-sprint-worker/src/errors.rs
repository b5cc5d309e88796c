// crates/ai-sprint-worker/src/errors.rs
// ============================================================================
// Module: Worker Errors
// Description: The error taxonomy every worker-role loop surfaces.
// Purpose: Compose the lower-level store/queue error types into one enum
//          roles can match on, per the workspace's upward-composition rule.
// Dependencies: ai-sprint-core, ai-sprint-config, ai-sprint-queue, thiserror
// ============================================================================

//! ## Overview
//! A role's public methods return `Result<_, WorkerError>`. Lower-layer
//! errors (`CoreError`, `QueueError`, `ConfigError`) convert in via `#[from]`
//! rather than being wrapped in a catch-all string, so callers can still
//! match on the originating kind.

use ai_sprint_config::ConfigError;
use ai_sprint_core::errors::CoreError;
use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::interfaces::ArtifactError;
use ai_sprint_core::interfaces::DocsError;
use ai_sprint_core::interfaces::HostError;
use ai_sprint_core::interfaces::VcsError;
use ai_sprint_queue::QueueError;
use thiserror::Error;

use crate::feature_spec::FeatureSpecError;

/// Failures a worker-role loop can surface.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A state-store operation failed.
    #[error("store error: {0}")]
    Store(#[from] CoreError),
    /// An event-queue operation failed.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    /// Configuration could not be loaded or did not validate.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// A feature's tasks artifact could not be parsed or violated an
    /// invariant.
    #[error("feature spec error: {0}")]
    FeatureSpec(#[from] FeatureSpecError),
    /// The version-control host failed a worktree or merge operation.
    #[error("vcs error: {0}")]
    Vcs(#[from] VcsError),
    /// The process host failed a spawn, destroy, or liveness check.
    #[error("host error: {0}")]
    Host(#[from] HostError),
    /// The documentation host failed to regenerate a convoy's docs.
    #[error("docs error: {0}")]
    Docs(#[from] DocsError),
    /// A feature's `tasks.md` artifact could not be read.
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    /// A role received an event type its loop does not handle.
    #[error("agent {agent_id} received unexpected event type {event_type}")]
    UnexpectedEvent {
        /// The role that received the event.
        agent_id: AgentId,
        /// The event's wire type name.
        event_type: &'static str,
    },
}
