// crates/ai-sprint-queue/src/lib.rs
// ============================================================================
// Crate: ai-sprint-queue
// Description: The per-agent FIFO event queue contract.
// Purpose: Let worker roles publish and consume events (§4.4) without
//          knowing how they are persisted.
// Dependencies: ai-sprint-core, thiserror
// ============================================================================

//! ## Overview
//! An [`Event`](ai_sprint_core::model::Event) is a durable, per-target FIFO
//! message. `ai-sprint-store-sqlite` is the one shipped [`EventQueue`]
//! implementation; it publishes and consumes events in the same database as
//! the rest of the state, which is what lets `reject` (§9.1) publish an
//! `ESCALATE_TASK` event in the same transaction as the task-status update.

#![deny(unsafe_code)]

use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::model::Event;
use ai_sprint_core::model::EventStatus;
use thiserror::Error;

/// Errors raised by an [`EventQueue`] implementation.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No event with the given id exists.
    #[error("event not found: {0}")]
    NotFound(String),
    /// The underlying store failed.
    #[error("queue storage error: {0}")]
    Storage(String),
}

/// A durable, per-target FIFO event channel.
///
/// # Invariants
/// - Events for a given `agent_id` are consumed in `created_at` order.
/// - [`EventQueue::consume`] must re-check `status = pending` as part of the
///   same atomic operation that flips it to `processing`; a prior read of
///   status is not sufficient to prevent two workers from consuming the same
///   event (§9.1).
pub trait EventQueue {
    /// Publishes an event, leaving it `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Storage`] on a storage failure.
    fn publish(&self, event: Event) -> Result<(), QueueError>;

    /// Atomically claims the oldest `pending` event addressed to `agent_id`,
    /// flipping it to `processing`. Returns `Ok(None)` if none is pending.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Storage`] on a storage failure.
    fn consume(&self, agent_id: &AgentId) -> Result<Option<Event>, QueueError>;

    /// Acknowledges a `processing` event as `done` or `failed`.
    ///
    /// Acking an event that is not `processing` — already acknowledged, or
    /// never claimed — is a no-op rather than a failure; a duplicate
    /// delivery or a late ack racing a retry is expected traffic, not a bug
    /// in the caller.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Storage`] on a storage failure.
    fn acknowledge(&self, event_id: &ai_sprint_core::identifiers::EventId, outcome: EventStatus) -> Result<(), QueueError>;
}
