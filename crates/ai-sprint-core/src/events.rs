// crates/ai-sprint-core/src/events.rs
// ============================================================================
// Module: Event Vocabulary
// Description: The closed set of inter-role event types and their payloads.
// Purpose: Model each event type as a tagged union over a per-variant payload.
// Dependencies: crate::identifiers, serde, std
// ============================================================================

//! ## Overview
//! The source models event payloads as schemaless dictionaries. Per the
//! design notes this re-implementation models each event type as one variant
//! of a tagged union, with fields specific to that variant, serialized as
//! JSON in the state store's `payload` column.

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::AgentId;
use crate::identifiers::ConvoyId;
use crate::identifiers::TaskId;
use crate::model::TaskStatus;

/// The coarse cause of a task escalation.
///
/// This replaces the source's free-string `failure_type`, narrowing it to the
/// two causes the design actually distinguishes (see `ai-sprint-health`'s
/// stuck-sweep policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationCause {
    /// The task was rejected three times by a reviewing role.
    Rejected,
    /// The task exceeded its maximum duration while bound to an agent.
    Stuck,
}

/// A coarse cause for a failed agent restart, reported for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartFailureCause {
    /// The process host refused to destroy the stale session.
    HostDestroyFailed,
    /// The process host refused to spawn the replacement.
    HostSpawnFailed,
}

/// The closed set of event types exchanged between roles (§4.4).
///
/// # Invariants
/// - Every variant names both its producer and its consumer in its doc
///   comment; the pairing is enforced by which role's loop matches on it,
///   not by the type system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    /// Developer -> CAB: a task was submitted for review.
    RouteTask {
        /// Task being routed.
        task_id: TaskId,
        /// Status the task transitioned from.
        from_state: TaskStatus,
        /// Status the task transitioned to.
        to_state: TaskStatus,
    },
    /// CAB/Tester/Refinery -> Developer: a task was rejected.
    ReworkNeeded {
        /// Task that was rejected.
        task_id: TaskId,
        /// Human-readable rejection reason.
        reason: String,
    },
    /// CAB -> Tester: run the tests stage.
    RunTests {
        /// Task to test.
        task_id: TaskId,
    },
    /// Tester -> Refinery: run the merge stage.
    SecurityScan {
        /// Task to scan and merge.
        task_id: TaskId,
    },
    /// Refinery -> Supervisor: a merge attempt concluded.
    MergeTask {
        /// Task that was merged or failed to merge.
        task_id: TaskId,
        /// Whether the merge succeeded.
        success: bool,
    },
    /// Refinery -> Librarian: a convoy completed; regenerate its docs.
    UpdateDocs {
        /// Convoy whose docs should be regenerated.
        convoy_id: ConvoyId,
    },
    /// Any role -> Supervisor: a task has failed enough times to escalate.
    EscalateTask {
        /// Task being escalated.
        task_id: TaskId,
        /// Failure count at the time of escalation.
        failure_count: u32,
        /// Coarse escalation cause.
        failure_type: EscalationCause,
        /// The agent bound to the task at the time of escalation.
        last_agent: AgentId,
    },
    /// Supervisor -> observability: restarting a crashed/hung agent failed.
    AgentRestartFailed {
        /// Agent whose restart failed.
        agent_id: AgentId,
        /// Coarse failure cause.
        failure_type: RestartFailureCause,
        /// Task bound to the agent at the time, if any.
        task_id: Option<TaskId>,
        /// Human-readable error detail.
        error: String,
    },
}

impl EventPayload {
    /// Returns the wire name of this event's type, matching §4.4's vocabulary.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::RouteTask { .. } => "ROUTE_TASK",
            Self::ReworkNeeded { .. } => "REWORK_NEEDED",
            Self::RunTests { .. } => "RUN_TESTS",
            Self::SecurityScan { .. } => "SECURITY_SCAN",
            Self::MergeTask { .. } => "MERGE_TASK",
            Self::UpdateDocs { .. } => "UPDATE_DOCS",
            Self::EscalateTask { .. } => "ESCALATE_TASK",
            Self::AgentRestartFailed { .. } => "AGENT_RESTART_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_name_matches_vocabulary_table() {
        let event = EventPayload::RunTests { task_id: TaskId::new("t1") };
        assert_eq!(event.type_name(), "RUN_TESTS");
    }

    #[test]
    fn round_trips_through_json() {
        let event = EventPayload::EscalateTask {
            task_id: TaskId::new("t1"),
            failure_count: 3,
            failure_type: EscalationCause::Rejected,
            last_agent: AgentId::new("dev-001"),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let back: EventPayload = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(event, back);
    }
}
