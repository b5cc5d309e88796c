// crates/ai-sprint-worker/src/telemetry.rs
// ============================================================================
// Module: Worker Telemetry
// Description: The typed event vocabulary worker-role loops emit.
// Purpose: Give every role loop one place to report what it did, without
//          pulling in a logging framework (per the workspace's dependency-
//          light observability idiom).
// Dependencies: ai-sprint-core::telemetry
// ============================================================================

//! ## Overview
//! Each role's [`crate::role::Role::tick`] records a [`WorkerEvent`] through
//! a constructor-injected [`ai_sprint_core::telemetry::Sink`], the same
//! pattern `ai-sprint-health` would use if it emitted telemetry directly.

use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::identifiers::ConvoyId;
use ai_sprint_core::identifiers::FeatureId;
use ai_sprint_core::identifiers::TaskId;

/// One observable occurrence in a worker-role loop.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A role stamped its heartbeat.
    Heartbeat {
        /// The role that heartbeat.
        agent_id: AgentId,
    },
    /// A role consumed an event from its queue.
    EventConsumed {
        /// The role that consumed the event.
        agent_id: AgentId,
        /// The event's wire type name.
        event_type: &'static str,
    },
    /// A role finished acting on a consumed event.
    EventAcknowledged {
        /// The role that acknowledged the event.
        agent_id: AgentId,
        /// The event's wire type name.
        event_type: &'static str,
        /// Whether the role's action succeeded.
        success: bool,
    },
    /// A role found nothing to consume and ran its idle action instead.
    Idled {
        /// The role that idled.
        agent_id: AgentId,
    },
    /// CAB, Tester, or Refinery ran a gate stage against a task.
    GateStageRun {
        /// The task the stage ran against.
        task_id: TaskId,
        /// The stage name (`review`, `tests`, `merge`).
        stage: &'static str,
        /// Whether every required gate passed.
        passed: bool,
    },
    /// A task was rejected back to the Developer, or escalated.
    TaskRejected {
        /// The task that was rejected.
        task_id: TaskId,
        /// The human-readable rejection reason.
        reason: String,
        /// Whether the rejection escalated the task rather than returning
        /// it for rework.
        escalated: bool,
    },
    /// The Supervisor attempted to restart a crashed or hung session.
    RestartAttempted {
        /// The session that was restarted.
        agent_id: AgentId,
        /// Whether the restart succeeded.
        succeeded: bool,
    },
    /// The Supervisor materialized a ready feature into convoys and tasks.
    FeatureMaterialized {
        /// The feature that was materialized.
        feature_id: FeatureId,
        /// How many convoys were created.
        convoy_count: usize,
    },
    /// The Supervisor failed to materialize a feature.
    FeatureMaterializationFailed {
        /// The feature that failed to materialize.
        feature_id: FeatureId,
        /// The failure reason.
        reason: String,
    },
    /// The Librarian regenerated a convoy's docs.
    DocsRegenerated {
        /// The convoy whose docs were regenerated.
        convoy_id: ConvoyId,
    },
}
