// crates/ai-sprint-core/src/model.rs
// ============================================================================
// Module: Data Model
// Description: The five core entities of the coordination plane.
// Purpose: Define the durable record shapes owned by the State Store.
// Dependencies: crate::identifiers, crate::time, serde, std
// ============================================================================

//! ## Overview
//! Feature, Convoy, Task, Event, and AgentSession are the five entities the
//! State Store persists. None of these types embed storage concerns; they
//! are plain records that `ai-sprint-store-sqlite` reads and writes whole.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::AgentId;
use crate::identifiers::ConvoyId;
use crate::identifiers::EventId;
use crate::identifiers::FeatureId;
use crate::identifiers::TaskId;
use crate::timestamp::Timestamp;

// ============================================================================
// SECTION: Feature
// ============================================================================

/// Lifecycle status of a [`Feature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    /// Externally created, not yet materialized into convoys.
    Ready,
    /// The Supervisor has materialized convoys and is driving them.
    InProgress,
    /// Every convoy under the feature is `done`.
    Done,
    /// Convoy materialization failed irrecoverably.
    Failed,
}

/// A unit of work, externally specified, decomposed into convoys.
///
/// # Invariants
/// - `status` only ever advances `Ready -> InProgress -> {Done, Failed}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature identifier; also the basename of its input directory.
    pub id: FeatureId,
    /// Human-readable name.
    pub name: String,
    /// Filesystem path to the feature's spec artifact.
    pub spec_path: String,
    /// Current lifecycle status.
    pub status: FeatureStatus,
    /// Instant the feature was created.
    pub created_at: Timestamp,
    /// Instant the Supervisor first advanced the feature to `in_progress`.
    pub started_at: Option<Timestamp>,
    /// Instant the feature reached a terminal status.
    pub completed_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Convoy
// ============================================================================

/// Lifecycle status of a [`Convoy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvoyStatus {
    /// Eligible for allocation.
    Available,
    /// Allocated to a developer and being worked.
    InProgress,
    /// Every task under the convoy is `done`.
    Done,
    /// Waiting on one or more dependency convoys.
    Blocked,
}

/// An orderable priority tag; `P1` sorts before `P2` sorts before `P3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// Highest priority class.
    P1,
    /// Middle priority class.
    P2,
    /// Lowest priority class.
    P3,
}

/// A bundle of related tasks scoped to a disjoint file set, assigned to one
/// developer.
///
/// # Invariants
/// - **F1 (file disjointness):** within one feature, the file sets of any two
///   non-`Done` convoys are disjoint.
/// - **F2 (dependency acyclicity):** the dependency graph on convoys of a
///   feature is a DAG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Convoy {
    /// Convoy identifier.
    pub id: ConvoyId,
    /// Owning feature.
    pub feature_id: FeatureId,
    /// Short descriptive story name.
    pub story: String,
    /// Priority class.
    pub priority: Priority,
    /// Current lifecycle status.
    pub status: ConvoyStatus,
    /// Unordered set of file paths this convoy owns.
    pub files: BTreeSet<String>,
    /// Convoys that must reach `Done` before this one can become available.
    pub dependencies: BTreeSet<ConvoyId>,
    /// Developer currently assigned, if allocated.
    pub assignee: Option<AgentId>,
    /// Instant the convoy was created.
    pub created_at: Timestamp,
    /// Instant the convoy was allocated.
    pub started_at: Option<Timestamp>,
    /// Instant the convoy reached `Done`.
    pub completed_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Task
// ============================================================================

/// Lifecycle status of a [`Task`], per the state machine in `ai-sprint-core::state_machine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Unclaimed, awaiting a developer.
    Todo,
    /// Claimed and being implemented, or returned here for rework.
    InProgress,
    /// Submitted; awaiting CAB review.
    InReview,
    /// Approved by CAB; awaiting Tester.
    InTests,
    /// Tested; awaiting Refinery's merge + doc update.
    InDocs,
    /// Terminal: merged.
    Done,
}

impl TaskStatus {
    /// Returns whether this status is terminal (no further transitions).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

/// One opaque acceptance-criterion entry attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCriterion {
    /// Free-form criterion description.
    pub description: String,
    /// Whether the criterion has been satisfied.
    #[serde(default)]
    pub satisfied: bool,
}

/// Structured validation output recorded by the Tester.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResults {
    /// Coverage percentage in `[0, 100]`.
    pub coverage_percent: Option<f64>,
    /// Mutation score percentage in `[0, 100]`.
    pub mutation_percent: Option<f64>,
}

/// The smallest unit of work; traverses the task state machine.
///
/// # Invariants
/// - **T1:** at most one assignee per non-terminal task.
/// - **T2:** if `failure_count >= 3` the task must have been escalated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub id: TaskId,
    /// Owning convoy.
    pub convoy_id: ConvoyId,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Primary file path this task edits.
    pub file_path: String,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Priority, inherited from the owning convoy.
    pub priority: Priority,
    /// Opaque acceptance-criteria list.
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    /// Developer or role currently assigned, if any.
    pub assignee: Option<AgentId>,
    /// Structured validation output, once tested.
    pub validation_results: Option<ValidationResults>,
    /// Human-readable reason for the most recent rejection or escalation.
    pub failure_reason: Option<String>,
    /// Count of rejections since the task last returned to `Todo`.
    pub failure_count: u32,
    /// Instant the task was created.
    pub created_at: Timestamp,
    /// Instant the task was first claimed.
    pub started_at: Option<Timestamp>,
    /// Instant the task reached `Done`.
    pub completed_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Event
// ============================================================================

/// Lifecycle status of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Published, awaiting consumption by its target agent.
    Pending,
    /// Consumed; awaiting acknowledgement.
    Processing,
    /// Acknowledged successfully.
    Done,
    /// Acknowledged as failed.
    Failed,
}

/// A durable, per-target FIFO message used for inter-role coordination.
///
/// # Invariants
/// - Ordering within one `agent_id` is FIFO by `created_at`.
/// - An event leaves `Processing` only via acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Target agent.
    pub agent_id: AgentId,
    /// Event type and its structured payload.
    pub payload: crate::events::EventPayload,
    /// Current lifecycle status.
    pub status: EventStatus,
    /// Instant the event was published.
    pub created_at: Timestamp,
    /// Instant the event was acknowledged, if any.
    pub processed_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Agent Session
// ============================================================================

/// The role a worker process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// The Supervisor / Manager role.
    Manager,
    /// Change Advisory Board: review gate.
    Cab,
    /// Merge + security-scan stage.
    Refinery,
    /// Documentation regeneration.
    Librarian,
    /// Implements tasks.
    Developer,
    /// Runs the tests stage.
    Tester,
}

/// Lifecycle status of an [`AgentSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Heartbeating normally.
    Active,
    /// Underlying process no longer exists.
    Crashed,
    /// No heartbeat within the hung threshold.
    Hung,
    /// Bound task has exceeded its maximum duration.
    Stuck,
}

/// The bookkeeping row describing one live worker process.
///
/// # Invariants
/// - `status` is mutated only by the Health Monitor and the Supervisor's
///   restart action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSession {
    /// Agent identifier, e.g. `dev-001`.
    pub agent_id: AgentId,
    /// Role this session plays.
    pub agent_type: AgentType,
    /// Convoy currently bound, if any.
    pub convoy_id: Option<ConvoyId>,
    /// Task currently bound, if any.
    pub current_task: Option<TaskId>,
    /// Filesystem worktree path, if any.
    pub worktree: Option<String>,
    /// Current health status.
    pub status: SessionStatus,
    /// Instant of the most recent heartbeat.
    pub last_heartbeat: Timestamp,
    /// Instant the session was spawned.
    pub started_at: Timestamp,
    /// Instant the session was marked crashed, if applicable.
    pub crashed_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_p1_before_p3() {
        assert!(Priority::P1 < Priority::P2);
        assert!(Priority::P2 < Priority::P3);
    }

    #[test]
    fn terminal_status_is_only_done() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(!TaskStatus::Todo.is_terminal());
        assert!(!TaskStatus::InDocs.is_terminal());
    }
}
