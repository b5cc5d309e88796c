// crates/ai-sprint-core/src/store.rs
// ============================================================================
// Module: State Store Interfaces
// Description: Backend-agnostic traits for the five entity stores.
// Purpose: Let `ai-sprint-store-sqlite` be the only crate that knows SQL,
//          while workers and the health monitor code against these traits.
// Dependencies: crate::errors, crate::identifiers, crate::model, std
// ============================================================================

//! ## Overview
//! Unlike [`crate::interfaces`]'s process/VCS hosts, the state store is
//! firmly in scope for the coordination plane (§4.1): these traits are the
//! in-scope contract a concrete embedded-database backend must satisfy.
//! `ai-sprint-store-sqlite::SqliteStore` is the one shipped implementation.

use crate::errors::CoreError;
use crate::identifiers::AgentId;
use crate::identifiers::ConvoyId;
use crate::identifiers::FeatureId;
use crate::identifiers::TaskId;
use crate::model::AgentSession;
use crate::model::Convoy;
use crate::model::Feature;
use crate::model::Task;
use crate::model::ValidationResults;

/// Outcome of a [`TaskStore::reject`] call, telling the caller which
/// follow-on event(s) the store already published atomically alongside the
/// status mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectOutcome {
    /// The task returned to `in_progress` for rework; `failure_count` is the
    /// new count.
    ReturnedForRework {
        /// Failure count after this rejection.
        failure_count: u32,
    },
    /// `failure_count` reached 3; the task was unassigned, returned to
    /// `todo`, and escalated.
    Escalated {
        /// Failure count after this rejection (always 3 or more).
        failure_count: u32,
    },
}

/// Durable storage for [`Feature`] records.
pub trait FeatureStore {
    /// Inserts a new feature in `ready` status.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IntegrityError`] if the id is already taken.
    fn create(&self, feature: Feature) -> Result<(), CoreError>;

    /// Loads a feature by id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such feature exists.
    fn get(&self, id: &FeatureId) -> Result<Feature, CoreError>;

    /// Lists every feature currently in `ready` status.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] on a storage failure.
    fn list_ready(&self) -> Result<Vec<Feature>, CoreError>;

    /// Advances a `ready` feature to `in_progress`, stamping `started_at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalTransition`] if the feature is not `ready`.
    fn advance_to_in_progress(&self, id: &FeatureId) -> Result<(), CoreError>;

    /// Marks a feature `done`, stamping `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalTransition`] if the feature is not `in_progress`.
    fn mark_done(&self, id: &FeatureId) -> Result<(), CoreError>;

    /// Marks a feature `failed`, stamping `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalTransition`] if the feature is already terminal.
    fn mark_failed(&self, id: &FeatureId) -> Result<(), CoreError>;
}

/// Durable storage for [`Convoy`] records, including the allocator (§4.5).
pub trait ConvoyStore {
    /// Creates a batch of convoys for one feature, atomically.
    ///
    /// Validates Invariant F1 (pairwise file disjointness among non-`done`
    /// convoys) and Invariant F2 (dependency acyclicity) before inserting
    /// anything; marks convoys whose dependencies are not all `done` as
    /// `blocked` rather than `available`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IntegrityError`] naming the offending file path
    /// or convoy id when F1 or F2 is violated.
    fn create_many(&self, convoys: Vec<Convoy>) -> Result<(), CoreError>;

    /// Loads a convoy by id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such convoy exists.
    fn get(&self, id: &ConvoyId) -> Result<Convoy, CoreError>;

    /// Lists every convoy under a feature.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] on a storage failure.
    fn list_by_feature(&self, feature_id: &FeatureId) -> Result<Vec<Convoy>, CoreError>;

    /// Atomically allocates the next available convoy to `agent_id`,
    /// honoring priority-then-created_at ordering and dependency gating.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] on a storage failure. Returns `Ok(None)` rather
    /// than an error when nothing is allocatable.
    fn allocate_next(&self, feature_id: &FeatureId, agent_id: &AgentId) -> Result<Option<ConvoyId>, CoreError>;

    /// Sweeps a feature's `blocked` convoys, flipping to `available` any
    /// whose dependencies are now all `done`, and flipping to `blocked` any
    /// `available` convoy whose dependencies are not all `done`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] on a storage failure.
    fn sweep_block_unblock(&self, feature_id: &FeatureId) -> Result<(), CoreError>;

    /// Flips a convoy to `done` if every task under it is `done`, returning
    /// whether the flip occurred.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such convoy exists.
    fn mark_done_if_complete(&self, id: &ConvoyId) -> Result<bool, CoreError>;
}

/// Durable storage for [`Task`] records, including the state machine (§4.3).
pub trait TaskStore {
    /// Creates a batch of tasks under one convoy.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the owning convoy does not exist.
    fn create_many(&self, tasks: Vec<Task>) -> Result<(), CoreError>;

    /// Loads a task by id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such task exists.
    fn get(&self, id: &TaskId) -> Result<Task, CoreError>;

    /// Lists every task under a convoy.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] on a storage failure.
    fn list_by_convoy(&self, convoy_id: &ConvoyId) -> Result<Vec<Task>, CoreError>;

    /// Atomically claims a `todo`, unassigned task for `agent_id`.
    ///
    /// Returns `true` if this call won the race, `false` if the task was
    /// already claimed or not in `todo`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such task exists.
    fn claim(&self, id: &TaskId, agent_id: &AgentId) -> Result<bool, CoreError>;

    /// Atomically claims the oldest unassigned `todo` task under a convoy.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] on a storage failure. Returns `Ok(None)` rather
    /// than an error when nothing is claimable.
    fn claim_next(&self, convoy_id: &ConvoyId, agent_id: &AgentId) -> Result<Option<TaskId>, CoreError>;

    /// Transitions a task forward by one legal step (e.g. `in_progress ->
    /// in_review`, `in_review -> in_tests`, `in_docs -> done`).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalTransition`] if the task is not in `from`.
    fn advance(&self, id: &TaskId, to: crate::model::TaskStatus) -> Result<(), CoreError>;

    /// Records structured test output on a task.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such task exists.
    fn record_validation(&self, id: &TaskId, results: ValidationResults) -> Result<(), CoreError>;

    /// Rejects a task: increments `failure_count`, records `reason`, and
    /// either returns it to `in_progress` for rework or escalates it (clears
    /// the assignee and returns it to `todo`) if `failure_count` reaches 3,
    /// atomically with publishing the corresponding event.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalTransition`] if the task is not in a
    /// rejectable state (`in_review`, `in_tests`, or `in_docs`).
    fn reject(&self, id: &TaskId, reason: &str, rejecting_agent: &AgentId) -> Result<RejectOutcome, CoreError>;
}

/// Durable storage for [`AgentSession`] records.
pub trait SessionStore {
    /// Inserts a new session in `active` status.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IntegrityError`] if the agent id is already in use.
    fn spawn(&self, session: AgentSession) -> Result<(), CoreError>;

    /// Stamps a fresh `last_heartbeat` for an `active` session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no active session exists for that id.
    fn heartbeat(&self, agent_id: &AgentId) -> Result<(), CoreError>;

    /// Loads a session by id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such session exists.
    fn get(&self, agent_id: &AgentId) -> Result<AgentSession, CoreError>;

    /// Lists every session currently `active`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] on a storage failure.
    fn list_active(&self) -> Result<Vec<AgentSession>, CoreError>;

    /// Marks a session `crashed`, stamping `crashed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such session exists.
    fn mark_crashed(&self, agent_id: &AgentId) -> Result<(), CoreError>;

    /// Marks a session `hung`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such session exists.
    fn mark_hung(&self, agent_id: &AgentId) -> Result<(), CoreError>;

    /// Marks a session `stuck`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such session exists.
    fn mark_stuck(&self, agent_id: &AgentId) -> Result<(), CoreError>;

    /// Finds the most-recent non-terminal task assigned to `agent_id`, for
    /// use by a freshly (re)started worker's `recover()` call.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] on a storage failure.
    fn find_resumable_task(&self, agent_id: &AgentId) -> Result<Option<TaskId>, CoreError>;

    /// Binds or clears the convoy a session is currently working, e.g. when
    /// the Developer role's `claim_next_task` allocates a convoy, or when a
    /// convoy completes and the binding is released.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such session exists.
    fn bind_convoy(&self, agent_id: &AgentId, convoy_id: Option<&ConvoyId>) -> Result<(), CoreError>;

    /// Binds or clears the task a session is currently working. The Health
    /// Monitor's stuck sweep reads this binding to find the task to report
    /// alongside a stuck session (§4.6).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such session exists.
    fn bind_task(&self, agent_id: &AgentId, task_id: Option<&TaskId>) -> Result<(), CoreError>;
}
