// crates/ai-sprint-health/src/recovery.rs
// ============================================================================
// Module: Recovery Anchor
// Description: What a freshly (re)spawned worker asks the state store for
//              before it resumes work.
// Purpose: Name the one read every worker's startup sequence performs,
//          since transient in-process context is never the source of
//          truth (§3's "recovery anchor").
// Dependencies: ai-sprint-core
// ============================================================================

//! ## Overview
//! A worker owns no durable state of its own: everything it was doing must
//! be reconstructible from the State Store. On startup (fresh spawn or
//! post-crash restart with a reused `agent_id`), a worker calls
//! [`recover_task`] to find the most-recent non-terminal task it was bound
//! to and resumes from there, rather than starting cold. §8's scenario S6
//! depends on this: a replacement session with the same `agent_id` finds
//! the task its predecessor was mid-way through and continues it, with the
//! task's own status and assignee untouched throughout.

use ai_sprint_core::errors::CoreError;
use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::identifiers::TaskId;
use ai_sprint_core::store::SessionStore;

/// Finds the task a (re)spawned worker with `agent_id` should resume, if
/// any.
///
/// # Errors
///
/// Returns a store error on a storage failure.
pub fn recover_task(sessions: &dyn SessionStore, agent_id: &AgentId) -> Result<Option<TaskId>, CoreError> {
    sessions.find_resumable_task(agent_id)
}
