// crates/ai-sprint-health/src/restart.rs
// ============================================================================
// Module: Restart Policy
// Description: Pure projection from a crashed/hung session onto what must
//              be re-spawned to replace it.
// Purpose: Keep the "what to restart" decision free of the process-host
//          I/O the Supervisor performs with it (§4.6).
// Dependencies: ai-sprint-core
// ============================================================================

//! ## Overview
//! Restarting an agent means destroying any residual host session, reading
//! back what that session was doing, and spawning an equivalent worker with
//! the same agent id. [`plan_restart`] is the pure half of that: it reads
//! the session row and says what needs to exist again. The Supervisor pairs
//! it with [`ai_sprint_core::interfaces::ProcessHost`] calls and, on
//! failure, publishes `AGENT_RESTART_FAILED` (§4.4) rather than retrying
//! indefinitely.

use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::identifiers::ConvoyId;
use ai_sprint_core::identifiers::TaskId;
use ai_sprint_core::model::AgentSession;
use ai_sprint_core::model::AgentType;

/// Everything needed to spawn a replacement for one crashed or hung session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartDirective {
    /// The agent id the replacement must reuse, so the fresh worker's first
    /// heartbeat re-creates the same identity.
    pub agent_id: AgentId,
    /// The role to spawn.
    pub agent_type: AgentType,
    /// The convoy the replacement should bind to, if the original had one.
    pub convoy_id: Option<ConvoyId>,
    /// The task the replacement should resume, if the original had one.
    pub current_task: Option<TaskId>,
    /// The worktree path to reuse, if the original had one.
    pub worktree: Option<String>,
}

/// Projects a crashed/hung [`AgentSession`] onto the directive needed to
/// spawn its replacement. Does not touch the process host or any store;
/// the caller destroys the residual session and spawns the new one.
#[must_use]
pub fn plan_restart(session: &AgentSession) -> RestartDirective {
    RestartDirective {
        agent_id: session.agent_id.clone(),
        agent_type: session.agent_type,
        convoy_id: session.convoy_id.clone(),
        current_task: session.current_task.clone(),
        worktree: session.worktree.clone(),
    }
}

#[cfg(test)]
mod tests {
    use ai_sprint_core::model::SessionStatus;
    use ai_sprint_core::timestamp::Timestamp;

    use super::*;

    #[test]
    fn plan_restart_carries_over_binding_and_worktree() {
        let session = AgentSession {
            agent_id: AgentId::new("dev-001"),
            agent_type: AgentType::Developer,
            convoy_id: Some(ConvoyId::new("convoy-1")),
            current_task: Some(TaskId::new("task-1")),
            worktree: Some("/work/dev-001".to_string()),
            status: SessionStatus::Crashed,
            last_heartbeat: Timestamp::now(),
            started_at: Timestamp::now(),
            crashed_at: Some(Timestamp::now()),
        };

        let directive = plan_restart(&session);

        assert_eq!(directive.agent_id, AgentId::new("dev-001"));
        assert_eq!(directive.convoy_id, Some(ConvoyId::new("convoy-1")));
        assert_eq!(directive.current_task, Some(TaskId::new("task-1")));
        assert_eq!(directive.worktree.as_deref(), Some("/work/dev-001"));
    }
}
