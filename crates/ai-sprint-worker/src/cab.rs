// crates/ai-sprint-worker/src/cab.rs
// ============================================================================
// Module: CAB Role
// Description: Change Advisory Board: runs the review gate stage.
// Purpose: Implement §4.7's CAB loop: verify, run review gates, route to
//          Tester on pass or reject on fail.
// Dependencies: ai-sprint-core, ai-sprint-queue, ai-sprint-gates, crate::role
// ============================================================================

//! ## Overview
//! CAB only ever reacts to `ROUTE_TASK`. It re-verifies the task is still
//! `in_review` (a defensive check against a stale or duplicate event), runs
//! the `review` gate stage against the submitting developer's worktree, and
//! either advances the task to `in_tests` and routes it to an available
//! Tester, or rejects it with the stage's aggregated failure message.

use ai_sprint_core::errors::CoreError;
use ai_sprint_core::events::EventPayload;
use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::identifiers::EventId;
use ai_sprint_core::model::AgentType;
use ai_sprint_core::model::Event;
use ai_sprint_core::model::EventStatus;
use ai_sprint_core::model::SessionStatus;
use ai_sprint_core::model::TaskStatus;
use ai_sprint_core::store::SessionStore;
use ai_sprint_core::store::TaskStore;
use ai_sprint_core::telemetry::Sink;
use ai_sprint_core::timestamp::Timestamp;
use ai_sprint_gates::GateRegistry;
use ai_sprint_gates::GateStage;
use ai_sprint_queue::EventQueue;

use crate::errors::WorkerError;
use crate::role::Role;
use crate::telemetry::WorkerEvent;

/// Picks the first idle (no bound task) active Tester session, falling back
/// to the first active Tester session if none is idle, by ascending
/// `agent_id`. There is no dedicated Tester-assignment table, so routing
/// picks among whichever Tester sessions are currently live.
///
/// # Errors
///
/// Returns [`CoreError::NotFound`] if no active Tester session exists at all.
pub fn select_tester(sessions: &dyn SessionStore) -> Result<AgentId, CoreError> {
    let mut testers: Vec<_> =
        sessions.list_active()?.into_iter().filter(|session| session.agent_type == AgentType::Tester).collect();
    testers.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
    testers
        .iter()
        .find(|session| session.current_task.is_none())
        .or_else(|| testers.first())
        .map(|session| session.agent_id.clone())
        .ok_or_else(|| CoreError::NotFound("no active tester session".to_string()))
}

/// The CAB worker: runs the review gate stage and routes tasks onward.
pub struct Cab<'a> {
    agent_id: AgentId,
    sessions: &'a dyn SessionStore,
    tasks: &'a dyn TaskStore,
    events: &'a dyn EventQueue,
    telemetry: &'a dyn Sink<WorkerEvent>,
    gates: &'a mut GateRegistry,
}

impl<'a> Cab<'a> {
    /// Creates a CAB role over the given stores, queue, telemetry sink, and
    /// gate registry, recovering any task the session was already bound to.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Store`] if recovery fails to read the session
    /// store.
    pub fn new(
        agent_id: AgentId,
        sessions: &'a dyn SessionStore,
        tasks: &'a dyn TaskStore,
        events: &'a dyn EventQueue,
        telemetry: &'a dyn Sink<WorkerEvent>,
        gates: &'a mut GateRegistry,
    ) -> Result<Self, WorkerError> {
        crate::role::recover(sessions, &agent_id)?;
        Ok(Self { agent_id, sessions, tasks, events, telemetry, gates })
    }

    fn route_task(&mut self, task_id: ai_sprint_core::identifiers::TaskId) -> Result<(), WorkerError> {
        let task = self.tasks.get(&task_id)?;
        if task.status != TaskStatus::InReview {
            return Ok(());
        }
        let working_dir = self.worktree_for(&task)?;
        let result = self.gates.run_stage(GateStage::Review, &working_dir);
        let passed = result.all_passed();
        self.telemetry.record(&WorkerEvent::GateStageRun { task_id: task_id.clone(), stage: GateStage::Review.name(), passed });

        if passed {
            self.tasks.advance(&task_id, TaskStatus::InTests)?;
            let tester = select_tester(self.sessions)?;
            self.events.publish(Event {
                id: EventId::generate(),
                agent_id: tester,
                payload: EventPayload::RunTests { task_id },
                status: EventStatus::Pending,
                created_at: Timestamp::now(),
                processed_at: None,
            })?;
        } else {
            let reason = result.failure_message().unwrap_or_else(|| "review gate failed".to_string());
            let outcome = self.tasks.reject(&task_id, &reason, &self.agent_id)?;
            self.telemetry.record(&WorkerEvent::TaskRejected {
                task_id,
                reason,
                escalated: matches!(outcome, ai_sprint_core::store::RejectOutcome::Escalated { .. }),
            });
        }
        Ok(())
    }

    fn worktree_for(&self, task: &ai_sprint_core::model::Task) -> Result<String, WorkerError> {
        let assignee = task
            .assignee
            .clone()
            .ok_or_else(|| CoreError::NotFound(format!("task {} has no assignee", task.id)))?;
        let session = self.sessions.get(&assignee)?;
        session.worktree.clone().ok_or_else(|| {
            WorkerError::Store(CoreError::NotFound(format!("session {assignee} has no worktree")))
        })
    }
}

impl Role for Cab<'_> {
    fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    fn sessions(&self) -> &dyn SessionStore {
        self.sessions
    }

    fn events(&self) -> &dyn EventQueue {
        self.events
    }

    fn telemetry(&self) -> &dyn Sink<WorkerEvent> {
        self.telemetry
    }

    fn handle_event(&mut self, event: Event) -> Result<(), WorkerError> {
        match event.payload {
            EventPayload::RouteTask { task_id, .. } => self.route_task(task_id),
            other => Err(WorkerError::UnexpectedEvent {
                agent_id: self.agent_id.clone(),
                event_type: other.type_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use ai_sprint_core::model::AgentSession;

    use super::*;

    struct FakeSessions {
        sessions: RefCell<HashMap<String, AgentSession>>,
    }

    impl SessionStore for FakeSessions {
        fn spawn(&self, session: AgentSession) -> Result<(), CoreError> {
            self.sessions.borrow_mut().insert(session.agent_id.as_str().to_string(), session);
            Ok(())
        }
        fn heartbeat(&self, _agent_id: &AgentId) -> Result<(), CoreError> {
            Ok(())
        }
        fn get(&self, agent_id: &AgentId) -> Result<AgentSession, CoreError> {
            self.sessions.borrow().get(agent_id.as_str()).cloned().ok_or_else(|| CoreError::NotFound(agent_id.to_string()))
        }
        fn list_active(&self) -> Result<Vec<AgentSession>, CoreError> {
            Ok(self.sessions.borrow().values().filter(|s| s.status == SessionStatus::Active).cloned().collect())
        }
        fn mark_crashed(&self, _agent_id: &AgentId) -> Result<(), CoreError> {
            Ok(())
        }
        fn mark_hung(&self, _agent_id: &AgentId) -> Result<(), CoreError> {
            Ok(())
        }
        fn mark_stuck(&self, _agent_id: &AgentId) -> Result<(), CoreError> {
            Ok(())
        }
        fn find_resumable_task(&self, _agent_id: &AgentId) -> Result<Option<ai_sprint_core::identifiers::TaskId>, CoreError> {
            Ok(None)
        }
        fn bind_convoy(
            &self,
            _agent_id: &AgentId,
            _convoy_id: Option<&ai_sprint_core::identifiers::ConvoyId>,
        ) -> Result<(), CoreError> {
            Ok(())
        }
        fn bind_task(
            &self,
            _agent_id: &AgentId,
            _task_id: Option<&ai_sprint_core::identifiers::TaskId>,
        ) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn sample_session(agent_id: &str, agent_type: AgentType, current_task: Option<&str>) -> AgentSession {
        AgentSession {
            agent_id: AgentId::new(agent_id),
            agent_type,
            convoy_id: None,
            current_task: current_task.map(ai_sprint_core::identifiers::TaskId::new),
            worktree: None,
            status: SessionStatus::Active,
            last_heartbeat: Timestamp::now(),
            started_at: Timestamp::now(),
            crashed_at: None,
        }
    }

    #[test]
    fn select_tester_prefers_an_idle_one() {
        let sessions = FakeSessions { sessions: RefCell::new(HashMap::new()) };
        sessions.spawn(sample_session("tester-001", AgentType::Tester, Some("t1"))).expect("spawn");
        sessions.spawn(sample_session("tester-002", AgentType::Tester, None)).expect("spawn");

        let picked = select_tester(&sessions).expect("select");
        assert_eq!(picked, AgentId::new("tester-002"));
    }

    #[test]
    fn select_tester_falls_back_when_none_idle() {
        let sessions = FakeSessions { sessions: RefCell::new(HashMap::new()) };
        sessions.spawn(sample_session("tester-001", AgentType::Tester, Some("t1"))).expect("spawn");

        let picked = select_tester(&sessions).expect("select");
        assert_eq!(picked, AgentId::new("tester-001"));
    }

    #[test]
    fn select_tester_errors_when_none_active() {
        let sessions = FakeSessions { sessions: RefCell::new(HashMap::new()) };
        assert!(select_tester(&sessions).is_err());
    }
}
