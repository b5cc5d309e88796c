// crates/ai-sprint-worker/src/developer.rs
// ============================================================================
// Module: Developer Role
// Description: Claims and implements tasks, submitting them for review.
// Purpose: Implement §4.7's Developer loop: claim_next_task when idle,
//          resume on REWORK_NEEDED, submit to CAB.
// Dependencies: ai-sprint-core, ai-sprint-queue, crate::role, crate::telemetry
// ============================================================================

//! ## Overview
//! The Developer is the only role with a non-trivial idle action: when it
//! has no pending event and no task bound to its session, it claims the
//! oldest unclaimed task under its bound convoy. On `REWORK_NEEDED` it keeps
//! (or re-binds) the named task rather than claiming a new one; the task
//! itself is already back in `in_progress`, the store having performed that
//! transition as part of `reject`.

use ai_sprint_core::events::EventPayload;
use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::identifiers::CAB_AGENT_ID;
use ai_sprint_core::identifiers::ConvoyId;
use ai_sprint_core::identifiers::EventId;
use ai_sprint_core::identifiers::TaskId;
use ai_sprint_core::model::Event;
use ai_sprint_core::model::EventStatus;
use ai_sprint_core::model::TaskStatus;
use ai_sprint_core::store::SessionStore;
use ai_sprint_core::store::TaskStore;
use ai_sprint_core::telemetry::Sink;
use ai_sprint_core::timestamp::Timestamp;
use ai_sprint_queue::EventQueue;

use crate::errors::WorkerError;
use crate::role::Role;
use crate::telemetry::WorkerEvent;

/// A Developer worker: implements tasks, submits them for CAB review, and
/// resumes rejected tasks on `REWORK_NEEDED`.
pub struct Developer<'a> {
    agent_id: AgentId,
    sessions: &'a dyn SessionStore,
    tasks: &'a dyn TaskStore,
    events: &'a dyn EventQueue,
    telemetry: &'a dyn Sink<WorkerEvent>,
    /// The convoy this developer is bound to; `claim_next_task` draws from
    /// this convoy's unclaimed tasks when idle.
    convoy_id: Option<ConvoyId>,
}

impl<'a> Developer<'a> {
    /// Creates a Developer bound to `agent_id`, initially working `convoy_id`
    /// if given, recovering any task the session was already bound to.
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
        convoy_id: Option<ConvoyId>,
    ) -> Result<Self, WorkerError> {
        crate::role::recover(sessions, &agent_id)?;
        Ok(Self { agent_id, sessions, tasks, events, telemetry, convoy_id })
    }

    /// Binds this developer to a newly allocated convoy, replacing any prior
    /// binding.
    pub fn bind_convoy(&mut self, convoy_id: ConvoyId) {
        self.convoy_id = Some(convoy_id);
    }

    /// Claims the oldest unclaimed task under the bound convoy, if this
    /// developer is currently idle (has no task bound to its session).
    ///
    /// Returns the claimed task id, or `None` if there is no bound convoy,
    /// the developer already has a task, or nothing is claimable.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Store`] on a storage failure.
    pub fn claim_next_task(&mut self) -> Result<Option<TaskId>, WorkerError> {
        let Some(convoy_id) = self.convoy_id.clone() else {
            return Ok(None);
        };
        let session = self.sessions.get(&self.agent_id)?;
        if session.current_task.is_some() {
            return Ok(None);
        }
        let Some(task_id) = self.tasks.claim_next(&convoy_id, &self.agent_id)? else {
            return Ok(None);
        };
        self.sessions.bind_task(&self.agent_id, Some(&task_id))?;
        Ok(Some(task_id))
    }

    /// Submits a task for review: transitions `in_progress -> in_review` and
    /// publishes `ROUTE_TASK` to CAB.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Store`] if the transition is illegal, or
    /// [`WorkerError::Queue`] if publishing fails.
    pub fn submit_task(&mut self, task_id: &TaskId) -> Result<(), WorkerError> {
        self.tasks.advance(task_id, TaskStatus::InReview)?;
        self.events.publish(Event {
            id: EventId::generate(),
            agent_id: AgentId::new(CAB_AGENT_ID),
            payload: EventPayload::RouteTask {
                task_id: task_id.clone(),
                from_state: TaskStatus::InProgress,
                to_state: TaskStatus::InReview,
            },
            status: EventStatus::Pending,
            created_at: Timestamp::now(),
            processed_at: None,
        })?;
        Ok(())
    }
}

impl Role for Developer<'_> {
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
            EventPayload::ReworkNeeded { task_id, .. } => {
                self.sessions.bind_task(&self.agent_id, Some(&task_id))?;
                Ok(())
            }
            other => Err(WorkerError::UnexpectedEvent {
                agent_id: self.agent_id.clone(),
                event_type: other.type_name(),
            }),
        }
    }

    fn idle_action(&mut self) -> Result<(), WorkerError> {
        self.claim_next_task().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::collections::VecDeque;

    use ai_sprint_core::errors::CoreError;
    use ai_sprint_core::model::AgentSession;
    use ai_sprint_core::model::AgentType;
    use ai_sprint_core::model::SessionStatus;
    use ai_sprint_core::model::Task;
    use ai_sprint_core::store::RejectOutcome;
    use ai_sprint_core::telemetry::NullSink;
    use ai_sprint_queue::QueueError;

    use super::*;

    struct FakeSessions {
        session: RefCell<AgentSession>,
    }

    impl SessionStore for FakeSessions {
        fn spawn(&self, _session: AgentSession) -> Result<(), CoreError> {
            Ok(())
        }

        fn heartbeat(&self, _agent_id: &AgentId) -> Result<(), CoreError> {
            Ok(())
        }

        fn get(&self, _agent_id: &AgentId) -> Result<AgentSession, CoreError> {
            Ok(self.session.borrow().clone())
        }

        fn list_active(&self) -> Result<Vec<AgentSession>, CoreError> {
            Ok(vec![self.session.borrow().clone()])
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

        fn find_resumable_task(&self, _agent_id: &AgentId) -> Result<Option<TaskId>, CoreError> {
            Ok(None)
        }

        fn bind_convoy(&self, _agent_id: &AgentId, convoy_id: Option<&ConvoyId>) -> Result<(), CoreError> {
            self.session.borrow_mut().convoy_id = convoy_id.cloned();
            Ok(())
        }

        fn bind_task(&self, _agent_id: &AgentId, task_id: Option<&TaskId>) -> Result<(), CoreError> {
            self.session.borrow_mut().current_task = task_id.cloned();
            Ok(())
        }
    }

    struct FakeTasks {
        claimable: RefCell<Option<TaskId>>,
        advanced: RefCell<Vec<(TaskId, TaskStatus)>>,
    }

    impl TaskStore for FakeTasks {
        fn create_many(&self, _tasks: Vec<Task>) -> Result<(), CoreError> {
            Ok(())
        }

        fn get(&self, id: &TaskId) -> Result<Task, CoreError> {
            Err(CoreError::NotFound(id.to_string()))
        }

        fn list_by_convoy(&self, _convoy_id: &ConvoyId) -> Result<Vec<Task>, CoreError> {
            Ok(Vec::new())
        }

        fn claim(&self, _id: &TaskId, _agent_id: &AgentId) -> Result<bool, CoreError> {
            Ok(false)
        }

        fn claim_next(&self, _convoy_id: &ConvoyId, _agent_id: &AgentId) -> Result<Option<TaskId>, CoreError> {
            Ok(self.claimable.borrow_mut().take())
        }

        fn advance(&self, id: &TaskId, to: TaskStatus) -> Result<(), CoreError> {
            self.advanced.borrow_mut().push((id.clone(), to));
            Ok(())
        }

        fn record_validation(
            &self,
            _id: &TaskId,
            _results: ai_sprint_core::model::ValidationResults,
        ) -> Result<(), CoreError> {
            Ok(())
        }

        fn reject(&self, _id: &TaskId, _reason: &str, _rejecting_agent: &AgentId) -> Result<RejectOutcome, CoreError> {
            unimplemented!("not exercised by these tests")
        }
    }

    struct FakeQueue {
        published: RefCell<VecDeque<Event>>,
    }

    impl EventQueue for FakeQueue {
        fn publish(&self, event: Event) -> Result<(), QueueError> {
            self.published.borrow_mut().push_back(event);
            Ok(())
        }

        fn consume(&self, _agent_id: &AgentId) -> Result<Option<Event>, QueueError> {
            Ok(None)
        }

        fn acknowledge(
            &self,
            _event_id: &ai_sprint_core::identifiers::EventId,
            _outcome: EventStatus,
        ) -> Result<(), QueueError> {
            Ok(())
        }
    }

    fn fake_session() -> AgentSession {
        AgentSession {
            agent_id: AgentId::new("dev-001"),
            agent_type: AgentType::Developer,
            convoy_id: None,
            current_task: None,
            worktree: None,
            status: SessionStatus::Active,
            last_heartbeat: Timestamp::now(),
            started_at: Timestamp::now(),
            crashed_at: None,
        }
    }

    #[test]
    fn claim_next_task_binds_the_claimed_task() {
        let sessions = FakeSessions { session: RefCell::new(fake_session()) };
        let tasks = FakeTasks { claimable: RefCell::new(Some(TaskId::new("t1"))), advanced: RefCell::new(Vec::new()) };
        let events = FakeQueue { published: RefCell::new(VecDeque::new()) };
        let sink = NullSink;
        let mut developer = Developer::new(
            AgentId::new("dev-001"),
            &sessions,
            &tasks,
            &events,
            &sink,
            Some(ConvoyId::new("c1")),
        )
        .expect("new");

        let claimed = developer.claim_next_task().expect("claim");
        assert_eq!(claimed, Some(TaskId::new("t1")));
        assert_eq!(sessions.session.borrow().current_task, Some(TaskId::new("t1")));
    }

    #[test]
    fn claim_next_task_is_a_no_op_when_already_bound() {
        let mut session = fake_session();
        session.current_task = Some(TaskId::new("t0"));
        let sessions = FakeSessions { session: RefCell::new(session) };
        let tasks = FakeTasks { claimable: RefCell::new(Some(TaskId::new("t1"))), advanced: RefCell::new(Vec::new()) };
        let events = FakeQueue { published: RefCell::new(VecDeque::new()) };
        let sink = NullSink;
        let mut developer = Developer::new(
            AgentId::new("dev-001"),
            &sessions,
            &tasks,
            &events,
            &sink,
            Some(ConvoyId::new("c1")),
        )
        .expect("new");

        let claimed = developer.claim_next_task().expect("claim");
        assert_eq!(claimed, None);
    }

    #[test]
    fn submit_task_advances_and_routes_to_cab() {
        let sessions = FakeSessions { session: RefCell::new(fake_session()) };
        let tasks = FakeTasks { claimable: RefCell::new(None), advanced: RefCell::new(Vec::new()) };
        let events = FakeQueue { published: RefCell::new(VecDeque::new()) };
        let sink = NullSink;
        let mut developer =
            Developer::new(AgentId::new("dev-001"), &sessions, &tasks, &events, &sink, Some(ConvoyId::new("c1")))
                .expect("new");

        developer.submit_task(&TaskId::new("t1")).expect("submit");

        assert_eq!(tasks.advanced.borrow().as_slice(), [(TaskId::new("t1"), TaskStatus::InReview)]);
        let published = events.published.borrow();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].agent_id, AgentId::new(CAB_AGENT_ID));
        assert!(matches!(published[0].payload, EventPayload::RouteTask { .. }));
    }

    #[test]
    fn rework_needed_rebinds_the_task() {
        let sessions = FakeSessions { session: RefCell::new(fake_session()) };
        let tasks = FakeTasks { claimable: RefCell::new(None), advanced: RefCell::new(Vec::new()) };
        let events = FakeQueue { published: RefCell::new(VecDeque::new()) };
        let sink = NullSink;
        let mut developer =
            Developer::new(AgentId::new("dev-001"), &sessions, &tasks, &events, &sink, Some(ConvoyId::new("c1")))
                .expect("new");

        developer
            .handle_event(Event {
                id: EventId::generate(),
                agent_id: AgentId::new("dev-001"),
                payload: EventPayload::ReworkNeeded { task_id: TaskId::new("t1"), reason: "lint".to_string() },
                status: EventStatus::Processing,
                created_at: Timestamp::now(),
                processed_at: None,
            })
            .expect("handle");

        assert_eq!(sessions.session.borrow().current_task, Some(TaskId::new("t1")));
    }
}
