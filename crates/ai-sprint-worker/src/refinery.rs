// crates/ai-sprint-worker/src/refinery.rs
// ============================================================================
// Module: Refinery Role
// Description: Runs the merge gate stage and performs the merge itself.
// Purpose: Implement §4.7's Refinery loop: verify, run merge gates, merge,
//          route to Supervisor on success, reject on any failure, and
//          trigger Librarian when a convoy completes.
// Dependencies: ai-sprint-core, ai-sprint-queue, ai-sprint-gates, crate::role
// ============================================================================

//! ## Overview
//! Refinery reacts to `SECURITY_SCAN`, re-verifies the task is still
//! `in_docs`, and runs the `merge` gate stage (SAST, dependency scan, secret
//! detection, all required). On pass it attempts the merge itself: a
//! fast-forward first, then rebase-then-fast-forward on failure, per §6.
//! A successful merge advances the task to `done` and routes `MERGE_TASK` to
//! the Supervisor; if that completes the owning convoy, it also routes
//! `UPDATE_DOCS` to the Librarian. Any gate or merge failure rejects the task
//! the same way CAB and Tester do.

use ai_sprint_core::errors::CoreError;
use ai_sprint_core::events::EventPayload;
use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::identifiers::EventId;
use ai_sprint_core::identifiers::LIBRARIAN_AGENT_ID;
use ai_sprint_core::identifiers::SUPERVISOR_AGENT_ID;
use ai_sprint_core::identifiers::TaskId;
use ai_sprint_core::interfaces::VcsHost;
use ai_sprint_core::model::Event;
use ai_sprint_core::model::EventStatus;
use ai_sprint_core::model::Task;
use ai_sprint_core::model::TaskStatus;
use ai_sprint_core::store::ConvoyStore;
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

/// The branch every merge targets. There is no per-feature branch concept in
/// the data model, so every convoy's worktree branches from and merges back
/// into this one fixed integration branch.
const TARGET_BRANCH: &str = "main";

/// The Refinery worker: runs the merge gate stage and performs the merge.
pub struct Refinery<'a> {
    agent_id: AgentId,
    sessions: &'a dyn SessionStore,
    tasks: &'a dyn TaskStore,
    convoys: &'a dyn ConvoyStore,
    events: &'a dyn EventQueue,
    telemetry: &'a dyn Sink<WorkerEvent>,
    gates: &'a mut GateRegistry,
    vcs: &'a mut dyn VcsHost,
}

impl<'a> Refinery<'a> {
    /// Creates a Refinery role over the given stores, queue, telemetry sink,
    /// gate registry, and VCS host, recovering any task the session was
    /// already bound to.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Store`] if recovery fails to read the session
    /// store.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_id: AgentId,
        sessions: &'a dyn SessionStore,
        tasks: &'a dyn TaskStore,
        convoys: &'a dyn ConvoyStore,
        events: &'a dyn EventQueue,
        telemetry: &'a dyn Sink<WorkerEvent>,
        gates: &'a mut GateRegistry,
        vcs: &'a mut dyn VcsHost,
    ) -> Result<Self, WorkerError> {
        crate::role::recover(sessions, &agent_id)?;
        Ok(Self { agent_id, sessions, tasks, convoys, events, telemetry, gates, vcs })
    }

    fn merge_task(&mut self, task_id: TaskId) -> Result<(), WorkerError> {
        let task = self.tasks.get(&task_id)?;
        if task.status != TaskStatus::InDocs {
            return Ok(());
        }
        let assignee = self.assignee_of(&task)?;
        let working_dir = self.worktree_for(&assignee)?;
        let result = self.gates.run_stage(GateStage::Merge, &working_dir);
        let gates_passed = result.all_passed();
        self.telemetry.record(&WorkerEvent::GateStageRun {
            task_id: task_id.clone(),
            stage: GateStage::Merge.name(),
            passed: gates_passed,
        });

        if !gates_passed {
            let reason = result.failure_message().unwrap_or_else(|| "merge gate failed".to_string());
            return self.reject(task_id, reason);
        }

        match self.perform_merge(assignee.as_str()) {
            Ok(()) => {
                self.tasks.advance(&task_id, TaskStatus::Done)?;
                self.events.publish(Event {
                    id: EventId::generate(),
                    agent_id: AgentId::new(SUPERVISOR_AGENT_ID),
                    payload: EventPayload::MergeTask { task_id: task_id.clone(), success: true },
                    status: EventStatus::Pending,
                    created_at: Timestamp::now(),
                    processed_at: None,
                })?;

                if self.convoys.mark_done_if_complete(&task.convoy_id)? {
                    self.events.publish(Event {
                        id: EventId::generate(),
                        agent_id: AgentId::new(LIBRARIAN_AGENT_ID),
                        payload: EventPayload::UpdateDocs { convoy_id: task.convoy_id.clone() },
                        status: EventStatus::Pending,
                        created_at: Timestamp::now(),
                        processed_at: None,
                    })?;
                }
                Ok(())
            }
            Err(error) => self.reject(task_id, format!("merge failed: {error}")),
        }
    }

    /// Fast-forward first, then rebase-then-fast-forward on failure, per §6.
    fn perform_merge(&mut self, branch: &str) -> Result<(), ai_sprint_core::interfaces::VcsError> {
        if self.vcs.fast_forward_merge(branch, TARGET_BRANCH).is_ok() {
            return Ok(());
        }
        self.vcs.rebase(branch, TARGET_BRANCH)?;
        self.vcs.fast_forward_merge(branch, TARGET_BRANCH)
    }

    fn reject(&mut self, task_id: TaskId, reason: String) -> Result<(), WorkerError> {
        let outcome = self.tasks.reject(&task_id, &reason, &self.agent_id)?;
        self.telemetry.record(&WorkerEvent::TaskRejected {
            task_id,
            reason,
            escalated: matches!(outcome, ai_sprint_core::store::RejectOutcome::Escalated { .. }),
        });
        Ok(())
    }

    fn assignee_of(&self, task: &Task) -> Result<AgentId, WorkerError> {
        task.assignee.clone().ok_or_else(|| CoreError::NotFound(format!("task {} has no assignee", task.id)).into())
    }

    fn worktree_for(&self, assignee: &AgentId) -> Result<String, WorkerError> {
        let session = self.sessions.get(assignee)?;
        session
            .worktree
            .clone()
            .ok_or_else(|| WorkerError::Store(CoreError::NotFound(format!("session {assignee} has no worktree"))))
    }
}

impl Role for Refinery<'_> {
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
            EventPayload::SecurityScan { task_id } => self.merge_task(task_id),
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
    use std::collections::VecDeque;

    use ai_sprint_core::identifiers::ConvoyId;
    use ai_sprint_core::interfaces::VcsError;
    use ai_sprint_core::model::AgentSession;
    use ai_sprint_core::model::AgentType;
    use ai_sprint_core::model::Priority;
    use ai_sprint_core::model::SessionStatus;
    use ai_sprint_core::store::RejectOutcome;
    use ai_sprint_core::telemetry::NullSink;
    use ai_sprint_queue::QueueError;

    use super::*;

    struct FakeSessions {
        session: AgentSession,
    }

    impl SessionStore for FakeSessions {
        fn spawn(&self, _session: AgentSession) -> Result<(), CoreError> {
            Ok(())
        }
        fn heartbeat(&self, _agent_id: &AgentId) -> Result<(), CoreError> {
            Ok(())
        }
        fn get(&self, _agent_id: &AgentId) -> Result<AgentSession, CoreError> {
            Ok(self.session.clone())
        }
        fn list_active(&self) -> Result<Vec<AgentSession>, CoreError> {
            Ok(vec![self.session.clone()])
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
        fn bind_convoy(&self, _agent_id: &AgentId, _convoy_id: Option<&ConvoyId>) -> Result<(), CoreError> {
            Ok(())
        }
        fn bind_task(&self, _agent_id: &AgentId, _task_id: Option<&TaskId>) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct FakeTasks {
        task: RefCell<Task>,
        rejected: RefCell<Vec<(TaskId, String)>>,
    }

    impl TaskStore for FakeTasks {
        fn create_many(&self, _tasks: Vec<Task>) -> Result<(), CoreError> {
            Ok(())
        }
        fn get(&self, _id: &TaskId) -> Result<Task, CoreError> {
            Ok(self.task.borrow().clone())
        }
        fn list_by_convoy(&self, _convoy_id: &ConvoyId) -> Result<Vec<Task>, CoreError> {
            Ok(Vec::new())
        }
        fn claim(&self, _id: &TaskId, _agent_id: &AgentId) -> Result<bool, CoreError> {
            Ok(false)
        }
        fn claim_next(&self, _convoy_id: &ConvoyId, _agent_id: &AgentId) -> Result<Option<TaskId>, CoreError> {
            Ok(None)
        }
        fn advance(&self, id: &TaskId, to: TaskStatus) -> Result<(), CoreError> {
            assert_eq!(id, &self.task.borrow().id);
            self.task.borrow_mut().status = to;
            Ok(())
        }
        fn record_validation(
            &self,
            _id: &TaskId,
            _results: ai_sprint_core::model::ValidationResults,
        ) -> Result<(), CoreError> {
            Ok(())
        }
        fn reject(&self, id: &TaskId, reason: &str, _rejecting_agent: &AgentId) -> Result<RejectOutcome, CoreError> {
            self.rejected.borrow_mut().push((id.clone(), reason.to_string()));
            Ok(RejectOutcome::ReturnedForRework { failure_count: 1 })
        }
    }

    struct FakeConvoys {
        completes: bool,
    }

    impl ConvoyStore for FakeConvoys {
        fn create_many(&self, _convoys: Vec<ai_sprint_core::model::Convoy>) -> Result<(), CoreError> {
            Ok(())
        }
        fn get(&self, _id: &ConvoyId) -> Result<ai_sprint_core::model::Convoy, CoreError> {
            unimplemented!("not exercised by these tests")
        }
        fn list_by_feature(
            &self,
            _feature_id: &ai_sprint_core::identifiers::FeatureId,
        ) -> Result<Vec<ai_sprint_core::model::Convoy>, CoreError> {
            Ok(Vec::new())
        }
        fn allocate_next(
            &self,
            _feature_id: &ai_sprint_core::identifiers::FeatureId,
            _agent_id: &AgentId,
        ) -> Result<Option<ConvoyId>, CoreError> {
            Ok(None)
        }
        fn sweep_block_unblock(&self, _feature_id: &ai_sprint_core::identifiers::FeatureId) -> Result<(), CoreError> {
            Ok(())
        }
        fn mark_done_if_complete(&self, _id: &ConvoyId) -> Result<bool, CoreError> {
            Ok(self.completes)
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
        fn acknowledge(&self, _event_id: &EventId, _outcome: EventStatus) -> Result<(), QueueError> {
            Ok(())
        }
    }

    struct FakeVcs {
        fast_forward_ok: bool,
        rebase_ok: bool,
    }

    impl VcsHost for FakeVcs {
        fn create_worktree(&mut self, _agent_id: &AgentId, _base_branch: &str) -> Result<String, VcsError> {
            unimplemented!("not exercised by these tests")
        }
        fn remove_worktree(&mut self, _agent_id: &AgentId, _force: bool) -> Result<(), VcsError> {
            Ok(())
        }
        fn fast_forward_merge(&mut self, _branch: &str, _target: &str) -> Result<(), VcsError> {
            if self.fast_forward_ok { Ok(()) } else { Err(VcsError::Failed("not a fast-forward".to_string())) }
        }
        fn rebase(&mut self, _branch: &str, _target: &str) -> Result<(), VcsError> {
            if self.rebase_ok {
                self.fast_forward_ok = true;
                Ok(())
            } else {
                Err(VcsError::Failed("rebase conflict".to_string()))
            }
        }
        fn delete_branch(&mut self, _branch: &str, _force: bool) -> Result<(), VcsError> {
            Ok(())
        }
    }

    fn sample_task() -> Task {
        Task {
            id: TaskId::new("t1"),
            convoy_id: ConvoyId::new("c1"),
            title: "t".to_string(),
            description: String::new(),
            file_path: "src/lib.rs".to_string(),
            status: TaskStatus::InDocs,
            priority: Priority::P1,
            acceptance_criteria: Vec::new(),
            assignee: Some(AgentId::new("dev-001")),
            validation_results: None,
            failure_reason: None,
            failure_count: 0,
            created_at: Timestamp::now(),
            started_at: None,
            completed_at: None,
        }
    }

    fn sample_session() -> AgentSession {
        AgentSession {
            agent_id: AgentId::new("dev-001"),
            agent_type: AgentType::Developer,
            convoy_id: Some(ConvoyId::new("c1")),
            current_task: Some(TaskId::new("t1")),
            worktree: Some("/worktrees/dev-001".to_string()),
            status: SessionStatus::Active,
            last_heartbeat: Timestamp::now(),
            started_at: Timestamp::now(),
            crashed_at: None,
        }
    }

    #[test]
    fn successful_merge_advances_task_and_routes_to_supervisor() {
        let sessions = FakeSessions { session: sample_session() };
        let tasks = FakeTasks { task: RefCell::new(sample_task()), rejected: RefCell::new(Vec::new()) };
        let convoys = FakeConvoys { completes: false };
        let events = FakeQueue { published: RefCell::new(VecDeque::new()) };
        let sink = NullSink;
        let mut gates = GateRegistry::new();
        let mut vcs = FakeVcs { fast_forward_ok: true, rebase_ok: false };
        let mut refinery =
            Refinery::new(AgentId::new("refinery-001"), &sessions, &tasks, &convoys, &events, &sink, &mut gates, &mut vcs)
                .expect("new");

        refinery.merge_task(TaskId::new("t1")).expect("merge");

        assert_eq!(tasks.task.borrow().status, TaskStatus::Done);
        let published = events.published.borrow();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].agent_id, AgentId::new(SUPERVISOR_AGENT_ID));
        assert!(matches!(published[0].payload, EventPayload::MergeTask { success: true, .. }));
    }

    #[test]
    fn completing_the_convoy_also_routes_to_librarian() {
        let sessions = FakeSessions { session: sample_session() };
        let tasks = FakeTasks { task: RefCell::new(sample_task()), rejected: RefCell::new(Vec::new()) };
        let convoys = FakeConvoys { completes: true };
        let events = FakeQueue { published: RefCell::new(VecDeque::new()) };
        let sink = NullSink;
        let mut gates = GateRegistry::new();
        let mut vcs = FakeVcs { fast_forward_ok: true, rebase_ok: false };
        let mut refinery =
            Refinery::new(AgentId::new("refinery-001"), &sessions, &tasks, &convoys, &events, &sink, &mut gates, &mut vcs)
                .expect("new");

        refinery.merge_task(TaskId::new("t1")).expect("merge");

        let published = events.published.borrow();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].agent_id, AgentId::new(LIBRARIAN_AGENT_ID));
        assert!(matches!(published[1].payload, EventPayload::UpdateDocs { .. }));
    }

    #[test]
    fn a_failed_fast_forward_retries_via_rebase() {
        let sessions = FakeSessions { session: sample_session() };
        let tasks = FakeTasks { task: RefCell::new(sample_task()), rejected: RefCell::new(Vec::new()) };
        let convoys = FakeConvoys { completes: false };
        let events = FakeQueue { published: RefCell::new(VecDeque::new()) };
        let sink = NullSink;
        let mut gates = GateRegistry::new();
        let mut vcs = FakeVcs { fast_forward_ok: false, rebase_ok: true };
        let mut refinery =
            Refinery::new(AgentId::new("refinery-001"), &sessions, &tasks, &convoys, &events, &sink, &mut gates, &mut vcs)
                .expect("new");

        refinery.merge_task(TaskId::new("t1")).expect("merge");

        assert_eq!(tasks.task.borrow().status, TaskStatus::Done);
    }

    #[test]
    fn an_unrecoverable_merge_failure_rejects_rather_than_erroring() {
        let sessions = FakeSessions { session: sample_session() };
        let tasks = FakeTasks { task: RefCell::new(sample_task()), rejected: RefCell::new(Vec::new()) };
        let convoys = FakeConvoys { completes: false };
        let events = FakeQueue { published: RefCell::new(VecDeque::new()) };
        let sink = NullSink;
        let mut gates = GateRegistry::new();
        let mut vcs = FakeVcs { fast_forward_ok: false, rebase_ok: false };
        let mut refinery =
            Refinery::new(AgentId::new("refinery-001"), &sessions, &tasks, &convoys, &events, &sink, &mut gates, &mut vcs)
                .expect("new");

        refinery.merge_task(TaskId::new("t1")).expect("handled, not propagated");

        assert_eq!(tasks.task.borrow().status, TaskStatus::InDocs);
        assert_eq!(tasks.rejected.borrow().len(), 1);
        assert!(events.published.borrow().is_empty());
    }
}
