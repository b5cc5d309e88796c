// crates/ai-sprint-health/src/sweep.rs
// ============================================================================
// Module: Health Sweeps
// Description: Crash, hung, and stuck detection over live agent sessions.
// Purpose: Give the Health Monitor one place that reads session/task state
//          and the process host and mutates session status accordingly.
// Dependencies: ai-sprint-core, ai-sprint-config
// ============================================================================

//! ## Overview
//! Three sweeps, run on the Supervisor's tick (§4.6): [`HealthMonitor::crash_sweep`]
//! asks the process host whether each `active` session's process still
//! exists; [`HealthMonitor::hung_sweep`] flags sessions silent past
//! `timeouts.agent_hung_seconds`; [`HealthMonitor::stuck_sweep`] flags the
//! *(session, task)* pair when the bound task has sat in a non-terminal,
//! non-`todo` status past `timeouts.task_max_duration_seconds`. Stuck is
//! deliberately modeled per task-and-agent rather than per agent alone
//! (§9.2): a session is only ever stuck because of the specific task it is
//! bound to, and the report carries both ids.

use ai_sprint_config::TimeoutsConfig;
use ai_sprint_core::errors::CoreError;
use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::identifiers::TaskId;
use ai_sprint_core::interfaces::ProcessHost;
use ai_sprint_core::model::TaskStatus;
use ai_sprint_core::store::SessionStore;
use ai_sprint_core::store::TaskStore;
use ai_sprint_core::timestamp::Timestamp;

/// One stuck `(session, task)` pair, as reported by [`HealthMonitor::stuck_sweep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuckReport {
    /// The task that has overrun its maximum duration.
    pub task_id: TaskId,
    /// The session bound to that task.
    pub agent_id: AgentId,
    /// How long the task has been in its current non-terminal status.
    pub duration_seconds: u64,
}

/// Runs the three health sweeps over the sessions and tasks visible through
/// a pair of store handles and a process host.
pub struct HealthMonitor<'a> {
    /// Session storage the sweeps read and mutate.
    sessions: &'a dyn SessionStore,
    /// Task storage the stuck sweep reads `started_at`/`status` from.
    tasks: &'a dyn TaskStore,
    /// Process host the crash sweep asks for liveness.
    host: &'a dyn ProcessHost,
    /// The configured heartbeat/hung/stuck thresholds.
    timeouts: TimeoutsConfig,
}

impl<'a> HealthMonitor<'a> {
    /// Creates a health monitor over the given stores, host, and thresholds.
    #[must_use]
    pub const fn new(
        sessions: &'a dyn SessionStore,
        tasks: &'a dyn TaskStore,
        host: &'a dyn ProcessHost,
        timeouts: TimeoutsConfig,
    ) -> Self {
        Self { sessions, tasks, host, timeouts }
    }

    /// Marks `crashed` every `active` session whose process the host can no
    /// longer find, returning the ids marked this tick.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::HostFailure`] if liveness cannot be determined,
    /// or a store error if the status mutation fails.
    pub fn crash_sweep(&self) -> Result<Vec<AgentId>, CoreError> {
        let mut crashed = Vec::new();
        for session in self.sessions.list_active()? {
            let alive = self
                .host
                .is_session_alive(session.agent_id.as_str())
                .map_err(|err| CoreError::HostFailure(err.to_string()))?;
            if !alive {
                self.sessions.mark_crashed(&session.agent_id)?;
                crashed.push(session.agent_id);
            }
        }
        Ok(crashed)
    }

    /// Marks `hung` every `active` session whose last heartbeat is older
    /// than `timeouts.agent_hung_seconds` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns a store error if a status mutation fails.
    pub fn hung_sweep(&self, now: &Timestamp) -> Result<Vec<AgentId>, CoreError> {
        let mut hung = Vec::new();
        for session in self.sessions.list_active()? {
            if is_overdue(&session.last_heartbeat, now, self.timeouts.agent_hung_seconds).is_some() {
                self.sessions.mark_hung(&session.agent_id)?;
                hung.push(session.agent_id);
            }
        }
        Ok(hung)
    }

    /// Marks `stuck` every `active` session whose bound task has sat in a
    /// non-terminal, non-`todo` status past `timeouts.task_max_duration_seconds`
    /// as of `now`, returning one [`StuckReport`] per such pair.
    ///
    /// # Errors
    ///
    /// Returns a store error if a task lookup or status mutation fails.
    pub fn stuck_sweep(&self, now: &Timestamp) -> Result<Vec<StuckReport>, CoreError> {
        let mut reports = Vec::new();
        for session in self.sessions.list_active()? {
            let Some(task_id) = session.current_task.clone() else { continue };
            let task = self.tasks.get(&task_id)?;
            if task.status.is_terminal() || task.status == TaskStatus::Todo {
                continue;
            }
            let Some(started_at) = &task.started_at else { continue };
            let Some(duration_seconds) =
                is_overdue(started_at, now, self.timeouts.task_max_duration_seconds)
            else {
                continue;
            };
            self.sessions.mark_stuck(&session.agent_id)?;
            reports.push(StuckReport { task_id, agent_id: session.agent_id, duration_seconds });
        }
        Ok(reports)
    }
}

/// Returns the elapsed seconds since `since` if it is at least `threshold`,
/// else `None`.
fn is_overdue(since: &Timestamp, now: &Timestamp, threshold: u64) -> Option<u64> {
    let elapsed = since.elapsed_seconds_since(now)?;
    let elapsed = u64::try_from(elapsed).ok()?;
    (elapsed >= threshold).then_some(elapsed)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use ai_sprint_core::identifiers::ConvoyId;
    use ai_sprint_core::interfaces::HostError;
    use ai_sprint_core::model::AgentSession;
    use ai_sprint_core::model::AgentType;
    use ai_sprint_core::model::SessionStatus;
    use ai_sprint_core::model::Task;

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
            self.sessions
                .borrow()
                .get(agent_id.as_str())
                .cloned()
                .ok_or_else(|| CoreError::NotFound(agent_id.to_string()))
        }

        fn list_active(&self) -> Result<Vec<AgentSession>, CoreError> {
            Ok(self
                .sessions
                .borrow()
                .values()
                .filter(|session| session.status == SessionStatus::Active)
                .cloned()
                .collect())
        }

        fn mark_crashed(&self, agent_id: &AgentId) -> Result<(), CoreError> {
            let mut sessions = self.sessions.borrow_mut();
            let session = sessions.get_mut(agent_id.as_str()).ok_or_else(|| CoreError::NotFound(agent_id.to_string()))?;
            session.status = SessionStatus::Crashed;
            Ok(())
        }

        fn mark_hung(&self, agent_id: &AgentId) -> Result<(), CoreError> {
            let mut sessions = self.sessions.borrow_mut();
            let session = sessions.get_mut(agent_id.as_str()).ok_or_else(|| CoreError::NotFound(agent_id.to_string()))?;
            session.status = SessionStatus::Hung;
            Ok(())
        }

        fn mark_stuck(&self, agent_id: &AgentId) -> Result<(), CoreError> {
            let mut sessions = self.sessions.borrow_mut();
            let session = sessions.get_mut(agent_id.as_str()).ok_or_else(|| CoreError::NotFound(agent_id.to_string()))?;
            session.status = SessionStatus::Stuck;
            Ok(())
        }

        fn find_resumable_task(&self, _agent_id: &AgentId) -> Result<Option<TaskId>, CoreError> {
            Ok(None)
        }

        fn bind_convoy(&self, agent_id: &AgentId, convoy_id: Option<&ConvoyId>) -> Result<(), CoreError> {
            let mut sessions = self.sessions.borrow_mut();
            let session = sessions.get_mut(agent_id.as_str()).ok_or_else(|| CoreError::NotFound(agent_id.to_string()))?;
            session.convoy_id = convoy_id.cloned();
            Ok(())
        }

        fn bind_task(&self, agent_id: &AgentId, task_id: Option<&TaskId>) -> Result<(), CoreError> {
            let mut sessions = self.sessions.borrow_mut();
            let session = sessions.get_mut(agent_id.as_str()).ok_or_else(|| CoreError::NotFound(agent_id.to_string()))?;
            session.current_task = task_id.cloned();
            Ok(())
        }
    }

    struct FakeTasks {
        tasks: RefCell<HashMap<String, Task>>,
    }

    impl TaskStore for FakeTasks {
        fn create_many(&self, tasks: Vec<Task>) -> Result<(), CoreError> {
            let mut store = self.tasks.borrow_mut();
            for task in tasks {
                store.insert(task.id.as_str().to_string(), task);
            }
            Ok(())
        }

        fn get(&self, id: &TaskId) -> Result<Task, CoreError> {
            self.tasks.borrow().get(id.as_str()).cloned().ok_or_else(|| CoreError::NotFound(id.to_string()))
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

        fn advance(&self, _id: &TaskId, _to: TaskStatus) -> Result<(), CoreError> {
            Ok(())
        }

        fn record_validation(
            &self,
            _id: &TaskId,
            _results: ai_sprint_core::model::ValidationResults,
        ) -> Result<(), CoreError> {
            Ok(())
        }

        fn reject(
            &self,
            _id: &TaskId,
            _reason: &str,
            _rejecting_agent: &AgentId,
        ) -> Result<ai_sprint_core::store::RejectOutcome, CoreError> {
            unimplemented!("not exercised by these tests")
        }
    }

    struct FakeHost {
        alive: RefCell<HashMap<String, bool>>,
    }

    impl ProcessHost for FakeHost {
        fn create_session(&mut self, _name: &str, _working_dir: &str) -> Result<(), HostError> {
            Ok(())
        }

        fn spawn(&mut self, _session: &str, _command: &str, _working_dir: &str) -> Result<String, HostError> {
            Ok("pane-0".to_string())
        }

        fn destroy_session(&mut self, _name: &str) -> Result<(), HostError> {
            Ok(())
        }

        fn is_session_alive(&self, name: &str) -> Result<bool, HostError> {
            Ok(*self.alive.borrow().get(name).unwrap_or(&true))
        }
    }

    fn sample_session(agent_id: &str, agent_type: AgentType, last_heartbeat: Timestamp) -> AgentSession {
        AgentSession {
            agent_id: AgentId::new(agent_id),
            agent_type,
            convoy_id: None,
            current_task: None,
            worktree: None,
            status: SessionStatus::Active,
            last_heartbeat,
            started_at: Timestamp::parse("2026-01-01T00:00:00Z").expect("parse"),
            crashed_at: None,
        }
    }

    #[test]
    fn crash_sweep_marks_sessions_the_host_no_longer_sees() {
        let sessions = FakeSessions { sessions: RefCell::new(HashMap::new()) };
        sessions
            .spawn(sample_session("dev-001", AgentType::Developer, Timestamp::now()))
            .expect("spawn");
        let tasks = FakeTasks { tasks: RefCell::new(HashMap::new()) };
        let mut alive = HashMap::new();
        alive.insert("dev-001".to_string(), false);
        let host = FakeHost { alive: RefCell::new(alive) };

        let monitor = HealthMonitor::new(&sessions, &tasks, &host, TimeoutsConfig::default());
        let crashed = monitor.crash_sweep().expect("sweep");

        assert_eq!(crashed, vec![AgentId::new("dev-001")]);
        assert_eq!(sessions.get(&AgentId::new("dev-001")).expect("get").status, SessionStatus::Crashed);
    }

    #[test]
    fn hung_sweep_flags_stale_heartbeats_only() {
        let sessions = FakeSessions { sessions: RefCell::new(HashMap::new()) };
        let stale = Timestamp::parse("2026-01-01T00:00:00Z").expect("parse");
        let fresh = Timestamp::parse("2026-01-01T00:04:00Z").expect("parse");
        sessions.spawn(sample_session("dev-001", AgentType::Developer, stale)).expect("spawn");
        sessions.spawn(sample_session("dev-002", AgentType::Developer, fresh)).expect("spawn");
        let tasks = FakeTasks { tasks: RefCell::new(HashMap::new()) };
        let host = FakeHost { alive: RefCell::new(HashMap::new()) };
        let now = Timestamp::parse("2026-01-01T00:05:00Z").expect("parse");

        let monitor = HealthMonitor::new(&sessions, &tasks, &host, TimeoutsConfig::default());
        let hung = monitor.hung_sweep(&now).expect("sweep");

        assert_eq!(hung, vec![AgentId::new("dev-001")]);
    }

    #[test]
    fn stuck_sweep_reports_the_session_task_pair() {
        let sessions = FakeSessions { sessions: RefCell::new(HashMap::new()) };
        let mut session = sample_session("dev-001", AgentType::Developer, Timestamp::now());
        session.current_task = Some(TaskId::new("task-1"));
        sessions.spawn(session).expect("spawn");

        let tasks = FakeTasks { tasks: RefCell::new(HashMap::new()) };
        let task = Task {
            id: TaskId::new("task-1"),
            convoy_id: ConvoyId::new("convoy-1"),
            title: "t".to_string(),
            description: "d".to_string(),
            file_path: "src/lib.rs".to_string(),
            status: TaskStatus::InProgress,
            priority: ai_sprint_core::model::Priority::P1,
            acceptance_criteria: Vec::new(),
            assignee: Some(AgentId::new("dev-001")),
            validation_results: None,
            failure_reason: None,
            failure_count: 0,
            created_at: Timestamp::parse("2026-01-01T00:00:00Z").expect("parse"),
            started_at: Some(Timestamp::parse("2026-01-01T00:00:00Z").expect("parse")),
            completed_at: None,
        };
        tasks.create_many(vec![task]).expect("create");

        let host = FakeHost { alive: RefCell::new(HashMap::new()) };
        let now = Timestamp::parse("2026-01-01T02:01:00Z").expect("parse");

        let monitor = HealthMonitor::new(&sessions, &tasks, &host, TimeoutsConfig::default());
        let reports = monitor.stuck_sweep(&now).expect("sweep");

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].task_id, TaskId::new("task-1"));
        assert_eq!(reports[0].agent_id, AgentId::new("dev-001"));
        assert!(reports[0].duration_seconds >= TimeoutsConfig::default().task_max_duration_seconds);
    }
}
