// crates/ai-sprint-worker/src/supervisor.rs
// ============================================================================
// Module: Supervisor Role
// Description: Feature materialization, health sweeps, and restart policy.
// Purpose: Implement §4.5's allocation/block-unblock cascade driver, §4.6's
//          Health Monitor + restart/stuck policy, and §4.7's Supervisor loop,
//          all three folded into the one role that owns the process host.
// Dependencies: ai-sprint-core, ai-sprint-queue, ai-sprint-config,
//               ai-sprint-health, crate::role, crate::feature_spec
// ============================================================================

//! ## Overview
//! Supervisor has no per-event action beyond observing `MERGE_TASK` and
//! `ESCALATE_TASK` (both already fully handled by the role that published
//! them or by [`ai_sprint_core::store::TaskStore::reject`]; Supervisor's
//! receipt of them is purely for the generic `EventConsumed`/`EventAcknowledged`
//! telemetry [`crate::role::Role::tick`] already emits). Its substance runs on
//! every idle tick, in order:
//!
//! 1. **Materialization** (§4.5): every feature in `ready` is advanced to
//!    `in_progress`, its `tasks.md` parsed, and the resulting convoys and
//!    tasks are created. A parse or validation failure marks the feature
//!    `failed` rather than leaving it half-materialized.
//! 2. **Crash/hung sweep** (§4.6): sessions the process host can no longer
//!    see, or that have gone silent past the hung threshold, are restarted.
//! 3. **Stuck sweep** (§4.6): sessions whose bound task has overrun its
//!    maximum duration are tracked across ticks; the third consecutive
//!    stuck report for one task escalates it.
//!
//! Restart pairs [`ai_sprint_health::plan_restart`]'s pure projection with
//! actual [`ProcessHost`] calls: destroy any residual session, then recreate
//! and respawn one under the same agent id, leaving the fresh worker's own
//! first heartbeat to re-create its `active` session row. A failed restart
//! publishes `AGENT_RESTART_FAILED` rather than retrying immediately.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use ai_sprint_config::TimeoutsConfig;
use ai_sprint_core::events::EscalationCause;
use ai_sprint_core::events::EventPayload;
use ai_sprint_core::events::RestartFailureCause;
use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::identifiers::ConvoyId;
use ai_sprint_core::identifiers::EventId;
use ai_sprint_core::identifiers::TaskId;
use ai_sprint_core::interfaces::FeatureArtifactReader;
use ai_sprint_core::interfaces::HostError;
use ai_sprint_core::interfaces::ProcessHost;
use ai_sprint_core::model::AcceptanceCriterion;
use ai_sprint_core::model::AgentType;
use ai_sprint_core::model::Convoy;
use ai_sprint_core::model::ConvoyStatus;
use ai_sprint_core::model::Event;
use ai_sprint_core::model::EventStatus;
use ai_sprint_core::model::Feature;
use ai_sprint_core::model::Task;
use ai_sprint_core::model::TaskStatus;
use ai_sprint_core::store::ConvoyStore;
use ai_sprint_core::store::FeatureStore;
use ai_sprint_core::store::SessionStore;
use ai_sprint_core::store::TaskStore;
use ai_sprint_core::telemetry::Sink;
use ai_sprint_core::timestamp::Timestamp;
use ai_sprint_health::plan_restart;
use ai_sprint_health::HealthMonitor;
use ai_sprint_health::RestartDirective;
use ai_sprint_queue::EventQueue;

use crate::errors::WorkerError;
use crate::feature_spec::FeatureSpecParser;
use crate::feature_spec::ParsedConvoy;
use crate::role::Role;
use crate::telemetry::WorkerEvent;

/// Consecutive stuck reports a single task must accrue before Supervisor
/// escalates it. There is no "3 strikes" wording scoped to the stuck sweep
/// specifically (only to rejection), so this reuses the same threshold
/// `TaskStore::reject` applies to review/test/merge rejections, tracked here
/// in-memory since a task sitting in `in_progress` is not a state
/// `TaskStore::reject` accepts.
const STUCK_ESCALATION_THRESHOLD: u32 = 3;

/// The Supervisor worker: materializes features, runs health sweeps, and
/// restarts crashed or hung agents.
pub struct Supervisor<'a> {
    agent_id: AgentId,
    sessions: &'a dyn SessionStore,
    tasks: &'a dyn TaskStore,
    convoys: &'a dyn ConvoyStore,
    features: &'a dyn FeatureStore,
    events: &'a dyn EventQueue,
    telemetry: &'a dyn Sink<WorkerEvent>,
    host: &'a mut dyn ProcessHost,
    artifacts: &'a dyn FeatureArtifactReader,
    parser: &'a dyn FeatureSpecParser,
    timeouts: TimeoutsConfig,
    stuck_streaks: BTreeMap<TaskId, u32>,
}

impl<'a> Supervisor<'a> {
    /// Creates a Supervisor role over the given stores, queue, telemetry
    /// sink, process host, artifact reader, spec parser, and timeouts,
    /// recovering any task the session was already bound to.
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
        features: &'a dyn FeatureStore,
        events: &'a dyn EventQueue,
        telemetry: &'a dyn Sink<WorkerEvent>,
        host: &'a mut dyn ProcessHost,
        artifacts: &'a dyn FeatureArtifactReader,
        parser: &'a dyn FeatureSpecParser,
        timeouts: TimeoutsConfig,
    ) -> Result<Self, WorkerError> {
        crate::role::recover(sessions, &agent_id)?;
        Ok(Self {
            agent_id,
            sessions,
            tasks,
            convoys,
            features,
            events,
            telemetry,
            host,
            artifacts,
            parser,
            timeouts,
            stuck_streaks: BTreeMap::new(),
        })
    }

    // ------------------------------------------------------------------
    // Feature materialization (§4.5)
    // ------------------------------------------------------------------

    fn materialize_ready_features(&mut self) -> Result<(), WorkerError> {
        for feature in self.features.list_ready()? {
            let feature_id = feature.id.clone();
            match self.materialize_one(&feature) {
                Ok(convoy_count) => {
                    self.telemetry
                        .record(&WorkerEvent::FeatureMaterialized { feature_id, convoy_count });
                }
                Err(error) => {
                    self.features.mark_failed(&feature_id)?;
                    self.telemetry.record(&WorkerEvent::FeatureMaterializationFailed {
                        feature_id,
                        reason: error.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn materialize_one(&mut self, feature: &Feature) -> Result<usize, WorkerError> {
        self.features.advance_to_in_progress(&feature.id)?;
        let raw = self.artifacts.read_tasks(&feature.spec_path)?;
        let parsed = self.parser.parse(&raw)?;

        let story_ids: BTreeMap<String, ConvoyId> = parsed
            .iter()
            .enumerate()
            .map(|(index, convoy)| (convoy.story.clone(), ConvoyId::new(format!("{}-convoy-{index}", feature.id))))
            .collect();

        let mut convoys = Vec::with_capacity(parsed.len());
        let mut tasks = Vec::new();
        for convoy in &parsed {
            let convoy_id = story_ids[&convoy.story].clone();
            let dependencies: BTreeSet<ConvoyId> =
                convoy.dependencies.iter().map(|story| story_ids[story].clone()).collect();
            let status = if dependencies.is_empty() { ConvoyStatus::Available } else { ConvoyStatus::Blocked };

            convoys.push(Convoy {
                id: convoy_id.clone(),
                feature_id: feature.id.clone(),
                story: convoy.story.clone(),
                priority: convoy.priority,
                status,
                files: convoy.files.clone(),
                dependencies,
                assignee: None,
                created_at: Timestamp::now(),
                started_at: None,
                completed_at: None,
            });
            tasks.extend(convoy_tasks(convoy, &convoy_id));
        }

        let convoy_count = convoys.len();
        self.convoys.create_many(convoys)?;
        self.tasks.create_many(tasks)?;
        Ok(convoy_count)
    }

    // ------------------------------------------------------------------
    // Crash/hung sweep + restart (§4.6)
    // ------------------------------------------------------------------

    fn run_health_sweeps(&mut self) -> Result<(), WorkerError> {
        let now = Timestamp::now();

        let mut failing = {
            let monitor = HealthMonitor::new(self.sessions, self.tasks, &*self.host, self.timeouts);
            monitor.crash_sweep()?
        };
        failing.extend({
            let monitor = HealthMonitor::new(self.sessions, self.tasks, &*self.host, self.timeouts);
            monitor.hung_sweep(&now)?
        });
        for agent_id in failing {
            self.restart(&agent_id)?;
        }

        let stuck = {
            let monitor = HealthMonitor::new(self.sessions, self.tasks, &*self.host, self.timeouts);
            monitor.stuck_sweep(&now)?
        };
        let reported: BTreeSet<TaskId> = stuck.iter().map(|report| report.task_id.clone()).collect();
        self.stuck_streaks.retain(|task_id, _| reported.contains(task_id));
        for report in stuck {
            let streak = self.stuck_streaks.entry(report.task_id.clone()).or_insert(0);
            *streak += 1;
            if *streak >= STUCK_ESCALATION_THRESHOLD {
                let failure_count = *streak;
                self.stuck_streaks.remove(&report.task_id);
                self.escalate_stuck(report.task_id, report.agent_id, failure_count)?;
            }
        }
        Ok(())
    }

    fn restart(&mut self, agent_id: &AgentId) -> Result<(), WorkerError> {
        let session = self.sessions.get(agent_id)?;
        let directive = plan_restart(&session);
        match self.try_restart(&directive) {
            Ok(()) => {
                self.telemetry
                    .record(&WorkerEvent::RestartAttempted { agent_id: agent_id.clone(), succeeded: true });
                Ok(())
            }
            Err((cause, error)) => {
                self.telemetry
                    .record(&WorkerEvent::RestartAttempted { agent_id: agent_id.clone(), succeeded: false });
                self.events.publish(Event {
                    id: EventId::generate(),
                    agent_id: self.agent_id.clone(),
                    payload: EventPayload::AgentRestartFailed {
                        agent_id: agent_id.clone(),
                        failure_type: cause,
                        task_id: directive.current_task.clone(),
                        error: error.to_string(),
                    },
                    status: EventStatus::Pending,
                    created_at: Timestamp::now(),
                    processed_at: None,
                })?;
                Ok(())
            }
        }
    }

    fn try_restart(&mut self, directive: &RestartDirective) -> Result<(), (RestartFailureCause, HostError)> {
        let name = directive.agent_id.as_str();
        let _ = self.host.destroy_session(name);
        let working_dir = directive.worktree.as_deref().unwrap_or(".");
        self.host
            .create_session(name, working_dir)
            .map_err(|error| (RestartFailureCause::HostDestroyFailed, error))?;
        self.host
            .spawn(name, worker_command(directive.agent_type), working_dir)
            .map_err(|error| (RestartFailureCause::HostSpawnFailed, error))?;
        Ok(())
    }

    fn escalate_stuck(&mut self, task_id: TaskId, agent_id: AgentId, failure_count: u32) -> Result<(), WorkerError> {
        let reason = format!("stuck: task exceeded its maximum duration {failure_count} time(s) in a row");
        match self.tasks.reject(&task_id, &reason, &agent_id) {
            Ok(_) => Ok(()),
            Err(_) => {
                self.events.publish(Event {
                    id: EventId::generate(),
                    agent_id: self.agent_id.clone(),
                    payload: EventPayload::EscalateTask {
                        task_id: task_id.clone(),
                        failure_count,
                        failure_type: EscalationCause::Stuck,
                        last_agent: agent_id,
                    },
                    status: EventStatus::Pending,
                    created_at: Timestamp::now(),
                    processed_at: None,
                })?;
                self.telemetry.record(&WorkerEvent::TaskRejected { task_id, reason, escalated: true });
                Ok(())
            }
        }
    }
}

/// Builds the task/convoy pair for a document-order parsed convoy.
fn convoy_tasks(convoy: &ParsedConvoy, convoy_id: &ConvoyId) -> Vec<Task> {
    convoy
        .tasks
        .iter()
        .enumerate()
        .map(|(index, task)| Task {
            id: TaskId::new(format!("{convoy_id}-task-{index}")),
            convoy_id: convoy_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            file_path: task.file_path.clone(),
            status: TaskStatus::Todo,
            priority: convoy.priority,
            acceptance_criteria: task
                .acceptance_criteria
                .iter()
                .map(|description| AcceptanceCriterion { description: description.clone(), satisfied: false })
                .collect(),
            assignee: None,
            validation_results: None,
            failure_reason: None,
            failure_count: 0,
            created_at: Timestamp::now(),
            started_at: None,
            completed_at: None,
        })
        .collect()
}

/// The command a replacement session spawns under its role. There is no
/// concrete worker-invocation convention in the source material beyond "one
/// process per agent" (§5), so this names the per-role `ai-sprint-worker`
/// subcommand `ai-sprint-cli` wires up.
fn worker_command(agent_type: AgentType) -> &'static str {
    match agent_type {
        AgentType::Manager => "ai-sprint-worker run --role supervisor",
        AgentType::Cab => "ai-sprint-worker run --role cab",
        AgentType::Refinery => "ai-sprint-worker run --role refinery",
        AgentType::Librarian => "ai-sprint-worker run --role librarian",
        AgentType::Developer => "ai-sprint-worker run --role developer",
        AgentType::Tester => "ai-sprint-worker run --role tester",
    }
}

impl Role for Supervisor<'_> {
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
            EventPayload::MergeTask { .. } | EventPayload::EscalateTask { .. } => Ok(()),
            other => Err(WorkerError::UnexpectedEvent {
                agent_id: self.agent_id.clone(),
                event_type: other.type_name(),
            }),
        }
    }

    fn idle_action(&mut self) -> Result<(), WorkerError> {
        self.materialize_ready_features()?;
        self.run_health_sweeps()
    }
}
