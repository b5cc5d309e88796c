// crates/ai-sprint-worker/src/tester.rs
// ============================================================================
// Module: Tester Role
// Description: Runs the tests gate stage and records validation scores.
// Purpose: Implement §4.7's Tester loop: verify, run tests gates, record
//          results, route to Refinery on pass or reject on fail.
// Dependencies: ai-sprint-core, ai-sprint-queue, ai-sprint-gates, crate::role
// ============================================================================

//! ## Overview
//! Tester reacts to `RUN_TESTS`, re-verifies the task is still `in_tests`,
//! and runs the `tests` gate stage (coverage required, mutation optional).
//! On pass it records the coverage/mutation percentages parsed from the
//! stage's thresholds into `validation_results`, advances the task to
//! `in_docs`, and routes it to Refinery as `SECURITY_SCAN`. On fail it
//! rejects with the stage's aggregated message, same as CAB.

use ai_sprint_core::errors::CoreError;
use ai_sprint_core::events::EventPayload;
use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::identifiers::EventId;
use ai_sprint_core::identifiers::REFINERY_AGENT_ID;
use ai_sprint_core::identifiers::TaskId;
use ai_sprint_core::interfaces::GateKind;
use ai_sprint_core::interfaces::GateOutcome;
use ai_sprint_core::model::Event;
use ai_sprint_core::model::EventStatus;
use ai_sprint_core::model::TaskStatus;
use ai_sprint_core::model::ValidationResults;
use ai_sprint_core::store::SessionStore;
use ai_sprint_core::store::TaskStore;
use ai_sprint_core::telemetry::Sink;
use ai_sprint_core::timestamp::Timestamp;
use ai_sprint_gates::GateRegistry;
use ai_sprint_gates::GateStage;
use ai_sprint_gates::StageResult;
use ai_sprint_queue::EventQueue;

use crate::errors::WorkerError;
use crate::role::Role;
use crate::telemetry::WorkerEvent;

/// The Tester worker: runs the tests gate stage and persists its scores.
pub struct Tester<'a> {
    agent_id: AgentId,
    sessions: &'a dyn SessionStore,
    tasks: &'a dyn TaskStore,
    events: &'a dyn EventQueue,
    telemetry: &'a dyn Sink<WorkerEvent>,
    gates: &'a mut GateRegistry,
}

impl<'a> Tester<'a> {
    /// Creates a Tester role over the given stores, queue, telemetry sink,
    /// and gate registry, recovering any task the session was already bound
    /// to.
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

    fn run_tests(&mut self, task_id: TaskId) -> Result<(), WorkerError> {
        let task = self.tasks.get(&task_id)?;
        if task.status != TaskStatus::InTests {
            return Ok(());
        }
        let working_dir = self.worktree_for(&task)?;
        let result = self.gates.run_stage(GateStage::Tests, &working_dir);
        let passed = result.all_passed();
        self.telemetry.record(&WorkerEvent::GateStageRun {
            task_id: task_id.clone(),
            stage: GateStage::Tests.name(),
            passed,
        });

        if passed {
            self.tasks.record_validation(&task_id, scores_from(&result))?;
            self.tasks.advance(&task_id, TaskStatus::InDocs)?;
            self.events.publish(Event {
                id: EventId::generate(),
                agent_id: AgentId::new(REFINERY_AGENT_ID),
                payload: EventPayload::SecurityScan { task_id },
                status: EventStatus::Pending,
                created_at: Timestamp::now(),
                processed_at: None,
            })?;
        } else {
            let reason = result.failure_message().unwrap_or_else(|| "tests gate failed".to_string());
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

/// Extracts coverage/mutation percentages from a passed `tests` stage
/// result. Neither threshold-evaluation function is invoked here (that
/// already happened inside the registered [`ai_sprint_core::interfaces::GateTool`]);
/// this only reads the metric each passed gate already carried.
fn scores_from(result: &StageResult) -> ValidationResults {
    let mut scores = ValidationResults::default();
    for gate in &result.results {
        if let GateOutcome::Pass { metric: Some(value) } = gate.outcome {
            match gate.kind {
                GateKind::Coverage => scores.coverage_percent = Some(value),
                GateKind::Mutation => scores.mutation_percent = Some(value),
                _ => {}
            }
        }
    }
    scores
}

impl Role for Tester<'_> {
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
            EventPayload::RunTests { task_id } => self.run_tests(task_id),
            other => Err(WorkerError::UnexpectedEvent {
                agent_id: self.agent_id.clone(),
                event_type: other.type_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use ai_sprint_gates::GateResult;

    use super::*;

    fn result(kind: GateKind, outcome: GateOutcome) -> GateResult {
        GateResult { kind, required: kind == GateKind::Coverage, outcome }
    }

    #[test]
    fn scores_from_reads_the_metric_of_each_passed_gate() {
        let stage = StageResult {
            stage: GateStage::Tests,
            results: vec![
                result(GateKind::Coverage, GateOutcome::Pass { metric: Some(91.5) }),
                result(GateKind::Mutation, GateOutcome::Pass { metric: Some(84.0) }),
            ],
        };

        let scores = scores_from(&stage);
        assert_eq!(scores.coverage_percent, Some(91.5));
        assert_eq!(scores.mutation_percent, Some(84.0));
    }

    #[test]
    fn scores_from_leaves_skipped_gates_unset() {
        let stage = StageResult {
            stage: GateStage::Tests,
            results: vec![
                result(GateKind::Coverage, GateOutcome::Pass { metric: Some(91.5) }),
                result(GateKind::Mutation, GateOutcome::Skip { reason: "tool absent".to_string() }),
            ],
        };

        let scores = scores_from(&stage);
        assert_eq!(scores.coverage_percent, Some(91.5));
        assert_eq!(scores.mutation_percent, None);
    }
}
