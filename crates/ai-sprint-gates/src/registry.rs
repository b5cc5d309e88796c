// crates/ai-sprint-gates/src/registry.rs
// ============================================================================
// Module: Gate Registry
// Description: Dispatches a stage's gate kinds to registered tools.
// Purpose: Let a worker role run a whole stage in one call without knowing
//          which concrete tools are installed in this environment.
// Dependencies: ai-sprint-core::interfaces, crate::stage
// ============================================================================

//! ## Overview
//! Mirrors the registry/dispatch split the pack's provider registry uses:
//! tools are registered by [`GateKind`] and the registry itself performs no
//! gate logic, it only routes. A gate kind with no registered tool yields
//! [`GateOutcome::Skip`], matching "tool absent" from §4.8 rather than
//! treating a missing registration as a hard error.

use std::collections::BTreeMap;

use ai_sprint_core::interfaces::GateKind;
use ai_sprint_core::interfaces::GateOutcome;
use ai_sprint_core::interfaces::GateTool;

use crate::stage::GateResult;
use crate::stage::GateStage;
use crate::stage::StageResult;

/// Routes gate kinds to the concrete [`GateTool`] that implements them.
pub struct GateRegistry {
    /// Registered tool implementations, keyed by the gate kind they run.
    tools: BTreeMap<GateKind, Box<dyn GateTool>>,
}

impl GateRegistry {
    /// Creates an empty registry; every gate kind will [`GateOutcome::Skip`]
    /// until registered.
    #[must_use]
    pub fn new() -> Self {
        Self { tools: BTreeMap::new() }
    }

    /// Registers `tool` as the implementation for `kind`, replacing any
    /// prior registration.
    pub fn register(&mut self, kind: GateKind, tool: impl GateTool + 'static) {
        self.tools.insert(kind, Box::new(tool));
    }

    /// Runs every gate kind in `stage`, in the order [`GateStage::gates`]
    /// lists them, against `working_dir`.
    pub fn run_stage(&mut self, stage: GateStage, working_dir: &str) -> StageResult {
        let results = stage
            .gates()
            .iter()
            .map(|&(kind, required)| {
                let outcome = self.tools.get_mut(&kind).map_or_else(
                    || GateOutcome::Skip { reason: "no tool registered for this gate kind".to_string() },
                    |tool| tool.run(kind, working_dir, kind.default_timeout()),
                );
                GateResult { kind, required, outcome }
            })
            .collect();
        StageResult { stage, results }
    }
}

impl Default for GateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct FixedOutcomeTool {
        outcome: GateOutcome,
    }

    impl GateTool for FixedOutcomeTool {
        fn run(&mut self, _kind: GateKind, _working_dir: &str, _timeout: Duration) -> GateOutcome {
            self.outcome.clone()
        }
    }

    #[test]
    fn unregistered_kind_skips_rather_than_panicking() {
        let mut registry = GateRegistry::new();
        let result = registry.run_stage(GateStage::Review, "/tmp");
        assert!(result.all_passed());
        assert!(result.results.iter().all(|r| matches!(r.outcome, GateOutcome::Skip { .. })));
    }

    #[test]
    fn registered_tool_is_dispatched_for_its_kind() {
        let mut registry = GateRegistry::new();
        registry.register(GateKind::Linting, FixedOutcomeTool { outcome: GateOutcome::Pass { metric: None } });
        registry.register(
            GateKind::TypeChecking,
            FixedOutcomeTool { outcome: GateOutcome::Fail { detail: "2 type errors".to_string() } },
        );
        let result = registry.run_stage(GateStage::Review, "/tmp");
        assert!(!result.all_passed());
        let message = result.failure_message().expect("a failure message");
        assert!(message.contains("TYPE_CHECKING"));
    }
}
