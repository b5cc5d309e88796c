// crates/ai-sprint-gates/src/stage.rs
// ============================================================================
// Module: Gate Stages
// Description: The three named gate-kind bundles and their pass/fail
//              aggregation.
// Purpose: Pin the review/tests/merge gate sets and the §4.8 pass rule in
//          one place so every role computes `all_passed` identically.
// Dependencies: ai-sprint-core::interfaces
// ============================================================================

//! ## Overview
//! Each [`GateStage`] names the fixed set of gate kinds a role runs, tagged
//! required or optional. [`StageResult`] holds one [`GateResult`] per kind in
//! the stage and implements the pass rule from §4.8: a required gate's
//! FAIL/ERROR blocks; an optional gate's never does, though it is still
//! reported in [`StageResult::failure_message`].

use ai_sprint_core::interfaces::GateKind;
use ai_sprint_core::interfaces::GateOutcome;

/// The three named gate-kind bundles run by CAB, Tester, and Refinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    /// CAB's bundle, run on `ROUTE_TASK`.
    Review,
    /// Tester's bundle, run on `RUN_TESTS`.
    Tests,
    /// Refinery's bundle, run on `SECURITY_SCAN`.
    Merge,
}

impl GateStage {
    /// The lower-case stage name used in logs and scenario wording.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Review => "review",
            Self::Tests => "tests",
            Self::Merge => "merge",
        }
    }

    /// The gate kinds in this stage, each paired with whether it is
    /// required (blocks `all_passed` on FAIL/ERROR) or optional.
    #[must_use]
    pub const fn gates(self) -> &'static [(GateKind, bool)] {
        match self {
            Self::Review => &[(GateKind::Linting, true), (GateKind::TypeChecking, true), (GateKind::Complexity, true)],
            Self::Tests => &[(GateKind::Coverage, true), (GateKind::Mutation, false)],
            Self::Merge => {
                &[(GateKind::Sast, true), (GateKind::DependencyScan, true), (GateKind::SecretDetection, true)]
            }
        }
    }
}

/// One gate kind's outcome within a stage run, tagged with whether it was
/// required.
#[derive(Debug, Clone, PartialEq)]
pub struct GateResult {
    /// The gate kind this result is for.
    pub kind: GateKind,
    /// Whether this kind is required within its stage.
    pub required: bool,
    /// The verdict the tool (or the registry, for an unregistered kind)
    /// produced.
    pub outcome: GateOutcome,
}

impl GateResult {
    /// Returns true when this result blocks `all_passed`: required and
    /// FAIL/ERROR.
    #[must_use]
    pub const fn blocks_stage(&self) -> bool {
        self.required && self.outcome.blocks()
    }
}

/// The full set of per-gate results for one stage run.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    /// The stage that was run.
    pub stage: GateStage,
    /// One result per gate kind in the stage, in the order [`GateStage::gates`]
    /// lists them.
    pub results: Vec<GateResult>,
}

impl StageResult {
    /// Implements the §4.8 pass rule: every required gate's outcome is
    /// PASS or SKIP; an optional gate's FAIL/ERROR never blocks.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|result| !result.blocks_stage())
    }

    /// One line per FAIL/ERROR result (required or optional), suitable as
    /// the `REWORK_NEEDED` payload. Returns `None` when nothing failed or
    /// errored.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        let lines: Vec<String> = self
            .results
            .iter()
            .filter_map(|result| outcome_detail(&result.outcome).map(|detail| format!("{}: {detail}", result.kind.name())))
            .collect();
        if lines.is_empty() { None } else { Some(lines.join("\n")) }
    }
}

/// Returns the failure/error detail text for a blocking outcome, or `None`
/// for PASS/SKIP.
fn outcome_detail(outcome: &GateOutcome) -> Option<&str> {
    match outcome {
        GateOutcome::Fail { detail } | GateOutcome::Error { detail } => Some(detail.as_str()),
        GateOutcome::Pass { .. } | GateOutcome::Skip { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(kind: GateKind, required: bool, outcome: GateOutcome) -> GateResult {
        GateResult { kind, required, outcome }
    }

    #[test]
    fn review_stage_lists_three_required_gates() {
        let gates = GateStage::Review.gates();
        assert_eq!(gates.len(), 3);
        assert!(gates.iter().all(|&(_, required)| required));
    }

    #[test]
    fn tests_stage_marks_mutation_optional() {
        let gates = GateStage::Tests.gates();
        let mutation = gates.iter().find(|&&(kind, _)| kind == GateKind::Mutation).expect("mutation entry");
        assert!(!mutation.1);
    }

    #[test]
    fn skip_counts_as_pass() {
        let stage = StageResult {
            stage: GateStage::Review,
            results: vec![result(GateKind::Linting, true, GateOutcome::Skip { reason: "tool absent".to_string() })],
        };
        assert!(stage.all_passed());
        assert!(stage.failure_message().is_none());
    }

    #[test]
    fn optional_gate_failure_does_not_block_but_is_reported() {
        let stage = StageResult {
            stage: GateStage::Tests,
            results: vec![
                result(GateKind::Coverage, true, GateOutcome::Pass { metric: Some(85.0) }),
                result(GateKind::Mutation, false, GateOutcome::Fail { detail: "kill rate 40%".to_string() }),
            ],
        };
        assert!(stage.all_passed());
        let message = stage.failure_message().expect("reported despite not blocking");
        assert!(message.contains("MUTATION"));
        assert!(message.contains("40%"));
    }

    #[test]
    fn required_gate_failure_blocks_and_names_the_gate() {
        let stage = StageResult {
            stage: GateStage::Review,
            results: vec![
                result(GateKind::Linting, true, GateOutcome::Pass { metric: None }),
                result(GateKind::TypeChecking, true, GateOutcome::Fail { detail: "2 type errors".to_string() }),
                result(GateKind::Complexity, true, GateOutcome::Pass { metric: None }),
            ],
        };
        assert!(!stage.all_passed());
        let message = stage.failure_message().expect("a failure message");
        assert!(message.contains("TYPE_CHECKING"));
        assert!(message.contains("2 type errors"));
    }

    #[test]
    fn required_gate_error_blocks_same_as_fail() {
        let stage = StageResult {
            stage: GateStage::Merge,
            results: vec![result(
                GateKind::Sast,
                true,
                GateOutcome::Error { detail: "tool timed out".to_string() },
            )],
        };
        assert!(!stage.all_passed());
    }
}
