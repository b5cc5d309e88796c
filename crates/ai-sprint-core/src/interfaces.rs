// crates/ai-sprint-core/src/interfaces.rs
// ============================================================================
// Module: External Interfaces
// Description: Backend-agnostic interfaces for process hosting, version
//              control, and quality-tool invocation, kept out of the core
//              per the purpose-and-scope split.
// Purpose: Define the contract surfaces the Supervisor and worker roles
//          depend on without embedding a concrete tmux/git/linter
//          implementation.
// Dependencies: crate::identifiers, thiserror, std
// ============================================================================

//! ## Overview
//! The process host, version-control host, and quality-tool invocation
//! boundary are deliberately out of scope for the coordination plane (§1);
//! these traits are the seam a concrete implementation plugs into.
//! Implementations must be deterministic from the caller's point of view and
//! fail closed on ambiguous state.

use std::time::Duration;

use thiserror::Error;

use crate::identifiers::AgentId;
use crate::identifiers::ConvoyId;

// ============================================================================
// SECTION: Process Host
// ============================================================================

/// Errors raised by a [`ProcessHost`] implementation.
#[derive(Debug, Error)]
pub enum HostError {
    /// The host refused or failed the requested operation.
    #[error("process host error: {0}")]
    Failed(String),
}

/// Abstract interface for spawning and supervising worker processes.
///
/// Corresponds to §6's process host: any implementation supplying these
/// semantics suffices, whether backed by tmux, a container runtime, or a
/// plain process table.
pub trait ProcessHost {
    /// Creates a named session rooted at `working_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when the session cannot be created.
    fn create_session(&mut self, name: &str, working_dir: &str) -> Result<(), HostError>;

    /// Spawns `command` inside an existing session, returning an opaque
    /// pane handle.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when the command cannot be spawned.
    fn spawn(&mut self, session: &str, command: &str, working_dir: &str) -> Result<String, HostError>;

    /// Destroys a named session and anything running inside it.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when the session cannot be destroyed.
    fn destroy_session(&mut self, name: &str) -> Result<(), HostError>;

    /// Returns whether a named session's process is still alive.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when liveness cannot be determined.
    fn is_session_alive(&self, name: &str) -> Result<bool, HostError>;
}

// ============================================================================
// SECTION: Version Control Host
// ============================================================================

/// Errors raised by a [`VcsHost`] implementation.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The host refused or failed the requested operation.
    #[error("vcs host error: {0}")]
    Failed(String),
}

/// Abstract interface for worktree and merge mechanics.
///
/// The core assumes fast-forward merges are attempted first, then
/// rebase-then-fast-forward on failure; implementations of [`VcsHost::fast_forward_merge`]
/// and [`VcsHost::rebase`] need not enforce that ordering themselves, the
/// Refinery role does.
pub trait VcsHost {
    /// Creates an isolated worktree for `agent_id`, branched from `base_branch`.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when the worktree cannot be created.
    fn create_worktree(&mut self, agent_id: &AgentId, base_branch: &str) -> Result<String, VcsError>;

    /// Removes a previously created worktree.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when the worktree cannot be removed and `force`
    /// was not set.
    fn remove_worktree(&mut self, agent_id: &AgentId, force: bool) -> Result<(), VcsError>;

    /// Attempts a fast-forward merge of `branch` into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when the merge is not a fast-forward or fails.
    fn fast_forward_merge(&mut self, branch: &str, target: &str) -> Result<(), VcsError>;

    /// Rebases `branch` onto `target`.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when the rebase fails (e.g. on conflicts).
    fn rebase(&mut self, branch: &str, target: &str) -> Result<(), VcsError>;

    /// Deletes a branch.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError`] when the branch cannot be deleted and `force`
    /// was not set.
    fn delete_branch(&mut self, branch: &str, force: bool) -> Result<(), VcsError>;
}

// ============================================================================
// SECTION: Documentation Host
// ============================================================================

/// Errors raised by a [`DocsHost`] implementation.
#[derive(Debug, Error)]
pub enum DocsError {
    /// The host refused or failed the requested operation.
    #[error("docs host error: {0}")]
    Failed(String),
}

/// Abstract interface for regenerating a convoy's documentation.
///
/// Like [`ProcessHost`] and [`VcsHost`], documentation regeneration itself is
/// out of scope for the coordination plane (§1); this is the seam the
/// Librarian role plugs a concrete generator into.
pub trait DocsHost {
    /// Regenerates documentation covering `convoy_id`'s completed work.
    ///
    /// # Errors
    ///
    /// Returns [`DocsError`] when regeneration fails.
    fn regenerate(&mut self, convoy_id: &ConvoyId) -> Result<(), DocsError>;
}

// ============================================================================
// SECTION: Feature Artifact Reader
// ============================================================================

/// Errors raised by a [`FeatureArtifactReader`] implementation.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The host refused or failed the requested operation.
    #[error("feature artifact error: {0}")]
    Failed(String),
}

/// Abstract interface for reading a feature's `tasks.md` artifact.
///
/// Like [`DocsHost`], reading the feature directory off disk is out of scope
/// for the coordination plane (§1); this is the seam the Supervisor's
/// feature-materialization step plugs a concrete filesystem reader into.
pub trait FeatureArtifactReader {
    /// Reads the raw `tasks.md` contents for the feature rooted at `spec_path`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] when the artifact cannot be read.
    fn read_tasks(&self, spec_path: &str) -> Result<String, ArtifactError>;
}

// ============================================================================
// SECTION: Quality Gate Tool
// ============================================================================

/// The eight quality-gate kinds the runner can invoke, in no particular
/// order of execution within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GateKind {
    /// Static style/lint checking.
    Linting,
    /// Static type checking.
    TypeChecking,
    /// Cyclomatic-complexity analysis.
    Complexity,
    /// Line/branch coverage measurement.
    Coverage,
    /// Mutation-testing kill-rate measurement.
    Mutation,
    /// Static application security testing.
    Sast,
    /// Dependency vulnerability scanning.
    DependencyScan,
    /// Secret-detection scanning.
    SecretDetection,
}

impl GateKind {
    /// The upper-case name used in aggregated failure messages, matching
    /// the event-vocabulary and scenario wording (e.g. `"TYPE_CHECKING"`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linting => "LINTING",
            Self::TypeChecking => "TYPE_CHECKING",
            Self::Complexity => "COMPLEXITY",
            Self::Coverage => "COVERAGE",
            Self::Mutation => "MUTATION",
            Self::Sast => "SAST",
            Self::DependencyScan => "DEPENDENCY_SCAN",
            Self::SecretDetection => "SECRET_DETECTION",
        }
    }

    /// The per-gate timeout after which a run is treated as [`GateOutcome::Error`].
    #[must_use]
    pub const fn default_timeout(self) -> Duration {
        match self {
            Self::Linting => Duration::from_secs(120),
            Self::TypeChecking => Duration::from_secs(180),
            Self::Complexity => Duration::from_secs(60),
            Self::Coverage => Duration::from_secs(300),
            Self::Mutation => Duration::from_secs(600),
            Self::Sast | Self::DependencyScan => Duration::from_secs(300),
            Self::SecretDetection => Duration::from_secs(180),
        }
    }
}

/// The four-valued verdict a single gate run produces.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// The gate ran and found nothing to block on. `metric` carries the
    /// gate's underlying measurement when it has one worth persisting
    /// (e.g. a coverage or mutation percentage); gates with no such
    /// single-number result (linting, type-checking) leave it `None`.
    Pass {
        /// The gate's underlying numeric measurement, if any.
        metric: Option<f64>,
    },
    /// The gate ran and found a blocking condition. `detail` is a
    /// human-readable description suitable for a `REWORK_NEEDED` payload.
    Fail {
        /// Human-readable failure detail.
        detail: String,
    },
    /// The external tool backing this gate is not available in this
    /// environment; treated as a pass for aggregation purposes.
    Skip {
        /// Why the gate was skipped.
        reason: String,
    },
    /// The tool ran but its output could not be parsed, or it timed out.
    Error {
        /// Human-readable error detail.
        detail: String,
    },
}

impl GateOutcome {
    /// Returns true for [`GateOutcome::Fail`] or [`GateOutcome::Error`] —
    /// the two verdicts that block a *required* gate.
    #[must_use]
    pub const fn blocks(&self) -> bool {
        matches!(self, Self::Fail { .. } | Self::Error { .. })
    }
}

/// Abstract interface for invoking one external quality-gate tool.
///
/// Corresponds to §6's quality-tool invocation boundary: the core defines
/// only the contract and the four-valued result schema described in §4.8.
/// Implementations own the subprocess, parsing, and timeout handling, and
/// must never let a crash or timeout escape as a panic — it becomes
/// [`GateOutcome::Error`].
pub trait GateTool {
    /// Runs the gate of kind `kind` against `working_dir`, returning within
    /// `timeout` (timing out itself becomes [`GateOutcome::Error`] rather
    /// than a Rust-level error).
    fn run(&mut self, kind: GateKind, working_dir: &str, timeout: Duration) -> GateOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal in-memory host used only to exercise the trait object shape.
    struct NullHost;

    impl ProcessHost for NullHost {
        fn create_session(&mut self, _name: &str, _working_dir: &str) -> Result<(), HostError> {
            Ok(())
        }

        fn spawn(&mut self, _session: &str, _command: &str, _working_dir: &str) -> Result<String, HostError> {
            Ok("pane-0".to_string())
        }

        fn destroy_session(&mut self, _name: &str) -> Result<(), HostError> {
            Ok(())
        }

        fn is_session_alive(&self, _name: &str) -> Result<bool, HostError> {
            Ok(true)
        }
    }

    #[test]
    fn process_host_trait_object_is_usable() {
        let mut host: Box<dyn ProcessHost> = Box::new(NullHost);
        host.create_session("dev-001", "/tmp").expect("create");
        assert!(host.is_session_alive("dev-001").expect("alive"));
    }

    /// A gate tool that always passes, used only to exercise the trait
    /// object shape.
    struct AlwaysPassTool;

    impl GateTool for AlwaysPassTool {
        fn run(&mut self, _kind: GateKind, _working_dir: &str, _timeout: Duration) -> GateOutcome {
            GateOutcome::Pass { metric: None }
        }
    }

    #[test]
    fn gate_tool_trait_object_is_usable() {
        let mut tool: Box<dyn GateTool> = Box::new(AlwaysPassTool);
        let outcome = tool.run(GateKind::Linting, "/tmp", GateKind::Linting.default_timeout());
        assert_eq!(outcome, GateOutcome::Pass { metric: None });
        assert!(!outcome.blocks());
    }

    #[test]
    fn gate_outcome_fail_and_error_block_but_skip_and_pass_do_not() {
        assert!(GateOutcome::Fail { detail: "x".to_string() }.blocks());
        assert!(GateOutcome::Error { detail: "x".to_string() }.blocks());
        assert!(!GateOutcome::Skip { reason: "x".to_string() }.blocks());
        assert!(!GateOutcome::Pass { metric: None }.blocks());
    }

    struct NullArtifacts;

    impl FeatureArtifactReader for NullArtifacts {
        fn read_tasks(&self, _spec_path: &str) -> Result<String, ArtifactError> {
            Ok(String::new())
        }
    }

    #[test]
    fn feature_artifact_reader_trait_object_is_usable() {
        let reader: Box<dyn FeatureArtifactReader> = Box::new(NullArtifacts);
        assert_eq!(reader.read_tasks("/features/f1").expect("read"), String::new());
    }

    #[test]
    fn every_gate_kind_has_a_distinct_name_and_positive_timeout() {
        let kinds = [
            GateKind::Linting,
            GateKind::TypeChecking,
            GateKind::Complexity,
            GateKind::Coverage,
            GateKind::Mutation,
            GateKind::Sast,
            GateKind::DependencyScan,
            GateKind::SecretDetection,
        ];
        let mut names: Vec<&str> = kinds.iter().map(|kind| kind.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), kinds.len());
        for kind in kinds {
            assert!(kind.default_timeout() > Duration::ZERO);
        }
    }
}
