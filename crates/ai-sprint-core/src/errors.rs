// crates/ai-sprint-core/src/errors.rs
// ============================================================================
// Module: Error Taxonomy
// Description: The cross-cutting error kinds every layer converts into.
// Purpose: Give workers one stable vocabulary to branch on, regardless of
//          which lower-level crate raised the original error.
// Dependencies: thiserror, std
// ============================================================================

//! ## Overview
//! `CoreError` is the taxonomy from the design's error-handling section. Every
//! lower-level error type (`StoreError`, `QueueError`, `GateError`, ...)
//! converts into one of these variants at the boundary a worker observes.
//! Workers never propagate a lower-level error past that boundary; they
//! translate it into a state-machine outcome (§7's propagation policy).

use thiserror::Error;

/// The cross-cutting error taxonomy shared by every layer of the
/// coordination plane.
///
/// # Invariants
/// - Variants are stable for programmatic handling; callers match on them,
///   not on the message text.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The target entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The attempted state change violates the task state machine.
    #[error("illegal transition: {0}")]
    IllegalTransition(String),
    /// A concurrent claim/consume/allocate lost the race; expected, retry.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A data-model invariant (F1, F2, or T1) would be violated by the write.
    #[error("integrity error: {0}")]
    IntegrityError(String),
    /// A quality gate returned `FAIL`.
    #[error("gate failed: {0}")]
    GateFailed(String),
    /// An external tool crashed, timed out, or produced unparseable output.
    #[error("tool error: {0}")]
    ToolError(String),
    /// The process or VCS host refused an operation.
    #[error("host failure: {0}")]
    HostFailure(String),
}

impl CoreError {
    /// Returns `true` when the caller should simply retry at the next tick
    /// rather than surface or escalate the error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflict_is_retryable() {
        assert!(CoreError::Conflict("lost race".into()).is_retryable());
        assert!(!CoreError::NotFound("x".into()).is_retryable());
        assert!(!CoreError::IntegrityError("x".into()).is_retryable());
    }

    #[test]
    fn display_includes_the_detail_message() {
        let err = CoreError::IllegalTransition("todo -> done".into());
        assert_eq!(err.to_string(), "illegal transition: todo -> done");
    }
}
