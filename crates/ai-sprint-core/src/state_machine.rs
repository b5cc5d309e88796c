// crates/ai-sprint-core/src/state_machine.rs
// ============================================================================
// Module: Task State Machine
// Description: The closed set of legal task-status transitions.
// Purpose: Give every layer a single source of truth for which transitions
//          are legal, independent of how the store enforces them.
// Dependencies: crate::errors, crate::model
// ============================================================================

//! ## Overview
//! The state store enforces these transitions with a `CHECK`-backed status
//! column plus an explicit predicate on every mutating statement; this module
//! is the pure, storage-free statement of which transitions are legal, so
//! both the store and the worker roles can consult the same table.

use crate::errors::CoreError;
use crate::model::TaskStatus;

/// Returns `Ok(())` when transitioning a task from `from` to `to` is legal,
/// or [`CoreError::IllegalTransition`] otherwise.
///
/// # Errors
///
/// Returns [`CoreError::IllegalTransition`] when `(from, to)` is not one of
/// the pairs in the table below.
///
/// | From | To | Trigger |
/// |---|---|---|
/// | `Todo` | `InProgress` | Developer claims |
/// | `InProgress` | `InReview` | Developer submits |
/// | `InReview` | `InTests` | CAB approves |
/// | `InReview` | `InProgress` | CAB rejects |
/// | `InTests` | `InDocs` | Tester approves |
/// | `InTests` | `InProgress` | Tester rejects |
/// | `InDocs` | `Done` | Refinery merges |
/// | `InDocs` | `InProgress` | Refinery rejects |
/// | `InProgress` | `Todo` | Escalation (unassign) |
pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<(), CoreError> {
    use TaskStatus::{Done, InDocs, InProgress, InReview, InTests, Todo};
    let legal = matches!(
        (from, to),
        (Todo, InProgress)
            | (InProgress, InReview)
            | (InReview, InTests)
            | (InReview, InProgress)
            | (InTests, InDocs)
            | (InTests, InProgress)
            | (InDocs, Done)
            | (InDocs, InProgress)
            | (InProgress, Todo)
    );
    if legal {
        Ok(())
    } else {
        Err(CoreError::IllegalTransition(format!("{from:?} -> {to:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::{Done, InDocs, InProgress, InReview, InTests, Todo};

    #[test]
    fn every_documented_transition_is_legal() {
        let legal_pairs = [
            (Todo, InProgress),
            (InProgress, InReview),
            (InReview, InTests),
            (InReview, InProgress),
            (InTests, InDocs),
            (InTests, InProgress),
            (InDocs, Done),
            (InDocs, InProgress),
            (InProgress, Todo),
        ];
        for (from, to) in legal_pairs {
            assert!(validate_transition(from, to).is_ok(), "{from:?} -> {to:?} should be legal");
        }
    }

    #[test]
    fn skipping_a_stage_is_illegal() {
        assert!(validate_transition(Todo, InReview).is_err());
        assert!(validate_transition(Todo, Done).is_err());
        assert!(validate_transition(InReview, Done).is_err());
    }

    #[test]
    fn self_transitions_are_illegal() {
        assert!(validate_transition(InProgress, InProgress).is_err());
    }

    #[test]
    fn done_is_a_dead_end() {
        for to in [Todo, InProgress, InReview, InTests, InDocs] {
            assert!(validate_transition(Done, to).is_err());
        }
    }
}
