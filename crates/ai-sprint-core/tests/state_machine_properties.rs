// Exhaustive and property-based checks for the task state machine's legal
// transition table (§4.3 of the specification this crate implements).

use ai_sprint_core::model::TaskStatus;
use ai_sprint_core::state_machine::validate_transition;

const ALL_STATUSES: [TaskStatus; 6] = [
    TaskStatus::Todo,
    TaskStatus::InProgress,
    TaskStatus::InReview,
    TaskStatus::InTests,
    TaskStatus::InDocs,
    TaskStatus::Done,
];

const LEGAL_COUNT: usize = 9;

#[test]
fn exactly_nine_pairs_out_of_thirty_six_are_legal() {
    let mut legal = 0usize;
    for &from in &ALL_STATUSES {
        for &to in &ALL_STATUSES {
            if validate_transition(from, to).is_ok() {
                legal += 1;
            }
        }
    }
    assert_eq!(legal, LEGAL_COUNT);
}

#[test]
fn done_has_no_outgoing_transitions() {
    for &to in &ALL_STATUSES {
        assert!(validate_transition(TaskStatus::Done, to).is_err());
    }
}

#[test]
fn round_trip_law_chain_is_all_individually_legal() {
    // submitted, rejected, resubmitted, approved, tested, merged
    let chain = [
        (TaskStatus::Todo, TaskStatus::InProgress),
        (TaskStatus::InProgress, TaskStatus::InReview),
        (TaskStatus::InReview, TaskStatus::InProgress),
        (TaskStatus::InProgress, TaskStatus::InReview),
        (TaskStatus::InReview, TaskStatus::InTests),
        (TaskStatus::InTests, TaskStatus::InDocs),
        (TaskStatus::InDocs, TaskStatus::Done),
    ];
    for (from, to) in chain {
        assert!(validate_transition(from, to).is_ok(), "{from:?} -> {to:?} must be legal");
    }
}
