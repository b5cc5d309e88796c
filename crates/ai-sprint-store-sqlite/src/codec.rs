// crates/ai-sprint-store-sqlite/src/codec.rs
// ============================================================================
// Module: Row Codecs
// Description: Conversions between core model enums and their `TEXT` columns.
// Purpose: Keep the CHECK-constrained string vocabulary in one place instead
//          of scattered across every query.
// Dependencies: ai-sprint-core
// ============================================================================

//! ## Overview
//! Every enum in `ai-sprint-core::model` is stored as lower-case (or, for
//! `Priority`, upper-case) `TEXT`, matching the `CHECK` constraints carried
//! over from the source schema. These functions are the single place that
//! vocabulary is spelled out.

use ai_sprint_core::model::AgentType;
use ai_sprint_core::model::ConvoyStatus;
use ai_sprint_core::model::EventStatus;
use ai_sprint_core::model::FeatureStatus;
use ai_sprint_core::model::Priority;
use ai_sprint_core::model::SessionStatus;
use ai_sprint_core::model::TaskStatus;

pub(crate) fn feature_status_to_str(status: FeatureStatus) -> &'static str {
    match status {
        FeatureStatus::Ready => "ready",
        FeatureStatus::InProgress => "in_progress",
        FeatureStatus::Done => "done",
        FeatureStatus::Failed => "failed",
    }
}

pub(crate) fn feature_status_from_str(value: &str) -> Option<FeatureStatus> {
    match value {
        "ready" => Some(FeatureStatus::Ready),
        "in_progress" => Some(FeatureStatus::InProgress),
        "done" => Some(FeatureStatus::Done),
        "failed" => Some(FeatureStatus::Failed),
        _ => None,
    }
}

pub(crate) fn convoy_status_to_str(status: ConvoyStatus) -> &'static str {
    match status {
        ConvoyStatus::Available => "available",
        ConvoyStatus::InProgress => "in_progress",
        ConvoyStatus::Done => "done",
        ConvoyStatus::Blocked => "blocked",
    }
}

pub(crate) fn convoy_status_from_str(value: &str) -> Option<ConvoyStatus> {
    match value {
        "available" => Some(ConvoyStatus::Available),
        "in_progress" => Some(ConvoyStatus::InProgress),
        "done" => Some(ConvoyStatus::Done),
        "blocked" => Some(ConvoyStatus::Blocked),
        _ => None,
    }
}

pub(crate) fn priority_to_str(priority: Priority) -> &'static str {
    match priority {
        Priority::P1 => "P1",
        Priority::P2 => "P2",
        Priority::P3 => "P3",
    }
}

pub(crate) fn priority_from_str(value: &str) -> Option<Priority> {
    match value {
        "P1" => Some(Priority::P1),
        "P2" => Some(Priority::P2),
        "P3" => Some(Priority::P3),
        _ => None,
    }
}

pub(crate) fn task_status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "todo",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::InReview => "in_review",
        TaskStatus::InTests => "in_tests",
        TaskStatus::InDocs => "in_docs",
        TaskStatus::Done => "done",
    }
}

pub(crate) fn task_status_from_str(value: &str) -> Option<TaskStatus> {
    match value {
        "todo" => Some(TaskStatus::Todo),
        "in_progress" => Some(TaskStatus::InProgress),
        "in_review" => Some(TaskStatus::InReview),
        "in_tests" => Some(TaskStatus::InTests),
        "in_docs" => Some(TaskStatus::InDocs),
        "done" => Some(TaskStatus::Done),
        _ => None,
    }
}

pub(crate) fn event_status_to_str(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Pending => "pending",
        EventStatus::Processing => "processing",
        EventStatus::Done => "done",
        EventStatus::Failed => "failed",
    }
}

pub(crate) fn event_status_from_str(value: &str) -> Option<EventStatus> {
    match value {
        "pending" => Some(EventStatus::Pending),
        "processing" => Some(EventStatus::Processing),
        "done" => Some(EventStatus::Done),
        "failed" => Some(EventStatus::Failed),
        _ => None,
    }
}

pub(crate) fn agent_type_to_str(agent_type: AgentType) -> &'static str {
    match agent_type {
        AgentType::Manager => "manager",
        AgentType::Cab => "cab",
        AgentType::Refinery => "refinery",
        AgentType::Librarian => "librarian",
        AgentType::Developer => "developer",
        AgentType::Tester => "tester",
    }
}

pub(crate) fn agent_type_from_str(value: &str) -> Option<AgentType> {
    match value {
        "manager" => Some(AgentType::Manager),
        "cab" => Some(AgentType::Cab),
        "refinery" => Some(AgentType::Refinery),
        "librarian" => Some(AgentType::Librarian),
        "developer" => Some(AgentType::Developer),
        "tester" => Some(AgentType::Tester),
        _ => None,
    }
}

pub(crate) fn session_status_to_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Crashed => "crashed",
        SessionStatus::Hung => "hung",
        SessionStatus::Stuck => "stuck",
    }
}

pub(crate) fn session_status_from_str(value: &str) -> Option<SessionStatus> {
    match value {
        "active" => Some(SessionStatus::Active),
        "crashed" => Some(SessionStatus::Crashed),
        "hung" => Some(SessionStatus::Hung),
        "stuck" => Some(SessionStatus::Stuck),
        _ => None,
    }
}
