// crates/ai-sprint-core/src/identifiers.rs
// ============================================================================
// Module: Identifiers
// Description: Opaque newtype identifiers for every core entity.
// Purpose: Prevent cross-entity id confusion at the type level.
// Dependencies: serde, std, uuid
// ============================================================================

//! ## Overview
//! Every entity in the coordination plane is addressed by an opaque,
//! string-backed identifier. Wrapping each kind in its own newtype means a
//! `TaskId` can never be passed where a `ConvoyId` is expected, even though
//! both are strings under the hood.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "` from any string-like value.")]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(FeatureId, "Identity of a [`crate::model::Feature`].");
string_id!(ConvoyId, "Identity of a [`crate::model::Convoy`].");
string_id!(TaskId, "Identity of a [`crate::model::Task`].");
string_id!(EventId, "Identity of a [`crate::model::Event`].");
string_id!(AgentId, "Identity of an [`crate::model::AgentSession`], e.g. `dev-001`.");

/// The fixed agent id every Supervisor/Manager session runs under.
///
/// Every deployment runs exactly one Supervisor, and events addressed to it
/// (`ESCALATE_TASK`, `MERGE_TASK`) need a stable target across restarts, so
/// it is a well-known constant rather than a generated id.
pub const SUPERVISOR_AGENT_ID: &str = "manager-001";

/// The fixed agent id the CAB (review-gate) role runs under.
///
/// Like the Supervisor, CAB is a singleton per deployment (only Developer and
/// Tester have a configurable concurrency cap, per `agents.max_developers`/
/// `agents.max_testers`), so `ROUTE_TASK` always targets this well-known id.
pub const CAB_AGENT_ID: &str = "cab-001";

/// The fixed agent id the Refinery (merge + security-scan) role runs under.
pub const REFINERY_AGENT_ID: &str = "refinery-001";

/// The fixed agent id the Librarian (doc regeneration) role runs under.
pub const LIBRARIAN_AGENT_ID: &str = "librarian-001";

impl EventId {
    /// Generates a fresh, globally unique event identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_display_and_new() {
        let id = TaskId::new("task-001");
        assert_eq!(id.as_str(), "task-001");
        assert_eq!(id.to_string(), "task-001");
    }

    #[test]
    fn distinct_id_types_do_not_compare() {
        let task = TaskId::new("x");
        let convoy = ConvoyId::new("x");
        assert_eq!(task.as_str(), convoy.as_str());
    }

    #[test]
    fn generated_event_ids_are_unique() {
        let a = EventId::generate();
        let b = EventId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn serializes_as_a_bare_string() {
        let id = AgentId::new("dev-001");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"dev-001\"");
    }
}
