// crates/ai-sprint-core/src/timestamp.rs
// ============================================================================
// Module: Time
// Description: Wall-clock instants stored as lexicographically sortable strings.
// Purpose: Give every entity a single, serializable timestamp representation.
// Dependencies: serde, time, std
// ============================================================================

//! ## Overview
//! All timestamps in the coordination plane are wall-clock instants in UTC,
//! stored as RFC 3339 strings. RFC 3339 with a fixed-width, zero-padded
//! fractional component sorts lexicographically in the same order as
//! chronologically, which is what lets the state store use a plain `TEXT`
//! column for every `*_at` field and still order by it with `ORDER BY`.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A UTC instant, serialized as an RFC 3339 string.
///
/// # Invariants
/// - The wrapped string is always a valid RFC 3339 timestamp in UTC.
/// - Two `Timestamp` values compare equal to their chronological order when
///   compared as strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// Returns the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self::from_offset(OffsetDateTime::now_utc())
    }

    fn from_offset(offset: OffsetDateTime) -> Self {
        let rendered = offset
            .replace_nanosecond(offset.nanosecond() - offset.nanosecond() % 1_000_000)
            .unwrap_or(offset)
            .format(&Rfc3339)
            .unwrap_or_else(|_| offset.unix_timestamp().to_string());
        Self(rendered)
    }

    /// Parses a timestamp from its RFC 3339 string form.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] when `value` is not a valid RFC 3339 string.
    pub fn parse(value: impl Into<String>) -> Result<Self, TimestampError> {
        let value = value.into();
        OffsetDateTime::parse(&value, &Rfc3339)
            .map_err(|err| TimestampError::Invalid(err.to_string()))?;
        Ok(Self(value))
    }

    /// Returns the timestamp as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number of whole seconds elapsed since this timestamp, or
    /// `None` if parsing fails or the timestamp is in the future.
    #[must_use]
    pub fn elapsed_seconds_since(&self, now: &Self) -> Option<i64> {
        let then = OffsetDateTime::parse(&self.0, &Rfc3339).ok()?;
        let now = OffsetDateTime::parse(&now.0, &Rfc3339).ok()?;
        let delta = now - then;
        Some(delta.whole_seconds())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors produced while parsing a [`Timestamp`].
#[derive(Debug, thiserror::Error)]
pub enum TimestampError {
    /// The provided string is not a valid RFC 3339 timestamp.
    #[error("invalid timestamp: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_parses_back() {
        let ts = Timestamp::now();
        let parsed = Timestamp::parse(ts.as_str().to_string()).expect("parse");
        assert_eq!(ts, parsed);
    }

    #[test]
    fn lexicographic_order_matches_chronological_order() {
        let earlier = Timestamp::parse("2026-01-01T00:00:00Z").expect("parse");
        let later = Timestamp::parse("2026-06-01T00:00:00Z").expect("parse");
        assert!(earlier < later);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Timestamp::parse("not a timestamp").is_err());
    }

    #[test]
    fn elapsed_seconds_since_computes_positive_delta() {
        let then = Timestamp::parse("2026-01-01T00:00:00Z").expect("parse");
        let now = Timestamp::parse("2026-01-01T00:05:00Z").expect("parse");
        assert_eq!(then.elapsed_seconds_since(&now), Some(300));
    }
}
