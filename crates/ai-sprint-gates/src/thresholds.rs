// crates/ai-sprint-gates/src/thresholds.rs
// ============================================================================
// Module: Threshold Evaluation
// Description: Pure functions turning raw tool measurements into a
//              PASS/FAIL verdict against configured thresholds.
// Purpose: Let a concrete `GateTool` keep all subprocess/parsing concerns to
//          itself and delegate the PASS/FAIL decision to one tested place.
// Dependencies: ai-sprint-core::interfaces, ai-sprint-config, thiserror
// ============================================================================

//! ## Overview
//! Coverage, mutation, complexity, and dependency-scan findings are each a
//! number (or small set of numbers) compared against a configured threshold
//! from [`ai_sprint_config::QualityConfig`] / [`ai_sprint_config::SecurityConfig`].
//! [`parse_mutation_output`] is split out on its own because the source's
//! mutation-testing parser was fragile: a line it cannot recognize must
//! surface as [`MutationParseError`], not a silent 0%, so the caller maps it
//! to [`ai_sprint_core::interfaces::GateOutcome::Error`] rather than an
//! undeserved FAIL.

use ai_sprint_config::QualityConfig;
use ai_sprint_config::SecurityConfig;
use ai_sprint_core::interfaces::GateOutcome;
use thiserror::Error;

/// Evaluates a measured line/branch coverage percentage against
/// `quality.coverage_threshold`.
#[must_use]
pub fn evaluate_coverage(percent: f64, quality: &QualityConfig) -> GateOutcome {
    let threshold = f64::from(quality.coverage_threshold);
    if percent >= threshold {
        GateOutcome::Pass { metric: Some(percent) }
    } else {
        GateOutcome::Fail { detail: format!("coverage {percent:.1}% is below the {threshold:.0}% threshold") }
    }
}

/// Raised when a mutation tool's raw output does not contain a recognizable
/// kill-rate measurement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutationParseError {
    /// No line resembling a mutation kill-rate percentage was found.
    #[error("mutation tool output did not contain a recognizable kill-rate percentage")]
    NoKillRateFound,
}

/// Parses a mutation-testing tool's raw stdout for its overall kill-rate
/// percentage, e.g. a line containing `"mutation score: 82.5%"` or
/// `"killed: 91.0%"`.
///
/// # Errors
///
/// Returns [`MutationParseError::NoKillRateFound`] when no line matches;
/// the caller must map this to [`GateOutcome::Error`] rather than assume 0%.
pub fn parse_mutation_output(raw: &str) -> Result<f64, MutationParseError> {
    for line in raw.lines() {
        let lower = line.to_ascii_lowercase();
        if !(lower.contains("mutation") || lower.contains("kill")) {
            continue;
        }
        let Some(percent_idx) = lower.find('%') else { continue };
        let prefix = &line[..percent_idx];
        let digits_start = prefix.rfind(|ch: char| !ch.is_ascii_digit() && ch != '.').map_or(0, |idx| idx + 1);
        if let Ok(value) = prefix[digits_start..].parse::<f64>() {
            return Ok(value);
        }
    }
    Err(MutationParseError::NoKillRateFound)
}

/// Evaluates a parsed mutation kill-rate percentage against
/// `quality.mutation_threshold`.
#[must_use]
pub fn evaluate_mutation(percent: f64, quality: &QualityConfig) -> GateOutcome {
    let threshold = f64::from(quality.mutation_threshold);
    if percent >= threshold {
        GateOutcome::Pass { metric: Some(percent) }
    } else {
        GateOutcome::Fail { detail: format!("mutation kill rate {percent:.1}% is below the {threshold:.0}% threshold") }
    }
}

/// Evaluates the highest per-function cyclomatic complexity found against
/// `quality.complexity_max`. `quality.complexity_flag` is a separate,
/// lower reporting threshold that does not by itself fail the gate.
#[must_use]
pub fn evaluate_complexity(max_function_complexity: u32, quality: &QualityConfig) -> GateOutcome {
    if max_function_complexity > quality.complexity_max {
        GateOutcome::Fail {
            detail: format!(
                "a function has cyclomatic complexity {max_function_complexity}, exceeding the max of {}",
                quality.complexity_max
            ),
        }
    } else {
        GateOutcome::Pass { metric: None }
    }
}

/// Evaluates a dependency/SAST-style severity-bucketed finding count
/// against `security`'s per-severity maxima.
#[must_use]
pub fn evaluate_severity_counts(critical: u32, high: u32, medium: u32, security: &SecurityConfig) -> GateOutcome {
    let mut violations = Vec::new();
    if critical > security.critical_cve_max {
        violations.push(format!("{critical} critical finding(s) exceed the max of {}", security.critical_cve_max));
    }
    if high > security.high_cve_max {
        violations.push(format!("{high} high finding(s) exceed the max of {}", security.high_cve_max));
    }
    if medium > security.medium_cve_max {
        violations.push(format!("{medium} medium finding(s) exceed the max of {}", security.medium_cve_max));
    }
    if violations.is_empty() {
        GateOutcome::Pass { metric: None }
    } else {
        GateOutcome::Fail { detail: violations.join("; ") }
    }
}
