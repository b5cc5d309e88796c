// crates/ai-sprint-gates/src/lib.rs
// ============================================================================
// Crate: ai-sprint-gates
// Description: The Quality Gate Runner: stage bundles, pure threshold
//              evaluation, and the registry that dispatches gate kinds to
//              concrete tools.
// Purpose: Give CAB, Tester, and Refinery one shared pass/fail/skip/error
//          pipeline (§4.8) instead of each role re-deriving it.
// Dependencies: ai-sprint-core, ai-sprint-config, thiserror
// ============================================================================

//! ## Overview
//! A [`stage::GateStage`] bundles the gate kinds one role runs, split into
//! required and optional. [`registry::GateRegistry`] dispatches each kind in
//! the bundle to a registered [`ai_sprint_core::interfaces::GateTool`],
//! defaulting absent kinds to [`ai_sprint_core::interfaces::GateOutcome::Skip`].
//! [`stage::StageResult::all_passed`] implements the pass rule: SKIP counts
//! as passing, and an optional gate's FAIL/ERROR is downgraded to non-blocking
//! for that computation while still surfacing in
//! [`stage::StageResult::failure_message`]. [`thresholds`] holds the pure
//! numeric evaluation functions the concrete tools call to turn raw tool
//! output into a [`ai_sprint_core::interfaces::GateOutcome`].

#![deny(unsafe_code)]

pub mod registry;
pub mod stage;
pub mod thresholds;

pub use registry::GateRegistry;
pub use stage::GateResult;
pub use stage::GateStage;
pub use stage::StageResult;
pub use thresholds::MutationParseError;
