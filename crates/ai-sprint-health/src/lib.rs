// crates/ai-sprint-health/src/lib.rs
// ============================================================================
// Crate: ai-sprint-health
// Description: Health Monitor sweeps and the Supervisor's restart/stuck/
//              recovery policies.
// Purpose: Keep crash/hung/stuck detection and the restart decision in one
//          place, shared by whichever worker role runs the Supervisor loop.
// Dependencies: ai-sprint-core, ai-sprint-config, thiserror
// ============================================================================

//! ## Overview
//! Three pieces, matching §4.6: [`sweep::HealthMonitor`] runs the crash/
//! hung/stuck sweeps over live sessions; [`restart::plan_restart`] is the
//! pure projection from a crashed/hung session onto what must be re-spawned;
//! [`recovery::recover_task`] is what a freshly (re)spawned worker calls on
//! startup to find the task it should resume. None of these perform process-host
//! I/O themselves; the Supervisor's worker loop (`ai-sprint-worker`) pairs
//! them with `ProcessHost` calls.

#![deny(unsafe_code)]

pub mod recovery;
pub mod restart;
pub mod sweep;

pub use recovery::recover_task;
pub use restart::plan_restart;
pub use restart::RestartDirective;
pub use sweep::HealthMonitor;
pub use sweep::StuckReport;
