// crates/ai-sprint-worker/src/lib.rs
// ============================================================================
// Crate: ai-sprint-worker
// Description: The five worker roles (§4.7) plus the shared tick loop they
//              run under.
// Purpose: Turn the state-store/event-queue/gate-runner/health-monitor
//          building blocks into the concrete per-role loops a deployed agent
//          process runs.
// Dependencies: ai-sprint-core, ai-sprint-config, ai-sprint-queue,
//               ai-sprint-gates, ai-sprint-health, thiserror
// ============================================================================

//! ## Overview
//! Every role shares [`role::Role::tick`]: heartbeat, consume one pending
//! event, act or idle, acknowledge. [`developer::Developer`] and
//! [`cab::Cab`] drive the implement/review half of the task state machine;
//! [`tester::Tester`] and [`refinery::Refinery`] drive the test/merge half;
//! [`librarian::Librarian`] regenerates docs once a convoy completes; and
//! [`supervisor::Supervisor`] materializes features into convoys and tasks,
//! runs the Health Monitor sweeps, and restarts crashed or hung sessions.
//! [`feature_spec`] is the typed seam between a feature's `tasks.md` artifact
//! and the convoy/task records the Supervisor creates from it. Each role's
//! loop reports through [`telemetry::WorkerEvent`] and surfaces failures as
//! [`errors::WorkerError`].

#![deny(unsafe_code)]

pub mod cab;
pub mod developer;
pub mod errors;
pub mod feature_spec;
pub mod librarian;
pub mod refinery;
pub mod role;
pub mod supervisor;
pub mod telemetry;
pub mod tester;

pub use cab::Cab;
pub use developer::Developer;
pub use errors::WorkerError;
pub use feature_spec::FeatureSpecParser;
pub use feature_spec::MarkdownTasksParser;
pub use librarian::Librarian;
pub use refinery::Refinery;
pub use role::Role;
pub use supervisor::Supervisor;
pub use telemetry::WorkerEvent;
pub use tester::Tester;
