// crates/ai-sprint-config/src/lib.rs
// ============================================================================
// Crate: ai-sprint-config
// Description: TOML configuration loading with environment overlay.
// Purpose: The one place every tunable default from the coordination plane's
//          sections (general, agents, timeouts, quality, security, models)
//          is pinned and validated.
// Dependencies: serde, toml, thiserror
// ============================================================================

//! ## Overview
//! Configuration is a single optional TOML file; every field has a default,
//! so a missing file is equivalent to an all-defaults configuration. An
//! `AI_SPRINT_`-prefixed environment overlay (nested delimiter `__`) is
//! applied on top of the parsed file before validation, mirroring the
//! source's `Pydantic` `BaseSettings` env-prefix behavior.

#![deny(unsafe_code)]

mod config;
mod env_overlay;

pub use config::AgentsConfig;
pub use config::AiSprintConfig;
pub use config::ConfigError;
pub use config::GeneralConfig;
pub use config::LogLevel;
pub use config::ModelsConfig;
pub use config::QualityConfig;
pub use config::SecurityConfig;
pub use config::TimeoutsConfig;
