// crates/ai-sprint-config/src/config.rs
// ============================================================================
// Module: AI Sprint Configuration
// Description: The five configuration sections, their numeric defaults, and
//              load/validate entry points.
// Purpose: Single source of truth for every tunable the coordination plane
//          reads, matching the source's config/defaults.py pin-for-pin.
// Dependencies: serde, toml, thiserror
// ============================================================================

//! ## Overview
//! [`AiSprintConfig::load`] reads an optional TOML file (a missing file is
//! all-defaults, not an error), applies the environment overlay, then
//! validates cross-field constraints that `#[serde(default)]` alone cannot
//! express (e.g. `complexity_flag <= complexity_max`).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::env_overlay::apply_env_overlay;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configured path could not be read.
    #[error("could not read config file {path}: {source}")]
    Io {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error, rendered.
        source: String,
    },
    /// The file's content was not valid TOML, or overlaid values did not fit
    /// the expected shape.
    #[error("invalid config: {0}")]
    Parse(String),
    /// Parsed successfully but violates a cross-field constraint.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Top-Level Configuration
// ============================================================================

/// The full, validated configuration tree.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AiSprintConfig {
    /// Database path and logging destination/level.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Concurrency caps and the Supervisor's polling cadence.
    #[serde(default)]
    pub agents: AgentsConfig,
    /// Heartbeat, hung, stuck, and merge timeouts.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// Coverage/mutation/complexity thresholds.
    #[serde(default)]
    pub quality: QualityConfig,
    /// CVE severity caps enforced by the dependency-scan gate.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Opaque model tag per worker role.
    #[serde(default)]
    pub models: ModelsConfig,
}

impl AiSprintConfig {
    /// Loads configuration from `path` if given (reading the file and
    /// failing if it is missing or malformed), or from process-wide defaults
    /// overlaid with `AI_SPRINT_`-prefixed environment variables if `path`
    /// is `None`. Either way the environment overlay is applied, then the
    /// result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if `path` is given but cannot be read,
    /// [`ConfigError::Parse`] if the content is not valid TOML or does not
    /// fit the expected shape, and [`ConfigError::Invalid`] if a cross-field
    /// constraint is violated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let table = match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .map_err(|err| ConfigError::Io { path: path.to_path_buf(), source: err.to_string() })?;
                toml::from_str::<toml::Table>(&text).map_err(|err| ConfigError::Parse(err.to_string()))?
            }
            None => toml::Table::new(),
        };
        let overlaid = apply_env_overlay(table, std::env::vars());
        let mut config: Self = toml::Value::Table(overlaid)
            .try_into()
            .map_err(|err: toml::de::Error| ConfigError::Parse(err.to_string()))?;
        config.general.database_path = expand_tilde(&config.general.database_path);
        config.general.log_file = expand_tilde(&config.general.log_file);
        config.validate()?;
        Ok(config)
    }

    /// Checks the cross-field constraints a `#[serde(default)]` struct
    /// cannot express on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first constraint
    /// violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents.max_developers == 0 {
            return Err(ConfigError::Invalid("agents.max_developers must be at least 1".to_string()));
        }
        if self.agents.max_testers == 0 {
            return Err(ConfigError::Invalid("agents.max_testers must be at least 1".to_string()));
        }
        if self.agents.max_developers + self.agents.max_testers > self.agents.max_agents_total {
            return Err(ConfigError::Invalid(
                "agents.max_developers + agents.max_testers must not exceed agents.max_agents_total"
                    .to_string(),
            ));
        }
        if self.quality.coverage_threshold > 100 {
            return Err(ConfigError::Invalid("quality.coverage_threshold must be 0..=100".to_string()));
        }
        if self.quality.mutation_threshold > 100 {
            return Err(ConfigError::Invalid("quality.mutation_threshold must be 0..=100".to_string()));
        }
        if self.quality.complexity_flag > self.quality.complexity_max {
            return Err(ConfigError::Invalid(
                "quality.complexity_flag must not exceed quality.complexity_max".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expands a leading `~` to the `HOME` environment variable, matching the
/// source's `Path.expanduser()`. Paths without a leading `~` are returned
/// unchanged; if `HOME` is unset the `~` is left in place.
fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(text) = path.to_str().ok_or(()) else {
        return path.to_path_buf();
    };
    let Some(rest) = text.strip_prefix('~') else {
        return path.to_path_buf();
    };
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(format!("{home}{rest}")),
        Err(_) => path.to_path_buf(),
    }
}

// ============================================================================
// SECTION: general
// ============================================================================

/// `general.*`: database location and logging destination/level.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Filesystem path to the SQLite state store.
    pub database_path: PathBuf,
    /// Filesystem path log records are appended to.
    pub log_file: PathBuf,
    /// Minimum severity recorded.
    pub log_level: LogLevel,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("~/.ai-sprint/beads.db"),
            log_file: PathBuf::from("~/.ai-sprint/logs/ai-sprint.log"),
            log_level: LogLevel::Info,
        }
    }
}

/// Log severity, ordered least to most severe.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Verbose diagnostic detail.
    Debug,
    /// Normal operational events.
    Info,
    /// Recoverable anomalies.
    Warning,
    /// Failures requiring attention.
    Error,
}

// ============================================================================
// SECTION: agents
// ============================================================================

/// `agents.*`: concurrency caps and the Supervisor's polling cadence.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentsConfig {
    /// Maximum concurrently active Developer agents.
    pub max_developers: u32,
    /// Maximum concurrently active Tester agents.
    pub max_testers: u32,
    /// Hard cap across every agent role combined.
    pub max_agents_total: u32,
    /// Seconds between Supervisor polling ticks.
    pub polling_interval_seconds: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self { max_developers: 3, max_testers: 3, max_agents_total: 10, polling_interval_seconds: 30 }
    }
}

// ============================================================================
// SECTION: timeouts
// ============================================================================

/// `timeouts.*`: heartbeat, hung, stuck, and merge thresholds.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Seconds between an agent's heartbeat writes.
    pub agent_heartbeat_seconds: u64,
    /// Seconds without a heartbeat before a session is flagged hung.
    pub agent_hung_seconds: u64,
    /// Seconds a task may remain in a non-terminal, non-`todo` status before
    /// being flagged stuck.
    pub task_max_duration_seconds: u64,
    /// Seconds the Refinery waits for a merge before treating it as failed.
    pub merge_timeout_seconds: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            agent_heartbeat_seconds: 60,
            agent_hung_seconds: 300,
            task_max_duration_seconds: 7_200,
            merge_timeout_seconds: 300,
        }
    }
}

// ============================================================================
// SECTION: quality
// ============================================================================

/// `quality.*`: coverage/mutation/complexity thresholds for the gate runner.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QualityConfig {
    /// Minimum line-coverage percentage the coverage gate requires.
    pub coverage_threshold: u8,
    /// Minimum mutation-kill percentage the mutation gate requires.
    pub mutation_threshold: u8,
    /// Cyclomatic complexity per function above which the complexity gate
    /// reports (but does not fail) a finding.
    pub complexity_flag: u32,
    /// Cyclomatic complexity per function above which the complexity gate
    /// fails.
    pub complexity_max: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self { coverage_threshold: 80, mutation_threshold: 80, complexity_flag: 10, complexity_max: 15 }
    }
}

// ============================================================================
// SECTION: security
// ============================================================================

/// `security.*`: CVE severity caps the dependency-scan gate enforces.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum allowed critical-severity findings.
    pub critical_cve_max: u32,
    /// Maximum allowed high-severity findings.
    pub high_cve_max: u32,
    /// Maximum allowed medium-severity findings.
    pub medium_cve_max: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { critical_cve_max: 0, high_cve_max: 0, medium_cve_max: 5 }
    }
}

// ============================================================================
// SECTION: models
// ============================================================================

/// `models.<role>`: an opaque model tag per worker role. The role set is
/// fixed (manager, cab, refinery, librarian, developer, tester) but the tag
/// vocabulary is not, so this is an open map rather than a closed struct.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ModelsConfig(BTreeMap<String, String>);

impl ModelsConfig {
    /// Returns the model tag configured for `role`, if any.
    #[must_use]
    pub fn get(&self, role: &str) -> Option<&str> {
        self.0.get(role).map(String::as_str)
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self(BTreeMap::from([
            ("manager".to_string(), "haiku".to_string()),
            ("cab".to_string(), "haiku".to_string()),
            ("refinery".to_string(), "sonnet".to_string()),
            ("librarian".to_string(), "sonnet".to_string()),
            ("developer".to_string(), "sonnet".to_string()),
            ("tester".to_string(), "haiku".to_string()),
        ]))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
