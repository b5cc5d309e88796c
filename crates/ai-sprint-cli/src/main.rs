// crates/ai-sprint-cli/src/main.rs
// ============================================================================
// Module: AI Sprint CLI Entry Point
// Description: A thin externalized command dispatcher over the
//              coordination plane's state store and configuration.
// Purpose: Give an operator a way to initialize the store, inspect feature
//          and session state, and validate configuration, without this
//          crate itself spawning or supervising any worker process.
// Dependencies: clap, ai-sprint-config, ai-sprint-core, ai-sprint-store-sqlite,
//               thiserror.
// ============================================================================

//! ## Overview
//! The command-line surface, the process host, and rich terminal rendering
//! are all named as external collaborators, not core responsibilities (§1).
//! This crate is the thinnest possible realization of that surface: it
//! loads configuration, opens the real `SQLite` store, and reports what is
//! in it. It does not start worker processes itself — that is
//! `ProcessHost`'s job, and no concrete `ProcessHost` ships in this
//! workspace.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use ai_sprint_config::AiSprintConfig;
use ai_sprint_config::ConfigError;
use ai_sprint_core::errors::CoreError;
use ai_sprint_core::model::FeatureStatus;
use ai_sprint_core::model::SessionStatus;
use ai_sprint_core::store::FeatureStore;
use ai_sprint_core::store::SessionStore;
use ai_sprint_store_sqlite::OpenError;
use ai_sprint_store_sqlite::SqliteStore;
use ai_sprint_store_sqlite::SqliteStoreConfig;
use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "ai-sprint", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize the state store at the configured database path.
    Start(ConfigArg),
    /// Report ready feature and active session counts.
    Status(ConfigArg),
    /// Report active session health, exiting 2 if any session is degraded.
    Health(ConfigArg),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a configuration file, reporting the first
    /// violated constraint if any.
    Validate(ConfigArg),
}

/// Shared `--config` argument taken by every subcommand that touches the
/// store or its configuration.
#[derive(Args, Debug)]
struct ConfigArg {
    /// Optional config file path (defaults to process-wide defaults
    /// overlaid with `AI_SPRINT_`-prefixed environment variables).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for operator-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::new(format!("config error: {err}"))
    }
}

impl From<OpenError> for CliError {
    fn from(err: OpenError) -> Self {
        Self::new(format!("store error: {err}"))
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        Self::new(format!("store error: {err}"))
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        write_stdout_line(&format!("ai-sprint {}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        write_stdout_line("usage: ai-sprint <start|status|health|config> [--config PATH]")
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Start(arg) => command_start(&arg),
        Commands::Status(arg) => command_status(&arg),
        Commands::Health(arg) => command_health(&arg),
        Commands::Config { command } => match command {
            ConfigCommand::Validate(arg) => command_config_validate(&arg),
        },
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Loads configuration and opens the `SQLite` store at its configured path,
/// creating the database file and schema if absent.
fn open_store(arg: &ConfigArg) -> CliResult<(AiSprintConfig, SqliteStore)> {
    let config = AiSprintConfig::load(arg.config.as_deref())?;
    let store = SqliteStore::open(SqliteStoreConfig {
        path: config.general.database_path.clone(),
        busy_timeout_ms: 5_000,
    })?;
    Ok((config, store))
}

/// Executes the `start` command: opens (creating if absent) the configured
/// store, then reports its path.
fn command_start(arg: &ConfigArg) -> CliResult<ExitCode> {
    let (config, _store) = open_store(arg)?;
    write_stdout_line(&format!("initialized store at {}", config.general.database_path.display()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `status` command: reports ready-feature and active-session
/// counts.
fn command_status(arg: &ConfigArg) -> CliResult<ExitCode> {
    let (_config, store) = open_store(arg)?;
    let ready_features = FeatureStore::list_ready(&store)?;
    let active_sessions = SessionStore::list_active(&store)?;

    write_stdout_line(&format!("ready features: {}", ready_features.len()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    for feature in &ready_features {
        write_stdout_line(&format!(
            "  {} [{}] {}",
            feature.id,
            feature_status_label(feature.status),
            feature.name
        ))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }

    write_stdout_line(&format!("active sessions: {}", active_sessions.len()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    for session in &active_sessions {
        write_stdout_line(&format!("  {} [{}]", session.agent_id, session_status_label(session.status)))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }

    Ok(ExitCode::SUCCESS)
}

/// Executes the `health` command: reports each active session's status and
/// exits 2 (per §7's "degraded" exit code) if any session is not `active`.
fn command_health(arg: &ConfigArg) -> CliResult<ExitCode> {
    let (_config, store) = open_store(arg)?;
    let sessions = SessionStore::list_active(&store)?;

    let mut degraded = false;
    for session in &sessions {
        let label = session_status_label(session.status);
        write_stdout_line(&format!("{} {label}", session.agent_id))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        if session.status != SessionStatus::Active {
            degraded = true;
        }
    }

    if degraded {
        write_stdout_line("degraded: one or more sessions are not active")
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::from(2));
    }
    write_stdout_line("ok: all active sessions are healthy")
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `config validate` command.
fn command_config_validate(arg: &ConfigArg) -> CliResult<ExitCode> {
    AiSprintConfig::load(arg.config.as_deref())?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Rendering Helpers
// ============================================================================

/// Renders a [`FeatureStatus`] as the lowercase label used elsewhere in this
/// workspace's on-disk encoding, matching `ai-sprint-store-sqlite::codec`.
const fn feature_status_label(status: FeatureStatus) -> &'static str {
    match status {
        FeatureStatus::Ready => "ready",
        FeatureStatus::InProgress => "in_progress",
        FeatureStatus::Done => "done",
        FeatureStatus::Failed => "failed",
    }
}

/// Renders a [`SessionStatus`] as the lowercase label used elsewhere in this
/// workspace's on-disk encoding, matching `ai-sprint-store-sqlite::codec`.
const fn session_status_label(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Crashed => "crashed",
        SessionStatus::Hung => "hung",
        SessionStatus::Stuck => "stuck",
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an I/O error encountered while writing CLI output.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns the unrecoverable-error
/// exit code named by §7's exit-code table.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::Cli;
    use super::feature_status_label;
    use super::session_status_label;

    #[test]
    fn cli_definition_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn feature_status_label_covers_every_variant() {
        use ai_sprint_core::model::FeatureStatus;

        assert_eq!(feature_status_label(FeatureStatus::Ready), "ready");
        assert_eq!(feature_status_label(FeatureStatus::InProgress), "in_progress");
        assert_eq!(feature_status_label(FeatureStatus::Done), "done");
        assert_eq!(feature_status_label(FeatureStatus::Failed), "failed");
    }

    #[test]
    fn session_status_label_covers_every_variant() {
        use ai_sprint_core::model::SessionStatus;

        assert_eq!(session_status_label(SessionStatus::Active), "active");
        assert_eq!(session_status_label(SessionStatus::Crashed), "crashed");
        assert_eq!(session_status_label(SessionStatus::Hung), "hung");
        assert_eq!(session_status_label(SessionStatus::Stuck), "stuck");
    }
}
