// crates/ai-sprint-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite State Store
// Description: Durable storage for features, convoys, tasks, agent sessions,
//              and the per-agent event queue, backed by a single SQLite file.
// Purpose: The one concrete backend for every store trait in ai-sprint-core
//          plus ai-sprint-queue's EventQueue.
// Dependencies: ai-sprint-core, ai-sprint-queue, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! The source ran one writer thread per database plus a round-robin read
//! pool, sized for a networked multi-tenant service. This coordination plane
//! is driven by a handful of worker processes polling at second-scale
//! intervals, so a single `Mutex<Connection>` guarding WAL-mode SQLite is
//! all the concurrency this workload needs; cross-process safety still comes
//! entirely from SQLite's own locking, not from the mutex, since every
//! worker role is a separate OS process opening its own connection to the
//! same file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use ai_sprint_core::errors::CoreError;
use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::identifiers::ConvoyId;
use ai_sprint_core::identifiers::EventId;
use ai_sprint_core::identifiers::FeatureId;
use ai_sprint_core::identifiers::SUPERVISOR_AGENT_ID;
use ai_sprint_core::identifiers::TaskId;
use ai_sprint_core::model::AcceptanceCriterion;
use ai_sprint_core::model::AgentSession;
use ai_sprint_core::model::Convoy;
use ai_sprint_core::model::Event;
use ai_sprint_core::model::EventStatus;
use ai_sprint_core::model::Feature;
use ai_sprint_core::model::FeatureStatus;
use ai_sprint_core::model::SessionStatus;
use ai_sprint_core::model::Task;
use ai_sprint_core::model::TaskStatus;
use ai_sprint_core::model::ValidationResults;
use ai_sprint_core::state_machine::validate_transition;
use ai_sprint_core::store::ConvoyStore;
use ai_sprint_core::store::FeatureStore;
use ai_sprint_core::store::RejectOutcome;
use ai_sprint_core::store::SessionStore;
use ai_sprint_core::store::TaskStore;
use ai_sprint_core::timestamp::Timestamp;
use ai_sprint_queue::EventQueue;
use ai_sprint_queue::QueueError;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;

use crate::codec;
use crate::error::OpenError;
use crate::error::core_err;
use crate::error::queue_err;
use crate::schema;

/// Configuration for opening a [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Filesystem path to the database file.
    pub path: PathBuf,
    /// Milliseconds SQLite will wait on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("ai-sprint.db"), busy_timeout_ms: 5_000 }
    }
}

/// A SQLite-backed implementation of every entity store plus the event
/// queue, sharing one connection behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if absent) the store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] if the path cannot be opened or the on-disk
    /// schema is newer than this build supports.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, OpenError> {
        let conn = schema::open(&config.path, config.busy_timeout_ms)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ============================================================================
// SECTION: Row Mapping Helpers
// ============================================================================

/// Decodes a `TEXT` column holding JSON, surfacing a malformed value as a
/// `rusqlite` error rather than silently substituting a default. The store
/// is the only writer of these columns, so a decode failure means on-disk
/// corruption, not an expected absence of data.
fn decode_json<T: serde::de::DeserializeOwned>(column: &str, text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(JsonColumnError {
            column: column.to_string(),
            source: err,
        }))
    })
}

#[derive(Debug)]
struct JsonColumnError {
    column: String,
    source: serde_json::Error,
}

impl std::fmt::Display for JsonColumnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "column {}: {}", self.column, self.source)
    }
}

impl std::error::Error for JsonColumnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

fn row_to_feature(row: &Row<'_>) -> rusqlite::Result<Feature> {
    let status_text: String = row.get("status")?;
    let started_text: Option<String> = row.get("started_at")?;
    let completed_text: Option<String> = row.get("completed_at")?;
    let created_text: String = row.get("created_at")?;
    Ok(Feature {
        id: FeatureId::new(row.get::<_, String>("id")?),
        name: row.get("name")?,
        spec_path: row.get("spec_path")?,
        status: codec::feature_status_from_str(&status_text).unwrap_or(FeatureStatus::Failed),
        created_at: Timestamp::parse(created_text).unwrap_or_else(|_| Timestamp::now()),
        started_at: started_text.and_then(|value| Timestamp::parse(value).ok()),
        completed_at: completed_text.and_then(|value| Timestamp::parse(value).ok()),
    })
}

fn row_to_convoy(row: &Row<'_>) -> rusqlite::Result<Convoy> {
    let status_text: String = row.get("status")?;
    let priority_text: String = row.get("priority")?;
    let files_text: String = row.get("files")?;
    let deps_text: String = row.get("dependencies")?;
    let assignee_text: Option<String> = row.get("assignee")?;
    let started_text: Option<String> = row.get("started_at")?;
    let completed_text: Option<String> = row.get("completed_at")?;
    let created_text: String = row.get("created_at")?;
    let files: BTreeSet<String> = decode_json("files", &files_text)?;
    let dependencies: BTreeSet<ConvoyId> = decode_json("dependencies", &deps_text)?;
    Ok(Convoy {
        id: ConvoyId::new(row.get::<_, String>("id")?),
        feature_id: FeatureId::new(row.get::<_, String>("feature_id")?),
        story: row.get("story")?,
        priority: codec::priority_from_str(&priority_text).unwrap_or(ai_sprint_core::model::Priority::P3),
        status: codec::convoy_status_from_str(&status_text)
            .unwrap_or(ai_sprint_core::model::ConvoyStatus::Blocked),
        files,
        dependencies,
        assignee: assignee_text.map(AgentId::new),
        created_at: Timestamp::parse(created_text).unwrap_or_else(|_| Timestamp::now()),
        started_at: started_text.and_then(|value| Timestamp::parse(value).ok()),
        completed_at: completed_text.and_then(|value| Timestamp::parse(value).ok()),
    })
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status_text: String = row.get("status")?;
    let priority_text: String = row.get("priority")?;
    let assignee_text: Option<String> = row.get("assignee")?;
    let acceptance_text: String = row.get("acceptance_criteria")?;
    let validation_text: Option<String> = row.get("validation_results")?;
    let started_text: Option<String> = row.get("started_at")?;
    let completed_text: Option<String> = row.get("completed_at")?;
    let created_text: String = row.get("created_at")?;
    let failure_count: i64 = row.get("failure_count")?;
    let acceptance_criteria: Vec<AcceptanceCriterion> =
        decode_json("acceptance_criteria", &acceptance_text)?;
    let validation_results: Option<ValidationResults> = validation_text
        .map(|text| decode_json("validation_results", &text))
        .transpose()?;
    Ok(Task {
        id: TaskId::new(row.get::<_, String>("id")?),
        convoy_id: ConvoyId::new(row.get::<_, String>("convoy_id")?),
        title: row.get("title")?,
        description: row.get("description")?,
        file_path: row.get("file_path")?,
        status: codec::task_status_from_str(&status_text).unwrap_or(TaskStatus::Todo),
        priority: codec::priority_from_str(&priority_text).unwrap_or(ai_sprint_core::model::Priority::P3),
        acceptance_criteria,
        assignee: assignee_text.map(AgentId::new),
        validation_results,
        failure_reason: row.get("failure_reason")?,
        failure_count: u32::try_from(failure_count).unwrap_or(u32::MAX),
        created_at: Timestamp::parse(created_text).unwrap_or_else(|_| Timestamp::now()),
        started_at: started_text.and_then(|value| Timestamp::parse(value).ok()),
        completed_at: completed_text.and_then(|value| Timestamp::parse(value).ok()),
    })
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<AgentSession> {
    let agent_type_text: String = row.get("agent_type")?;
    let status_text: String = row.get("status")?;
    let convoy_text: Option<String> = row.get("convoy_id")?;
    let task_text: Option<String> = row.get("current_task")?;
    let heartbeat_text: String = row.get("last_heartbeat")?;
    let started_text: String = row.get("started_at")?;
    let crashed_text: Option<String> = row.get("crashed_at")?;
    Ok(AgentSession {
        agent_id: AgentId::new(row.get::<_, String>("agent_id")?),
        agent_type: codec::agent_type_from_str(&agent_type_text)
            .unwrap_or(ai_sprint_core::model::AgentType::Developer),
        convoy_id: convoy_text.map(ConvoyId::new),
        current_task: task_text.map(TaskId::new),
        worktree: row.get("worktree")?,
        status: codec::session_status_from_str(&status_text).unwrap_or(SessionStatus::Crashed),
        last_heartbeat: Timestamp::parse(heartbeat_text).unwrap_or_else(|_| Timestamp::now()),
        started_at: Timestamp::parse(started_text).unwrap_or_else(|_| Timestamp::now()),
        crashed_at: crashed_text.and_then(|value| Timestamp::parse(value).ok()),
    })
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    let payload_text: String = row.get("payload")?;
    let status_text: String = row.get("status")?;
    let created_text: String = row.get("created_at")?;
    let processed_text: Option<String> = row.get("processed_at")?;
    let payload: ai_sprint_core::events::EventPayload = decode_json("payload", &payload_text)?;
    Ok(Event {
        id: EventId::new(row.get::<_, String>("id")?),
        agent_id: AgentId::new(row.get::<_, String>("agent_id")?),
        payload,
        status: codec::event_status_from_str(&status_text).unwrap_or(EventStatus::Failed),
        created_at: Timestamp::parse(created_text).unwrap_or_else(|_| Timestamp::now()),
        processed_at: processed_text.and_then(|value| Timestamp::parse(value).ok()),
    })
}

/// Inserts an event row. Shared by [`EventQueue::publish`] and
/// [`TaskStore::reject`] so a reject's follow-on event lands in the same
/// transaction as the task mutation.
fn insert_event(conn: &Connection, event: &Event) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO events (id, agent_id, event_type, payload, status, created_at, processed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.id.as_str(),
            event.agent_id.as_str(),
            event.payload.type_name(),
            serde_json::to_string(&event.payload).unwrap_or_default(),
            codec::event_status_to_str(event.status),
            event.created_at.as_str(),
            event.processed_at.as_ref().map(Timestamp::as_str),
        ],
    )?;
    Ok(())
}

// ============================================================================
// SECTION: FeatureStore
// ============================================================================

impl FeatureStore for SqliteStore {
    fn create(&self, feature: Feature) -> Result<(), CoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO features (id, name, spec_path, status, created_at, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                feature.id.as_str(),
                feature.name,
                feature.spec_path,
                codec::feature_status_to_str(feature.status),
                feature.created_at.as_str(),
                feature.started_at.as_ref().map(Timestamp::as_str),
                feature.completed_at.as_ref().map(Timestamp::as_str),
            ],
        )
        .map_err(|err| match err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                CoreError::IntegrityError(format!("feature id already exists: {}", feature.id))
            }
            other => core_err(other),
        })?;
        Ok(())
    }

    fn get(&self, id: &FeatureId) -> Result<Feature, CoreError> {
        let conn = self.conn();
        conn.query_row("SELECT * FROM features WHERE id = ?1", params![id.as_str()], row_to_feature)
            .optional()
            .map_err(core_err)?
            .ok_or_else(|| CoreError::NotFound(format!("feature {id}")))
    }

    fn list_ready(&self) -> Result<Vec<Feature>, CoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT * FROM features WHERE status = 'ready' ORDER BY created_at ASC")
            .map_err(core_err)?;
        let rows = stmt.query_map(params![], row_to_feature).map_err(core_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(core_err)
    }

    fn advance_to_in_progress(&self, id: &FeatureId) -> Result<(), CoreError> {
        let conn = self.conn();
        transition_feature(&conn, id, "ready", "in_progress", Some(Timestamp::now()), None)
    }

    fn mark_done(&self, id: &FeatureId) -> Result<(), CoreError> {
        let conn = self.conn();
        let changes = conn
            .execute(
                "UPDATE features SET status = 'done', completed_at = ?2
                 WHERE id = ?1 AND status = 'in_progress'",
                params![id.as_str(), Timestamp::now().as_str()],
            )
            .map_err(core_err)?;
        require_one_change(&conn, id, changes)
    }

    fn mark_failed(&self, id: &FeatureId) -> Result<(), CoreError> {
        let conn = self.conn();
        let changes = conn
            .execute(
                "UPDATE features SET status = 'failed', completed_at = ?2
                 WHERE id = ?1 AND status IN ('ready', 'in_progress')",
                params![id.as_str(), Timestamp::now().as_str()],
            )
            .map_err(core_err)?;
        require_one_change(&conn, id, changes)
    }
}

fn transition_feature(
    conn: &Connection,
    id: &FeatureId,
    from: &str,
    to: &str,
    started_at: Option<Timestamp>,
    completed_at: Option<Timestamp>,
) -> Result<(), CoreError> {
    let changes = conn
        .execute(
            "UPDATE features SET status = ?4, started_at = COALESCE(?2, started_at), completed_at = COALESCE(?3, completed_at)
             WHERE id = ?1 AND status = ?5",
            params![
                id.as_str(),
                started_at.as_ref().map(Timestamp::as_str),
                completed_at.as_ref().map(Timestamp::as_str),
                to,
                from,
            ],
        )
        .map_err(core_err)?;
    require_one_change(conn, id, changes)
}

fn require_one_change(conn: &Connection, id: &FeatureId, changes: usize) -> Result<(), CoreError> {
    if changes == 1 {
        return Ok(());
    }
    let exists: bool = conn
        .query_row("SELECT 1 FROM features WHERE id = ?1", params![id.as_str()], |_| Ok(true))
        .optional()
        .map_err(core_err)?
        .unwrap_or(false);
    if exists {
        Err(CoreError::IllegalTransition(format!("feature {id} is not in the expected status")))
    } else {
        Err(CoreError::NotFound(format!("feature {id}")))
    }
}

// ============================================================================
// SECTION: ConvoyStore
// ============================================================================

impl ConvoyStore for SqliteStore {
    fn create_many(&self, convoys: Vec<Convoy>) -> Result<(), CoreError> {
        if convoys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(core_err)?;

        let feature_ids: HashSet<FeatureId> = convoys.iter().map(|c| c.feature_id.clone()).collect();
        for feature_id in &feature_ids {
            let mut existing = fetch_feature_convoys(&tx, feature_id)?;
            let incoming: Vec<&Convoy> =
                convoys.iter().filter(|c| &c.feature_id == feature_id).collect();
            validate_file_disjointness(&existing, &incoming)?;
            existing.extend(incoming.iter().map(|c| (*c).clone()));
            validate_acyclic(&existing)?;
        }

        for convoy in &convoys {
            let status = if dependencies_satisfied(&tx, &convoy.dependencies)? {
                convoy.status
            } else {
                ai_sprint_core::model::ConvoyStatus::Blocked
            };
            tx.execute(
                "INSERT INTO convoys (id, feature_id, story, priority, status, files, dependencies, assignee, created_at, started_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    convoy.id.as_str(),
                    convoy.feature_id.as_str(),
                    convoy.story,
                    codec::priority_to_str(convoy.priority),
                    codec::convoy_status_to_str(status),
                    serde_json::to_string(&convoy.files).unwrap_or_default(),
                    serde_json::to_string(&convoy.dependencies).unwrap_or_default(),
                    convoy.assignee.as_ref().map(AgentId::as_str),
                    convoy.created_at.as_str(),
                    convoy.started_at.as_ref().map(Timestamp::as_str),
                    convoy.completed_at.as_ref().map(Timestamp::as_str),
                ],
            )
            .map_err(core_err)?;
        }
        tx.commit().map_err(core_err)?;
        Ok(())
    }

    fn get(&self, id: &ConvoyId) -> Result<Convoy, CoreError> {
        let conn = self.conn();
        conn.query_row("SELECT * FROM convoys WHERE id = ?1", params![id.as_str()], row_to_convoy)
            .optional()
            .map_err(core_err)?
            .ok_or_else(|| CoreError::NotFound(format!("convoy {id}")))
    }

    fn list_by_feature(&self, feature_id: &FeatureId) -> Result<Vec<Convoy>, CoreError> {
        let conn = self.conn();
        fetch_feature_convoys(&conn, feature_id)
    }

    fn allocate_next(&self, feature_id: &FeatureId, agent_id: &AgentId) -> Result<Option<ConvoyId>, CoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT * FROM convoys WHERE feature_id = ?1 AND status = 'available'
                 ORDER BY priority ASC, created_at ASC",
            )
            .map_err(core_err)?;
        let candidates: Vec<Convoy> = stmt
            .query_map(params![feature_id.as_str()], row_to_convoy)
            .map_err(core_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(core_err)?;
        drop(stmt);

        for candidate in candidates {
            if !dependencies_satisfied(&conn, &candidate.dependencies)? {
                continue;
            }
            let changes = conn
                .execute(
                    "UPDATE convoys SET status = 'in_progress', assignee = ?2, started_at = ?3
                     WHERE id = ?1 AND status = 'available'",
                    params![candidate.id.as_str(), agent_id.as_str(), Timestamp::now().as_str()],
                )
                .map_err(core_err)?;
            if changes == 1 {
                return Ok(Some(candidate.id));
            }
        }
        Ok(None)
    }

    fn sweep_block_unblock(&self, feature_id: &FeatureId) -> Result<(), CoreError> {
        let conn = self.conn();
        let convoys = fetch_feature_convoys(&conn, feature_id)?;
        for convoy in &convoys {
            let satisfied = dependencies_satisfied(&conn, &convoy.dependencies)?;
            match convoy.status {
                ai_sprint_core::model::ConvoyStatus::Blocked if satisfied => {
                    conn.execute(
                        "UPDATE convoys SET status = 'available' WHERE id = ?1 AND status = 'blocked'",
                        params![convoy.id.as_str()],
                    )
                    .map_err(core_err)?;
                }
                ai_sprint_core::model::ConvoyStatus::Available if !satisfied => {
                    conn.execute(
                        "UPDATE convoys SET status = 'blocked' WHERE id = ?1 AND status = 'available'",
                        params![convoy.id.as_str()],
                    )
                    .map_err(core_err)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn mark_done_if_complete(&self, id: &ConvoyId) -> Result<bool, CoreError> {
        let conn = self.conn();
        let exists: bool = conn
            .query_row("SELECT 1 FROM convoys WHERE id = ?1", params![id.as_str()], |_| Ok(true))
            .optional()
            .map_err(core_err)?
            .unwrap_or(false);
        if !exists {
            return Err(CoreError::NotFound(format!("convoy {id}")));
        }
        let remaining: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM tasks WHERE convoy_id = ?1 AND status != 'done'",
                params![id.as_str()],
                |row| row.get(0),
            )
            .map_err(core_err)?;
        if remaining > 0 {
            return Ok(false);
        }
        let changes = conn
            .execute(
                "UPDATE convoys SET status = 'done', completed_at = ?2 WHERE id = ?1 AND status != 'done'",
                params![id.as_str(), Timestamp::now().as_str()],
            )
            .map_err(core_err)?;
        Ok(changes == 1)
    }
}

fn fetch_feature_convoys(conn: &Connection, feature_id: &FeatureId) -> Result<Vec<Convoy>, CoreError> {
    let mut stmt = conn
        .prepare("SELECT * FROM convoys WHERE feature_id = ?1 ORDER BY created_at ASC")
        .map_err(core_err)?;
    let rows = stmt.query_map(params![feature_id.as_str()], row_to_convoy).map_err(core_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(core_err)
}

fn dependencies_satisfied(conn: &Connection, dependencies: &BTreeSet<ConvoyId>) -> Result<bool, CoreError> {
    for dep in dependencies {
        let status: Option<String> = conn
            .query_row("SELECT status FROM convoys WHERE id = ?1", params![dep.as_str()], |row| row.get(0))
            .optional()
            .map_err(core_err)?;
        if status.as_deref() != Some("done") {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Invariant F1: pairwise file-set disjointness among non-`done` convoys.
fn validate_file_disjointness(existing: &[Convoy], incoming: &[&Convoy]) -> Result<(), CoreError> {
    let mut seen: HashMap<&str, &ConvoyId> = HashMap::new();
    let all_non_done = existing
        .iter()
        .filter(|c| c.status != ai_sprint_core::model::ConvoyStatus::Done)
        .chain(incoming.iter().copied());
    for convoy in all_non_done {
        for file in &convoy.files {
            if let Some(other) = seen.get(file.as_str()) {
                if *other != &convoy.id {
                    return Err(CoreError::IntegrityError(format!(
                        "file {file} claimed by both convoy {other} and convoy {}",
                        convoy.id
                    )));
                }
            } else {
                seen.insert(file.as_str(), &convoy.id);
            }
        }
    }
    Ok(())
}

/// Invariant F2: the dependency graph on a feature's convoys is a DAG.
fn validate_acyclic(convoys: &[Convoy]) -> Result<(), CoreError> {
    let edges: HashMap<ConvoyId, BTreeSet<ConvoyId>> =
        convoys.iter().map(|c| (c.id.clone(), c.dependencies.clone())).collect();
    let mut state: HashMap<ConvoyId, u8> = HashMap::new();
    for convoy in convoys {
        visit_acyclic(&convoy.id, &edges, &mut state)?;
    }
    Ok(())
}

fn visit_acyclic(
    node: &ConvoyId,
    edges: &HashMap<ConvoyId, BTreeSet<ConvoyId>>,
    state: &mut HashMap<ConvoyId, u8>,
) -> Result<(), CoreError> {
    match state.get(node) {
        Some(1) => return Err(CoreError::IntegrityError(format!("dependency cycle through convoy {node}"))),
        Some(2) => return Ok(()),
        _ => {}
    }
    state.insert(node.clone(), 1);
    if let Some(deps) = edges.get(node) {
        for dep in deps {
            visit_acyclic(dep, edges, state)?;
        }
    }
    state.insert(node.clone(), 2);
    Ok(())
}

// ============================================================================
// SECTION: TaskStore
// ============================================================================

impl TaskStore for SqliteStore {
    fn create_many(&self, tasks: Vec<Task>) -> Result<(), CoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(core_err)?;
        for task in &tasks {
            tx.execute(
                "INSERT INTO tasks (id, convoy_id, title, description, file_path, status, priority, assignee, acceptance_criteria, validation_results, failure_reason, failure_count, created_at, started_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    task.id.as_str(),
                    task.convoy_id.as_str(),
                    task.title,
                    task.description,
                    task.file_path,
                    codec::task_status_to_str(task.status),
                    codec::priority_to_str(task.priority),
                    task.assignee.as_ref().map(AgentId::as_str),
                    serde_json::to_string(&task.acceptance_criteria).unwrap_or_default(),
                    task.validation_results.as_ref().and_then(|v| serde_json::to_string(v).ok()),
                    task.failure_reason,
                    i64::from(task.failure_count),
                    task.created_at.as_str(),
                    task.started_at.as_ref().map(Timestamp::as_str),
                    task.completed_at.as_ref().map(Timestamp::as_str),
                ],
            )
            .map_err(|err| match err {
                rusqlite::Error::SqliteFailure(code, _)
                    if code.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    CoreError::NotFound(format!("convoy {}", task.convoy_id))
                }
                other => core_err(other),
            })?;
        }
        tx.commit().map_err(core_err)?;
        Ok(())
    }

    fn get(&self, id: &TaskId) -> Result<Task, CoreError> {
        let conn = self.conn();
        conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id.as_str()], row_to_task)
            .optional()
            .map_err(core_err)?
            .ok_or_else(|| CoreError::NotFound(format!("task {id}")))
    }

    fn list_by_convoy(&self, convoy_id: &ConvoyId) -> Result<Vec<Task>, CoreError> {
        let conn = self.conn();
        fetch_convoy_tasks(&conn, convoy_id)
    }

    fn claim(&self, id: &TaskId, agent_id: &AgentId) -> Result<bool, CoreError> {
        let conn = self.conn();
        let exists: bool = conn
            .query_row("SELECT 1 FROM tasks WHERE id = ?1", params![id.as_str()], |_| Ok(true))
            .optional()
            .map_err(core_err)?
            .unwrap_or(false);
        if !exists {
            return Err(CoreError::NotFound(format!("task {id}")));
        }
        let changes = conn
            .execute(
                "UPDATE tasks SET status = 'in_progress', assignee = ?2, started_at = ?3
                 WHERE id = ?1 AND status = 'todo' AND assignee IS NULL",
                params![id.as_str(), agent_id.as_str(), Timestamp::now().as_str()],
            )
            .map_err(core_err)?;
        Ok(changes == 1)
    }

    fn claim_next(&self, convoy_id: &ConvoyId, agent_id: &AgentId) -> Result<Option<TaskId>, CoreError> {
        let conn = self.conn();
        let candidates: Vec<TaskId> = {
            let mut stmt = conn
                .prepare(
                    "SELECT id FROM tasks WHERE convoy_id = ?1 AND status = 'todo' AND assignee IS NULL
                     ORDER BY created_at ASC",
                )
                .map_err(core_err)?;
            stmt.query_map(params![convoy_id.as_str()], |row| row.get::<_, String>(0))
                .map_err(core_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(core_err)?
                .into_iter()
                .map(TaskId::new)
                .collect()
        };
        for candidate in candidates {
            let changes = conn
                .execute(
                    "UPDATE tasks SET status = 'in_progress', assignee = ?2, started_at = ?3
                     WHERE id = ?1 AND status = 'todo' AND assignee IS NULL",
                    params![candidate.as_str(), agent_id.as_str(), Timestamp::now().as_str()],
                )
                .map_err(core_err)?;
            if changes == 1 {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn advance(&self, id: &TaskId, to: TaskStatus) -> Result<(), CoreError> {
        let conn = self.conn();
        let current: Option<String> = conn
            .query_row("SELECT status FROM tasks WHERE id = ?1", params![id.as_str()], |row| row.get(0))
            .optional()
            .map_err(core_err)?;
        let Some(current) = current else {
            return Err(CoreError::NotFound(format!("task {id}")));
        };
        let from = codec::task_status_from_str(&current).unwrap_or(TaskStatus::Todo);
        validate_transition(from, to)?;
        let completed_at = to.is_terminal().then(|| Timestamp::now());
        let changes = conn
            .execute(
                "UPDATE tasks SET status = ?3, completed_at = COALESCE(?4, completed_at)
                 WHERE id = ?1 AND status = ?2",
                params![
                    id.as_str(),
                    current,
                    codec::task_status_to_str(to),
                    completed_at.as_ref().map(Timestamp::as_str),
                ],
            )
            .map_err(core_err)?;
        if changes == 1 {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!("task {id} changed status concurrently")))
        }
    }

    fn record_validation(&self, id: &TaskId, results: ValidationResults) -> Result<(), CoreError> {
        let conn = self.conn();
        let changes = conn
            .execute(
                "UPDATE tasks SET validation_results = ?2 WHERE id = ?1",
                params![id.as_str(), serde_json::to_string(&results).map_err(|err| {
                    CoreError::ToolError(format!("could not serialize validation results: {err}"))
                })?],
            )
            .map_err(core_err)?;
        if changes == 1 {
            Ok(())
        } else {
            Err(CoreError::NotFound(format!("task {id}")))
        }
    }

    fn reject(&self, id: &TaskId, reason: &str, rejecting_agent: &AgentId) -> Result<RejectOutcome, CoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(core_err)?;

        let row: Option<(String, Option<String>, i64)> = tx
            .query_row(
                "SELECT status, assignee, failure_count FROM tasks WHERE id = ?1",
                params![id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(core_err)?;
        let Some((status_text, assignee_text, failure_count)) = row else {
            return Err(CoreError::NotFound(format!("task {id}")));
        };
        let status = codec::task_status_from_str(&status_text).unwrap_or(TaskStatus::Todo);
        if !matches!(status, TaskStatus::InReview | TaskStatus::InTests | TaskStatus::InDocs) {
            return Err(CoreError::IllegalTransition(format!(
                "task {id} cannot be rejected from status {status_text}"
            )));
        }
        let new_count = u32::try_from(failure_count).unwrap_or(0) + 1;
        let assignee = assignee_text.map(AgentId::new);

        let outcome = if new_count >= 3 {
            tx.execute(
                "UPDATE tasks SET status = 'todo', assignee = NULL, failure_count = ?2, failure_reason = ?3
                 WHERE id = ?1",
                params![
                    id.as_str(),
                    i64::from(new_count),
                    format!("Escalated after {new_count} failures: {reason}"),
                ],
            )
            .map_err(core_err)?;
            let last_agent = assignee.unwrap_or_else(|| rejecting_agent.clone());
            let event = Event {
                id: EventId::generate(),
                agent_id: AgentId::new(SUPERVISOR_AGENT_ID),
                payload: ai_sprint_core::events::EventPayload::EscalateTask {
                    task_id: id.clone(),
                    failure_count: new_count,
                    failure_type: ai_sprint_core::events::EscalationCause::Rejected,
                    last_agent,
                },
                status: EventStatus::Pending,
                created_at: Timestamp::now(),
                processed_at: None,
            };
            insert_event(&tx, &event).map_err(core_err)?;
            RejectOutcome::Escalated { failure_count: new_count }
        } else {
            tx.execute(
                "UPDATE tasks SET status = 'in_progress', failure_count = ?2, failure_reason = ?3 WHERE id = ?1",
                params![id.as_str(), i64::from(new_count), reason],
            )
            .map_err(core_err)?;
            if let Some(assignee) = &assignee {
                let event = Event {
                    id: EventId::generate(),
                    agent_id: assignee.clone(),
                    payload: ai_sprint_core::events::EventPayload::ReworkNeeded {
                        task_id: id.clone(),
                        reason: reason.to_string(),
                    },
                    status: EventStatus::Pending,
                    created_at: Timestamp::now(),
                    processed_at: None,
                };
                insert_event(&tx, &event).map_err(core_err)?;
            }
            RejectOutcome::ReturnedForRework { failure_count: new_count }
        };

        tx.commit().map_err(core_err)?;
        Ok(outcome)
    }
}

fn fetch_convoy_tasks(conn: &Connection, convoy_id: &ConvoyId) -> Result<Vec<Task>, CoreError> {
    let mut stmt = conn
        .prepare("SELECT * FROM tasks WHERE convoy_id = ?1 ORDER BY created_at ASC")
        .map_err(core_err)?;
    let rows = stmt.query_map(params![convoy_id.as_str()], row_to_task).map_err(core_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(core_err)
}

// ============================================================================
// SECTION: SessionStore
// ============================================================================

impl SessionStore for SqliteStore {
    fn spawn(&self, session: AgentSession) -> Result<(), CoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO agent_sessions (agent_id, agent_type, convoy_id, current_task, worktree, status, last_heartbeat, started_at, crashed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                session.agent_id.as_str(),
                codec::agent_type_to_str(session.agent_type),
                session.convoy_id.as_ref().map(ConvoyId::as_str),
                session.current_task.as_ref().map(TaskId::as_str),
                session.worktree,
                codec::session_status_to_str(session.status),
                session.last_heartbeat.as_str(),
                session.started_at.as_str(),
                session.crashed_at.as_ref().map(Timestamp::as_str),
            ],
        )
        .map_err(|err| match err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                CoreError::IntegrityError(format!("agent id already in use: {}", session.agent_id))
            }
            other => core_err(other),
        })?;
        Ok(())
    }

    fn heartbeat(&self, agent_id: &AgentId) -> Result<(), CoreError> {
        let conn = self.conn();
        let changes = conn
            .execute(
                "UPDATE agent_sessions SET last_heartbeat = ?2 WHERE agent_id = ?1 AND status = 'active'",
                params![agent_id.as_str(), Timestamp::now().as_str()],
            )
            .map_err(core_err)?;
        if changes == 1 {
            Ok(())
        } else {
            Err(CoreError::NotFound(format!("active session {agent_id}")))
        }
    }

    fn get(&self, agent_id: &AgentId) -> Result<AgentSession, CoreError> {
        let conn = self.conn();
        conn.query_row(
            "SELECT * FROM agent_sessions WHERE agent_id = ?1",
            params![agent_id.as_str()],
            row_to_session,
        )
        .optional()
        .map_err(core_err)?
        .ok_or_else(|| CoreError::NotFound(format!("session {agent_id}")))
    }

    fn list_active(&self) -> Result<Vec<AgentSession>, CoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT * FROM agent_sessions WHERE status = 'active'")
            .map_err(core_err)?;
        let rows = stmt.query_map(params![], row_to_session).map_err(core_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(core_err)
    }

    fn mark_crashed(&self, agent_id: &AgentId) -> Result<(), CoreError> {
        let conn = self.conn();
        let changes = conn
            .execute(
                "UPDATE agent_sessions SET status = 'crashed', crashed_at = ?2 WHERE agent_id = ?1",
                params![agent_id.as_str(), Timestamp::now().as_str()],
            )
            .map_err(core_err)?;
        require_session_change(&conn, agent_id, changes)
    }

    fn mark_hung(&self, agent_id: &AgentId) -> Result<(), CoreError> {
        let conn = self.conn();
        let changes = conn
            .execute("UPDATE agent_sessions SET status = 'hung' WHERE agent_id = ?1", params![agent_id.as_str()])
            .map_err(core_err)?;
        require_session_change(&conn, agent_id, changes)
    }

    fn mark_stuck(&self, agent_id: &AgentId) -> Result<(), CoreError> {
        let conn = self.conn();
        let changes = conn
            .execute("UPDATE agent_sessions SET status = 'stuck' WHERE agent_id = ?1", params![agent_id.as_str()])
            .map_err(core_err)?;
        require_session_change(&conn, agent_id, changes)
    }

    fn find_resumable_task(&self, agent_id: &AgentId) -> Result<Option<TaskId>, CoreError> {
        let conn = self.conn();
        let bound: Option<String> = conn
            .query_row(
                "SELECT current_task FROM agent_sessions WHERE agent_id = ?1",
                params![agent_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(core_err)?
            .flatten();
        let Some(task_id) = bound else {
            return Ok(None);
        };
        let status: Option<String> = conn
            .query_row("SELECT status FROM tasks WHERE id = ?1", params![task_id], |row| row.get(0))
            .optional()
            .map_err(core_err)?;
        match status {
            Some(text) if codec::task_status_from_str(&text).map(TaskStatus::is_terminal) != Some(true) => {
                Ok(Some(TaskId::new(task_id)))
            }
            _ => Ok(None),
        }
    }

    fn bind_convoy(&self, agent_id: &AgentId, convoy_id: Option<&ConvoyId>) -> Result<(), CoreError> {
        let conn = self.conn();
        let changes = conn
            .execute(
                "UPDATE agent_sessions SET convoy_id = ?2 WHERE agent_id = ?1",
                params![agent_id.as_str(), convoy_id.map(ConvoyId::as_str)],
            )
            .map_err(core_err)?;
        require_session_change(&conn, agent_id, changes)
    }

    fn bind_task(&self, agent_id: &AgentId, task_id: Option<&TaskId>) -> Result<(), CoreError> {
        let conn = self.conn();
        let changes = conn
            .execute(
                "UPDATE agent_sessions SET current_task = ?2 WHERE agent_id = ?1",
                params![agent_id.as_str(), task_id.map(TaskId::as_str)],
            )
            .map_err(core_err)?;
        require_session_change(&conn, agent_id, changes)
    }
}

fn require_session_change(conn: &Connection, agent_id: &AgentId, changes: usize) -> Result<(), CoreError> {
    if changes == 1 {
        return Ok(());
    }
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM agent_sessions WHERE agent_id = ?1",
            params![agent_id.as_str()],
            |_| Ok(true),
        )
        .optional()
        .map_err(core_err)?
        .unwrap_or(false);
    if exists {
        Ok(())
    } else {
        Err(CoreError::NotFound(format!("session {agent_id}")))
    }
}

// ============================================================================
// SECTION: EventQueue
// ============================================================================

impl EventQueue for SqliteStore {
    fn publish(&self, event: Event) -> Result<(), QueueError> {
        let conn = self.conn();
        insert_event(&conn, &event).map_err(queue_err)
    }

    fn consume(&self, agent_id: &AgentId) -> Result<Option<Event>, QueueError> {
        let conn = self.conn();
        conn.query_row(
            "UPDATE events SET status = 'processing'
             WHERE id = (
                 SELECT id FROM events WHERE agent_id = ?1 AND status = 'pending'
                 ORDER BY created_at ASC, id ASC LIMIT 1
             ) AND status = 'pending'
             RETURNING id, agent_id, event_type, payload, status, created_at, processed_at",
            params![agent_id.as_str()],
            row_to_event,
        )
        .optional()
        .map_err(queue_err)
    }

    fn acknowledge(&self, event_id: &EventId, outcome: EventStatus) -> Result<(), QueueError> {
        let conn = self.conn();
        let _changes = conn
            .execute(
                "UPDATE events SET status = ?2, processed_at = ?3 WHERE id = ?1 AND status = 'processing'",
                params![event_id.as_str(), codec::event_status_to_str(outcome), Timestamp::now().as_str()],
            )
            .map_err(queue_err)?;
        // `_changes == 0` means the event was already acknowledged or never
        // reached `processing` (a duplicate delivery or a late ack racing a
        // retry). That is not this caller's fault, so it is a no-op rather
        // than an error; a caller that cares can still tell from the event's
        // current status.
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
