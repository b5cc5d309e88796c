// crates/ai-sprint-worker/src/role.rs
// ============================================================================
// Module: Role Loop
// Description: The heartbeat -> consume -> act -> acknowledge loop every
//              worker role shares.
// Purpose: Pin the common tick sequence (§4.7) in one default trait method
//          so the five per-role modules implement only what differs.
// Dependencies: ai-sprint-core, ai-sprint-queue, crate::errors, crate::telemetry
// ============================================================================

//! ## Overview
//! All five worker roles share one loop: heartbeat, consume the next pending
//! event addressed to the role's own agent id, act on it (or run an idle
//! action if nothing is pending), and acknowledge the outcome. [`Role::tick`]
//! is that loop; implementors supply [`Role::handle_event`] and, optionally,
//! [`Role::idle_action`].

use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::model::Event;
use ai_sprint_core::model::EventStatus;
use ai_sprint_core::store::SessionStore;
use ai_sprint_core::telemetry::Sink;
use ai_sprint_health::recover_task;
use ai_sprint_queue::EventQueue;

use crate::errors::WorkerError;
use crate::telemetry::WorkerEvent;

/// Seeds `agent_id`'s session binding from its recovery anchor (§4.6): the
/// most-recent non-terminal task it was bound to before this process
/// started. Every role constructor calls this before returning, so a
/// crashed-and-replaced session resumes the task its predecessor left mid-way
/// through rather than starting cold on its first [`Role::tick`].
///
/// A fresh session with nothing to resume leaves the binding untouched.
///
/// # Errors
///
/// Returns [`WorkerError::Store`] on a storage failure.
pub fn recover(sessions: &dyn SessionStore, agent_id: &AgentId) -> Result<(), WorkerError> {
    if let Some(task_id) = recover_task(sessions, agent_id)? {
        sessions.bind_task(agent_id, Some(&task_id))?;
    }
    Ok(())
}

/// One iteration of a worker role's heartbeat/consume/act/acknowledge loop.
pub trait Role {
    /// This role's own agent id.
    fn agent_id(&self) -> &AgentId;

    /// The session store this role heartbeats against.
    fn sessions(&self) -> &dyn SessionStore;

    /// The event queue this role consumes from and acknowledges against.
    fn events(&self) -> &dyn EventQueue;

    /// The telemetry sink this role reports through.
    fn telemetry(&self) -> &dyn Sink<WorkerEvent>;

    /// Acts on one consumed event, returning `Err` if the action failed.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] if the role could not act on the event.
    fn handle_event(&mut self, event: Event) -> Result<(), WorkerError>;

    /// Runs when no event is pending. The default does nothing; the
    /// Developer role overrides this with `claim_next_task`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] if the idle action failed.
    fn idle_action(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Runs one full loop iteration: heartbeat, consume, act or idle,
    /// acknowledge.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] if the heartbeat, consume, or acknowledge
    /// step itself fails (as opposed to the action the event triggered,
    /// which is acknowledged as failed rather than propagated).
    fn tick(&mut self) -> Result<(), WorkerError> {
        self.sessions().heartbeat(self.agent_id())?;
        self.telemetry().record(&WorkerEvent::Heartbeat { agent_id: self.agent_id().clone() });

        match self.events().consume(self.agent_id())? {
            Some(event) => {
                let event_id = event.id.clone();
                let event_type = event.payload.type_name();
                self.telemetry().record(&WorkerEvent::EventConsumed {
                    agent_id: self.agent_id().clone(),
                    event_type,
                });

                let outcome = self.handle_event(event);
                let status = if outcome.is_ok() { EventStatus::Done } else { EventStatus::Failed };
                self.events().acknowledge(&event_id, status)?;
                self.telemetry().record(&WorkerEvent::EventAcknowledged {
                    agent_id: self.agent_id().clone(),
                    event_type,
                    success: outcome.is_ok(),
                });
                outcome
            }
            None => {
                self.telemetry().record(&WorkerEvent::Idled { agent_id: self.agent_id().clone() });
                self.idle_action()
            }
        }
    }
}
