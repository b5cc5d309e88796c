// crates/ai-sprint-worker/src/librarian.rs
// ============================================================================
// Module: Librarian Role
// Description: Regenerates a completed convoy's documentation.
// Purpose: Implement §4.7's Librarian loop: on UPDATE_DOCS, regenerate docs
//          for the named convoy via the documentation host.
// Dependencies: ai-sprint-core, ai-sprint-queue, crate::role
// ============================================================================

//! ## Overview
//! Librarian is the simplest role: it reacts only to `UPDATE_DOCS` and
//! delegates the actual regeneration to a constructor-injected
//! [`ai_sprint_core::interfaces::DocsHost`], the out-of-scope external
//! boundary §4.7 calls for. It has no idle action; with nothing pending it
//! does nothing, same as the default [`Role::idle_action`].

use ai_sprint_core::events::EventPayload;
use ai_sprint_core::identifiers::AgentId;
use ai_sprint_core::interfaces::DocsHost;
use ai_sprint_core::model::Event;
use ai_sprint_core::store::SessionStore;
use ai_sprint_core::telemetry::Sink;
use ai_sprint_queue::EventQueue;

use crate::errors::WorkerError;
use crate::role::Role;
use crate::telemetry::WorkerEvent;

/// The Librarian worker: regenerates documentation for completed convoys.
pub struct Librarian<'a> {
    agent_id: AgentId,
    sessions: &'a dyn SessionStore,
    events: &'a dyn EventQueue,
    telemetry: &'a dyn Sink<WorkerEvent>,
    docs: &'a mut dyn DocsHost,
}

impl<'a> Librarian<'a> {
    /// Creates a Librarian role over the given session store, queue,
    /// telemetry sink, and documentation host, recovering any task the
    /// session was already bound to.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Store`] if recovery fails to read the session
    /// store.
    pub fn new(
        agent_id: AgentId,
        sessions: &'a dyn SessionStore,
        events: &'a dyn EventQueue,
        telemetry: &'a dyn Sink<WorkerEvent>,
        docs: &'a mut dyn DocsHost,
    ) -> Result<Self, WorkerError> {
        crate::role::recover(sessions, &agent_id)?;
        Ok(Self { agent_id, sessions, events, telemetry, docs })
    }
}

impl Role for Librarian<'_> {
    fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    fn sessions(&self) -> &dyn SessionStore {
        self.sessions
    }

    fn events(&self) -> &dyn EventQueue {
        self.events
    }

    fn telemetry(&self) -> &dyn Sink<WorkerEvent> {
        self.telemetry
    }

    fn handle_event(&mut self, event: Event) -> Result<(), WorkerError> {
        match event.payload {
            EventPayload::UpdateDocs { convoy_id } => {
                self.docs.regenerate(&convoy_id)?;
                self.telemetry.record(&WorkerEvent::DocsRegenerated { convoy_id });
                Ok(())
            }
            other => Err(WorkerError::UnexpectedEvent {
                agent_id: self.agent_id.clone(),
                event_type: other.type_name(),
            }),
        }
    }
}
