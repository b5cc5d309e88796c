// crates/ai-sprint-core/src/telemetry.rs
// ============================================================================
// Module: Telemetry Sink
// Description: A dependency-light, constructor-injected observability seam.
// Purpose: Give every layer a place to emit structured events without
//          pulling in a logging framework.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Rather than a process-global logger (the source's `logging.py` module),
//! every service that emits operational signal takes a `Sink` at
//! construction time and records small, typed events through it. This keeps
//! the coordination plane's behavior observable without deciding for the
//! caller how those events should be rendered, shipped, or retained.

use std::sync::Mutex;

/// Destination for structured telemetry events of type `E`.
///
/// Implementations must not panic; a telemetry failure must never abort the
/// operation being observed.
pub trait Sink<E>: Send + Sync {
    /// Records one event.
    fn record(&self, event: &E);
}

/// A sink that discards every event; the default for production code paths
/// that have not wired a real destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl<E> Sink<E> for NullSink {
    fn record(&self, _event: &E) {}
}

/// A sink that collects every event in memory, for assertions in tests.
#[derive(Debug, Default)]
pub struct VecSink<E> {
    events: Mutex<Vec<E>>,
}

impl<E> VecSink<E> {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self { events: Mutex::new(Vec::new()) }
    }
}

impl<E: Clone + Send> Sink<E> for VecSink<E> {
    fn record(&self, event: &E) {
        let Ok(mut events) = self.events.lock() else {
            return;
        };
        events.push(event.clone());
    }
}

impl<E: Clone> VecSink<E> {
    /// Returns a snapshot of every event recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned, which only happens if a
    /// prior call to [`Sink::record`] panicked while holding it.
    #[must_use]
    pub fn events(&self) -> Vec<E> {
        self.events.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}
