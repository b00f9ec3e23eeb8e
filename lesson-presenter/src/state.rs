//! Shared presentation state
//!
//! Read-side state shared between the controller actor and the HTTP/SSE
//! surface. The actor publishes a snapshot after every message it handles;
//! handlers read the last published snapshot without a round trip.

use crate::presentation::SessionSnapshot;
use lesson_common::events::{EventBus, PresentationEvent};
use tokio::sync::{broadcast, RwLock};

/// Shared state accessible by all components
///
/// Uses RwLock for concurrent read access with one writer (the actor)
pub struct SharedState {
    /// Last snapshot published by the controller
    snapshot: RwLock<SessionSnapshot>,

    /// Event broadcaster for subscribers and SSE
    bus: EventBus,
}

impl SharedState {
    pub fn new(event_capacity: usize) -> Self {
        Self {
            snapshot: RwLock::new(SessionSnapshot::default()),
            bus: EventBus::new(event_capacity),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn publish(&self, snapshot: SessionSnapshot) {
        *self.snapshot.write().await = snapshot;
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribe to the presentation event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<PresentationEvent> {
        self.bus.subscribe()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(256)
    }
}
