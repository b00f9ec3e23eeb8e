//! Event types for the presentation event system
//!
//! Provides the caller-facing event definitions and the EventBus shared by
//! the presentation engine and its HTTP/SSE surface.

mod presentation_types;

pub use presentation_types::{Cue, ErrorKind, SessionStatus};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Presentation event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Every variant carries the session it belongs to so that subscribers can
/// discard events from a session they no longer track.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PresentationEvent {
    /// Session lifecycle status changed
    ///
    /// Triggers:
    /// - SSE: Update play/pause/stop controls
    /// - UI: Show loading spinner or error banner
    StatusChanged {
        session_id: Uuid,
        old_status: SessionStatus,
        new_status: SessionStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Narration progress update
    ///
    /// Emitted on the audio handle's native position-update granularity,
    /// only when the percentage changed.
    Progress {
        session_id: Uuid,
        /// 0.0 - 100.0
        percent: f64,
        position_ms: u64,
        duration_ms: u64,
    },

    /// A timeline event fired (or the completion/neutral cue was applied)
    Cue {
        session_id: Uuid,
        /// Index of the timeline event, None for completion/neutral cues
        index: Option<usize>,
        /// Media time of the event in milliseconds
        time_ms: u64,
        cue: Cue,
    },

    /// Playback rate changed
    SpeedChanged {
        session_id: Uuid,
        old_speed: f64,
        new_speed: f64,
    },

    /// Narration reached its natural end
    ///
    /// Distinct from Stopped: only emitted when the audio ended by itself.
    Completed {
        session_id: Uuid,
        /// Timeline events that never fired because audio ended first
        skipped_cues: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session stopped by the caller or torn down
    Stopped {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session failed or a request was rejected
    Error {
        session_id: Uuid,
        kind: ErrorKind,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PresentationEvent {
    /// Session this event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            PresentationEvent::StatusChanged { session_id, .. }
            | PresentationEvent::Progress { session_id, .. }
            | PresentationEvent::Cue { session_id, .. }
            | PresentationEvent::SpeedChanged { session_id, .. }
            | PresentationEvent::Completed { session_id, .. }
            | PresentationEvent::Stopped { session_id, .. }
            | PresentationEvent::Error { session_id, .. } => *session_id,
        }
    }

    /// Variant name, used as the SSE event field
    pub fn event_type(&self) -> &'static str {
        match self {
            PresentationEvent::StatusChanged { .. } => "StatusChanged",
            PresentationEvent::Progress { .. } => "Progress",
            PresentationEvent::Cue { .. } => "Cue",
            PresentationEvent::SpeedChanged { .. } => "SpeedChanged",
            PresentationEvent::Completed { .. } => "Completed",
            PresentationEvent::Stopped { .. } => "Stopped",
            PresentationEvent::Error { .. } => "Error",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the engine)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use lesson_common::events::{EventBus, PresentationEvent, SessionStatus};
/// use uuid::Uuid;
///
/// let event_bus = EventBus::new(64);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(PresentationEvent::StatusChanged {
///     session_id: Uuid::new_v4(),
///     old_status: SessionStatus::Idle,
///     new_status: SessionStatus::Loading,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PresentationEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PresentationEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PresentationEvent,
    ) -> Result<usize, broadcast::error::SendError<PresentationEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PresentationEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_event(session_id: Uuid) -> PresentationEvent {
        PresentationEvent::StatusChanged {
            session_id,
            old_status: SessionStatus::Loading,
            new_status: SessionStatus::Presenting,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(32);
        assert_eq!(bus.capacity(), 32);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_emit_without_subscribers_fails() {
        let bus = EventBus::new(8);
        assert!(bus.emit(status_event(Uuid::new_v4())).is_err());
        // Lossy variant must not panic
        bus.emit_lossy(status_event(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_eventbus_delivers_to_all_subscribers() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let id = Uuid::new_v4();

        assert_eq!(bus.emit(status_event(id)).unwrap(), 2);
        assert_eq!(rx1.recv().await.unwrap().session_id(), id);
        assert_eq!(rx2.recv().await.unwrap().session_id(), id);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = PresentationEvent::Cue {
            session_id: Uuid::nil(),
            index: Some(1),
            time_ms: 5000,
            cue: Cue::new("explain", "happy", "Let's begin"),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Cue");
        assert_eq!(json["cue"]["gesture"], "explain");
        assert_eq!(json["time_ms"], 5000);
        assert_eq!(event.event_type(), "Cue");
    }

    #[test]
    fn test_session_status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Presenting).unwrap();
        assert_eq!(json, "\"presenting\"");
        assert_eq!(SessionStatus::Paused.to_string(), "paused");
    }

    #[test]
    fn test_session_status_classification() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Stopped.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(!SessionStatus::Loading.is_terminal());
        assert!(SessionStatus::Presenting.is_active());
        assert!(SessionStatus::Paused.is_active());
        assert!(!SessionStatus::Idle.is_active());
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::PresentationUnavailable).unwrap();
        assert_eq!(json, "\"presentation_unavailable\"");
        assert_eq!(ErrorKind::InvalidSpeed.to_string(), "InvalidSpeed");
    }

    #[test]
    fn test_default_cue_is_neutral() {
        let cue = Cue::default();
        assert_eq!(cue.gesture, "idle");
        assert_eq!(cue.emotion, "neutral");
        assert!(cue.subtitle.is_empty());
    }
}
