//! Audio handle abstraction
//!
//! The presentation engine never touches a media element directly. It owns a
//! boxed [`AudioHandle`] created by an [`AudioBackend`] and learns about
//! playback progress through [`AudioEvent`]s delivered to an
//! [`AudioEventSink`].

use crate::error::Result;
use tokio::sync::mpsc;

/// Native events raised by an audio handle
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// Track loaded and ready to play
    CanPlay { duration_ms: u64 },
    /// Periodic position report while playing
    TimeUpdate { position_ms: u64 },
    /// Playback reached the end of the track
    Ended,
    /// Media error; the handle is unusable afterwards
    Error { message: String },
}

/// Delivery endpoint for audio events, bound to one session generation
///
/// The generation travels with every event so the receiver can drop events
/// raised by a handle that has since been released.
#[derive(Debug, Clone)]
pub struct AudioEventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, AudioEvent)>,
}

impl AudioEventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, AudioEvent)>) -> Self {
        Self { generation, tx }
    }

    /// Deliver an event; returns false once the receiver is gone
    pub fn emit(&self, event: AudioEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Playback primitive controlled by a presentation session
///
/// Loading is asynchronous: `load` returns immediately and completion is
/// reported through [`AudioEvent::CanPlay`] or [`AudioEvent::Error`].
pub trait AudioHandle: Send {
    fn load(&mut self, url: &str);
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn seek(&mut self, position_ms: u64);
    fn current_time_ms(&self) -> u64;
    fn duration_ms(&self) -> Option<u64>;
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64);
    /// Stop all activity and free the underlying resource; idempotent
    fn release(&mut self);
}

/// Factory for audio handles
pub trait AudioBackend: Send + Sync {
    fn create(&self, sink: AudioEventSink, duration_hint_ms: Option<u64>) -> Box<dyn AudioHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tags_events_with_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = AudioEventSink::new(7, tx);

        assert!(sink.emit(AudioEvent::Ended));
        assert_eq!(rx.try_recv().unwrap(), (7, AudioEvent::Ended));
        assert_eq!(sink.generation(), 7);
    }

    #[test]
    fn test_sink_reports_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = AudioEventSink::new(1, tx);
        drop(rx);
        assert!(!sink.emit(AudioEvent::TimeUpdate { position_ms: 10 }));
    }
}
