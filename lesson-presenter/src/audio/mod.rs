//! Audio playback primitives used by the presentation engine

pub mod clock;
pub mod handle;
pub mod probe;

pub use clock::{ClockAudio, ClockAudioBackend, ClockSettings};
pub use handle::{AudioBackend, AudioEvent, AudioEventSink, AudioHandle};
