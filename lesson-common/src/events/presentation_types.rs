//! Presentation-related type definitions
//!
//! Supporting types for session lifecycle, cues and error classification.

use serde::{Deserialize, Serialize};

/// Presentation session lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No presentation has been started
    #[default]
    Idle,
    /// Waiting for the payload or for the audio to become playable
    Loading,
    /// Audio playing, cues armed
    Presenting,
    /// Audio paused, cues disarmed
    Paused,
    /// Audio reached its natural end
    Completed,
    /// Stopped by the caller (or torn down)
    Stopped,
    /// Payload fetch or audio playback failed
    Failed,
}

impl SessionStatus {
    /// True for states that hold no resources and accept no further playback
    /// commands except a new start
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Stopped | SessionStatus::Failed
        )
    }

    /// True while the session owns an audio handle that is playing or paused
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Presenting | SessionStatus::Paused)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Loading => write!(f, "loading"),
            SessionStatus::Presenting => write!(f, "presenting"),
            SessionStatus::Paused => write!(f, "paused"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Stopped => write!(f, "stopped"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Gesture, emotion and subtitle currently shown by the presenter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub gesture: String,
    pub emotion: String,
    pub subtitle: String,
}

impl Cue {
    pub fn new(gesture: &str, emotion: &str, subtitle: &str) -> Self {
        Self {
            gesture: gesture.to_string(),
            emotion: emotion.to_string(),
            subtitle: subtitle.to_string(),
        }
    }

    /// Resting cue shown before the first event and after a stop
    pub fn neutral() -> Self {
        Self::new("idle", "neutral", "")
    }

    /// Cue shown once narration has ended naturally
    pub fn completion() -> Self {
        Self::new("wave", "happy", "Thank you for listening!")
    }
}

impl Default for Cue {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Error classification surfaced to callers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Generation service failed or returned no audio
    PresentationUnavailable,
    /// Timeline events were not in time order
    InvalidTimeline,
    /// Speed was zero, negative or not finite
    InvalidSpeed,
    /// The audio primitive reported a media error
    AudioPlaybackError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::PresentationUnavailable => write!(f, "PresentationUnavailable"),
            ErrorKind::InvalidTimeline => write!(f, "InvalidTimeline"),
            ErrorKind::InvalidSpeed => write!(f, "InvalidSpeed"),
            ErrorKind::AudioPlaybackError => write!(f, "AudioPlaybackError"),
        }
    }
}
