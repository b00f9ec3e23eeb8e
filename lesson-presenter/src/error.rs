//! Error types for lesson-presenter
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use lesson_common::events::ErrorKind;
use thiserror::Error;

/// Main error type for lesson-presenter
#[derive(Error, Debug)]
pub enum Error {
    /// Generation service failed, timed out, or returned no audio
    #[error("Presentation unavailable: {0}")]
    PresentationUnavailable(String),

    /// Timeline events are not ordered by time
    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),

    /// Playback speed must be a finite number greater than zero
    #[error("Invalid speed: {0}")]
    InvalidSpeed(f64),

    /// Underlying media error
    #[error("Audio playback error: {0}")]
    AudioPlayback(String),

    /// Session was superseded before its payload arrived
    #[error("Presentation cancelled: {0}")]
    Cancelled(String),

    /// Controller has been torn down
    #[error("Controller closed")]
    Closed,

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Caller-facing classification, for the taxonomy errors only
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::PresentationUnavailable(_) => Some(ErrorKind::PresentationUnavailable),
            Error::InvalidTimeline(_) => Some(ErrorKind::InvalidTimeline),
            Error::InvalidSpeed(_) => Some(ErrorKind::InvalidSpeed),
            Error::AudioPlayback(_) => Some(ErrorKind::AudioPlaybackError),
            _ => None,
        }
    }
}

impl From<lesson_common::Error> for Error {
    fn from(err: lesson_common::Error) -> Self {
        match err {
            lesson_common::Error::Io(e) => Error::Io(e),
            other => Error::Config(other.to_string()),
        }
    }
}

/// Convenience Result type using lesson-presenter Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_kinds() {
        assert_eq!(
            Error::PresentationUnavailable("down".into()).kind(),
            Some(ErrorKind::PresentationUnavailable)
        );
        assert_eq!(
            Error::InvalidTimeline("order".into()).kind(),
            Some(ErrorKind::InvalidTimeline)
        );
        assert_eq!(Error::InvalidSpeed(0.0).kind(), Some(ErrorKind::InvalidSpeed));
        assert_eq!(
            Error::AudioPlayback("decode".into()).kind(),
            Some(ErrorKind::AudioPlaybackError)
        );
        assert_eq!(Error::Closed.kind(), None);
    }

    #[test]
    fn test_common_error_conversion() {
        let err: Error = lesson_common::Error::Config("bad".into()).into();
        assert!(matches!(err, Error::Config(_)));
    }
}
