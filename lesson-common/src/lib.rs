//! # Lesson Common Library
//!
//! Shared code for the lesson presentation services including:
//! - Session status, cue and error-kind types
//! - Event types (PresentationEvent enum) and the EventBus
//! - Configuration file discovery
//! - Time utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{Cue, EventBus, PresentationEvent, SessionStatus};
