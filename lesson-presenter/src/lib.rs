//! # Lesson Presenter Library (lesson-presenter)
//!
//! Narrated lesson presentation engine.
//!
//! **Purpose:** Fetch a generated narration track plus its gesture timeline,
//! play the narration and fire each timeline cue at the matching media time,
//! with pause, resume, stop and speed control.
//!
//! **Architecture:** A single actor task (`PlaybackController`) owns the
//! session, its audio handle and its armed timers; an axum HTTP/SSE surface
//! drives the controller and streams its events.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod presentation;
pub mod state;

pub use error::{Error, Result};
pub use presentation::PlaybackController;
pub use state::SharedState;
