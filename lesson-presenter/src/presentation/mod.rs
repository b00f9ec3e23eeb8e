//! Narrated presentation engine
//!
//! - `payload`: generated audio URL plus gesture timeline
//! - `scheduler`: arms timeline events against the clock
//! - `session`: lifecycle state machine for one presentation
//! - `controller`: actor handle that drives the session
//! - `generation`: client for the presentation generation service

pub mod controller;
pub mod generation;
pub mod payload;
pub mod scheduler;
pub mod session;

pub use controller::PlaybackController;
pub use generation::{
    GenerationError, GenerationRequest, HttpPresentationService, LessonContent,
    PresentationOptions, PresentationService,
};
pub use payload::{PresentationPayload, TimelineEvent};
pub use scheduler::{ScheduleHandle, ScheduledCue, TimelineScheduler};
pub use session::{CueSettings, PresentationSession, SessionSnapshot};
