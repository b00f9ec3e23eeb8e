//! Presentation session state machine
//!
//! Owns everything one narrated presentation needs: the payload, the audio
//! handle, the armed timeline timers and the caller-visible state (status,
//! speed, progress, current cue).
//!
//! **State transitions:**
//! - `Idle/any --begin--> Loading`
//! - `Loading --payload + canPlay--> Presenting`
//! - `Loading --fetch error--> Failed`
//! - `Loading --invalid timeline--> Loading` (nothing armed, nothing loaded)
//! - `Presenting <--pause/resume--> Paused` (timers cancelled on pause and
//!   re-armed from the audio position on resume)
//! - `Presenting/Paused --ended--> Completed`
//! - `any --audio error--> Failed`
//! - `any --stop/teardown--> Stopped`
//!
//! **Stale callback guards:**
//! - `generation` is bumped on begin/stop/teardown/fail. Audio events and
//!   payload arrivals carry the generation they were created under.
//! - `schedule_epoch` is bumped whenever armed timers are cancelled. Timer
//!   fires carry the epoch they were armed under.
//! - `next_cue` only moves forward, so no timeline event is applied twice.
//!
//! The session is driven by exactly one task (the controller actor), so it
//! needs no internal locking.

use crate::audio::{AudioBackend, AudioEvent, AudioEventSink, AudioHandle};
use crate::error::{Error, Result};
use crate::presentation::payload::PresentationPayload;
use crate::presentation::scheduler::{ScheduleHandle, TimelineScheduler};
use lesson_common::events::{Cue, ErrorKind, EventBus, PresentationEvent, SessionStatus};
use lesson_common::time::now;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Cues applied outside the timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueSettings {
    /// Shown before the first event and after stop
    pub neutral: Cue,
    /// Shown when narration ends naturally
    pub completion: Cue,
}

impl Default for CueSettings {
    fn default() -> Self {
        Self {
            neutral: Cue::neutral(),
            completion: Cue::completion(),
        }
    }
}

/// Timer fire notification: `(schedule_epoch, timeline index)`
pub type CueDue = (u64, usize);

/// Read-side view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub speed: f64,
    pub progress_percent: f64,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub cue: Cue,
    pub fired_cues: usize,
    pub total_cues: usize,
    pub armed_timers: usize,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            session_id: Uuid::nil(),
            status: SessionStatus::Idle,
            speed: 1.0,
            progress_percent: 0.0,
            position_ms: 0,
            duration_ms: None,
            cue: Cue::neutral(),
            fired_cues: 0,
            total_cues: 0,
            armed_timers: 0,
        }
    }
}

/// One presentation's lifecycle, resources and visible state
pub struct PresentationSession {
    id: Uuid,
    status: SessionStatus,
    speed: f64,
    progress_percent: f64,
    position_ms: u64,
    duration_ms: Option<u64>,
    cue: Cue,
    payload: Option<PresentationPayload>,
    next_cue: usize,

    audio: Option<Box<dyn AudioHandle>>,
    schedule: ScheduleHandle,

    generation: u64,
    schedule_epoch: u64,
    torn_down: bool,

    cues: CueSettings,
    backend: Arc<dyn AudioBackend>,
    bus: EventBus,
    cue_tx: mpsc::UnboundedSender<CueDue>,
    audio_tx: mpsc::UnboundedSender<(u64, AudioEvent)>,
}

impl PresentationSession {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        bus: EventBus,
        cues: CueSettings,
        cue_tx: mpsc::UnboundedSender<CueDue>,
        audio_tx: mpsc::UnboundedSender<(u64, AudioEvent)>,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            status: SessionStatus::Idle,
            speed: 1.0,
            progress_percent: 0.0,
            position_ms: 0,
            duration_ms: None,
            cue: cues.neutral.clone(),
            payload: None,
            next_cue: 0,
            audio: None,
            schedule: ScheduleHandle::empty(),
            generation: 0,
            schedule_epoch: 0,
            torn_down: false,
            cues,
            backend,
            bus,
            cue_tx,
            audio_tx,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn schedule_epoch(&self) -> u64 {
        self.schedule_epoch
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn current_cue(&self) -> &Cue {
        &self.cue
    }

    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    /// Timers armed and not yet fired or cancelled
    pub fn armed_timers(&self) -> usize {
        self.schedule.pending()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            status: self.status,
            speed: self.speed,
            progress_percent: self.progress_percent,
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            cue: self.cue.clone(),
            fired_cues: self.next_cue,
            total_cues: self.payload.as_ref().map_or(0, |p| p.timeline.len()),
            armed_timers: self.schedule.pending(),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Discard any previous presentation and enter Loading
    ///
    /// Returns the generation the new session runs under.
    pub fn begin(&mut self, speed: f64) -> Result<u64> {
        if self.torn_down {
            return Err(Error::Closed);
        }
        validate_speed(speed)?;

        self.release_resources();
        self.generation += 1;
        self.id = Uuid::new_v4();
        self.speed = speed;
        self.progress_percent = 0.0;
        self.position_ms = 0;
        self.duration_ms = None;
        self.payload = None;
        self.next_cue = 0;
        self.cue = self.cues.neutral.clone();

        info!(session_id = %self.id, generation = self.generation, speed, "Presentation starting");
        self.set_status(SessionStatus::Loading);
        Ok(self.generation)
    }

    /// Take the payload for `generation`, create and load the audio handle
    ///
    /// An out-of-order timeline leaves the session in Loading with nothing
    /// armed and nothing loaded.
    pub fn accept_payload(&mut self, generation: u64, payload: PresentationPayload) -> Result<()> {
        if !self.is_current(generation) || self.status != SessionStatus::Loading {
            warn!(generation, current = self.generation, "Ignoring stale payload");
            return Err(Error::Cancelled("presentation was superseded".to_string()));
        }

        if let Err(e) = payload.validate() {
            match &e {
                Error::InvalidTimeline(message) => {
                    warn!(session_id = %self.id, "Rejected timeline: {}", message);
                    self.emit_error(ErrorKind::InvalidTimeline, message);
                }
                other => self.fail(ErrorKind::PresentationUnavailable, &other.to_string()),
            }
            return Err(e);
        }

        info!(
            session_id = %self.id,
            audio_url = %payload.audio_url,
            cues = payload.timeline.len(),
            "Presentation payload ready"
        );

        let sink = AudioEventSink::new(self.generation, self.audio_tx.clone());
        let mut audio = self.backend.create(sink, payload.duration_hint_ms);
        audio.set_playback_rate(self.speed);
        audio.load(&payload.audio_url);

        self.duration_ms = payload.duration_hint_ms;
        self.payload = Some(payload);
        self.audio = Some(audio);
        Ok(())
    }

    /// The generation service failed for `generation`
    pub fn payload_failed(&mut self, generation: u64, message: &str) {
        if !self.is_current(generation) || self.status != SessionStatus::Loading {
            return;
        }
        self.fail(ErrorKind::PresentationUnavailable, message);
    }

    /// Handle a native audio event raised under `generation`
    pub fn on_audio_event(&mut self, generation: u64, event: AudioEvent) {
        if !self.is_current(generation) || self.audio.is_none() {
            debug!(generation, current = self.generation, ?event, "Dropping stale audio event");
            return;
        }

        match event {
            AudioEvent::CanPlay { duration_ms } => self.on_can_play(duration_ms),
            AudioEvent::TimeUpdate { position_ms } => self.on_time_update(position_ms),
            AudioEvent::Ended => {
                if self.status.is_active() {
                    self.complete();
                }
            }
            AudioEvent::Error { message } => {
                error!(session_id = %self.id, "Audio playback error: {}", message);
                self.fail(ErrorKind::AudioPlaybackError, &message);
            }
        }
    }

    /// A timer armed under `epoch` reports timeline event `index` due
    pub fn on_cue_due(&mut self, epoch: u64, index: usize) {
        if epoch != self.schedule_epoch || self.status != SessionStatus::Presenting {
            debug!(epoch, current = self.schedule_epoch, index, "Dropping stale cue");
            return;
        }
        self.fire_through(index);
    }

    /// Presenting → Paused; no-op in any other state
    pub fn pause(&mut self) -> bool {
        if self.status != SessionStatus::Presenting {
            return false;
        }

        if let Some(audio) = self.audio.as_mut() {
            audio.pause();
            self.position_ms = audio.current_time_ms();
        }
        self.cancel_schedule();
        self.catch_up(self.position_ms);

        info!(session_id = %self.id, position_ms = self.position_ms, "Presentation paused");
        self.set_status(SessionStatus::Paused);
        true
    }

    /// Paused → Presenting; no-op in any other state
    pub fn resume(&mut self) -> bool {
        if self.status != SessionStatus::Paused {
            return false;
        }

        let played = match self.audio.as_mut() {
            Some(audio) => audio.play().map(|_| audio.current_time_ms()),
            None => Err(Error::AudioPlayback("no audio handle".to_string())),
        };

        match played {
            Ok(position_ms) => {
                self.position_ms = position_ms;
                self.arm_remaining(position_ms);
                info!(session_id = %self.id, position_ms, "Presentation resumed");
                self.set_status(SessionStatus::Presenting);
                true
            }
            Err(e) => {
                self.fail(ErrorKind::AudioPlaybackError, &e.to_string());
                false
            }
        }
    }

    /// Change playback speed, rescaling the remaining cue timers
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        validate_speed(speed)?;
        let old_speed = self.speed;
        self.speed = speed;

        if let Some(audio) = self.audio.as_mut() {
            audio.set_playback_rate(speed);
        }

        if self.status == SessionStatus::Presenting {
            let position_ms = self
                .audio
                .as_ref()
                .map_or(self.position_ms, |a| a.current_time_ms());
            self.position_ms = position_ms;
            self.cancel_schedule();
            self.arm_remaining(position_ms);
        } else if self.status == SessionStatus::Idle || self.status.is_terminal() {
            debug!(session_id = %self.id, speed, "Speed recorded for the next presentation");
        }

        if (old_speed - speed).abs() > f64::EPSILON {
            info!(session_id = %self.id, old_speed, new_speed = speed, "Playback speed changed");
            self.bus.emit_lossy(PresentationEvent::SpeedChanged {
                session_id: self.id,
                old_speed,
                new_speed: speed,
            });
        }
        Ok(())
    }

    /// Cancel everything and rest in Stopped; idempotent
    pub fn stop(&mut self) {
        if let Some(audio) = self.audio.as_mut() {
            audio.pause();
            audio.seek(0);
        }
        self.release_resources();
        self.generation += 1;

        self.position_ms = 0;
        self.progress_percent = 0.0;
        if self.cue != self.cues.neutral {
            self.cue = self.cues.neutral.clone();
            self.emit_cue(None, 0);
        }

        if self.status != SessionStatus::Stopped {
            info!(session_id = %self.id, "Presentation stopped");
            self.set_status(SessionStatus::Stopped);
            self.bus.emit_lossy(PresentationEvent::Stopped {
                session_id: self.id,
                timestamp: now(),
            });
        }
    }

    /// Final cleanup; the session accepts no further playback afterwards
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.stop();
        self.torn_down = true;
        debug!(session_id = %self.id, "Session torn down");
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn is_current(&self, generation: u64) -> bool {
        !self.torn_down && generation == self.generation
    }

    fn on_can_play(&mut self, duration_ms: u64) {
        if self.status != SessionStatus::Loading {
            return;
        }
        self.duration_ms = Some(duration_ms);
        if let Some(last_ms) = self.payload.as_ref().and_then(|p| p.last_event_ms()) {
            if last_ms > duration_ms {
                warn!(
                    session_id = %self.id,
                    last_ms,
                    duration_ms,
                    "Timeline runs past the end of the track; trailing cues will be skipped"
                );
            }
        }

        let started = match self.audio.as_mut() {
            Some(audio) => {
                audio.set_playback_rate(self.speed);
                audio.play().map(|_| audio.current_time_ms())
            }
            None => return,
        };

        match started {
            Ok(position_ms) => {
                self.position_ms = position_ms;
                self.arm_remaining(position_ms);
                info!(session_id = %self.id, duration_ms, "Presentation playing");
                self.set_status(SessionStatus::Presenting);
                self.emit_progress();
            }
            Err(e) => self.fail(ErrorKind::AudioPlaybackError, &e.to_string()),
        }
    }

    fn on_time_update(&mut self, position_ms: u64) {
        if self.status != SessionStatus::Presenting {
            return;
        }
        self.position_ms = position_ms;
        self.catch_up(position_ms);

        let Some(duration_ms) = self.duration_ms.filter(|d| *d > 0) else {
            return;
        };
        let percent = (position_ms as f64 / duration_ms as f64 * 100.0).clamp(0.0, 100.0);
        if percent > self.progress_percent {
            self.progress_percent = percent;
            self.emit_progress();
        }
    }

    /// Fire every unfired event at or before `position_ms`
    fn catch_up(&mut self, position_ms: u64) {
        let Some(payload) = self.payload.as_ref() else {
            return;
        };
        let due = payload.timeline[self.next_cue.min(payload.timeline.len())..]
            .iter()
            .take_while(|e| e.time_ms <= position_ms)
            .count();
        if due > 0 {
            self.fire_through(self.next_cue + due - 1);
        }
    }

    /// Apply timeline events `next_cue..=index` in order
    fn fire_through(&mut self, index: usize) {
        let Some(payload) = self.payload.as_ref() else {
            return;
        };
        if index < self.next_cue || index >= payload.timeline.len() {
            return;
        }

        let fired: Vec<_> = payload.timeline[self.next_cue..=index]
            .iter()
            .enumerate()
            .map(|(offset, event)| (self.next_cue + offset, event.time_ms, event.cue()))
            .collect();
        self.next_cue = index + 1;

        for (i, time_ms, cue) in fired {
            debug!(session_id = %self.id, index = i, time_ms, gesture = %cue.gesture, "Cue fired");
            self.cue = cue;
            self.emit_cue(Some(i), time_ms);
        }
    }

    fn arm_remaining(&mut self, origin_ms: u64) {
        self.cancel_schedule();
        let Some(payload) = self.payload.as_ref() else {
            return;
        };
        if self.next_cue >= payload.timeline.len() {
            return;
        }

        let epoch = self.schedule_epoch;
        let tx = self.cue_tx.clone();
        self.schedule = TimelineScheduler::arm_from(
            &payload.timeline,
            self.next_cue,
            origin_ms,
            self.speed,
            move |cue| {
                let _ = tx.send((epoch, cue.index));
            },
        );
    }

    fn cancel_schedule(&mut self) {
        self.schedule.cancel_all();
        self.schedule_epoch += 1;
    }

    fn release_resources(&mut self) {
        self.cancel_schedule();
        if let Some(mut audio) = self.audio.take() {
            audio.release();
        }
    }

    fn complete(&mut self) {
        let total = self.payload.as_ref().map_or(0, |p| p.timeline.len());
        let skipped = total.saturating_sub(self.next_cue);
        if skipped > 0 {
            debug!(session_id = %self.id, skipped, "Audio ended before all cues fired");
        }
        self.next_cue = total;

        let duration_ms = self.duration_ms.unwrap_or(self.position_ms);
        self.release_resources();

        self.position_ms = duration_ms;
        self.progress_percent = 100.0;
        self.emit_progress();

        self.cue = self.cues.completion.clone();
        self.emit_cue(None, duration_ms);

        info!(session_id = %self.id, skipped, "Presentation completed");
        self.set_status(SessionStatus::Completed);
        self.bus.emit_lossy(PresentationEvent::Completed {
            session_id: self.id,
            skipped_cues: skipped,
            timestamp: now(),
        });
    }

    fn fail(&mut self, kind: ErrorKind, message: &str) {
        self.release_resources();
        self.generation += 1;
        error!(session_id = %self.id, %kind, "Presentation failed: {}", message);
        self.emit_error(kind, message);
        self.set_status(SessionStatus::Failed);
    }

    fn set_status(&mut self, new_status: SessionStatus) {
        let old_status = self.status;
        if old_status == new_status {
            return;
        }
        self.status = new_status;
        self.bus.emit_lossy(PresentationEvent::StatusChanged {
            session_id: self.id,
            old_status,
            new_status,
            timestamp: now(),
        });
    }

    fn emit_progress(&self) {
        self.bus.emit_lossy(PresentationEvent::Progress {
            session_id: self.id,
            percent: self.progress_percent,
            position_ms: self.position_ms,
            duration_ms: self.duration_ms.unwrap_or_default(),
        });
    }

    fn emit_cue(&self, index: Option<usize>, time_ms: u64) {
        self.bus.emit_lossy(PresentationEvent::Cue {
            session_id: self.id,
            index,
            time_ms,
            cue: self.cue.clone(),
        });
    }

    fn emit_error(&self, kind: ErrorKind, message: &str) {
        self.bus.emit_lossy(PresentationEvent::Error {
            session_id: self.id,
            kind,
            message: message.to_string(),
            timestamp: now(),
        });
    }
}

/// Speed must be finite and strictly positive
pub fn validate_speed(speed: f64) -> Result<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidSpeed(speed))
    }
}
