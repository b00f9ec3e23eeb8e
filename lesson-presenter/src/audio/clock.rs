//! Clock-driven audio handle
//!
//! Tracks a narration position on the tokio clock instead of a sound device.
//! Position advances by `elapsed * playback_rate` while playing, a ticker
//! raises `TimeUpdate` at the configured granularity, and `Ended` is raised
//! when the position reaches the track duration.
//!
//! The track duration comes from a symphonia probe of the fetched track, or
//! from the payload's duration hint when probing is disabled or fails.

use super::handle::{AudioBackend, AudioEvent, AudioEventSink, AudioHandle};
use super::probe;
use crate::error::{Error, Result};
use lesson_common::time::{media_to_wall, millis_to_duration, wall_to_media};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Tuning for clock-driven playback
#[derive(Debug, Clone)]
pub struct ClockSettings {
    /// Wall-clock interval between TimeUpdate events
    pub time_update_interval_ms: u64,
    /// Fetch and probe the track for its duration
    pub probe_duration: bool,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            time_update_interval_ms: 250,
            probe_duration: true,
        }
    }
}

/// Creates [`ClockAudio`] handles
#[derive(Clone)]
pub struct ClockAudioBackend {
    client: reqwest::Client,
    settings: ClockSettings,
}

impl ClockAudioBackend {
    pub fn new(client: reqwest::Client, settings: ClockSettings) -> Self {
        Self { client, settings }
    }
}

impl AudioBackend for ClockAudioBackend {
    fn create(&self, sink: AudioEventSink, duration_hint_ms: Option<u64>) -> Box<dyn AudioHandle> {
        Box::new(ClockAudio::new(
            self.client.clone(),
            self.settings.clone(),
            sink,
            duration_hint_ms,
        ))
    }
}

#[derive(Debug)]
struct ClockState {
    /// Instant at which `anchor_position_ms` was valid
    anchor: Instant,
    anchor_position_ms: u64,
    rate: f64,
    playing: bool,
    duration_ms: Option<u64>,
    released: bool,
}

impl ClockState {
    fn position_at(&self, now: Instant) -> u64 {
        let position = if self.playing {
            self.anchor_position_ms
                .saturating_add(wall_to_media(now.saturating_duration_since(self.anchor), self.rate))
        } else {
            self.anchor_position_ms
        };
        match self.duration_ms {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    /// Fold elapsed play time into the anchor
    fn rebase(&mut self, now: Instant) {
        self.anchor_position_ms = self.position_at(now);
        self.anchor = now;
    }
}

/// Audio handle whose position follows the tokio clock
pub struct ClockAudio {
    client: reqwest::Client,
    settings: ClockSettings,
    sink: AudioEventSink,
    duration_hint_ms: Option<u64>,
    state: Arc<Mutex<ClockState>>,
    loader: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl ClockAudio {
    pub fn new(
        client: reqwest::Client,
        settings: ClockSettings,
        sink: AudioEventSink,
        duration_hint_ms: Option<u64>,
    ) -> Self {
        Self {
            client,
            settings,
            sink,
            duration_hint_ms,
            state: Arc::new(Mutex::new(ClockState {
                anchor: Instant::now(),
                anchor_position_ms: 0,
                rate: 1.0,
                playing: false,
                duration_ms: None,
                released: false,
            })),
            loader: None,
            ticker: None,
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ClockState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn start_ticker(&mut self) {
        self.stop_ticker();
        let state = Arc::clone(&self.state);
        let sink = self.sink.clone();
        let interval = millis_to_duration(self.settings.time_update_interval_ms.max(1));
        self.ticker = Some(tokio::spawn(run_ticker(state, sink, interval)));
    }
}

/// Raise TimeUpdate every `interval` and Ended at the end of the track
async fn run_ticker(state: Arc<Mutex<ClockState>>, sink: AudioEventSink, interval: Duration) {
    loop {
        let wait = {
            let guard = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if guard.released || !guard.playing {
                return;
            }
            let Some(duration) = guard.duration_ms else {
                return;
            };
            let position = guard.position_at(Instant::now());
            interval.min(media_to_wall(duration.saturating_sub(position), guard.rate))
        };

        tokio::time::sleep(wait).await;

        let event = {
            let mut guard = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if guard.released || !guard.playing {
                return;
            }
            let now = Instant::now();
            let position = guard.position_at(now);
            match guard.duration_ms {
                Some(duration) if position >= duration => {
                    guard.rebase(now);
                    guard.playing = false;
                    None
                }
                _ => Some(position),
            }
        };

        match event {
            Some(position_ms) => {
                sink.emit(AudioEvent::TimeUpdate { position_ms });
            }
            None => {
                let duration_ms = state
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .duration_ms
                    .unwrap_or_default();
                sink.emit(AudioEvent::TimeUpdate {
                    position_ms: duration_ms,
                });
                sink.emit(AudioEvent::Ended);
                return;
            }
        }
    }
}

impl AudioHandle for ClockAudio {
    fn load(&mut self, url: &str) {
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }

        let client = self.client.clone();
        let sink = self.sink.clone();
        let state = Arc::clone(&self.state);
        let probe_enabled = self.settings.probe_duration;
        let hint = self.duration_hint_ms;
        let url = url.to_string();

        self.loader = Some(tokio::spawn(async move {
            let duration = if probe_enabled {
                match probe::probe_duration(&client, &url).await {
                    Ok(duration) => Some(duration),
                    Err(e) => {
                        warn!(url = %url, "Duration probe failed: {}", e);
                        None
                    }
                }
            } else {
                None
            };

            let Some(duration_ms) = duration.or(hint) else {
                sink.emit(AudioEvent::Error {
                    message: format!("Could not determine duration of {}", url),
                });
                return;
            };

            {
                let mut guard = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                if guard.released {
                    return;
                }
                guard.duration_ms = Some(duration_ms);
            }

            debug!(url = %url, duration_ms, "Track ready to play");
            sink.emit(AudioEvent::CanPlay { duration_ms });
        }));
    }

    fn play(&mut self) -> Result<()> {
        let ready = self.with_state(|s| {
            if s.released || s.duration_ms.is_none() {
                return false;
            }
            s.rebase(Instant::now());
            s.playing = true;
            true
        });
        if !ready {
            return Err(Error::AudioPlayback("track is not loaded".to_string()));
        }
        self.start_ticker();
        Ok(())
    }

    fn pause(&mut self) {
        self.with_state(|s| {
            s.rebase(Instant::now());
            s.playing = false;
        });
        self.stop_ticker();
    }

    fn seek(&mut self, position_ms: u64) {
        self.with_state(|s| {
            s.anchor = Instant::now();
            s.anchor_position_ms = match s.duration_ms {
                Some(duration) => position_ms.min(duration),
                None => position_ms,
            };
        });
    }

    fn current_time_ms(&self) -> u64 {
        self.with_state(|s| s.position_at(Instant::now()))
    }

    fn duration_ms(&self) -> Option<u64> {
        self.with_state(|s| s.duration_ms)
    }

    fn playback_rate(&self) -> f64 {
        self.with_state(|s| s.rate)
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            return;
        }
        self.with_state(|s| {
            s.rebase(Instant::now());
            s.rate = rate;
        });
    }

    fn release(&mut self) {
        self.with_state(|s| {
            s.released = true;
            s.playing = false;
        });
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
        self.stop_ticker();
    }
}

impl Drop for ClockAudio {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle(interval_ms: u64, hint: Option<u64>) -> (ClockAudio, mpsc::UnboundedReceiver<(u64, AudioEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let settings = ClockSettings {
            time_update_interval_ms: interval_ms,
            probe_duration: false,
        };
        let audio = ClockAudio::new(reqwest::Client::new(), settings, AudioEventSink::new(1, tx), hint);
        (audio, rx)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<(u64, AudioEvent)>) -> Vec<AudioEvent> {
        let mut events = Vec::new();
        while let Ok((_, event)) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_with_hint_reports_can_play() {
        let (mut audio, mut rx) = handle(250, Some(3000));
        audio.load("lesson.mp3");
        advance(1).await;

        assert_eq!(drain(&mut rx), vec![AudioEvent::CanPlay { duration_ms: 3000 }]);
        assert_eq!(audio.duration_ms(), Some(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_without_duration_reports_error() {
        let (mut audio, mut rx) = handle(250, None);
        audio.load("lesson.mp3");
        advance(1).await;

        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [AudioEvent::Error { .. }]));
        assert!(audio.play().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_updates_and_ended() {
        let (mut audio, mut rx) = handle(250, Some(1000));
        audio.load("lesson.mp3");
        advance(1).await;
        drain(&mut rx);

        audio.play().unwrap();
        advance(600).await;
        let updates = drain(&mut rx);
        assert_eq!(
            updates,
            vec![
                AudioEvent::TimeUpdate { position_ms: 250 },
                AudioEvent::TimeUpdate { position_ms: 500 },
            ]
        );
        assert_eq!(audio.current_time_ms(), 600);

        advance(1000).await;
        let tail = drain(&mut rx);
        assert_eq!(
            tail,
            vec![
                AudioEvent::TimeUpdate { position_ms: 750 },
                AudioEvent::TimeUpdate { position_ms: 1000 },
                AudioEvent::Ended,
            ]
        );
        assert_eq!(audio.current_time_ms(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_scales_position() {
        let (mut audio, mut rx) = handle(250, Some(10_000));
        audio.load("lesson.mp3");
        advance(1).await;
        drain(&mut rx);

        audio.set_playback_rate(2.0);
        audio.play().unwrap();
        advance(1000).await;
        assert_eq!(audio.current_time_ms(), 2000);
        assert_eq!(audio.playback_rate(), 2.0);

        audio.set_playback_rate(-1.0);
        assert_eq!(audio.playback_rate(), 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_position() {
        let (mut audio, mut rx) = handle(250, Some(10_000));
        audio.load("lesson.mp3");
        advance(1).await;

        audio.play().unwrap();
        advance(1000).await;
        audio.pause();
        drain(&mut rx);

        advance(5000).await;
        assert_eq!(audio.current_time_ms(), 1000);
        assert!(drain(&mut rx).is_empty());

        audio.seek(0);
        assert_eq!(audio.current_time_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_silences_handle() {
        let (mut audio, mut rx) = handle(250, Some(10_000));
        audio.load("lesson.mp3");
        advance(1).await;
        audio.play().unwrap();
        audio.release();
        audio.release();
        drain(&mut rx);

        advance(20_000).await;
        assert!(drain(&mut rx).is_empty());
        assert!(audio.play().is_err());
    }
}
