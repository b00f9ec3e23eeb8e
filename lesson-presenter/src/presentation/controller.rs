//! Playback controller
//!
//! Caller-facing handle over a single-task actor that owns the presentation
//! session. Commands, payload arrivals, audio events and timer fires are all
//! handled sequentially by that task, so session state is never touched
//! concurrently.
//!
//! Message priority inside the actor: payload, audio, cue, command. A
//! command therefore observes every audio event that was queued before it.

use crate::audio::{AudioBackend, AudioEvent};
use crate::error::{Error, Result};
use crate::presentation::generation::{
    GenerationError, GenerationRequest, LessonContent, PresentationOptions, PresentationService,
};
use crate::presentation::payload::PresentationPayload;
use crate::presentation::session::{
    validate_speed, CueDue, CueSettings, PresentationSession, SessionSnapshot,
};
use crate::state::SharedState;
use lesson_common::events::PresentationEvent;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

type PayloadResult = std::result::Result<PresentationPayload, GenerationError>;

enum Command {
    Start {
        request: GenerationRequest,
        speed: f64,
        reply: oneshot::Sender<Result<Uuid>>,
    },
    Pause {
        reply: oneshot::Sender<bool>,
    },
    Resume {
        reply: oneshot::Sender<bool>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    SetSpeed {
        speed: f64,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Teardown {
        reply: Option<oneshot::Sender<()>>,
    },
}

/// Handle to the presentation actor
///
/// Dropping the controller tears the session down.
pub struct PlaybackController {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<SharedState>,
}

impl PlaybackController {
    /// Spawn the actor task; must be called from within a tokio runtime
    pub fn spawn(
        service: Arc<dyn PresentationService>,
        backend: Arc<dyn AudioBackend>,
        state: Arc<SharedState>,
        cues: CueSettings,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (cue_tx, cue_rx) = mpsc::unbounded_channel();
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let (payload_tx, payload_rx) = mpsc::unbounded_channel();

        let session = PresentationSession::new(backend, state.bus().clone(), cues, cue_tx, audio_tx);
        let actor = Actor {
            session,
            service,
            state: Arc::clone(&state),
            pending_start: None,
            fetch: None,
            payload_tx,
        };

        tokio::spawn(actor.run(command_rx, cue_rx, audio_rx, payload_rx));

        Self {
            commands: command_tx,
            state,
        }
    }

    /// Begin a new presentation, superseding any current one
    ///
    /// Resolves once the generated payload has been accepted and audio is
    /// loading. Fails with `Cancelled` if another start, a stop or a
    /// teardown supersedes it first.
    pub async fn start(&self, lesson: LessonContent, options: PresentationOptions) -> Result<Uuid> {
        validate_speed(options.speed)?;
        let request = GenerationRequest::new(&lesson, &options);
        let speed = options.speed;
        self.request(|reply| Command::Start {
            request,
            speed,
            reply,
        })
        .await?
    }

    /// Pause narration; returns false when not presenting
    pub async fn pause(&self) -> Result<bool> {
        closed_as(self.request(|reply| Command::Pause { reply }).await, false)
    }

    /// Resume narration; returns false when not paused
    pub async fn resume(&self) -> Result<bool> {
        closed_as(self.request(|reply| Command::Resume { reply }).await, false)
    }

    /// Stop and reset; idempotent
    pub async fn stop(&self) -> Result<()> {
        closed_as(self.request(|reply| Command::Stop { reply }).await, ())
    }

    /// Change playback speed; invalid values are rejected without a state change
    pub async fn set_speed(&self, speed: f64) -> Result<()> {
        validate_speed(speed)?;
        self.request(|reply| Command::SetSpeed { speed, reply }).await?
    }

    /// Current session state, read through the actor
    ///
    /// After teardown this is the last published snapshot.
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        match self.request(|reply| Command::Snapshot { reply }).await {
            Err(Error::Closed) => Ok(self.state.snapshot().await),
            other => other,
        }
    }

    /// Release every resource; idempotent
    ///
    /// Afterwards `start` and `set_speed` fail with `Closed` and every other
    /// command is a no-op.
    pub async fn teardown(&self) -> Result<()> {
        closed_as(
            self.request(|reply| Command::Teardown { reply: Some(reply) })
                .await,
            (),
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresentationEvent> {
        self.state.subscribe_events()
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(make(reply)).map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }
}

/// Commands sent after teardown resolve to `value`
fn closed_as<T>(result: Result<T>, value: T) -> Result<T> {
    match result {
        Err(Error::Closed) => Ok(value),
        other => other,
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Teardown { reply: None });
    }
}

struct Actor {
    session: PresentationSession,
    service: Arc<dyn PresentationService>,
    state: Arc<SharedState>,
    pending_start: Option<(u64, oneshot::Sender<Result<Uuid>>)>,
    fetch: Option<JoinHandle<()>>,
    payload_tx: mpsc::UnboundedSender<(u64, PayloadResult)>,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut cues: mpsc::UnboundedReceiver<CueDue>,
        mut audio: mpsc::UnboundedReceiver<(u64, AudioEvent)>,
        mut payloads: mpsc::UnboundedReceiver<(u64, PayloadResult)>,
    ) {
        debug!("Playback controller started");

        loop {
            tokio::select! {
                biased;

                Some((generation, result)) = payloads.recv() => {
                    self.on_payload(generation, result).await;
                }
                Some((generation, event)) = audio.recv() => {
                    self.session.on_audio_event(generation, event);
                    self.publish().await;
                }
                Some((epoch, index)) = cues.recv() => {
                    self.session.on_cue_due(epoch, index);
                    self.publish().await;
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        self.shutdown().await;
                        break;
                    };
                    if !self.on_command(command).await {
                        break;
                    }
                }
            }
        }

        debug!("Playback controller exited");
    }

    /// Returns false once the actor should exit
    async fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start {
                request,
                speed,
                reply,
            } => self.start(request, speed, reply).await,
            Command::Pause { reply } => {
                let paused = self.session.pause();
                self.publish().await;
                let _ = reply.send(paused);
            }
            Command::Resume { reply } => {
                let resumed = self.session.resume();
                self.publish().await;
                let _ = reply.send(resumed);
            }
            Command::Stop { reply } => {
                self.cancel_pending_start("stopped");
                self.session.stop();
                self.publish().await;
                let _ = reply.send(());
            }
            Command::SetSpeed { speed, reply } => {
                let result = self.session.set_speed(speed);
                self.publish().await;
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            Command::Teardown { reply } => {
                self.shutdown().await;
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
                return false;
            }
        }
        true
    }

    async fn start(
        &mut self,
        request: GenerationRequest,
        speed: f64,
        reply: oneshot::Sender<Result<Uuid>>,
    ) {
        self.cancel_pending_start("superseded by a newer start");

        let generation = match self.session.begin(speed) {
            Ok(generation) => generation,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };
        self.publish().await;

        info!(
            session_id = %self.session.id(),
            lesson_id = %request.lesson_id,
            "Requesting presentation payload"
        );

        let service = Arc::clone(&self.service);
        let payload_tx = self.payload_tx.clone();
        self.fetch = Some(tokio::spawn(async move {
            let result = service.generate(request).await;
            let _ = payload_tx.send((generation, result));
        }));
        self.pending_start = Some((generation, reply));
    }

    async fn on_payload(&mut self, generation: u64, result: PayloadResult) {
        if generation != self.session.generation() {
            debug!(generation, "Dropping payload for superseded session");
            return;
        }
        self.fetch = None;
        let reply = match self.pending_start.take() {
            Some((pending, reply)) if pending == generation => Some(reply),
            other => {
                self.pending_start = other;
                None
            }
        };

        let outcome = match result {
            Ok(payload) => self
                .session
                .accept_payload(generation, payload)
                .map(|_| self.session.id()),
            Err(e) => {
                warn!(generation, "Presentation generation failed: {}", e);
                let message = e.to_string();
                self.session.payload_failed(generation, &message);
                Err(Error::PresentationUnavailable(message))
            }
        };

        self.publish().await;
        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    fn cancel_pending_start(&mut self, reason: &str) {
        if let Some(fetch) = self.fetch.take() {
            fetch.abort();
        }
        if let Some((_, reply)) = self.pending_start.take() {
            let _ = reply.send(Err(Error::Cancelled(reason.to_string())));
        }
    }

    async fn shutdown(&mut self) {
        self.cancel_pending_start("controller torn down");
        self.session.teardown();
        self.publish().await;
    }

    async fn publish(&mut self) {
        self.state.publish(self.session.snapshot()).await;
    }
}
