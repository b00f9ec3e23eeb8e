//! Lesson Presenter (lesson-presenter) - Main entry point
//!
//! HTTP service that generates narrated lesson presentations and plays them
//! back with timed gesture cues.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lesson_presenter::api::{self, AppContext};
use lesson_presenter::audio::ClockAudioBackend;
use lesson_presenter::config::{self, CliOverrides};
use lesson_presenter::presentation::{
    HttpPresentationService, PlaybackController, PresentationOptions,
};
use lesson_presenter::SharedState;

/// Command-line arguments for lesson-presenter
#[derive(Parser, Debug)]
#[command(name = "lesson-presenter")]
#[command(about = "Narrated lesson presentation service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "LESSON_PRESENTER_PORT")]
    port: Option<u16>,

    /// Path to presenter.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the presentation generation service
    #[arg(long, env = "LESSON_GENERATION_URL")]
    generation_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = CliOverrides {
        config: args.config,
        port: args.port,
        generation_url: args.generation_url,
    };
    let config = config::load(&overrides).context("Failed to load configuration")?;

    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("lesson_presenter={level},lesson_common={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "Starting lesson-presenter"
    );
    info!("Generation service: {}", config.generation.base_url);

    let state = Arc::new(SharedState::new(config.playback.event_capacity));

    let service = HttpPresentationService::new(
        &config.generation.base_url,
        config.generation.timeout(),
    )
    .context("Failed to build generation client")?;

    let audio_client = reqwest::Client::builder()
        .user_agent(concat!("lesson-presenter/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build audio client")?;
    let backend = ClockAudioBackend::new(audio_client, config.playback.clock_settings());

    let controller = Arc::new(PlaybackController::spawn(
        Arc::new(service),
        Arc::new(backend),
        Arc::clone(&state),
        config.playback.cue_settings(),
    ));
    info!("Playback controller initialized");

    let ctx = AppContext {
        controller: Arc::clone(&controller),
        defaults: PresentationOptions {
            speed: 1.0,
            language: config.generation.language.clone(),
            voice_type: config.generation.voice_type.clone(),
        },
    };

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address))?;

    api::server::run(addr, ctx, shutdown_signal())
        .await
        .context("Server error")?;

    controller.teardown().await.ok();
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
