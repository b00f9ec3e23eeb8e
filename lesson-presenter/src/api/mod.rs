//! REST + SSE API for the presentation engine
//!
//! All control routes live under `/api/v1`; `/health` sits at the root.

pub mod handlers;
pub mod server;
pub mod sse;

use crate::presentation::{PlaybackController, PresentationOptions};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub controller: Arc<PlaybackController>,
    /// Options applied when a start request omits them
    pub defaults: PresentationOptions,
}

/// Build the API router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest(
            "/api/v1",
            Router::new()
                .route("/presentation/start", post(handlers::start))
                .route("/presentation/pause", post(handlers::pause))
                .route("/presentation/resume", post(handlers::resume))
                .route("/presentation/stop", post(handlers::stop))
                .route("/presentation/speed", post(handlers::set_speed))
                .route("/presentation/status", get(handlers::status))
                .route("/events", get(sse::event_stream)),
        )
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}
