//! HTTP request handlers
//!
//! REST endpoints for presentation control and status.

use crate::api::AppContext;
use crate::error::Error;
use crate::presentation::{LessonContent, PresentationOptions, SessionSnapshot};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    lesson_id: String,
    content: String,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    voice_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub status: String,
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub status: String,
    /// False when the command was a no-op in the current state
    pub changed: bool,
}

#[derive(Debug, Deserialize)]
pub struct SpeedRequest {
    speed: f64,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map an engine error onto an HTTP status and JSON body
pub fn error_response(err: Error) -> ApiError {
    let status = match &err {
        Error::InvalidSpeed(_) | Error::InvalidTimeline(_) | Error::BadRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::PresentationUnavailable(_) => StatusCode::BAD_GATEWAY,
        Error::Cancelled(_) => StatusCode::CONFLICT,
        Error::Closed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let kind = match (&err, err.kind()) {
        (_, Some(kind)) => kind.to_string(),
        (Error::Cancelled(_), None) => "Cancelled".to_string(),
        (Error::Closed, None) => "Closed".to_string(),
        (Error::BadRequest(_), None) => "BadRequest".to_string(),
        _ => "Internal".to_string(),
    };

    warn!(status = status.as_u16(), %kind, "Request failed: {}", err);

    (
        status,
        Json(ErrorResponse {
            status: "error".to_string(),
            kind,
            message: err.to_string(),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "lesson-presenter".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
    })
}

// ============================================================================
// Presentation Control Endpoints
// ============================================================================

/// POST /presentation/start - Generate and begin a presentation
///
/// Responds once the payload is accepted and audio is loading.
pub async fn start(
    State(ctx): State<AppContext>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    if req.lesson_id.trim().is_empty() {
        return Err(error_response(Error::BadRequest(
            "lessonId must not be empty".to_string(),
        )));
    }

    let defaults = &ctx.defaults;
    let options = PresentationOptions {
        speed: req.speed.unwrap_or(defaults.speed),
        language: req.language.unwrap_or_else(|| defaults.language.clone()),
        voice_type: req.voice_type.unwrap_or_else(|| defaults.voice_type.clone()),
    };

    info!(lesson_id = %req.lesson_id, speed = options.speed, "Start presentation request");

    let session_id = ctx
        .controller
        .start(LessonContent::new(req.lesson_id, req.content), options)
        .await
        .map_err(error_response)?;

    Ok(Json(StartResponse {
        status: "loading".to_string(),
        session_id,
    }))
}

/// POST /presentation/pause
pub async fn pause(State(ctx): State<AppContext>) -> Result<Json<TransitionResponse>, ApiError> {
    let changed = ctx.controller.pause().await.map_err(error_response)?;
    transition(&ctx, changed).await
}

/// POST /presentation/resume
pub async fn resume(State(ctx): State<AppContext>) -> Result<Json<TransitionResponse>, ApiError> {
    let changed = ctx.controller.resume().await.map_err(error_response)?;
    transition(&ctx, changed).await
}

/// POST /presentation/stop
pub async fn stop(State(ctx): State<AppContext>) -> Result<Json<TransitionResponse>, ApiError> {
    ctx.controller.stop().await.map_err(error_response)?;
    transition(&ctx, true).await
}

/// POST /presentation/speed
pub async fn set_speed(
    State(ctx): State<AppContext>,
    Json(req): Json<SpeedRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    ctx.controller
        .set_speed(req.speed)
        .await
        .map_err(error_response)?;
    Ok(Json(ctx.controller.state().snapshot().await))
}

/// GET /presentation/status
pub async fn status(State(ctx): State<AppContext>) -> Json<SessionSnapshot> {
    Json(ctx.controller.state().snapshot().await)
}

async fn transition(ctx: &AppContext, changed: bool) -> Result<Json<TransitionResponse>, ApiError> {
    let snapshot = ctx.controller.state().snapshot().await;
    Ok(Json(TransitionResponse {
        status: snapshot.status.to_string(),
        changed,
    }))
}
