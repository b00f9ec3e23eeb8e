//! Presentation generation service client
//!
//! Submits lesson content to the generation backend and receives the
//! narration track plus its gesture timeline.

use crate::presentation::payload::PresentationPayload;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("lesson-presenter/", env!("CARGO_PKG_VERSION"));

/// Generation service errors
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Connection failure or timeout
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Non-success HTTP status
    #[error("Generation API error {0}: {1}")]
    ApiError(u16, String),

    /// Response body is not a presentation payload
    #[error("Response parse error: {0}")]
    ParseError(String),
}

/// Lesson to present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonContent {
    pub lesson_id: String,
    pub content: String,
}

impl LessonContent {
    pub fn new(lesson_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            lesson_id: lesson_id.into(),
            content: content.into(),
        }
    }
}

/// Caller-chosen presentation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresentationOptions {
    pub speed: f64,
    pub language: String,
    pub voice_type: String,
}

impl Default for PresentationOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            language: "en".to_string(),
            voice_type: "female".to_string(),
        }
    }
}

/// Wire body of a generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub lesson_id: String,
    pub content: String,
    pub language: String,
    pub voice_type: String,
    pub speed: f64,
}

impl GenerationRequest {
    pub fn new(lesson: &LessonContent, options: &PresentationOptions) -> Self {
        Self {
            lesson_id: lesson.lesson_id.clone(),
            content: lesson.content.clone(),
            language: options.language.clone(),
            voice_type: options.voice_type.clone(),
            speed: options.speed,
        }
    }
}

/// Source of presentation payloads
pub trait PresentationService: Send + Sync {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, Result<PresentationPayload, GenerationError>>;
}

/// HTTP client for the generation backend
pub struct HttpPresentationService {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpPresentationService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a relative `audioUrl` against the service base URL
    pub fn resolve_audio_url(&self, audio_url: &str) -> String {
        if audio_url.is_empty()
            || audio_url.contains("://")
            || audio_url.starts_with("data:")
        {
            audio_url.to_string()
        } else if let Some(path) = audio_url.strip_prefix('/') {
            format!("{}/{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, audio_url)
        }
    }

    async fn post_generate(
        &self,
        request: GenerationRequest,
    ) -> Result<PresentationPayload, GenerationError> {
        let url = format!("{}/presentation/generate", self.base_url);

        debug!(url = %url, lesson_id = %request.lesson_id, "Requesting presentation");

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                lesson_id = %request.lesson_id,
                status = status.as_u16(),
                "Generation service rejected request"
            );
            return Err(GenerationError::ApiError(status.as_u16(), body));
        }

        let mut payload: PresentationPayload = response
            .json()
            .await
            .map_err(|e| GenerationError::ParseError(e.to_string()))?;

        payload.audio_url = self.resolve_audio_url(&payload.audio_url);

        info!(
            lesson_id = %request.lesson_id,
            cues = payload.timeline.len(),
            "Presentation generated"
        );

        Ok(payload)
    }
}

impl PresentationService for HttpPresentationService {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, Result<PresentationPayload, GenerationError>> {
        Box::pin(self.post_generate(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> HttpPresentationService {
        HttpPresentationService::new("http://localhost:8000/", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(service().base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_resolve_audio_url() {
        let svc = service();
        assert_eq!(
            svc.resolve_audio_url("/static/audio/l1.mp3"),
            "http://localhost:8000/static/audio/l1.mp3"
        );
        assert_eq!(
            svc.resolve_audio_url("audio/l1.mp3"),
            "http://localhost:8000/audio/l1.mp3"
        );
        assert_eq!(
            svc.resolve_audio_url("https://cdn.example.com/l1.mp3"),
            "https://cdn.example.com/l1.mp3"
        );
        assert_eq!(svc.resolve_audio_url(""), "");
    }

    #[test]
    fn test_request_wire_format() {
        let lesson = LessonContent::new("l-42", "Photosynthesis basics");
        let request = GenerationRequest::new(&lesson, &PresentationOptions::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["lessonId"], "l-42");
        assert_eq!(json["content"], "Photosynthesis basics");
        assert_eq!(json["language"], "en");
        assert_eq!(json["voiceType"], "female");
        assert_eq!(json["speed"], 1.0);
    }

    #[test]
    fn test_options_fill_defaults() {
        let options: PresentationOptions = serde_json::from_str(r#"{"speed": 1.5}"#).unwrap();
        assert_eq!(options.speed, 1.5);
        assert_eq!(options.language, "en");
        assert_eq!(options.voice_type, "female");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let svc = HttpPresentationService::new("http://127.0.0.1:9", Duration::from_millis(500))
            .unwrap();
        let request = GenerationRequest::new(
            &LessonContent::new("l-1", "x"),
            &PresentationOptions::default(),
        );
        let result = svc.generate(request).await;
        assert!(matches!(result, Err(GenerationError::NetworkError(_))));
    }
}
