//! Presentation payload: narration URL plus the cue timeline
//!
//! The timeline is decoded leniently. A missing, null or malformed timeline
//! becomes an empty one (audio-only playback). A well-formed timeline whose
//! times go backwards is rejected by [`PresentationPayload::validate`].

use crate::error::{Error, Result};
use lesson_common::events::Cue;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// One timestamped presentation event
///
/// `time_ms` is media time: milliseconds from the start of the narration at
/// speed 1.0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(rename = "time", deserialize_with = "deserialize_millis")]
    pub time_ms: u64,
    #[serde(default)]
    pub gesture: String,
    #[serde(default)]
    pub emotion: String,
    /// Subtitle text
    #[serde(default)]
    pub text: String,
}

impl TimelineEvent {
    pub fn new(time_ms: u64, gesture: &str, emotion: &str, text: &str) -> Self {
        Self {
            time_ms,
            gesture: gesture.to_string(),
            emotion: emotion.to_string(),
            text: text.to_string(),
        }
    }

    pub fn cue(&self) -> Cue {
        Cue::new(&self.gesture, &self.emotion, &self.text)
    }
}

/// Payload returned by the generation service, immutable for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationPayload {
    #[serde(default)]
    pub audio_url: String,
    #[serde(default, deserialize_with = "deserialize_timeline")]
    pub timeline: Vec<TimelineEvent>,
    #[serde(default)]
    pub duration_hint_ms: Option<u64>,
}

impl PresentationPayload {
    pub fn new(audio_url: &str, timeline: Vec<TimelineEvent>) -> Self {
        Self {
            audio_url: audio_url.to_string(),
            timeline,
            duration_hint_ms: None,
        }
    }

    pub fn with_duration_hint(mut self, duration_ms: u64) -> Self {
        self.duration_hint_ms = Some(duration_ms);
        self
    }

    /// Check the payload before any resource is created
    ///
    /// An empty audio URL means the service produced nothing playable.
    pub fn validate(&self) -> Result<()> {
        if self.audio_url.trim().is_empty() {
            return Err(Error::PresentationUnavailable(
                "generation service returned no audio URL".to_string(),
            ));
        }
        validate_order(&self.timeline)
    }

    /// Media time of the last timeline event
    pub fn last_event_ms(&self) -> Option<u64> {
        self.timeline.last().map(|e| e.time_ms)
    }
}

/// Reject timelines whose times decrease
pub fn validate_order(timeline: &[TimelineEvent]) -> Result<()> {
    for (index, pair) in timeline.windows(2).enumerate() {
        if pair[1].time_ms < pair[0].time_ms {
            return Err(Error::InvalidTimeline(format!(
                "event {} at {}ms precedes event {} at {}ms",
                index + 1,
                pair[1].time_ms,
                index,
                pair[0].time_ms
            )));
        }
    }
    Ok(())
}

/// Accept integral or fractional JSON numbers, round to whole milliseconds
fn deserialize_millis<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 {
        return Err(serde::de::Error::custom(format!(
            "event time must be a non-negative number, got {}",
            value
        )));
    }
    Ok(value.round() as u64)
}

fn deserialize_timeline<'de, D>(deserializer: D) -> std::result::Result<Vec<TimelineEvent>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    if raw.is_null() {
        return Ok(Vec::new());
    }
    match serde_json::from_value::<Vec<TimelineEvent>>(raw) {
        Ok(events) => Ok(events),
        Err(e) => {
            warn!("Malformed timeline treated as empty: {}", e);
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> PresentationPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decode_well_formed_payload() {
        let payload = decode(json!({
            "audioUrl": "https://cdn.example.com/lesson.mp3",
            "timeline": [
                {"time": 0, "gesture": "wave", "emotion": "neutral", "text": "Hi"},
                {"time": 5000.4, "gesture": "explain", "emotion": "happy", "text": "Let's begin"}
            ],
            "durationHintMs": 12000
        }));

        assert_eq!(payload.audio_url, "https://cdn.example.com/lesson.mp3");
        assert_eq!(payload.timeline.len(), 2);
        assert_eq!(payload.timeline[1].time_ms, 5000);
        assert_eq!(payload.timeline[1].gesture, "explain");
        assert_eq!(payload.duration_hint_ms, Some(12000));
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_missing_timeline_is_empty() {
        let payload = decode(json!({"audioUrl": "a.mp3"}));
        assert!(payload.timeline.is_empty());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_null_or_non_array_timeline_is_empty() {
        assert!(decode(json!({"audioUrl": "a.mp3", "timeline": null})).timeline.is_empty());
        assert!(decode(json!({"audioUrl": "a.mp3", "timeline": "oops"})).timeline.is_empty());
        assert!(decode(json!({"audioUrl": "a.mp3", "timeline": {"time": 1}})).timeline.is_empty());
    }

    #[test]
    fn test_malformed_entry_empties_timeline() {
        let payload = decode(json!({
            "audioUrl": "a.mp3",
            "timeline": [
                {"time": 0, "gesture": "wave"},
                {"gesture": "no time here"}
            ]
        }));
        assert!(payload.timeline.is_empty());
    }

    #[test]
    fn test_negative_time_empties_timeline() {
        let payload = decode(json!({
            "audioUrl": "a.mp3",
            "timeline": [{"time": -5, "gesture": "wave"}]
        }));
        assert!(payload.timeline.is_empty());
    }

    #[test]
    fn test_missing_text_fields_default_to_empty() {
        let payload = decode(json!({
            "audioUrl": "a.mp3",
            "timeline": [{"time": 100}]
        }));
        assert_eq!(payload.timeline[0], TimelineEvent::new(100, "", "", ""));
    }

    #[test]
    fn test_out_of_order_timeline_rejected() {
        let payload = PresentationPayload::new(
            "a.mp3",
            vec![
                TimelineEvent::new(0, "wave", "neutral", "Hi"),
                TimelineEvent::new(3000, "point", "neutral", "Look"),
                TimelineEvent::new(2000, "nod", "happy", "Yes"),
            ],
        );
        match payload.validate() {
            Err(Error::InvalidTimeline(msg)) => assert!(msg.contains("2000ms")),
            other => panic!("Expected InvalidTimeline, got {:?}", other),
        }
    }

    #[test]
    fn test_equal_times_are_allowed() {
        let payload = PresentationPayload::new(
            "a.mp3",
            vec![
                TimelineEvent::new(1000, "wave", "neutral", "A"),
                TimelineEvent::new(1000, "nod", "neutral", "B"),
            ],
        );
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_empty_audio_url_is_unavailable() {
        let payload = decode(json!({"audioUrl": "  ", "timeline": []}));
        assert!(matches!(
            payload.validate(),
            Err(Error::PresentationUnavailable(_))
        ));
    }

    #[test]
    fn test_event_cue_maps_text_to_subtitle() {
        let cue = TimelineEvent::new(0, "wave", "neutral", "Hi").cue();
        assert_eq!(cue, Cue::new("wave", "neutral", "Hi"));
        assert_eq!(
            PresentationPayload::new("a", vec![TimelineEvent::new(7, "", "", "")]).last_event_ms(),
            Some(7)
        );
    }
}
