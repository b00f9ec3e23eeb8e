//! Timestamp utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Longest wall-clock span produced by [`media_to_wall`] (about 30 years)
///
/// Keeps `Instant + span` from overflowing at vanishingly small rates.
pub const MAX_WALL_SPAN: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Convert a media-time span to wall-clock time at the given playback rate
///
/// A rate of 2.0 halves the wall-clock span. Non-positive or non-finite
/// rates are treated as 1.0. The result never exceeds [`MAX_WALL_SPAN`].
pub fn media_to_wall(media_ms: u64, rate: f64) -> Duration {
    let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
    Duration::try_from_secs_f64(media_ms as f64 / rate / 1000.0)
        .map_or(MAX_WALL_SPAN, |span| span.min(MAX_WALL_SPAN))
}

/// Convert a wall-clock span to media time at the given playback rate
///
/// Saturates at `u64::MAX` for very large rates.
pub fn wall_to_media(wall: Duration, rate: f64) -> u64 {
    let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
    (wall.as_secs_f64() * rate * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // After 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::ZERO);
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
        assert_eq!(millis_to_duration(3_600_000), Duration::from_secs(3600));
    }

    #[test]
    fn test_media_to_wall_scales_by_rate() {
        assert_eq!(media_to_wall(5000, 1.0), Duration::from_millis(5000));
        assert_eq!(media_to_wall(5000, 2.0), Duration::from_millis(2500));
        assert_eq!(media_to_wall(3000, 0.5), Duration::from_millis(6000));
    }

    #[test]
    fn test_media_to_wall_rejects_bad_rate() {
        assert_eq!(media_to_wall(1000, 0.0), Duration::from_millis(1000));
        assert_eq!(media_to_wall(1000, f64::NAN), Duration::from_millis(1000));
    }

    #[test]
    fn test_media_to_wall_clamps_tiny_rates() {
        assert_eq!(media_to_wall(5000, 1e-20), MAX_WALL_SPAN);
        assert_eq!(media_to_wall(5000, f64::MIN_POSITIVE), MAX_WALL_SPAN);
        assert_eq!(media_to_wall(0, 1e-20), Duration::ZERO);
    }

    #[test]
    fn test_wall_to_media_saturates_huge_rates() {
        assert_eq!(wall_to_media(Duration::from_secs(1), 1e300), u64::MAX);
    }

    #[test]
    fn test_wall_to_media() {
        assert_eq!(wall_to_media(Duration::from_millis(250), 1.0), 250);
        assert_eq!(wall_to_media(Duration::from_millis(250), 2.0), 500);
        assert_eq!(wall_to_media(Duration::from_millis(1000), 1.5), 1500);
    }
}
