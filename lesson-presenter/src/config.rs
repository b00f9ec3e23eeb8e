//! Configuration management for lesson-presenter
//!
//! Bootstrap settings come from a TOML file (`presenter.toml`) located via
//! `lesson_common::config`, with command-line/environment overrides applied
//! on top.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--port, --generation-url)
//! 2. Environment variables (LESSON_PRESENTER_PORT, LESSON_GENERATION_URL)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::audio::ClockSettings;
use crate::error::Result;
use crate::presentation::CueSettings;
use lesson_common::config::{load_or_default, ConfigLocator};
use lesson_common::events::Cue;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LESSON_PRESENTER_CONFIG";

const MIN_TIME_UPDATE_INTERVAL_MS: u64 = 50;
const MAX_TIME_UPDATE_INTERVAL_MS: u64 = 2000;
const MIN_EVENT_CAPACITY: usize = 16;

/// Bootstrap configuration loaded from TOML file
///
/// Cannot change while running; restart to pick up edits.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            logging: LoggingConfig::default(),
            generation: GenerationConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Presentation generation service
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_url")]
    pub base_url: String,

    /// Whole-request timeout for one generation call
    #[serde(default = "default_generation_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_voice_type")]
    pub voice_type: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_url(),
            timeout_ms: default_generation_timeout_ms(),
            language: default_language(),
            voice_type: default_voice_type(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Playback clock and event settings
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Position update cadence (clamped to 50-2000 ms)
    #[serde(default = "default_time_update_interval_ms")]
    pub time_update_interval_ms: u64,

    /// Read track duration from the audio file
    #[serde(default = "default_true")]
    pub probe_duration: bool,

    /// Event bus buffer (minimum 16)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default = "Cue::completion")]
    pub completion_cue: Cue,

    #[serde(default = "Cue::neutral")]
    pub neutral_cue: Cue,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            time_update_interval_ms: default_time_update_interval_ms(),
            probe_duration: true,
            event_capacity: default_event_capacity(),
            completion_cue: Cue::completion(),
            neutral_cue: Cue::neutral(),
        }
    }
}

impl PlaybackConfig {
    /// Clamp out-of-range values, logging each adjustment
    pub fn validated(mut self) -> Self {
        let interval = self
            .time_update_interval_ms
            .clamp(MIN_TIME_UPDATE_INTERVAL_MS, MAX_TIME_UPDATE_INTERVAL_MS);
        if interval != self.time_update_interval_ms {
            warn!(
                configured = self.time_update_interval_ms,
                using = interval,
                "time_update_interval_ms out of range"
            );
            self.time_update_interval_ms = interval;
        }

        if self.event_capacity < MIN_EVENT_CAPACITY {
            warn!(
                configured = self.event_capacity,
                using = MIN_EVENT_CAPACITY,
                "event_capacity too small"
            );
            self.event_capacity = MIN_EVENT_CAPACITY;
        }
        self
    }

    pub fn clock_settings(&self) -> ClockSettings {
        ClockSettings {
            time_update_interval_ms: self.time_update_interval_ms,
            probe_duration: self.probe_duration,
        }
    }

    pub fn cue_settings(&self) -> CueSettings {
        CueSettings {
            neutral: self.neutral_cue.clone(),
            completion: self.completion_cue.clone(),
        }
    }
}

fn default_port() -> u16 {
    5780
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_generation_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_generation_timeout_ms() -> u64 {
    30_000
}

fn default_language() -> String {
    "en".to_string()
}

fn default_voice_type() -> String {
    "female".to_string()
}

fn default_time_update_interval_ms() -> u64 {
    250
}

fn default_event_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

/// Overrides taken from the command line (and its env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub port: Option<u16>,
    pub generation_url: Option<String>,
}

/// Config file locator for this service
pub fn locator() -> ConfigLocator {
    ConfigLocator::new("lesson-presenter", "presenter.toml", CONFIG_ENV_VAR)
}

/// Load the TOML config and apply command-line overrides
pub fn load(overrides: &CliOverrides) -> Result<TomlConfig> {
    let config: TomlConfig = load_or_default(&locator(), overrides.config.as_deref())?;
    Ok(apply_overrides(config, overrides))
}

/// Load from an explicit file (no discovery)
pub fn load_file(path: &Path) -> Result<TomlConfig> {
    let config: TomlConfig = lesson_common::config::load_toml(path)?;
    Ok(apply_overrides(config, &CliOverrides::default()))
}

fn apply_overrides(mut config: TomlConfig, overrides: &CliOverrides) -> TomlConfig {
    if let Some(port) = overrides.port {
        config.port = port;
    }
    if let Some(url) = &overrides.generation_url {
        config.generation.base_url = url.clone();
    }
    config.playback = config.playback.validated();
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 5780);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.generation.base_url, "http://localhost:8000");
        assert_eq!(config.generation.timeout(), Duration::from_secs(30));
        assert_eq!(config.playback.time_update_interval_ms, 250);
        assert!(config.playback.probe_duration);
        assert_eq!(config.playback.completion_cue, Cue::completion());
    }

    #[test]
    fn test_partial_file() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 6000

            [generation]
            base_url = "http://gen.internal:9000"

            [playback.completion_cue]
            gesture = "bow"
            emotion = "happy"
            subtitle = "Bye!"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.generation.base_url, "http://gen.internal:9000");
        assert_eq!(config.generation.language, "en");
        assert_eq!(config.playback.completion_cue, Cue::new("bow", "happy", "Bye!"));
        assert_eq!(config.playback.neutral_cue, Cue::neutral());
    }

    #[test]
    fn test_playback_clamped() {
        let playback = PlaybackConfig {
            time_update_interval_ms: 5,
            event_capacity: 2,
            ..PlaybackConfig::default()
        }
        .validated();
        assert_eq!(playback.time_update_interval_ms, 50);
        assert_eq!(playback.event_capacity, 16);

        let playback = PlaybackConfig {
            time_update_interval_ms: 60_000,
            ..PlaybackConfig::default()
        }
        .validated();
        assert_eq!(playback.time_update_interval_ms, 2000);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 6001\n[generation]\nbase_url = \"http://file:1\"").unwrap();

        let overrides = CliOverrides {
            config: Some(file.path().to_path_buf()),
            port: Some(7000),
            generation_url: Some("http://cli:2".to_string()),
        };
        let config = load(&overrides).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.generation.base_url, "http://cli:2");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let result = load_file(file.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_settings_projection() {
        let playback = PlaybackConfig::default();
        let clock = playback.clock_settings();
        assert_eq!(clock.time_update_interval_ms, 250);
        assert!(clock.probe_duration);
        assert_eq!(playback.cue_settings(), CueSettings::default());
    }
}
