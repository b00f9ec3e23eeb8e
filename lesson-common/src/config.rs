//! Configuration file discovery and TOML loading
//!
//! Config file resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`~/.config/<app>/<file>` on Linux)
//! 4. System config directory (`/etc/<app>/<file>`, Linux only)
//!
//! When nothing is found the caller falls back to built-in defaults.
//! A missing config file is never fatal.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a resolved config path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    UserConfigDir,
    SystemConfigDir,
}

/// Locates the config file for one application
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    app_dir: String,
    file_name: String,
    env_var: String,
}

impl ConfigLocator {
    /// Create a locator for `<config dir>/<app_dir>/<file_name>`, overridable
    /// through `env_var`.
    pub fn new(app_dir: &str, file_name: &str, env_var: &str) -> Self {
        Self {
            app_dir: app_dir.to_string(),
            file_name: file_name.to_string(),
            env_var: env_var.to_string(),
        }
    }

    /// Resolve the config file path
    ///
    /// An explicit CLI or environment path is returned even if it does not
    /// exist, so the caller can report it. Directory candidates are only
    /// returned when the file is present.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
        if let Some(path) = cli_arg {
            return Some((path.to_path_buf(), ConfigSource::CommandLine));
        }

        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.trim().is_empty() {
                return Some((PathBuf::from(path), ConfigSource::Environment));
            }
        }

        if let Some(user) = self.user_config_path() {
            if user.exists() {
                return Some((user, ConfigSource::UserConfigDir));
            }
        }

        let system = self.system_config_path()?;
        if system.exists() {
            return Some((system, ConfigSource::SystemConfigDir));
        }

        None
    }

    /// Per-user config path for the current platform
    pub fn user_config_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(&self.app_dir).join(&self.file_name))
    }

    fn system_config_path(&self) -> Option<PathBuf> {
        if cfg!(target_os = "linux") {
            Some(PathBuf::from("/etc").join(&self.app_dir).join(&self.file_name))
        } else {
            None
        }
    }
}

/// Parse a TOML file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let parsed = toml::from_str(&content)?;
    debug!(path = %path.display(), "Parsed TOML config");
    Ok(parsed)
}

/// Resolve and load a config file, falling back to `T::default()`
///
/// A file that exists but fails to parse is an error; a missing file is
/// logged and replaced by defaults.
pub fn load_or_default<T: DeserializeOwned + Default>(
    locator: &ConfigLocator,
    cli_arg: Option<&Path>,
) -> Result<T> {
    match locator.resolve(cli_arg) {
        Some((path, source)) if path.exists() => {
            info!(path = %path.display(), ?source, "Loading configuration");
            load_toml(&path)
        }
        Some((path, source)) => {
            warn!(
                path = %path.display(),
                ?source,
                "Config file not found, using built-in defaults"
            );
            Ok(T::default())
        }
        None => {
            info!("No config file found, using built-in defaults");
            Ok(T::default())
        }
    }
}
