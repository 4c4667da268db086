//! Viewer configuration
//!
//! Values resolve in layers: built-in defaults, then an optional JSON file,
//! then `LAYERSCOPE_*` environment variables. Command-line flags are applied
//! last by the CLI.

use crate::error::{Result, ViewerError};
use crate::playback::{tick_period, DEFAULT_SPEED, MAX_SPEED, MIN_SPEED};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MODEL: &str = "tiny_resnet";

pub const ENV_BACKEND_URL: &str = "LAYERSCOPE_BACKEND_URL";
pub const ENV_TIMEOUT_MS: &str = "LAYERSCOPE_TIMEOUT_MS";
pub const ENV_DEFAULT_MODEL: &str = "LAYERSCOPE_DEFAULT_MODEL";
pub const ENV_SPEED: &str = "LAYERSCOPE_SPEED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Base URL of the model backend
    pub backend_url: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Model loaded when a command names none
    pub default_model: String,

    /// Initial playback speed (steps per second)
    pub playback_speed: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            default_model: DEFAULT_MODEL.to_string(),
            playback_speed: DEFAULT_SPEED,
        }
    }
}

impl ViewerConfig {
    /// Resolve defaults, file and environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ViewerError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| ViewerError::InvalidConfig {
            reason: format!("{}: {}", path.display(), e),
        })?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Overlay `LAYERSCOPE_*` environment variables
    pub fn apply_env(self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable source
    ///
    /// Unparseable numbers are logged and ignored.
    pub fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            match raw.trim().parse() {
                Ok(ms) => self.timeout_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid {}", ENV_TIMEOUT_MS),
            }
        }
        if let Some(model) = lookup(ENV_DEFAULT_MODEL) {
            self.default_model = model;
        }
        if let Some(raw) = lookup(ENV_SPEED) {
            match raw.trim().parse() {
                Ok(speed) => self.playback_speed = speed,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid {}", ENV_SPEED),
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend_url.trim().is_empty() {
            return Err(ViewerError::InvalidConfig {
                reason: "backend_url must not be empty".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ViewerError::InvalidConfig {
                reason: "timeout_ms must be greater than zero".to_string(),
            });
        }
        if tick_period(self.playback_speed).is_err() {
            return Err(ViewerError::InvalidConfig {
                reason: format!(
                    "playback_speed must be between {} and {}, got {}",
                    MIN_SPEED, MAX_SPEED, self.playback_speed
                ),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
