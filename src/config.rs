//! Editor configuration
//!
//! Stored as TOML. Every field has a default, so a partial file (or none at
//! all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use speededitor_transport::protocol::timing;
use speededitor_transport::{EventReaderConfig, SessionConfig};

use crate::error::{EditorError, Result};

/// Default broadcast channel capacity for device events
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Poll read timeout in milliseconds
    pub read_timeout_ms: u32,
    /// Delay between discovery attempts, and between failed reauth retries
    pub discovery_interval_ms: u64,
    /// How long disconnect waits for the worker threads
    pub shutdown_grace_ms: u64,
    /// Events buffered per subscriber before the slowest one lags
    pub event_capacity: usize,
    /// Jog and LED keys drive their own state on release
    pub follow_keys: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: timing::READ_TIMEOUT_MS.unsigned_abs(),
            discovery_interval_ms: timing::DISCOVERY_INTERVAL_MS,
            shutdown_grace_ms: timing::SHUTDOWN_GRACE_MS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            follow_keys: false,
        }
    }
}

impl EditorConfig {
    /// `<config dir>/speededitor/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("speededitor")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| EditorError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| EditorError::Config(format!("{}: {e}", path.display())))
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EditorError::Config(format!("{}: {e}", parent.display())))?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| EditorError::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| EditorError::Config(format!("{}: {e}", path.display())))
    }

    /// Session settings derived from this config
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            discovery_interval: Duration::from_millis(self.discovery_interval_ms),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            reader: EventReaderConfig {
                read_timeout_ms: i32::try_from(self.read_timeout_ms).unwrap_or(i32::MAX),
                ..EventReaderConfig::default()
            },
            ..SessionConfig::default()
        }
    }
}
