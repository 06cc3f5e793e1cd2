//! Engine configuration
//!
//! Loaded from `~/.config/whatsync/config.toml` when present; every field
//! has a default so an absent or partial file is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use whatsync_protocol::{Result, SyncError};

/// Tunables for the synchronization engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Poll interval in seconds while the push channel is live
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Tighter poll interval in seconds when push is unavailable
    #[serde(default = "default_poll_interval_no_push")]
    pub poll_interval_no_push_secs: u64,

    /// Whether to attempt the push subscription at all
    #[serde(default = "default_push_enabled")]
    pub push_enabled: bool,

    /// Maximum characters of a message body shown in list previews
    #[serde(default = "default_preview_length")]
    pub preview_length: usize,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_poll_interval_no_push() -> u64 {
    10
}

fn default_push_enabled() -> bool {
    true
}

fn default_preview_length() -> usize {
    50
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            poll_interval_no_push_secs: default_poll_interval_no_push(),
            push_enabled: default_push_enabled(),
            preview_length: default_preview_length(),
        }
    }
}

impl SyncConfig {
    /// Default configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("whatsync").join("config.toml"))
    }

    /// Load from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| SyncError::config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Falling back to default config: {}", e);
                Self::default()
            }
        }
    }

    /// Persist to a specific file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| SyncError::config(format!("serialize config: {}", e)))?;
        fs::write(path, raw)?;
        Ok(())
    }

    /// Effective poll interval given the push channel's availability
    pub fn poll_interval(&self, push_available: bool) -> Duration {
        if push_available {
            Duration::from_secs(self.poll_interval_secs)
        } else {
            Duration::from_secs(self.poll_interval_no_push_secs)
        }
    }
}
