//! Configuration for the receiver node.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Control-channel settings.
    pub control: ControlConfig,
    /// Media transport settings.
    pub media: MediaConfig,
    /// Workspace and enhancement settings.
    pub enhancement: EnhancementConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Control-channel configuration.
///
/// Both receive operations are bounded waits; a sender that never
/// shows up fails the session with a timeout instead of blocking the
/// node forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// TCP port to listen on for resolution metadata.
    pub metadata_port: u16,
    /// TCP port to listen on for the completion signal.
    pub done_port: u16,
    /// Seconds to wait for the metadata handshake.
    pub metadata_timeout_secs: u64,
    /// Seconds to wait for the completion signal (covers the whole
    /// streaming phase).
    pub done_timeout_secs: u64,
}

/// Media transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// UDP port the receive pipeline listens on.
    pub port: u16,
}

/// Workspace and enhancement-model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    /// Root directory of the session workspace.
    pub workspace_root: PathBuf,
    /// Entry point of the per-frame inference model.
    pub inference_script: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            media: MediaConfig::default(),
            enhancement: EnhancementConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            metadata_port: vrx_core::DEFAULT_METADATA_PORT,
            done_port: vrx_core::DEFAULT_DONE_PORT,
            metadata_timeout_secs: 600,
            done_timeout_secs: 3600,
        }
    }
}

impl ControlConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn done_timeout(&self) -> Duration {
        Duration::from_secs(self.done_timeout_secs)
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            port: vrx_core::DEFAULT_MEDIA_PORT,
        }
    }
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            inference_script: vrx_core::pipeline::DEFAULT_INFERENCE_SCRIPT.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ReceiverConfig {
    /// Load from `path`, falling back to defaults when the file is
    /// missing or unparsable.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                eprintln!("invalid config {}: {e}, using defaults", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}
