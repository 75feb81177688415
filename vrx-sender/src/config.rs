//! Configuration for the sender node.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Control-channel settings.
    pub control: ControlConfig,
    /// Media transport settings.
    pub media: MediaConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Control-channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Receiver TCP port for the resolution-metadata handshake.
    pub metadata_port: u16,
    /// Receiver TCP port for the completion signal.
    pub done_port: u16,
}

/// Media transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Receiver UDP port for the RTP stream.
    pub port: u16,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            media: MediaConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            metadata_port: vrx_core::DEFAULT_METADATA_PORT,
            done_port: vrx_core::DEFAULT_DONE_PORT,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            port: vrx_core::DEFAULT_MEDIA_PORT,
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

impl SenderConfig {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_well_known_ports() {
        let config = SenderConfig::default();
        assert_eq!(config.control.metadata_port, 6000);
        assert_eq!(config.control.done_port, 6001);
        assert_eq!(config.media.port, 5000);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: SenderConfig = toml::from_str("[control]\nmetadata_port = 7000\n").unwrap();
        assert_eq!(config.control.metadata_port, 7000);
        assert_eq!(config.control.done_port, 6001);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn round_trips_through_toml() {
        let config = SenderConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: SenderConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.media.port, config.media.port);
    }
}
