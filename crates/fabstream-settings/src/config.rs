//! Configuration management for Fabstream
//!
//! Configuration is stored as TOML and organized into sections:
//! - Firmware dialect selection
//! - Streaming behaviour (event and input queue capacities, start-up pump)
//! - Logging defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, SettingsError, SettingsResult};

/// Log levels accepted by `logging.level`
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Firmware settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareSettings {
    /// Firmware dialect name, e.g. `repetier`
    pub dialect: String,
}

impl Default for FirmwareSettings {
    fn default() -> Self {
        Self {
            dialect: "repetier".to_string(),
        }
    }
}

/// Streaming settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Capacity of the event bus broadcast channel
    pub event_capacity: usize,
    /// Capacity of the controller's inbound queue
    pub queue_capacity: usize,
    /// Send the first line without waiting for the device to ask
    pub pump_on_start: bool,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            queue_capacity: 256,
            pump_on_start: true,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Firmware settings
    pub firmware: FirmwareSettings,
    /// Streaming settings
    pub streaming: StreamingSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location: `<config dir>/fabstream/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("fabstream").join("config.toml"))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no configuration directory on this platform".into())
            })
    }

    /// Load config from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from the default location, falling back to defaults when no file exists
    pub fn load_or_default() -> SettingsResult<Self> {
        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Save config to a TOML file, creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::ConfigDirectory(e.to_string()))?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.firmware.dialect.trim().is_empty() {
            return Err(ConfigError::UnknownValue {
                key: "firmware.dialect".to_string(),
                value: self.firmware.dialect.clone(),
            });
        }

        if self.streaming.event_capacity == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "streaming.event_capacity".to_string(),
                value: "0".to_string(),
            });
        }

        if self.streaming.queue_capacity == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "streaming.queue_capacity".to_string(),
                value: "0".to_string(),
            });
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::UnknownValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        Ok(())
    }
}
