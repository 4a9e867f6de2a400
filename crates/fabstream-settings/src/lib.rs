//! Fabstream Settings Crate
//!
//! Handles configuration loading, validation and persistence.

pub mod config;
pub mod error;

pub use config::{Config, FirmwareSettings, LoggingSettings, StreamingSettings};
pub use error::{ConfigError, SettingsError, SettingsResult};
