//! Error types for the settings crate.

use thiserror::Error;

/// Errors raised while reading or writing the configuration file.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The file could not be read.
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    /// The file could not be written.
    #[error("Failed to save settings: {0}")]
    SaveError(String),

    /// No configuration directory is known, or it could not be created.
    #[error("Config directory error: {0}")]
    ConfigDirectory(String),

    /// The file is not valid TOML or does not match the schema.
    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings could not be rendered as TOML.
    #[error("Failed to render settings: {0}")]
    Render(#[from] toml::ser::Error),

    /// The settings parsed but hold an unusable value.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A setting that parsed but cannot be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A numeric setting is outside its allowed range.
    #[error("'{key}' must be greater than zero, got {value}")]
    ValueOutOfRange { key: String, value: String },

    /// A named setting is not one of the accepted names.
    #[error("'{key}' has unknown value '{value}'")]
    UnknownValue { key: String, value: String },
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
