//! Error handling for Fabstream
//!
//! Provides error types for each layer of the streaming core:
//! - Controller errors (state machine violations)
//! - Firmware errors (response parsing)
//! - Job errors (job source access)
//!
//! All error types use `thiserror` for ergonomic error handling.

use crate::data::DeviceState;
use thiserror::Error;

/// Controller error type
///
/// Represents errors related to device state handling and job ownership.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// Controller is not connected
    #[error("Controller not connected")]
    NotConnected,

    /// Invalid state transition
    #[error("Invalid state transition from {current} to {requested}")]
    InvalidStateTransition {
        /// The state held when the request arrived.
        current: DeviceState,
        /// The rejected target state.
        requested: DeviceState,
    },

    /// A job is already being streamed
    #[error("A job is already active")]
    JobActive,
}

/// Firmware error type
///
/// Represents errors specific to firmware dialects and their response grammar.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FirmwareError {
    /// A temperature report did not match `T:<f> /<f> B:<f> /<f>`
    #[error("Malformed telemetry '{line}': {reason}")]
    MalformedTelemetry {
        /// The offending device line.
        line: String,
        /// What part of the grammar failed.
        reason: String,
    },

    /// Unknown firmware dialect name
    #[error("Unknown firmware type: {firmware_type}")]
    UnknownFirmware {
        /// The unknown firmware identifier.
        firmware_type: String,
    },
}

/// Job source error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    /// The job source could not be opened
    #[error("Failed to open job source {path}: {reason}")]
    UnopenableSource {
        /// Path or description of the source.
        path: String,
        /// The reason the open failed.
        reason: String,
    },

    /// Reading the next line failed
    #[error("Failed to read job source: {reason}")]
    ReadFailed {
        /// The reason the read failed.
        reason: String,
    },
}

/// Main error type for Fabstream
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Firmware error
    #[error(transparent)]
    Firmware(#[from] FirmwareError),

    /// Job error
    #[error(transparent)]
    Job(#[from] JobError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a controller error
    pub fn is_controller_error(&self) -> bool {
        matches!(self, Error::Controller(_))
    }

    /// Check if this is a firmware error
    pub fn is_firmware_error(&self) -> bool {
        matches!(self, Error::Firmware(_))
    }

    /// Check if this is a job source error
    pub fn is_job_error(&self) -> bool {
        matches!(self, Error::Job(_))
    }

    /// Check if the error leaves the stream able to continue
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Firmware(FirmwareError::MalformedTelemetry { .. })
                | Error::Controller(ControllerError::InvalidStateTransition { .. })
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
