//! Event type definitions for the event bus.
//!
//! Events are organized by category and are cloneable and serializable
//! so consumers can log or replay them.

use serde::{Deserialize, Serialize};

use crate::core::TransitionOrigin;
use crate::data::{DeviceState, TelemetrySample};

/// Root event enum for all streaming events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppEvent {
    /// Device state changes
    Device(DeviceEvent),
    /// Job streaming events
    Job(JobEvent),
    /// Temperature reports
    Telemetry(TelemetryEvent),
    /// Recoverable errors and diagnostics
    Error(ErrorEvent),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Device(_) => EventCategory::Device,
            AppEvent::Job(_) => EventCategory::Job,
            AppEvent::Telemetry(_) => EventCategory::Telemetry,
            AppEvent::Error(_) => EventCategory::Error,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Device(e) => e.description(),
            AppEvent::Job(e) => e.description(),
            AppEvent::Telemetry(e) => e.description(),
            AppEvent::Error(e) => e.description(),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Device state events.
    Device,
    /// Job streaming events.
    Job,
    /// Telemetry events.
    Telemetry,
    /// Error and diagnostic events.
    Error,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Device => write!(f, "Device"),
            EventCategory::Job => write!(f, "Job"),
            EventCategory::Telemetry => write!(f, "Telemetry"),
            EventCategory::Error => write!(f, "Error"),
        }
    }
}

/// Device state events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// The authoritative state changed.
    StateChanged {
        /// State before the change.
        from: DeviceState,
        /// State after the change.
        to: DeviceState,
        /// Who requested the change.
        origin: TransitionOrigin,
    },
}

impl DeviceEvent {
    fn description(&self) -> String {
        match self {
            DeviceEvent::StateChanged { from, to, origin } => {
                format!("State {} -> {} ({})", from, to, origin)
            }
        }
    }
}

/// Job streaming events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobEvent {
    /// A streamer was installed for a new job.
    Started {
        /// Size of the job source in bytes.
        total_bytes: u64,
    },
    /// The next command to transmit to the device.
    NextCommand {
        /// Normalized command text.
        line: String,
    },
    /// Byte progress changed.
    ProgressChanged {
        /// Percentage in [0, 100].
        percent: f32,
    },
    /// The completion sequence ran; the streamer is torn down.
    Finished,
}

impl JobEvent {
    fn description(&self) -> String {
        match self {
            JobEvent::Started { total_bytes } => format!("Job started ({} bytes)", total_bytes),
            JobEvent::NextCommand { line } => format!("Next command: {}", line),
            JobEvent::ProgressChanged { percent } => format!("Progress: {:.1}%", percent),
            JobEvent::Finished => "Job finished".to_string(),
        }
    }
}

/// Temperature events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    /// A new temperature sample replaced the previous one.
    Updated(TelemetrySample),
}

impl TelemetryEvent {
    fn description(&self) -> String {
        match self {
            TelemetryEvent::Updated(sample) => format!("Telemetry: {}", sample),
        }
    }
}

/// Recoverable error events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ErrorEvent {
    /// A temperature report could not be parsed.
    MalformedTelemetry {
        /// The offending line.
        line: String,
        /// What failed.
        reason: String,
    },
    /// A state change request was refused.
    TransitionRejected {
        /// State held at the time.
        current: DeviceState,
        /// Refused target.
        requested: DeviceState,
    },
}

impl ErrorEvent {
    fn description(&self) -> String {
        match self {
            ErrorEvent::MalformedTelemetry { line, reason } => {
                format!("Malformed telemetry '{}': {}", line, reason)
            }
            ErrorEvent::TransitionRejected { current, requested } => {
                format!("Rejected transition {} -> {}", current, requested)
            }
        }
    }
}
