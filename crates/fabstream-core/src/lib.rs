//! # Fabstream Core
//!
//! Core types and state management for Fabstream.
//! Provides the device state model, the guarded state cell, telemetry and
//! progress values, error types and the event bus shared by the
//! communication layer.

pub mod core;
pub mod data;
pub mod error;
pub mod event_bus;
pub mod types;

pub use core::{StateCell, TransitionOrigin, TransitionOutcome};

pub use data::{CommandLine, DeviceState, JobProgress, TelemetrySample, COMMENT_DELIMITER};

pub use error::{ControllerError, Error, FirmwareError, JobError, Result};

pub use event_bus::{
    AppEvent, DeviceEvent, ErrorEvent, EventBus, EventBusConfig, EventBusError, EventCategory,
    EventFilter, JobEvent, SubscriptionId, TelemetryEvent,
};

pub use types::{thread_safe_vec, ThreadSafeVec};
