//! # Fabstream Communication
//!
//! Firmware dialects and the job streaming state machine.
//! Classifies device output as readiness, telemetry or noise, and feeds a
//! job source to the device one line per readiness signal.

pub mod communication;
pub mod firmware;

pub use communication::{
    CommandSink, ControllerInput, FileJobSource, JobSource, JobStreamer, PrintController,
    PrintControllerConfig, RawLine, ReaderJobSource, RecordingSink, RunExit, TextJobSource,
};

pub use firmware::{Firmware, FirmwareKind, ResponseClassifier, ResponseOutcome};
