//! Data models for Fabstream
//!
//! Provides the value types shared between the firmware layer and the job streamer:
//! - Device state (the authoritative connection/print state)
//! - Telemetry samples parsed from temperature reports
//! - Job progress accounting
//! - Normalized command lines

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the attached fabrication device
///
/// Exactly one value is authoritative at a time; it is owned by the controller's
/// [`StateCell`](crate::core::StateCell) and mirrored by the job streamer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceState {
    /// No transport is open
    #[default]
    Disconnected,
    /// Connected and waiting for work
    Idle,
    /// A job has been handed to the streamer but no line has been sent yet
    StartPrint,
    /// The streamer is feeding commands
    Busy,
    /// Streaming is held; no lines are read
    Pause,
    /// Streaming was cancelled; the next pump finishes the job
    Stop,
    /// Device reported a fault
    Error,
    /// Job source was fully consumed
    FinishedPrint,
}

impl DeviceState {
    /// Check if this state indicates a transport is open
    pub fn is_connected(&self) -> bool {
        !matches!(self, DeviceState::Disconnected)
    }

    /// Check if the streamer may read and send the next line in this state
    pub fn accepts_commands(&self) -> bool {
        matches!(
            self,
            DeviceState::StartPrint | DeviceState::Idle | DeviceState::Busy
        )
    }

    /// Check if a transition from this state to `target` is structurally allowed.
    ///
    /// Pause and Stop need a transport to carry them, so they are refused
    /// while disconnected. Every other transition is permitted.
    pub fn can_transition_to(&self, target: DeviceState) -> bool {
        !(*self == DeviceState::Disconnected
            && matches!(target, DeviceState::Pause | DeviceState::Stop))
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Idle => write!(f, "Idle"),
            Self::StartPrint => write!(f, "StartPrint"),
            Self::Busy => write!(f, "Busy"),
            Self::Pause => write!(f, "Pause"),
            Self::Stop => write!(f, "Stop"),
            Self::Error => write!(f, "Error"),
            Self::FinishedPrint => write!(f, "FinishedPrint"),
        }
    }
}

/// One temperature report from the device
///
/// Created fresh for every parsed report; no history is kept.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Current extruder temperature
    pub extruder_temp: f32,
    /// Extruder target temperature
    pub extruder_target: f32,
    /// Current bed temperature
    pub bed_temp: f32,
    /// Bed target temperature
    pub bed_target: f32,
}

impl TelemetrySample {
    /// Create a new sample
    pub fn new(extruder_temp: f32, extruder_target: f32, bed_temp: f32, bed_target: f32) -> Self {
        Self {
            extruder_temp,
            extruder_target,
            bed_temp,
            bed_target,
        }
    }
}

impl fmt::Display for TelemetrySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "extruder {:.1}/{:.1} bed {:.1}/{:.1}",
            self.extruder_temp, self.extruder_target, self.bed_temp, self.bed_target
        )
    }
}

/// Byte-based progress of a streaming job
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JobProgress {
    /// Bytes read from the job source so far
    pub consumed_bytes: u64,
    /// Size of the job source when it was opened
    pub total_bytes: u64,
    /// `100 * consumed / total`, clamped to [0, 100]
    pub current_percent: f32,
}

impl JobProgress {
    /// Create progress for a job of `total_bytes`
    pub fn new(total_bytes: u64) -> Self {
        Self {
            consumed_bytes: 0,
            total_bytes,
            current_percent: 0.0,
        }
    }

    /// Account for `bytes` read from the source and recompute the percentage
    pub fn consume(&mut self, bytes: u64) -> f32 {
        self.consumed_bytes = self.consumed_bytes.saturating_add(bytes);
        self.current_percent = if self.total_bytes == 0 {
            100.0
        } else {
            ((self.consumed_bytes as f64 * 100.0 / self.total_bytes as f64).clamp(0.0, 100.0))
                as f32
        };
        self.current_percent
    }

    /// Force the terminal value
    pub fn complete(&mut self) -> f32 {
        self.current_percent = 100.0;
        self.current_percent
    }

    /// Bytes not yet consumed
    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.consumed_bytes)
    }
}

/// Comment delimiter for G-code lines
pub const COMMENT_DELIMITER: char = ';';

/// A normalized instruction line ready to be sent to the device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandLine(String);

impl CommandLine {
    /// Normalize raw source text into a command.
    ///
    /// Truncates at the first `;`, trims the ends and collapses interior runs of
    /// whitespace into single spaces. Returns `None` when nothing is left.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let code = match raw.find(COMMENT_DELIMITER) {
            Some(idx) => &raw[..idx],
            None => raw,
        };
        let simplified = code.split_whitespace().collect::<Vec<_>>().join(" ");
        if simplified.is_empty() {
            None
        } else {
            Some(Self(simplified))
        }
    }

    /// The command text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CommandLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_and_stop_refused_while_disconnected() {
        let state = DeviceState::Disconnected;
        assert!(!state.can_transition_to(DeviceState::Pause));
        assert!(!state.can_transition_to(DeviceState::Stop));
        assert!(state.can_transition_to(DeviceState::Idle));
        assert!(DeviceState::Busy.can_transition_to(DeviceState::Pause));
    }

    #[test]
    fn test_accepts_commands() {
        assert!(DeviceState::Idle.accepts_commands());
        assert!(DeviceState::StartPrint.accepts_commands());
        assert!(DeviceState::Busy.accepts_commands());
        assert!(!DeviceState::Pause.accepts_commands());
        assert!(!DeviceState::Error.accepts_commands());
    }

    #[test]
    fn test_command_line_strips_comment() {
        let cmd = CommandLine::from_raw("G1 X10 ; move").unwrap();
        assert_eq!(cmd.as_str(), "G1 X10");
    }

    #[test]
    fn test_command_line_collapses_whitespace() {
        let cmd = CommandLine::from_raw("  G1\tX10    Y5 \r").unwrap();
        assert_eq!(cmd.as_str(), "G1 X10 Y5");
    }

    #[test]
    fn test_command_line_blank() {
        assert!(CommandLine::from_raw("").is_none());
        assert!(CommandLine::from_raw("   ").is_none());
        assert!(CommandLine::from_raw("; only a comment").is_none());
    }

    #[test]
    fn test_progress_accounting() {
        let mut progress = JobProgress::new(200);
        assert_eq!(progress.consume(50), 25.0);
        assert_eq!(progress.consume(150), 100.0);
        assert_eq!(progress.remaining_bytes(), 0);
    }

    #[test]
    fn test_progress_clamped() {
        let mut progress = JobProgress::new(10);
        assert_eq!(progress.consume(11), 100.0);
    }

    #[test]
    fn test_progress_empty_source() {
        let mut progress = JobProgress::new(0);
        assert_eq!(progress.consume(0), 100.0);
        assert_eq!(progress.complete(), 100.0);
    }
}
