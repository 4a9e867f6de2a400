//! Repetier response parser
//!
//! Classifies Repetier-Firmware output. Temperature reports look like
//! `T:185.4 /185.0 B:60.5 /60.0`, optionally prefixed by an acknowledgment
//! (`ok T:...`) and followed by extra fields (`@:0 B@:0`) which are ignored.

use fabstream_core::{FirmwareError, TelemetrySample};

use crate::firmware::{ResponseClassifier, ResponseOutcome};

/// Generic acknowledgment token
pub const OK_TOKEN: &str = "ok";
/// Busy/idle token sent while the device waits for input
pub const WAIT_TOKEN: &str = "wait";
/// Marker introducing the current extruder temperature
pub const EXTRUDER_TEMP_MARKER: &str = "T:";
/// Marker introducing the current bed temperature
pub const BED_TEMP_MARKER: &str = "B:";
/// Marker introducing a target temperature
pub const TARGET_MARKER: &str = "/";

/// Parser for Repetier protocol responses
#[derive(Debug, Clone, Default)]
pub struct RepetierResponseParser;

impl RepetierResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        Self
    }

    /// Check whether a line carries a temperature marker
    pub fn is_telemetry(line: &str) -> bool {
        line.contains(EXTRUDER_TEMP_MARKER) || line.contains(BED_TEMP_MARKER)
    }

    /// Check whether a line signals readiness for the next command
    pub fn is_ready(line: &str) -> bool {
        line.contains(OK_TOKEN) || line.contains(WAIT_TOKEN)
    }

    /// Parse a temperature report.
    ///
    /// Tokens are separated by single spaces. The report starts at the first
    /// token carrying a temperature marker and must provide four fields.
    pub fn parse_telemetry(&self, line: &str) -> Result<TelemetrySample, FirmwareError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let tokens: Vec<&str> = line.split(' ').collect();

        let start = tokens
            .iter()
            .position(|t| t.starts_with(EXTRUDER_TEMP_MARKER) || t.starts_with(BED_TEMP_MARKER))
            .ok_or_else(|| malformed(line, "no field starts with a temperature marker"))?;

        let fields = &tokens[start..];
        if fields.len() < 4 {
            return Err(malformed(
                line,
                format!("expected 4 fields, found {}", fields.len()),
            ));
        }

        Ok(TelemetrySample {
            extruder_temp: parse_field(line, fields[0], EXTRUDER_TEMP_MARKER)?,
            extruder_target: parse_field(line, fields[1], TARGET_MARKER)?,
            bed_temp: parse_field(line, fields[2], BED_TEMP_MARKER)?,
            bed_target: parse_field(line, fields[3], TARGET_MARKER)?,
        })
    }
}

impl ResponseClassifier for RepetierResponseParser {
    fn name(&self) -> &'static str {
        "Repetier"
    }

    fn classify(&self, line: &str) -> Result<ResponseOutcome, FirmwareError> {
        // Telemetry wins over readiness even when the report is prefixed with "ok"
        if Self::is_telemetry(line) {
            self.parse_telemetry(line).map(ResponseOutcome::Telemetry)
        } else if Self::is_ready(line) {
            Ok(ResponseOutcome::Ready)
        } else {
            Ok(ResponseOutcome::Unrecognized)
        }
    }

    fn encode(&self, command: &str) -> Vec<u8> {
        command.as_bytes().to_vec()
    }
}

fn parse_field(line: &str, token: &str, marker: &str) -> Result<f32, FirmwareError> {
    let value = token.strip_prefix(marker).ok_or_else(|| {
        malformed(
            line,
            format!("field '{}' does not start with '{}'", token, marker),
        )
    })?;
    value
        .parse::<f32>()
        .map_err(|e| malformed(line, format!("invalid number '{}': {}", value, e)))
}

fn malformed(line: &str, reason: impl Into<String>) -> FirmwareError {
    FirmwareError::MalformedTelemetry {
        line: line.to_string(),
        reason: reason.into(),
    }
}
