//! Firmware dialects
//!
//! Each dialect knows how its device acknowledges commands and reports
//! temperatures. The set is closed and chosen at construction:
//! - Repetier: `ok`/`wait` readiness, `T:<f> /<f> B:<f> /<f>` telemetry

pub mod repetier;

use fabstream_core::{FirmwareError, TelemetrySample};
use std::fmt;
use std::str::FromStr;

pub use repetier::RepetierResponseParser;

/// Classification of one line of device output
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseOutcome {
    /// The device finished the previous command and can take another
    Ready,
    /// A temperature report
    Telemetry(TelemetrySample),
    /// Anything else (startup banners, echo lines, debug output)
    Unrecognized,
}

/// Capability shared by all firmware dialects
pub trait ResponseClassifier: Send + Sync {
    /// Human readable dialect name
    fn name(&self) -> &'static str;

    /// Classify one line of device output.
    ///
    /// A line carrying a telemetry marker that does not satisfy the report
    /// grammar yields [`FirmwareError::MalformedTelemetry`]; the caller keeps
    /// its previous sample and carries on.
    fn classify(&self, line: &str) -> Result<ResponseOutcome, FirmwareError>;

    /// Convert an outgoing command into the transport's byte encoding
    fn encode(&self, command: &str) -> Vec<u8>;
}

/// Supported firmware dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FirmwareKind {
    /// Repetier-Firmware
    #[default]
    Repetier,
}

impl FirmwareKind {
    /// All known dialects
    pub const ALL: [FirmwareKind; 1] = [FirmwareKind::Repetier];
}

impl fmt::Display for FirmwareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repetier => write!(f, "Repetier"),
        }
    }
}

impl FromStr for FirmwareKind {
    type Err = FirmwareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FirmwareKind::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FirmwareError::UnknownFirmware {
                firmware_type: s.to_string(),
            })
    }
}

/// A dialect instance selected at construction
#[derive(Debug, Clone)]
pub enum Firmware {
    /// Repetier-Firmware
    Repetier(RepetierResponseParser),
}

impl Firmware {
    /// Create the classifier for `kind`
    pub fn new(kind: FirmwareKind) -> Self {
        let firmware = match kind {
            FirmwareKind::Repetier => Firmware::Repetier(RepetierResponseParser::new()),
        };
        tracing::debug!("{} firmware selected", firmware.name());
        firmware
    }

    /// The dialect of this instance
    pub fn kind(&self) -> FirmwareKind {
        match self {
            Firmware::Repetier(_) => FirmwareKind::Repetier,
        }
    }
}

impl Default for Firmware {
    fn default() -> Self {
        Self::new(FirmwareKind::default())
    }
}

impl ResponseClassifier for Firmware {
    fn name(&self) -> &'static str {
        match self {
            Firmware::Repetier(parser) => parser.name(),
        }
    }

    fn classify(&self, line: &str) -> Result<ResponseOutcome, FirmwareError> {
        match self {
            Firmware::Repetier(parser) => parser.classify(line),
        }
    }

    fn encode(&self, command: &str) -> Vec<u8> {
        match self {
            Firmware::Repetier(parser) => parser.encode(command),
        }
    }
}
