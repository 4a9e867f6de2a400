//! # Fabstream
//!
//! Streams G-code jobs to 3D printer firmware one line per readiness signal.
//!
//! ## Architecture
//!
//! Fabstream is organized as a workspace with multiple crates:
//!
//! 1. **fabstream-core** - Device state, job progress, errors, event bus
//! 2. **fabstream-communication** - Firmware response classifiers, job sources,
//!    the job streamer and the print controller
//! 3. **fabstream-settings** - TOML configuration
//! 4. **fabstream** - CLI binary and dry-run driver

use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

pub use fabstream_communication::{
    CommandSink, ControllerInput, Firmware, FirmwareKind, JobStreamer, PrintController,
    PrintControllerConfig, RunExit,
};
pub use fabstream_core::{
    AppEvent, DeviceState, Error, EventBusConfig, EventCategory, EventFilter, JobEvent,
    JobProgress, Result, TelemetrySample,
};
pub use fabstream_settings::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Logs go to stderr so stdout stays free for command output. `RUST_LOG`
/// overrides `level`.
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", level, e))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Resolve the firmware dialect named in the settings
pub fn firmware_from_settings(settings: &Config) -> Result<Firmware> {
    let kind = FirmwareKind::from_str(&settings.firmware.dialect)?;
    Ok(Firmware::new(kind))
}

/// Controller configuration derived from the settings
pub fn controller_config(settings: &Config) -> PrintControllerConfig {
    PrintControllerConfig {
        pump_on_start: settings.streaming.pump_on_start,
        event_bus: EventBusConfig {
            channel_capacity: settings.streaming.event_capacity,
            ..EventBusConfig::default()
        },
    }
}

/// Sink standing in for a device: writes each command to `out` and
/// acknowledges it with `ok`
pub struct DryRunSink<W> {
    out: Option<W>,
    acks: mpsc::Sender<ControllerInput>,
    sent: usize,
}

impl<W: Write + Send> DryRunSink<W> {
    /// Echo commands to `out`, or drop them when `out` is `None`
    pub fn new(out: Option<W>, acks: mpsc::Sender<ControllerInput>) -> Self {
        Self {
            out,
            acks,
            sent: 0,
        }
    }

    /// Number of commands accepted so far
    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl<W: Write + Send> CommandSink for DryRunSink<W> {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        if let Some(out) = self.out.as_mut() {
            out.write_all(data)?;
        }
        self.acks
            .try_send(ControllerInput::DeviceLine("ok".to_string()))
            .map_err(|e| Error::other(format!("acknowledgment dropped: {}", e)))?;
        self.sent += 1;
        Ok(data.len())
    }
}

/// Outcome of a dry run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DryRunReport {
    /// Commands transmitted
    pub commands: usize,
    /// Last progress percentage published
    pub percent: f32,
    /// Device state once streaming stopped
    pub final_state: DeviceState,
}

/// Stream `path` through `controller` against a device that acknowledges
/// every line.
///
/// Commands are echoed to `out` when given.
pub async fn dry_run<W: Write + Send>(
    controller: &mut PrintController,
    path: &Path,
    queue_capacity: usize,
    out: Option<W>,
) -> anyhow::Result<DryRunReport> {
    let (tx, rx) = mpsc::channel(queue_capacity);
    let mut sink = DryRunSink::new(out, tx.clone());

    let percent = Arc::new(Mutex::new(0.0f32));
    let recorder = Arc::clone(&percent);
    let subscription = controller.bus().subscribe(
        EventFilter::Categories(vec![EventCategory::Job]),
        move |event| {
            if let AppEvent::Job(JobEvent::ProgressChanged { percent }) = event {
                *recorder.lock() = percent;
            }
        },
    );

    controller.connect()?;
    match controller.start_job_from_path(path)? {
        Some(command) => controller.transmit(&command, &mut sink)?,
        // Without a pump on start the device has to ask first
        None if controller.is_streaming() => tx.try_send(ControllerInput::DeviceReady)?,
        None => {}
    }
    drop(tx);

    if controller.is_streaming() {
        let exit = controller.run(rx, &mut sink).await?;
        tracing::debug!("Controller loop exited: {:?}", exit);
    }
    controller.bus().unsubscribe(subscription);

    let report = DryRunReport {
        commands: sink.sent(),
        percent: *percent.lock(),
        final_state: controller.state(),
    };
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_config_from_settings() {
        let mut settings = Config::default();
        settings.streaming.event_capacity = 16;
        settings.streaming.pump_on_start = false;

        let config = controller_config(&settings);
        assert_eq!(config.event_bus.channel_capacity, 16);
        assert!(!config.pump_on_start);
    }

    #[test]
    fn test_unknown_dialect() {
        let mut settings = Config::default();
        settings.firmware.dialect = "marlin".to_string();
        assert!(firmware_from_settings(&settings).is_err());
    }
}
