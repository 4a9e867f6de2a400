//! Print controller
//!
//! Owns the authoritative device state, the firmware classifier and at most
//! one [`JobStreamer`]. Inputs are processed strictly one at a time in arrival
//! order, so a pause queued before a readiness signal always takes effect
//! before the next line is read.

use fabstream_core::{
    AppEvent, CommandLine, ControllerError, DeviceState, Error, ErrorEvent, EventBus,
    EventBusConfig, FirmwareError, JobProgress, Result, StateCell, TelemetryEvent,
    TelemetrySample, TransitionOrigin, TransitionOutcome,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::job_source::{FileJobSource, JobSource};
use super::sink::CommandSink;
use super::streamer::JobStreamer;
use crate::firmware::{Firmware, ResponseClassifier, ResponseOutcome};

/// Inbound events delivered to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerInput {
    /// The device can accept another command
    DeviceReady,
    /// One line of raw device output
    DeviceLine(String),
    /// A state change requested from outside (user, transport)
    ExternalStateChange(DeviceState),
}

/// Configuration for the print controller
#[derive(Debug, Clone)]
pub struct PrintControllerConfig {
    /// Pump once when a job starts, for devices that stay silent while idle
    pub pump_on_start: bool,
    /// Event bus settings
    pub event_bus: EventBusConfig,
}

impl Default for PrintControllerConfig {
    fn default() -> Self {
        Self {
            pump_on_start: true,
            event_bus: EventBusConfig::default(),
        }
    }
}

/// Why [`PrintController::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// Every input sender was dropped
    ChannelClosed,
    /// The active job ran its completion sequence
    JobFinished,
    /// The job source failed and the device was moved to `Error`
    StreamHalted,
}

/// Controller for one device connection
pub struct PrintController {
    firmware: Firmware,
    bus: Arc<EventBus>,
    cell: Arc<StateCell>,
    streamer: Option<JobStreamer>,
    telemetry: Option<TelemetrySample>,
    last_error: Option<FirmwareError>,
    config: PrintControllerConfig,
}

impl PrintController {
    /// Create a disconnected controller speaking `firmware`
    pub fn new(firmware: Firmware, config: PrintControllerConfig) -> Self {
        let bus = Arc::new(EventBus::with_config(config.event_bus.clone()));
        let cell = Arc::new(StateCell::new(DeviceState::Disconnected, Arc::clone(&bus)));
        Self {
            firmware,
            bus,
            cell,
            streamer: None,
            telemetry: None,
            last_error: None,
            config,
        }
    }

    /// Event bus carrying every outbound event of this controller
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// Snapshot of the authoritative device state
    pub fn state(&self) -> DeviceState {
        self.cell.snapshot()
    }

    /// The firmware dialect in use
    pub fn firmware(&self) -> &Firmware {
        &self.firmware
    }

    /// Most recent telemetry sample
    pub fn telemetry(&self) -> Option<TelemetrySample> {
        self.telemetry
    }

    /// Most recent classification error, kept for diagnostics
    pub fn last_error(&self) -> Option<&FirmwareError> {
        self.last_error.as_ref()
    }

    /// Whether a job is being streamed
    pub fn is_streaming(&self) -> bool {
        self.streamer.is_some()
    }

    /// Progress of the active job
    pub fn progress(&self) -> Option<JobProgress> {
        self.streamer.as_ref().map(JobStreamer::progress)
    }

    /// Mark the transport as open
    pub fn connect(&mut self) -> Result<TransitionOutcome> {
        self.transition(DeviceState::Idle)
    }

    /// Mark the transport as closed
    pub fn disconnect(&mut self) -> Result<TransitionOutcome> {
        self.transition(DeviceState::Disconnected)
    }

    /// Start streaming `source`.
    ///
    /// Returns the first command when the controller pumps on start.
    pub fn start_job(&mut self, source: Box<dyn JobSource>) -> Result<Option<CommandLine>> {
        if self.streamer.is_some() {
            return Err(ControllerError::JobActive.into());
        }
        if !self.state().is_connected() {
            return Err(ControllerError::NotConnected.into());
        }

        self.cell
            .request_transition(DeviceState::StartPrint, TransitionOrigin::Controller)?;
        self.streamer = Some(JobStreamer::new(
            source,
            Arc::clone(&self.cell),
            Arc::clone(&self.bus),
        ));

        if self.config.pump_on_start {
            self.pump()
        } else {
            Ok(None)
        }
    }

    /// Open `path` and start streaming it
    pub fn start_job_from_path(&mut self, path: impl AsRef<Path>) -> Result<Option<CommandLine>> {
        let source = FileJobSource::open(path)?;
        self.start_job(Box::new(source))
    }

    /// Process one input and return the command to transmit, if any
    pub fn handle(&mut self, input: ControllerInput) -> Result<Option<CommandLine>> {
        match input {
            ControllerInput::DeviceReady => self.pump(),
            ControllerInput::DeviceLine(line) => self.handle_line(&line),
            ControllerInput::ExternalStateChange(state) => {
                // Refusals are logged and published by the cell
                self.transition(state).ok();
                Ok(None)
            }
        }
    }

    fn handle_line(&mut self, line: &str) -> Result<Option<CommandLine>> {
        match self.firmware.classify(line) {
            Ok(ResponseOutcome::Ready) => self.pump(),
            Ok(ResponseOutcome::Telemetry(sample)) => {
                tracing::trace!("Telemetry: {}", sample);
                self.telemetry = Some(sample);
                self.bus
                    .publish(AppEvent::Telemetry(TelemetryEvent::Updated(sample)))
                    .ok();
                Ok(None)
            }
            Ok(ResponseOutcome::Unrecognized) => {
                tracing::trace!("Unrecognized device line: {}", line);
                Ok(None)
            }
            Err(err) => {
                tracing::warn!("{}", err);
                if let FirmwareError::MalformedTelemetry { line, reason } = &err {
                    self.bus
                        .publish(AppEvent::Error(ErrorEvent::MalformedTelemetry {
                            line: line.clone(),
                            reason: reason.clone(),
                        }))
                        .ok();
                }
                self.last_error = Some(err);
                Ok(None)
            }
        }
    }

    /// Apply a controller-originated transition and mirror it into the streamer
    fn transition(&mut self, state: DeviceState) -> Result<TransitionOutcome> {
        let outcome = self
            .cell
            .request_transition(state, TransitionOrigin::Controller)?;
        if let Some(streamer) = self.streamer.as_mut() {
            streamer.on_external_state_change(state, TransitionOrigin::Controller);
        }
        Ok(outcome)
    }

    fn pump(&mut self) -> Result<Option<CommandLine>> {
        let Some(streamer) = self.streamer.as_mut() else {
            return Ok(None);
        };

        let result = streamer.pump();
        if streamer.is_finished() {
            tracing::debug!("Releasing finished streamer");
            self.streamer = None;
        }

        result.map_err(|err| {
            tracing::error!("Job source failed: {}", err);
            self.transition(DeviceState::Error).ok();
            err
        })
    }

    /// Encode a command for the transport, newline terminated
    pub fn encode(&self, command: &CommandLine) -> Vec<u8> {
        let mut bytes = self.firmware.encode(command.as_str());
        bytes.push(b'\n');
        bytes
    }

    /// Write a command produced by [`handle`](Self::handle) or
    /// [`start_job`](Self::start_job) to `sink`
    pub fn transmit(&mut self, command: &CommandLine, sink: &mut dyn CommandSink) -> Result<()> {
        let bytes = self.encode(command);
        if let Err(err) = sink.send(&bytes) {
            tracing::error!("Failed to send command '{}': {}", command, err);
            self.transition(DeviceState::Error).ok();
            return Err(err);
        }
        Ok(())
    }

    /// Drain `inputs` in arrival order, transmitting commands to `sink`.
    ///
    /// Returns once all senders are dropped, once a job that was active when
    /// the loop started (or was started by it) has finished, or once its
    /// source failed.
    pub async fn run(
        &mut self,
        mut inputs: mpsc::Receiver<ControllerInput>,
        sink: &mut dyn CommandSink,
    ) -> Result<RunExit> {
        while let Some(input) = inputs.recv().await {
            let had_job = self.is_streaming();

            match self.handle(input) {
                Ok(Some(command)) => self.transmit(&command, sink)?,
                Ok(None) => {}
                Err(Error::Job(err)) => {
                    tracing::error!("Stream halted: {}", err);
                    return Ok(RunExit::StreamHalted);
                }
                Err(err) => return Err(err),
            }

            if had_job && !self.is_streaming() {
                return Ok(RunExit::JobFinished);
            }
        }
        Ok(RunExit::ChannelClosed)
    }
}

impl std::fmt::Debug for PrintController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintController")
            .field("firmware", &self.firmware.name())
            .field("state", &self.state())
            .field("streamer", &self.streamer)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}
