//! Flow-controlled job streaming
//!
//! The [`JobStreamer`] hands the device one command per readiness signal.
//! It mirrors the controller's device state and both reads and writes the
//! controller's [`StateCell`]:
//! - `pump` reads the next non-blank command when the mirrored state allows it
//! - progress is byte based and published after every line read
//! - the completion sequence runs once, when the source is exhausted or the
//!   job was stopped
//!
//! Inbound state synchronisation is detached while the streamer applies a
//! change of its own, so the echo of that change is never processed as if it
//! came from outside.

use fabstream_core::{
    AppEvent, CommandLine, DeviceState, EventBus, JobEvent, JobProgress, Result, StateCell,
    TransitionOrigin,
};
use std::path::Path;
use std::sync::Arc;

use super::job_source::{FileJobSource, JobSource};

/// Streams one job source to the device
pub struct JobStreamer {
    source: Box<dyn JobSource>,
    progress: JobProgress,
    /// Mirror of the controller's state; the cell stays authoritative
    state: DeviceState,
    cell: Arc<StateCell>,
    bus: Arc<EventBus>,
    /// Whether readiness signals are processed
    ready_attached: bool,
    /// Whether inbound state changes are processed
    sync_attached: bool,
    finished: bool,
}

impl JobStreamer {
    /// Create a streamer over `source`, starting from the cell's current state
    pub fn new(source: Box<dyn JobSource>, cell: Arc<StateCell>, bus: Arc<EventBus>) -> Self {
        let total_bytes = source.total_bytes();
        tracing::info!("Streaming {} ({} bytes)", source.describe(), total_bytes);
        bus.publish(AppEvent::Job(JobEvent::Started { total_bytes }))
            .ok();

        Self {
            source,
            progress: JobProgress::new(total_bytes),
            state: cell.snapshot(),
            cell,
            bus,
            ready_attached: true,
            sync_attached: true,
            finished: false,
        }
    }

    /// Open `path` and create a streamer over it.
    ///
    /// No streamer exists if the file cannot be opened.
    pub fn from_path(
        path: impl AsRef<Path>,
        cell: Arc<StateCell>,
        bus: Arc<EventBus>,
    ) -> Result<Self> {
        let source = FileJobSource::open(path)?;
        Ok(Self::new(Box::new(source), cell, bus))
    }

    /// Handle one readiness signal.
    ///
    /// Returns the command to transmit, if any. Holds in `Pause`, ignores
    /// `Error` and unknown states, and finishes the job on `Stop` or when the
    /// source is exhausted, including when it runs out while skipping blank
    /// and comment lines.
    pub fn pump(&mut self) -> Result<Option<CommandLine>> {
        if !self.ready_attached {
            tracing::trace!("Readiness ignored, streamer detached");
            return Ok(None);
        }

        match self.state {
            DeviceState::StartPrint | DeviceState::Idle | DeviceState::Busy => {
                if self.source.is_exhausted()? {
                    self.finish();
                    return Ok(None);
                }

                self.set_state(DeviceState::Busy);
                let Some(command) = self.next_command()? else {
                    // Only blank or comment lines were left
                    self.finish();
                    return Ok(None);
                };
                tracing::debug!("cline: {}", command);
                self.bus
                    .publish(AppEvent::Job(JobEvent::NextCommand {
                        line: command.to_string(),
                    }))
                    .ok();
                Ok(Some(command))
            }
            DeviceState::Error => {
                tracing::debug!("Error state");
                Ok(None)
            }
            DeviceState::Stop => {
                self.finish();
                Ok(None)
            }
            DeviceState::Pause => Ok(None),
            other => {
                tracing::debug!("Unknown state {}", other);
                Ok(None)
            }
        }
    }

    /// Read lines until one survives normalization or the source runs out
    fn next_command(&mut self) -> Result<Option<CommandLine>> {
        loop {
            let Some(raw) = self.source.read_line()? else {
                return Ok(None);
            };
            tracing::trace!("Nextline: {}", raw.text);

            let percent = self.progress.consume(raw.bytes);
            self.publish_progress(percent);

            if let Some(command) = CommandLine::from_raw(&raw.text) {
                return Ok(Some(command));
            }
        }
    }

    /// Run the completion sequence; later calls have no effect
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }

        let percent = self.progress.complete();
        self.publish_progress(percent);
        tracing::debug!("atEnd");

        self.ready_attached = false;
        self.finished = true;
        self.set_state(DeviceState::FinishedPrint);
        self.set_state(DeviceState::Idle);

        tracing::info!("Job finished ({} bytes)", self.progress.consumed_bytes);
        self.bus.publish(AppEvent::Job(JobEvent::Finished)).ok();
    }

    /// Apply a state change that originated in the streamer.
    ///
    /// Detaches inbound synchronisation, updates the mirror and the shared
    /// cell, then reattaches (unless the job has finished). `&mut self` rules
    /// out re-entry during the call; echoes delivered afterwards carry
    /// [`TransitionOrigin::Streamer`] and are dropped by
    /// [`on_external_state_change`](Self::on_external_state_change).
    fn set_state(&mut self, new_state: DeviceState) {
        if !self.state.can_transition_to(new_state) {
            tracing::debug!("Serial not connected, ignoring {}", new_state);
            return;
        }
        if new_state == self.state {
            return;
        }

        tracing::debug!("State Changed from [{}] to [{}]", self.state, new_state);
        self.sync_attached = false;
        self.state = new_state;
        if let Err(e) = self
            .cell
            .request_transition(new_state, TransitionOrigin::Streamer)
        {
            tracing::warn!("Streamer transition refused: {}", e);
        }
        self.sync_attached = !self.finished;
    }

    /// Mirror a state change published by the controller.
    ///
    /// Ignored while detached and for changes the streamer made itself.
    pub fn on_external_state_change(&mut self, new_state: DeviceState, origin: TransitionOrigin) {
        if !self.sync_attached {
            tracing::trace!("State change to {} ignored, sync detached", new_state);
            return;
        }
        if origin == TransitionOrigin::Streamer {
            return;
        }
        self.set_state(new_state);
    }

    /// Current progress snapshot
    pub fn progress(&self) -> JobProgress {
        self.progress
    }

    /// Mirrored device state
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Whether the completion sequence has run
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn publish_progress(&self, percent: f32) {
        tracing::trace!("progress: {}", percent);
        self.bus
            .publish(AppEvent::Job(JobEvent::ProgressChanged { percent }))
            .ok();
    }
}

impl std::fmt::Debug for JobStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStreamer")
            .field("source", &self.source.describe())
            .field("progress", &self.progress)
            .field("state", &self.state)
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::job_source::TextJobSource;
    use fabstream_core::{DeviceEvent, EventFilter, ThreadSafeVec};

    fn setup(
        text: &str,
        state: DeviceState,
    ) -> (JobStreamer, Arc<StateCell>, ThreadSafeVec<AppEvent>) {
        let bus = Arc::new(EventBus::new());
        let events = fabstream_core::thread_safe_vec();
        let sink = Arc::clone(&events);
        bus.subscribe(EventFilter::All, move |event| sink.lock().push(event));
        let cell = Arc::new(StateCell::new(state, Arc::clone(&bus)));
        let streamer = JobStreamer::new(
            Box::new(TextJobSource::from_text(text)),
            Arc::clone(&cell),
            bus,
        );
        (streamer, cell, events)
    }

    fn finished_count(events: &ThreadSafeVec<AppEvent>) -> usize {
        events
            .lock()
            .iter()
            .filter(|e| matches!(e, AppEvent::Job(JobEvent::Finished)))
            .count()
    }

    #[test]
    fn test_blank_and_comment_lines_skipped() {
        let (mut streamer, cell, _) =
            setup("G1 X10 ; move\n\nG1 Y10\n", DeviceState::StartPrint);

        assert_eq!(streamer.pump().unwrap().unwrap().as_str(), "G1 X10");
        assert_eq!(cell.snapshot(), DeviceState::Busy);
        assert_eq!(streamer.pump().unwrap().unwrap().as_str(), "G1 Y10");
        assert_eq!(streamer.progress().current_percent, 100.0);
        assert!(!streamer.is_finished());
    }

    #[test]
    fn test_pause_holds() {
        let (mut streamer, _, _) = setup("G28\n", DeviceState::Pause);
        assert!(streamer.pump().unwrap().is_none());
        assert_eq!(streamer.progress().consumed_bytes, 0);
    }

    #[test]
    fn test_error_is_noop() {
        let (mut streamer, _, _) = setup("G28\n", DeviceState::Error);
        assert!(streamer.pump().unwrap().is_none());
        assert!(!streamer.is_finished());
    }

    #[test]
    fn test_stop_finishes() {
        let (mut streamer, cell, events) = setup("G28\nG1 X1\n", DeviceState::Stop);
        assert!(streamer.pump().unwrap().is_none());
        assert!(streamer.is_finished());
        assert_eq!(cell.snapshot(), DeviceState::Idle);
        assert_eq!(finished_count(&events), 1);
    }

    #[test]
    fn test_completion_sequence_once() {
        let (mut streamer, cell, events) = setup("G28\n", DeviceState::Busy);
        assert!(streamer.pump().unwrap().is_some());
        assert!(streamer.pump().unwrap().is_none());
        assert!(streamer.is_finished());

        streamer.finish();
        assert!(streamer.pump().unwrap().is_none());
        assert_eq!(finished_count(&events), 1);
        assert_eq!(cell.snapshot(), DeviceState::Idle);

        let transitions: Vec<DeviceState> = events
            .lock()
            .iter()
            .filter_map(|e| match e {
                AppEvent::Device(DeviceEvent::StateChanged { to, .. }) => Some(*to),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![DeviceState::FinishedPrint, DeviceState::Idle]
        );
    }

    #[test]
    fn test_external_change_mirrored() {
        let (mut streamer, cell, _) = setup("G28\nG1 X1\n", DeviceState::Busy);
        cell.request_transition(DeviceState::Pause, TransitionOrigin::Controller)
            .unwrap();
        streamer.on_external_state_change(DeviceState::Pause, TransitionOrigin::Controller);
        assert_eq!(streamer.state(), DeviceState::Pause);
        assert!(streamer.pump().unwrap().is_none());
    }

    #[test]
    fn test_own_echo_ignored() {
        let (mut streamer, _, _) = setup("G28\n", DeviceState::Busy);
        streamer.on_external_state_change(DeviceState::Idle, TransitionOrigin::Streamer);
        assert_eq!(streamer.state(), DeviceState::Busy);
    }

    #[test]
    fn test_pause_refused_while_disconnected() {
        let (mut streamer, cell, _) = setup("G28\n", DeviceState::Disconnected);
        streamer.on_external_state_change(DeviceState::Pause, TransitionOrigin::Controller);
        assert_eq!(streamer.state(), DeviceState::Disconnected);
        assert_eq!(cell.snapshot(), DeviceState::Disconnected);
        assert!(streamer.pump().unwrap().is_none());
    }

    #[test]
    fn test_sync_detached_after_finish() {
        let (mut streamer, _, _) = setup("", DeviceState::Idle);
        streamer.pump().unwrap();
        assert!(streamer.is_finished());
        streamer.on_external_state_change(DeviceState::Busy, TransitionOrigin::Controller);
        assert_eq!(streamer.state(), DeviceState::Idle);
    }
}
