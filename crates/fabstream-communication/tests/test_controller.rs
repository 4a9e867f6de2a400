use fabstream_communication::{
    CommandSink, ControllerInput, Firmware, FirmwareKind, JobSource, PrintController,
    PrintControllerConfig, RawLine, RecordingSink, RunExit, TextJobSource,
};
use fabstream_core::{
    AppEvent, DeviceState, EventCategory, EventFilter, JobError, JobEvent, TelemetryEvent,
    TelemetrySample,
};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

fn connected_controller() -> PrintController {
    let mut controller = PrintController::new(
        Firmware::new(FirmwareKind::Repetier),
        PrintControllerConfig::default(),
    );
    controller.connect().unwrap();
    controller
}

/// Sink that acknowledges every command like a device would
struct AckingSink {
    inner: RecordingSink,
    tx: mpsc::Sender<ControllerInput>,
}

impl CommandSink for AckingSink {
    fn send(&mut self, data: &[u8]) -> fabstream_core::Result<usize> {
        let written = self.inner.send(data)?;
        self.tx
            .try_send(ControllerInput::DeviceLine("ok".to_string()))
            .map_err(|e| fabstream_core::Error::other(e.to_string()))?;
        Ok(written)
    }
}

#[test]
fn test_device_lines_drive_stream() {
    let mut controller = connected_controller();
    let first = controller
        .start_job(Box::new(TextJobSource::from_text("G28\nM105\n")))
        .unwrap();
    assert_eq!(first.unwrap().as_str(), "G28");

    let next = controller
        .handle(ControllerInput::DeviceLine("ok".to_string()))
        .unwrap();
    assert_eq!(next.unwrap().as_str(), "M105");

    // Telemetry never doubles as readiness
    let none = controller
        .handle(ControllerInput::DeviceLine(
            "ok T:185.4 /185.0 B:60.5 /60.0".to_string(),
        ))
        .unwrap();
    assert!(none.is_none());
    assert!(controller.is_streaming());
    assert_eq!(
        controller.telemetry(),
        Some(TelemetrySample::new(185.4, 185.0, 60.5, 60.0))
    );

    controller
        .handle(ControllerInput::DeviceLine("wait".to_string()))
        .unwrap();
    assert!(!controller.is_streaming());
    assert_eq!(controller.state(), DeviceState::Idle);
}

#[test]
fn test_telemetry_event_published() {
    let mut controller = connected_controller();
    let samples = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&samples);
    controller.bus().subscribe(
        EventFilter::Categories(vec![EventCategory::Telemetry]),
        move |event| {
            if let AppEvent::Telemetry(TelemetryEvent::Updated(sample)) = event {
                recorder.lock().unwrap().push(sample);
            }
        },
    );

    controller
        .handle(ControllerInput::DeviceLine(
            "T:200.0 /210.0 B:55.0 /60.0".to_string(),
        ))
        .unwrap();
    assert_eq!(
        samples.lock().unwrap().as_slice(),
        &[TelemetrySample::new(200.0, 210.0, 55.0, 60.0)]
    );
}

#[test]
fn test_pause_queued_before_ready_takes_effect_first() {
    let mut controller = connected_controller();
    controller
        .start_job(Box::new(TextJobSource::from_text("G28\nG1 X1\n")))
        .unwrap();

    let inputs = vec![
        ControllerInput::ExternalStateChange(DeviceState::Pause),
        ControllerInput::DeviceReady,
    ];
    let sent: Vec<_> = inputs
        .into_iter()
        .filter_map(|input| controller.handle(input).unwrap())
        .collect();

    assert!(sent.is_empty());
    assert_eq!(controller.state(), DeviceState::Pause);
    assert_eq!(controller.progress().unwrap().consumed_bytes, 4);
}

#[test]
fn test_wait_while_paused_holds_stream() {
    let mut controller = connected_controller();
    controller
        .start_job(Box::new(TextJobSource::from_text("G28\nG1 X1\n")))
        .unwrap();
    controller
        .handle(ControllerInput::ExternalStateChange(DeviceState::Pause))
        .unwrap();

    let held = controller
        .handle(ControllerInput::DeviceLine("wait".to_string()))
        .unwrap();
    assert!(held.is_none());
    assert_eq!(controller.state(), DeviceState::Pause);
    assert_eq!(controller.progress().unwrap().consumed_bytes, 4);

    controller
        .handle(ControllerInput::ExternalStateChange(DeviceState::Busy))
        .unwrap();
    let resumed = controller
        .handle(ControllerInput::DeviceLine("wait".to_string()))
        .unwrap();
    assert_eq!(resumed.unwrap().as_str(), "G1 X1");
}

#[test]
fn test_stop_finishes_on_next_ready() {
    let mut controller = connected_controller();
    controller
        .start_job(Box::new(TextJobSource::from_text("G28\nG1 X1\nG1 X2\n")))
        .unwrap();

    controller
        .handle(ControllerInput::ExternalStateChange(DeviceState::Stop))
        .unwrap();
    assert!(controller.is_streaming());

    assert!(controller
        .handle(ControllerInput::DeviceReady)
        .unwrap()
        .is_none());
    assert!(!controller.is_streaming());
    assert_eq!(controller.state(), DeviceState::Idle);
}

#[tokio::test]
async fn test_run_streams_whole_job() {
    let mut controller = connected_controller();
    let finished = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&finished);
    controller
        .bus()
        .subscribe(EventFilter::Categories(vec![EventCategory::Job]), move |e| {
            if e == AppEvent::Job(JobEvent::Finished) {
                *counter.lock().unwrap() += 1;
            }
        });

    let (tx, rx) = mpsc::channel(16);
    let recording = RecordingSink::new();
    let mut sink = AckingSink {
        inner: recording.clone(),
        tx: tx.clone(),
    };

    let program = "; test program\nG28\n\nG1 X10 Y10 ; diagonal\nM84\n; end\n\n";
    if let Some(first) = controller
        .start_job(Box::new(TextJobSource::from_text(program)))
        .unwrap()
    {
        controller.transmit(&first, &mut sink).unwrap();
    }
    drop(tx);

    let exit = controller.run(rx, &mut sink).await.unwrap();
    assert_eq!(exit, RunExit::JobFinished);
    assert_eq!(
        recording.sent(),
        vec![
            "G28".to_string(),
            "G1 X10 Y10".to_string(),
            "M84".to_string()
        ]
    );
    assert_eq!(*finished.lock().unwrap(), 1);
    assert_eq!(controller.state(), DeviceState::Idle);
}

#[tokio::test]
async fn test_run_returns_when_channel_closes() {
    let mut controller = connected_controller();
    let (tx, rx) = mpsc::channel(4);
    tx.send(ControllerInput::DeviceLine("start".to_string()))
        .await
        .unwrap();
    drop(tx);

    let mut sink = RecordingSink::new();
    let exit = controller.run(rx, &mut sink).await.unwrap();
    assert_eq!(exit, RunExit::ChannelClosed);
    assert!(sink.sent().is_empty());
}

/// Source whose reads always fail
struct BrokenSource;

impl JobSource for BrokenSource {
    fn total_bytes(&self) -> u64 {
        10
    }

    fn read_line(&mut self) -> fabstream_core::Result<Option<RawLine>> {
        Err(JobError::ReadFailed {
            reason: "device unplugged".to_string(),
        }
        .into())
    }

    fn is_exhausted(&mut self) -> fabstream_core::Result<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn test_read_failure_halts_stream() {
    let mut controller = PrintController::new(
        Firmware::default(),
        PrintControllerConfig {
            pump_on_start: false,
            ..Default::default()
        },
    );
    controller.connect().unwrap();
    controller.start_job(Box::new(BrokenSource)).unwrap();

    let (tx, rx) = mpsc::channel(4);
    tx.send(ControllerInput::DeviceReady).await.unwrap();
    // Keep the sender alive: the loop must stop on its own
    let _tx = tx;

    let mut sink = RecordingSink::new();
    let exit = controller.run(rx, &mut sink).await.unwrap();
    assert_eq!(exit, RunExit::StreamHalted);
    assert_eq!(controller.state(), DeviceState::Error);
    assert!(sink.sent().is_empty());
}
