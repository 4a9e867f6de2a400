//! Streaming layer
//!
//! Job sources, the flow-controlled streamer, the controller that owns the
//! device state and event queue, and the sink seam towards the transport.

pub mod controller;
pub mod job_source;
pub mod sink;
pub mod streamer;

pub use controller::{ControllerInput, PrintController, PrintControllerConfig, RunExit};
pub use job_source::{FileJobSource, JobSource, RawLine, ReaderJobSource, TextJobSource};
pub use sink::{CommandSink, RecordingSink};
pub use streamer::JobStreamer;
