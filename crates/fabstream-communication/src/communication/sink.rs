//! Outbound command sinks
//!
//! The physical transport lives outside this crate; the controller only needs
//! somewhere to push encoded, newline-terminated commands.

use fabstream_core::{thread_safe_vec, Result, ThreadSafeVec};

/// Destination for encoded commands
pub trait CommandSink: Send {
    /// Queue `data` for transmission, returning the number of bytes accepted
    fn send(&mut self, data: &[u8]) -> Result<usize>;
}

/// Sink that records every command it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    sent: ThreadSafeVec<String>,
}

impl RecordingSink {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self {
            sent: thread_safe_vec(),
        }
    }

    /// Commands received so far, without line terminators
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Shared handle to the recorded commands
    pub fn handle(&self) -> ThreadSafeVec<String> {
        self.sent.clone()
    }
}

impl CommandSink for RecordingSink {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let line = String::from_utf8_lossy(data);
        self.sent
            .lock()
            .push(line.trim_end_matches(['\r', '\n']).to_string());
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_strips_terminator() {
        let mut sink = RecordingSink::new();
        assert_eq!(sink.send(b"G28\n").unwrap(), 4);
        assert_eq!(sink.sent(), vec!["G28".to_string()]);
    }

    #[test]
    fn test_clones_share_storage() {
        let sink = RecordingSink::new();
        let mut writer = sink.clone();
        writer.send(b"M105\n").unwrap();
        assert_eq!(sink.sent().len(), 1);
    }
}
