//! Job sources
//!
//! A job source produces the raw lines of one fabrication program and reports
//! how many bytes each line took, so progress reflects what was read rather
//! than what was sent.

use fabstream_core::{Error, JobError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;

/// One raw line read from a job source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Line text without its terminator
    pub text: String,
    /// Bytes consumed from the source, terminator included
    pub bytes: u64,
}

/// Line-by-line access to a job program
pub trait JobSource: Send {
    /// Size of the program when it was opened
    fn total_bytes(&self) -> u64;

    /// Read the next raw line, or `None` once the source is exhausted
    fn read_line(&mut self) -> Result<Option<RawLine>>;

    /// Check whether another line is available
    fn is_exhausted(&mut self) -> Result<bool>;

    /// Short description for logs
    fn describe(&self) -> String {
        "job source".to_string()
    }
}

/// A job source over any buffered reader
#[derive(Debug)]
pub struct ReaderJobSource<R> {
    reader: R,
    total_bytes: u64,
    name: String,
    buffer: Vec<u8>,
}

/// Job source backed by a file on disk
pub type FileJobSource = ReaderJobSource<BufReader<File>>;

/// Job source backed by in-memory text
pub type TextJobSource = ReaderJobSource<Cursor<Vec<u8>>>;

impl<R: BufRead> ReaderJobSource<R> {
    /// Wrap a reader whose remaining size is `total_bytes`
    pub fn new(reader: R, total_bytes: u64, name: impl Into<String>) -> Self {
        Self {
            reader,
            total_bytes,
            name: name.into(),
            buffer: Vec::new(),
        }
    }
}

impl FileJobSource {
    /// Open a G-code file.
    ///
    /// Fails with [`JobError::UnopenableSource`] when the file cannot be opened
    /// or its size cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let unopenable = |e: std::io::Error| JobError::UnopenableSource {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let file = File::open(path).map_err(unopenable)?;
        let total_bytes = file.metadata().map_err(unopenable)?.len();
        tracing::debug!("Opened {} ({} bytes)", path.display(), total_bytes);

        Ok(Self::new(
            BufReader::new(file),
            total_bytes,
            path.display().to_string(),
        ))
    }
}

impl TextJobSource {
    /// Create a source over in-memory program text
    pub fn from_text(text: impl Into<String>) -> Self {
        let bytes = text.into().into_bytes();
        let total = bytes.len() as u64;
        Self::new(Cursor::new(bytes), total, "<memory>")
    }
}

impl<R: BufRead + Send> JobSource for ReaderJobSource<R> {
    fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn read_line(&mut self) -> Result<Option<RawLine>> {
        self.buffer.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buffer)
            .map_err(read_failed)?;
        if read == 0 {
            return Ok(None);
        }

        let mut text = String::from_utf8_lossy(&self.buffer).into_owned();
        if text.ends_with('\n') {
            text.pop();
            if text.ends_with('\r') {
                text.pop();
            }
        }

        Ok(Some(RawLine {
            text,
            bytes: read as u64,
        }))
    }

    fn is_exhausted(&mut self) -> Result<bool> {
        Ok(self.reader.fill_buf().map_err(read_failed)?.is_empty())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

fn read_failed(e: std::io::Error) -> Error {
    JobError::ReadFailed {
        reason: e.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_lines_with_byte_counts() {
        let mut source = TextJobSource::from_text("G28\r\nG1 X1\nM84");
        assert_eq!(source.total_bytes(), 14);

        let first = source.read_line().unwrap().unwrap();
        assert_eq!(first.text, "G28");
        assert_eq!(first.bytes, 5);

        let second = source.read_line().unwrap().unwrap();
        assert_eq!(second.text, "G1 X1");
        assert_eq!(second.bytes, 6);

        assert!(!source.is_exhausted().unwrap());
        let last = source.read_line().unwrap().unwrap();
        assert_eq!(last.text, "M84");
        assert_eq!(last.bytes, 3);

        assert!(source.is_exhausted().unwrap());
        assert!(source.read_line().unwrap().is_none());
    }

    #[test]
    fn test_empty_source() {
        let mut source = TextJobSource::from_text("");
        assert!(source.is_exhausted().unwrap());
        assert_eq!(source.total_bytes(), 0);
    }

    #[test]
    fn test_open_missing_file() {
        let err = FileJobSource::open("/definitely/not/here.gcode").unwrap_err();
        assert!(matches!(err, Error::Job(JobError::UnopenableSource { .. })));
    }
}
