use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use super::LogRecord;

/// Anything that wants to see log records: the log file, the live log pane,
/// a test probe.
pub trait LogSink: Send + Sync {
    fn log(&self, record: &LogRecord);
}

impl<F> LogSink for F
where
    F: Fn(&LogRecord) + Send + Sync,
{
    fn log(&self, record: &LogRecord) {
        self(record);
    }
}

/// Append-only log file, one formatted record per line.
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl LogSink for FileSink {
    fn log(&self, record: &LogRecord) {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        // A failed log write must not take the operation down with it.
        let _ = writeln!(file, "{record}");
    }
}

/// Keeps the most recent lines in memory for live display.
pub struct MemorySink {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: Mutex::new(VecDeque::new()),
        }
    }

    /// Starts with the tail of an earlier log file; a missing file gives an
    /// empty pane.
    pub fn with_history(capacity: usize, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let sink = Self::new(capacity);
        match std::fs::read_to_string(path) {
            Ok(text) => text.lines().for_each(|line| sink.push(line.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok(sink)
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.iter().cloned().collect()
    }

    fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }
}

impl LogSink for MemorySink {
    fn log(&self, record: &LogRecord) {
        self.push(record.to_string());
    }
}

/// Mirrors records to stderr (`--verbose`).
pub struct StderrSink;

impl LogSink for StderrSink {
    fn log(&self, record: &LogRecord) {
        eprintln!("{record}");
    }
}
