//! Application log as an event sink.
//!
//! Code logs through `tracing`. [`EventLogLayer`] forwards each event to an
//! [`EventLog`], which fans the formatted record out to its subscribers: the
//! append-only log file, the live in-memory pane and anything else that
//! registered a [`LogSink`].

pub mod layer;
pub mod sink;

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{Local, NaiveDateTime};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogSettings;
use crate::core::LibraryError;

pub use layer::EventLogLayer;
pub use sink::{FileSink, LogSink, MemorySink, StderrSink};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Self::Error,
            tracing::Level::WARN => Self::Warning,
            tracing::Level::INFO => Self::Info,
            _ => Self::Debug,
        }
    }
}

/// One log line: `YYYY-MM-DD HH:MM:SS - LEVEL - message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: NaiveDateTime,
    pub level: LogLevel,
    pub message: String,
}

impl std::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {} - {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level,
            self.message
        )
    }
}

/// Fan-out point for log records. Cheap to clone; clones share subscribers.
#[derive(Clone, Default)]
pub struct EventLog {
    sinks: Arc<RwLock<Vec<Arc<dyn LogSink>>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, sink: Arc<dyn LogSink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let record = LogRecord {
            timestamp: Local::now().naive_local(),
            level,
            message: message.into(),
        };
        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);
        for sink in sinks.iter() {
            sink.log(&record);
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }
}

/// Install the global `tracing` subscriber and return the event log behind it.
///
/// The log file from `settings` is subscribed immediately; callers add their
/// own sinks (live pane, stderr) to the returned handle.
pub fn init(settings: &LogSettings) -> Result<EventLog, LibraryError> {
    let log = EventLog::new();
    if let Some(path) = &settings.file {
        log.subscribe(Arc::new(FileSink::open(path)?));
    }

    let filter = EnvFilter::try_new(&settings.level)
        .map_err(|e| LibraryError::InvalidInput(format!("log level '{}': {e}", settings.level)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(EventLogLayer::new(log.clone()))
        .try_init()
        .map_err(|e| LibraryError::InvalidInput(format!("logging already initialised: {e}")))?;

    Ok(log)
}
