//! Leveled console logging.
//!
//! [`ConsoleLogger`] prepends a configurable prefix and hands records to a
//! [`LogSink`]. The default sink forwards to `tracing`; [`MemorySink`] keeps
//! records for inspection.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::failure::Failure;

/// Console log levels, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Severe,
    Warning,
    Info,
    Config,
    Fine,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Severe => "SEVERE",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Config => "CONFIG",
            LogLevel::Fine => "FINE",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    /// Message with the prefix already applied
    pub message: String,
    /// One-line rendering of an attached failure
    pub failure: Option<String>,
}

/// Destination for console records.
pub trait LogSink: Send + Sync {
    fn emit(&self, record: &LogRecord);
}

/// Forwards records to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        let message = record.message.as_str();
        match (record.level, record.failure.as_deref()) {
            (LogLevel::Severe, Some(failure)) => tracing::error!(failure, "{}", message),
            (LogLevel::Severe, None) => tracing::error!("{}", message),
            (LogLevel::Warning, Some(failure)) => tracing::warn!(failure, "{}", message),
            (LogLevel::Warning, None) => tracing::warn!("{}", message),
            (LogLevel::Info, Some(failure)) => tracing::info!(failure, "{}", message),
            (LogLevel::Info, None) => tracing::info!("{}", message),
            (LogLevel::Config, Some(failure)) => tracing::debug!(failure, "{}", message),
            (LogLevel::Config, None) => tracing::debug!("{}", message),
            (LogLevel::Fine, Some(failure)) => tracing::trace!(failure, "{}", message),
            (LogLevel::Fine, None) => tracing::trace!("{}", message),
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records at exactly `level`.
    pub fn at_level(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.records.lock().iter().any(|r| r.message.contains(needle))
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) {
        self.records.lock().push(record.clone());
    }
}

/// Prefixing console logger shared by every component.
pub struct ConsoleLogger {
    prefix: RwLock<String>,
    sink: Arc<dyn LogSink>,
}

impl ConsoleLogger {
    pub fn new(prefix: impl Into<String>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            prefix: RwLock::new(prefix.into()),
            sink,
        }
    }

    /// Logger that forwards to `tracing`.
    pub fn tracing(prefix: impl Into<String>) -> Self {
        Self::new(prefix, Arc::new(TracingSink))
    }

    pub fn prefix(&self) -> String {
        self.prefix.read().clone()
    }

    pub fn set_prefix(&self, prefix: impl Into<String>) {
        *self.prefix.write() = prefix.into();
    }

    /// Log each message as its own record.
    pub fn log<S: AsRef<str>>(&self, level: LogLevel, messages: &[S]) {
        let prefix = self.prefix();
        self.emit_all(level, Some(&prefix), None, messages);
    }

    /// Log each message with the failure attached.
    pub fn log_failure<S: AsRef<str>>(&self, level: LogLevel, failure: &Failure, messages: &[S]) {
        let prefix = self.prefix();
        let rendered = failure.to_string();
        self.emit_all(level, Some(&prefix), Some(&rendered), messages);
    }

    /// Log without the prefix.
    pub fn log_no_prefix<S: AsRef<str>>(&self, level: LogLevel, messages: &[S]) {
        self.emit_all(level, None, None, messages);
    }

    /// Raw console line, as used for stack traces.
    pub fn print(&self, line: &str) {
        self.sink.emit(&LogRecord {
            level: LogLevel::Severe,
            message: line.to_string(),
            failure: None,
        });
    }

    fn emit_all<S: AsRef<str>>(
        &self,
        level: LogLevel,
        prefix: Option<&str>,
        failure: Option<&str>,
        messages: &[S],
    ) {
        for message in messages {
            let message = match prefix {
                Some(prefix) => format!("{}{}", prefix, message.as_ref()),
                None => message.as_ref().to_string(),
            };
            self.sink.emit(&LogRecord {
                level,
                message,
                failure: failure.map(str::to_string),
            });
        }
    }
}

impl std::fmt::Debug for ConsoleLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleLogger")
            .field("prefix", &*self.prefix.read())
            .finish_non_exhaustive()
    }
}

/// Environment variable that switches the subscriber to JSON output.
pub const LOG_JSON_ENV: &str = "MODHOST_LOG_JSON";

/// Install the process-wide `tracing` subscriber.
///
/// Honors `RUST_LOG`; falls back to `modhost=info`. Returns `false` if a
/// subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("modhost=info")
            .add_directive(tracing::Level::WARN.into())
    });

    let json_logging = std::env::var(LOG_JSON_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .try_init()
            .is_ok()
    }
}
