//! Core types for modhost.
//!
//! Provides:
//! - Failure values with captured call stacks and causal chains
//! - Classification of command failures
//! - Diagnostic report writing and stack-trace filtering
//! - Console logging, sender messaging and environment collaborators
//! - Configuration

pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod failure;
pub mod logging;
pub mod messenger;
pub mod sink;

// Re-exports
pub use classify::{classify, classify_failure, CommandError, FailureClass, UserFacingFailure};

pub use config::{ModhostConfig, TraceConfig};

pub use diagnostics::{command_context, CauseBlock, DiagnosticWriter, FailureRecord, TraceFilter};

pub use environment::{Environment, EnvironmentSnapshot, ModuleDescriptor, StaticEnvironment};

pub use error::{ConfigError, SinkError};

pub use failure::{install_panic_hook, Failure, FailureOrigin, Frame, REPORT_MARKER};

pub use logging::{init_tracing, ConsoleLogger, LogLevel, LogRecord, LogSink, MemorySink, TracingSink};

pub use messenger::{CommandSender, ConsoleSender, MessagePrefixes, Messenger, Severity};

pub use sink::{FileSink, MemoryReportSink, ReportSink};
