//! Diagnostic reports for unexpected failures.
//!
//! The writer turns a [`Failure`] into a [`FailureRecord`], echoes a short
//! summary to the console and appends the rendered record to a
//! [`ReportSink`]. Appends are serialized so records never interleave, and
//! a failing sink is logged rather than raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::classify::{classify_failure, FailureClass};
use crate::config::{ModhostConfig, TraceConfig};
use crate::environment::{Environment, EnvironmentSnapshot};
use crate::failure::{Failure, Frame};
use crate::logging::{ConsoleLogger, LogLevel};
use crate::sink::ReportSink;

/// Width of the delimiter line framing each record.
pub const DELIMITER_WIDTH: usize = 100;

/// Shown when a failure in the chain has no message.
pub const UNKNOWN_CAUSE: &str = "(Unknown cause)";

/// Context line attached to failures caught while executing a command.
pub fn command_context(label: &str) -> String {
    format!("An error occurred while executing command: {}", label)
}

fn delimiter() -> String {
    "-".repeat(DELIMITER_WIDTH)
}

/// Drops noisy frames from a call stack.
#[derive(Debug, Clone)]
pub struct TraceFilter {
    host_namespace: String,
    runtime_namespaces: Vec<String>,
    reflection_namespaces: Vec<String>,
    context_frames: usize,
}

impl TraceFilter {
    pub fn new(config: &TraceConfig) -> Self {
        Self {
            host_namespace: config.host_namespace.clone(),
            runtime_namespaces: config.runtime_namespaces.clone(),
            reflection_namespaces: config.reflection_namespaces.clone(),
            context_frames: config.context_frames,
        }
    }

    pub fn is_host_internal(&self, frame: &Frame) -> bool {
        let symbol = frame.symbol.as_str();
        (!self.host_namespace.is_empty() && symbol.starts_with(&self.host_namespace))
            || self
                .runtime_namespaces
                .iter()
                .any(|ns| !ns.is_empty() && symbol.starts_with(ns.as_str()))
    }

    pub fn is_reflection(&self, frame: &Frame) -> bool {
        self.reflection_namespaces
            .iter()
            .any(|ns| frame.symbol.contains(ns.as_str()))
    }

    /// Frames worth printing. Host-internal frames end the trace once more
    /// than `context_frames` frames have been walked; reflection frames are
    /// skipped everywhere but still count as walked.
    pub fn filter<'a>(&self, frames: &'a [Frame]) -> Vec<&'a Frame> {
        let mut kept = Vec::new();
        for (walked, frame) in frames.iter().enumerate() {
            if walked > self.context_frames && self.is_host_internal(frame) {
                break;
            }
            if !self.is_reflection(frame) {
                kept.push(frame);
            }
        }
        kept
    }
}

/// Title line and filtered frames of one failure in a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CauseBlock {
    pub title: String,
    pub frames: Vec<String>,
}

/// Everything a report contains, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// `<Module> <Version> encountered <Type>`
    pub header: String,
    pub system_line: String,
    pub modules_line: String,
    pub context: Vec<String>,
    /// The failure itself first, then each cause down to the root
    pub causes: Vec<CauseBlock>,
}

impl FailureRecord {
    pub fn render(&self) -> String {
        let delimiter = delimiter();
        let mut lines = vec![
            delimiter.clone(),
            self.header.clone(),
            self.system_line.clone(),
            format!("Modules: {}", self.modules_line),
            delimiter.clone(),
        ];

        if !self.context.concat().is_empty() {
            lines.push(String::new());
            lines.push("More Information:".to_string());
            lines.extend(self.context.iter().cloned());
        }

        for block in &self.causes {
            lines.push(block.title.clone());
            lines.extend(block.frames.iter().map(|frame| format!("\tat {}", frame)));
        }

        lines.push(delimiter);
        let mut text = lines.join("\n");
        text.push_str("\n\n");
        text
    }
}

/// Writes diagnostic reports and console traces.
pub struct DiagnosticWriter {
    environment: Arc<dyn Environment>,
    sink: Arc<dyn ReportSink>,
    console: Arc<ConsoleLogger>,
    filter: TraceFilter,
    auto_report: AtomicBool,
    write_lock: Mutex<()>,
}

impl DiagnosticWriter {
    pub fn new(
        config: &ModhostConfig,
        environment: Arc<dyn Environment>,
        sink: Arc<dyn ReportSink>,
        console: Arc<ConsoleLogger>,
    ) -> Self {
        Self {
            environment,
            sink,
            console,
            filter: TraceFilter::new(&config.trace),
            auto_report: AtomicBool::new(config.auto_report),
            write_lock: Mutex::new(()),
        }
    }

    pub fn auto_report(&self) -> bool {
        self.auto_report.load(Ordering::Acquire)
    }

    pub fn set_auto_report(&self, enabled: bool) {
        self.auto_report.store(enabled, Ordering::Release);
    }

    pub fn filter(&self) -> &TraceFilter {
        &self.filter
    }

    pub fn console(&self) -> &Arc<ConsoleLogger> {
        &self.console
    }

    /// Assemble the record for `failure` without writing it.
    pub fn build_record<S: AsRef<str>>(&self, failure: &Failure, context: &[S]) -> FailureRecord {
        self.build_record_with(&self.environment.snapshot(), failure, context)
    }

    fn build_record_with<S: AsRef<str>>(
        &self,
        snapshot: &EnvironmentSnapshot,
        failure: &Failure,
        context: &[S],
    ) -> FailureRecord {
        let causes = std::iter::once(failure)
            .chain(failure.causes())
            .map(|f| CauseBlock {
                title: format!(
                    "{} {}",
                    f.type_name(),
                    f.message().unwrap_or_else(|| UNKNOWN_CAUSE.to_string())
                ),
                frames: self.filtered_lines(f),
            })
            .collect();

        FailureRecord {
            header: format!(
                "{} {} encountered {}",
                snapshot.module.name,
                snapshot.module.version,
                failure.type_name()
            ),
            system_line: snapshot.system_line(),
            modules_line: snapshot.modules_line(),
            context: context.iter().map(|c| c.as_ref().to_string()).collect(),
            causes,
        }
    }

    /// Filtered frames of a single failure, rendered.
    pub fn filtered_lines(&self, failure: &Failure) -> Vec<String> {
        self.filter
            .filter(failure.frames())
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Persist a report for `failure` and echo a summary to the console.
    pub fn report<S: AsRef<str>>(&self, failure: &Failure, context: &[S]) {
        failure.mark_reported();
        self.write_report(failure, context);
    }

    fn write_report<S: AsRef<str>>(&self, failure: &Failure, context: &[S]) {
        let snapshot = self.environment.snapshot();
        let record = self.build_record_with(&snapshot, failure, context);

        self.console.log(
            LogLevel::Severe,
            &[format!(
                "{}! Please check {} and include it when filing an issue. {}",
                record.header,
                self.sink.location(),
                record.system_line
            )],
        );

        let rendered = record.render();
        let result = {
            let _guard = self.write_lock.lock();
            self.sink.append(&rendered)
        };

        if let Err(err) = result {
            let secondary = Failure::from_error(&err);
            self.console.log_failure(
                LogLevel::Severe,
                &secondary,
                &["Got error when saving error! Saving error:"],
            );
            self.console
                .log_failure(LogLevel::Severe, failure, &["Original error that is not saved:"]);
        }
    }

    /// Raise-time step for self-reporting failures: writes the report once,
    /// if auto-reporting is on. Other failures pass through untouched.
    pub fn raise(&self, failure: Failure) -> Failure {
        self.report_if_unreported(&failure);
        failure
    }

    fn report_if_unreported(&self, failure: &Failure) {
        if !failure.is_self_reporting() || !self.auto_report() || !failure.mark_reported() {
            return;
        }

        match failure.cause() {
            Some(cause) => {
                let context: Vec<&str> = failure
                    .raw_message()
                    .filter(|m| *m != cause.to_string())
                    .into_iter()
                    .collect();
                self.write_report(cause, &context);
            }
            None => {
                let context: Vec<&str> = failure.raw_message().into_iter().collect();
                self.write_report(failure, &context);
            }
        }
    }

    /// Handle an internal failure caught at a boundary.
    ///
    /// Plain failures are reported here; self-reporting ones only if they
    /// were not reported when raised. The filtered trace is printed either way.
    pub fn error<S: AsRef<str>>(&self, failure: &Failure, context: &[S]) {
        match classify_failure(failure) {
            FailureClass::SelfReporting => self.report_if_unreported(failure),
            FailureClass::Unexpected | FailureClass::UserFacing => {
                if failure.mark_reported() {
                    self.write_report(failure, context);
                }
            }
        }

        self.print_filtered_trace(failure);
        self.console.log(LogLevel::Severe, context);
    }

    /// Console-only trace of the outermost failure and its root cause.
    pub fn print_filtered_trace(&self, failure: &Failure) {
        let root = failure.root_cause();

        if failure.is_self_reporting() && root.is_some() {
            self.console.print(&failure.message().unwrap_or_default());
        } else {
            self.console.print(&failure.to_string());
            self.print_frames(failure);
        }

        if let Some(root) = root {
            self.console.print(&root.to_string());
            self.print_frames(root);
        }
    }

    fn print_frames(&self, failure: &Failure) {
        for line in self.filtered_lines(failure) {
            self.console.print(&format!("\tat {}", line));
        }
    }

    /// Fire-and-forget report. Runs on the blocking pool when called inside a
    /// tokio runtime, inline otherwise.
    pub fn spawn_report(
        self: &Arc<Self>,
        failure: Failure,
        context: Vec<String>,
    ) -> Option<tokio::task::JoinHandle<()>> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let writer = Arc::clone(self);
                Some(handle.spawn_blocking(move || writer.report(&failure, &context)))
            }
            Err(_) => {
                self.report(&failure, &context);
                None
            }
        }
    }
}

impl std::fmt::Debug for DiagnosticWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticWriter")
            .field("sink", &self.sink.location())
            .field("filter", &self.filter)
            .field("auto_report", &self.auto_report())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(symbols: &[&str]) -> Vec<Frame> {
        symbols.iter().map(|s| Frame::new(*s)).collect()
    }

    fn filter() -> TraceFilter {
        TraceFilter::new(&TraceConfig {
            host_namespace: "host::server".to_string(),
            runtime_namespaces: Vec::new(),
            reflection_namespaces: vec!["host::reflect".to_string()],
            context_frames: 6,
        })
    }

    #[test]
    fn test_early_host_frames_kept() {
        let frames = frames(&["module::a", "host::server::tick", "module::b"]);
        let kept = filter().filter(&frames);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_deep_host_frames_truncated() {
        let mut symbols = vec!["module::f"; 7];
        symbols.push("host::server::dispatch");
        symbols.push("module::after");
        let frames = frames(&symbols);

        let kept = filter().filter(&frames);
        assert_eq!(kept.len(), 7);
        assert!(kept.iter().all(|f| f.symbol == "module::f"));
    }

    #[test]
    fn test_reflection_frames_dropped_but_counted() {
        let mut symbols = vec!["host::reflect::invoke"; 7];
        symbols.push("host::server::dispatch");
        let frames = frames(&symbols);

        assert!(filter().filter(&frames).is_empty());
    }

    #[test]
    fn test_spawned_thread_frames_truncated_by_default() {
        let mut symbols = vec!["medic::potion::lookup", "<unknown>"];
        symbols.extend(["medic::heal::apply"; 6]);
        symbols.push("std::thread::Builder::spawn_unchecked_::{{closure}}");
        symbols.push("std::sys::pal::unix::thread::Thread::new::thread_start");
        let frames = frames(&symbols);

        let kept = TraceFilter::new(&TraceConfig::default()).filter(&frames);
        assert_eq!(kept.len(), 7);
        assert_eq!(kept[0].symbol, "medic::potion::lookup");
        assert!(kept.iter().all(|f| f.symbol.starts_with("medic::")));
    }

    #[test]
    fn test_render_layout() {
        let record = FailureRecord {
            header: "Medic 1.0 encountered Boom".to_string(),
            system_line: "Running Forge 4.1 and Rust 1.85".to_string(),
            modules_line: "[Medic v1.0]".to_string(),
            context: vec!["while healing".to_string()],
            causes: vec![CauseBlock {
                title: "Boom (Unknown cause)".to_string(),
                frames: vec!["medic::heal(src/heal.rs:3)".to_string()],
            }],
        };
        let dashes = "-".repeat(100);
        let expected = format!(
            "{d}\nMedic 1.0 encountered Boom\nRunning Forge 4.1 and Rust 1.85\nModules: [Medic v1.0]\n{d}\n\nMore Information:\nwhile healing\nBoom (Unknown cause)\n\tat medic::heal(src/heal.rs:3)\n{d}\n\n",
            d = dashes
        );
        assert_eq!(record.render(), expected);
    }

    #[test]
    fn test_render_without_context() {
        let record = FailureRecord {
            header: "h".to_string(),
            system_line: "s".to_string(),
            modules_line: "[]".to_string(),
            context: vec![String::new()],
            causes: Vec::new(),
        };
        assert!(!record.render().contains("More Information:"));
    }
}
