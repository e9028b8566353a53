//! Diagnostic writer tests.
//!
//! Covers report persistence, the self-reporting protocol, trace printing
//! and behavior when the sink fails.

use std::sync::Arc;
use std::thread;

use modhost_core::{
    command_context, ConsoleLogger, DiagnosticWriter, Failure, FileSink, Frame, LogLevel,
    MemoryReportSink, MemorySink, ModhostConfig, ModuleDescriptor, ReportSink, StaticEnvironment,
};

/// Helper bundling a writer with in-memory collaborators.
struct Harness {
    writer: Arc<DiagnosticWriter>,
    logs: Arc<MemorySink>,
    reports: Arc<MemoryReportSink>,
}

fn harness_with(config: ModhostConfig, reports: Arc<MemoryReportSink>) -> Harness {
    let logs = Arc::new(MemorySink::new());
    let console = Arc::new(ConsoleLogger::new("[Medic] ", logs.clone()));
    let environment = Arc::new(
        StaticEnvironment::new(ModuleDescriptor::new("Medic", "1.2.0"), "Forge", "4.1.0")
            .with_runtime_version("1.85"),
    );
    let writer = Arc::new(DiagnosticWriter::new(
        &config,
        environment,
        reports.clone(),
        console,
    ));
    Harness {
        writer,
        logs,
        reports,
    }
}

fn harness() -> Harness {
    harness_with(ModhostConfig::default(), Arc::new(MemoryReportSink::new()))
}

fn plain(type_name: &str, message: &str, symbol: &str) -> Failure {
    Failure::new(type_name, message).with_frames(vec![Frame::new(symbol)])
}

#[test]
fn test_report_contents() {
    let h = harness();
    let failure = plain("Boom", "potion missing", "medic::heal::apply")
        .with_cause(plain("IoError", "disk", "medic::store::load"));

    h.writer.report(&failure, &["while healing alex"]);

    assert_eq!(h.reports.write_count(), 1);
    let report = h.reports.contents();
    assert!(report.starts_with(&"-".repeat(100)));
    assert!(report.contains("Medic 1.2.0 encountered Boom\n"));
    assert!(report.contains("Running Forge 4.1.0 and Rust 1.85\n"));
    assert!(report.contains("Modules: [Medic v1.2.0]\n"));
    assert!(report.contains("\n\nMore Information:\nwhile healing alex\n"));
    assert!(report.contains("Boom potion missing\n\tat medic::heal::apply\n"));
    assert!(report.contains("IoError disk\n\tat medic::store::load\n"));
    assert!(report.ends_with(&format!("{}\n\n", "-".repeat(100))));

    let severe = h.logs.at_level(LogLevel::Severe);
    assert_eq!(severe.len(), 1);
    assert!(severe[0].message.starts_with("[Medic] Medic 1.2.0 encountered Boom! Please check memory"));
}

#[test]
fn test_unknown_cause_placeholder() {
    let h = harness();
    let failure = Failure::without_message("Silent").with_frames(Vec::new());
    h.writer.report(&failure, &[] as &[&str]);

    let report = h.reports.contents();
    assert!(report.contains("Silent (Unknown cause)"));
    assert!(!report.contains("More Information:"));
}

#[test]
fn test_self_reporting_auto_report_off() {
    let mut config = ModhostConfig::default();
    config.auto_report = false;
    let h = harness_with(config, Arc::new(MemoryReportSink::new()));

    let _failure = h.writer.raise(Failure::self_reporting("quota exceeded"));

    assert_eq!(h.reports.write_count(), 0);
}

#[test]
fn test_self_reporting_auto_report_on_writes_once() {
    let h = harness();

    let failure = h.writer.raise(Failure::self_reporting("quota exceeded"));
    assert_eq!(h.reports.write_count(), 1);
    assert!(failure.is_reported());

    // Raising again, or routing through the boundary handler, does not write again.
    let failure = h.writer.raise(failure);
    h.writer.error(&failure, &[command_context("heal")]);
    assert_eq!(h.reports.write_count(), 1);

    let report = h.reports.contents();
    assert!(report.contains("More Information:\nquota exceeded\n"));
    assert!(report.contains("ModhostFailure Report: quota exceeded"));
}

#[test]
fn test_self_reporting_wrap_reports_cause() {
    let h = harness();
    let cause = plain("ParseError", "bad amount", "medic::parse");

    h.writer
        .raise(Failure::self_reporting_wrap(cause, "could not read heal amount"));

    let report = h.reports.contents();
    assert!(report.contains("Medic 1.2.0 encountered ParseError"));
    assert!(report.contains("More Information:\ncould not read heal amount\n"));
}

#[test]
fn test_toggle_auto_report_at_runtime() {
    let h = harness();
    h.writer.set_auto_report(false);
    h.writer.raise(Failure::self_reporting("first"));
    h.writer.set_auto_report(true);
    h.writer.raise(Failure::self_reporting("second"));

    assert_eq!(h.reports.write_count(), 1);
    assert!(h.reports.contents().contains("second"));
}

#[test]
fn test_error_reports_plain_failure_and_prints_trace() {
    let h = harness();
    let failure = plain("Boom", "kaput", "medic::heal::apply");

    h.writer.error(&failure, &[command_context("heal")]);

    assert_eq!(h.reports.write_count(), 1);
    assert!(h
        .reports
        .contents()
        .contains("An error occurred while executing command: heal"));
    assert!(h.logs.contains("Boom: kaput"));
    assert!(h.logs.contains("\tat medic::heal::apply"));
    assert!(h.logs.contains("[Medic] An error occurred while executing command: heal"));

    // Same instance again: trace printed, no second report.
    h.writer.error(&failure, &[command_context("heal")]);
    assert_eq!(h.reports.write_count(), 1);
}

#[test]
fn test_error_prints_trace_for_unreported_self_reporting_with_auto_report_off() {
    let mut config = ModhostConfig::default();
    config.auto_report = false;
    let h = harness_with(config, Arc::new(MemoryReportSink::new()));

    let failure = Failure::self_reporting("not saved").with_frames(vec![Frame::new("medic::x")]);
    h.writer.error(&failure, &["ctx"]);

    assert_eq!(h.reports.write_count(), 0);
    assert!(h.logs.contains("ModhostFailure: Report: not saved"));
}

#[test]
fn test_filtered_trace_skips_middle_cause() {
    let h = harness();
    let root = plain("RootError", "c", "medic::root");
    let middle = plain("MiddleError", "b", "medic::middle").with_cause(root);
    let outer = plain("OuterError", "a", "medic::outer").with_cause(middle);

    h.writer.print_filtered_trace(&outer);

    let lines: Vec<String> = h.logs.records().into_iter().map(|r| r.message).collect();
    assert_eq!(
        lines,
        vec![
            "OuterError: a",
            "\tat medic::outer",
            "RootError: c",
            "\tat medic::root",
        ]
    );
}

#[test]
fn test_filtered_trace_self_reporting_with_cause_prints_message_only() {
    let h = harness();
    let cause = plain("IoError", "disk", "medic::store");
    let failure = Failure::self_reporting_wrap(cause, "save failed")
        .with_frames(vec![Frame::new("medic::save")]);

    h.writer.print_filtered_trace(&failure);

    let lines: Vec<String> = h.logs.records().into_iter().map(|r| r.message).collect();
    assert_eq!(lines, vec!["Report: save failed", "IoError: disk", "\tat medic::store"]);
}

#[test]
fn test_filtered_trace_depth_limit() {
    let h = harness();
    let mut frames: Vec<Frame> = (0..7).map(|i| Frame::new(format!("medic::f{}", i))).collect();
    frames.push(Frame::new("std::rt::lang_start"));
    frames.push(Frame::new("main"));
    let failure = Failure::new("Deep", "x").with_frames(frames);

    h.writer.print_filtered_trace(&failure);

    let printed = h.logs.records();
    assert_eq!(printed.len(), 8);
    assert!(!h.logs.contains("lang_start"));
    assert!(!h.logs.contains("main"));
}

#[test]
fn test_sink_failure_is_logged_not_raised() {
    let h = harness_with(
        ModhostConfig::default(),
        Arc::new(MemoryReportSink::failing("disk full")),
    );
    let failure = plain("Boom", "kaput", "medic::heal");

    h.writer.report(&failure, &["ctx"]);

    let severe = h.logs.at_level(LogLevel::Severe);
    assert_eq!(severe.len(), 3);
    assert!(severe[1].message.contains("Got error when saving error!"));
    assert_eq!(severe[1].failure.as_deref(), Some("SinkError: Sink rejected write: disk full"));
    assert!(severe[2].message.contains("Original error that is not saved:"));
    assert_eq!(severe[2].failure.as_deref(), Some("Boom: kaput"));
}

#[test]
fn test_concurrent_reports_do_not_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(FileSink::new(dir.path().join("medic"), "error.txt"));
    let logs = Arc::new(MemorySink::new());
    let writer = Arc::new(DiagnosticWriter::new(
        &ModhostConfig::default(),
        Arc::new(StaticEnvironment::new(
            ModuleDescriptor::new("Medic", "1.2.0"),
            "Forge",
            "4.1.0",
        )),
        sink.clone(),
        Arc::new(ConsoleLogger::new("", logs)),
    ));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let writer = writer.clone();
            thread::spawn(move || {
                let failure = plain("Boom", &format!("worker {}", i), "medic::worker");
                writer.report(&failure, &[format!("thread {}", i)]);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let contents = std::fs::read_to_string(sink.path()).unwrap();
    let delimiter = "-".repeat(100);
    let mut starts: Vec<usize> = contents
        .match_indices(&format!("{}\nMedic 1.2.0 encountered Boom\n", delimiter))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(starts.len(), 8);
    assert_eq!(starts[0], 0);

    starts.push(contents.len());
    for window in starts.windows(2) {
        let record = &contents[window[0]..window[1]];
        assert_eq!(record.matches("More Information:").count(), 1);
        assert_eq!(record.matches("\tat medic::worker").count(), 1);
        assert!(record.ends_with(&format!("{}\n\n", delimiter)));
    }
    assert!(sink.location().ends_with("error.txt"));
}

#[tokio::test]
async fn test_spawn_report_in_runtime() {
    let h = harness();
    let handle = h
        .writer
        .spawn_report(plain("Boom", "async", "medic::task"), vec!["from task".to_string()]);

    handle.expect("runtime present").await.unwrap();
    assert_eq!(h.reports.write_count(), 1);
}

#[test]
fn test_spawn_report_without_runtime_runs_inline() {
    let h = harness();
    let handle = h
        .writer
        .spawn_report(plain("Boom", "sync", "medic::main"), Vec::new());

    assert!(handle.is_none());
    assert_eq!(h.reports.write_count(), 1);
}
