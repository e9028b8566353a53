//! Unexpected failures as values.
//!
//! A [`Failure`] carries what a diagnostic report needs: a short type name,
//! an optional message, the captured call stack and an optional cause.
//! Failures built through the `self_reporting*` constructors are tagged so
//! that the diagnostic writer persists them at raise time and never twice.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

/// Marker prepended to the message of every self-reporting failure.
pub const REPORT_MARKER: &str = "Report: ";

/// Type name given to failures recovered from a panic.
pub const PANIC_TYPE: &str = "Panic";

/// Type name used for causes whose concrete type is erased.
const ERASED_TYPE: &str = "Error";

/// One entry of a captured call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Fully qualified symbol path
    pub symbol: String,
    /// Source file, if known
    pub file: Option<String>,
    /// Source line, if known
    pub line: Option<u32>,
}

impl Frame {
    /// Create a frame without location information.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            file: None,
            line: None,
        }
    }

    /// Attach a source location.
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}({}:{})", self.symbol, file, line),
            (Some(file), None) => write!(f, "{}({})", self.symbol, file),
            _ => write!(f, "{}", self.symbol),
        }
    }
}

/// How a failure entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// Ordinary unexpected failure, reported where it is caught
    Plain,
    /// Domain failure that is reported when raised
    SelfReporting,
}

/// An unexpected failure with its call stack and causal chain.
#[derive(Debug, Clone)]
pub struct Failure {
    type_name: String,
    message: Option<String>,
    frames: Vec<Frame>,
    cause: Option<Box<Failure>>,
    origin: FailureOrigin,
    // Shared by clones so a failure is reported once no matter how often it is copied.
    reported: Arc<AtomicBool>,
}

impl Failure {
    /// Create a failure and capture the current call stack.
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::build(type_name.into(), Some(message.into()), capture_frames())
    }

    /// Create a failure that has no message.
    pub fn without_message(type_name: impl Into<String>) -> Self {
        Self::build(type_name.into(), None, capture_frames())
    }

    fn build(type_name: String, message: Option<String>, frames: Vec<Frame>) -> Self {
        Self {
            type_name,
            message,
            frames,
            cause: None,
            origin: FailureOrigin::Plain,
            reported: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the captured frames.
    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = frames;
        self
    }

    /// Set the direct cause of this failure.
    pub fn with_cause(mut self, cause: Failure) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Self-reporting failure carrying a message.
    pub fn self_reporting(message: impl Into<String>) -> Self {
        Self::new(SELF_REPORTING_TYPE, message).into_self_reporting()
    }

    /// Self-reporting failure wrapping a cause. The cause's rendering becomes the message.
    pub fn self_reporting_cause(cause: Failure) -> Self {
        let message = cause.to_string();
        Self::new(SELF_REPORTING_TYPE, message)
            .with_cause(cause)
            .into_self_reporting()
    }

    /// Self-reporting failure wrapping a cause with an explanatory message.
    pub fn self_reporting_wrap(cause: Failure, message: impl Into<String>) -> Self {
        Self::new(SELF_REPORTING_TYPE, message)
            .with_cause(cause)
            .into_self_reporting()
    }

    /// Self-reporting failure without message or cause.
    pub fn self_reporting_empty() -> Self {
        Self::without_message(SELF_REPORTING_TYPE).into_self_reporting()
    }

    /// Tag an existing failure as self-reporting.
    pub fn into_self_reporting(mut self) -> Self {
        self.origin = FailureOrigin::SelfReporting;
        self
    }

    /// Convert a concrete error, walking its `source()` chain.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let type_name = short_type_name(std::any::type_name::<E>()).to_string();
        let mut failure = Self::build(type_name, Some(err.to_string()), capture_frames());
        if let Some(source) = err.source() {
            failure.cause = Some(Box::new(Self::from_source(source)));
        }
        failure
    }

    /// Convert an `anyhow::Error`. A `Failure` stored inside is returned as is.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        if let Some(failure) = err.downcast_ref::<Failure>() {
            return failure.clone();
        }
        let mut failure = Self::build(
            ERASED_TYPE.to_string(),
            Some(err.to_string()),
            capture_frames(),
        );
        if let Some(source) = err.source() {
            failure.cause = Some(Box::new(Self::from_source(source)));
        }
        failure
    }

    fn from_source(source: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(failure) = source.downcast_ref::<Failure>() {
            return failure.clone();
        }
        let mut failure = Self::build(ERASED_TYPE.to_string(), Some(source.to_string()), Vec::new());
        if let Some(next) = source.source() {
            failure.cause = Some(Box::new(Self::from_source(next)));
        }
        failure
    }

    /// Convert a panic payload caught by `catch_unwind`.
    ///
    /// With [`install_panic_hook`] in place the frames are those of the
    /// panic site; otherwise they are captured where the panic was caught.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            Some((*s).to_string())
        } else {
            payload.downcast_ref::<String>().cloned()
        };
        let frames = take_panic_frames().unwrap_or_else(capture_frames);
        Self::build(PANIC_TYPE.to_string(), message, frames)
    }

    /// Short type name, e.g. `ParseIntError`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The message as given at construction.
    pub fn raw_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The message as presented downstream. Self-reporting failures always
    /// carry the report marker.
    pub fn message(&self) -> Option<String> {
        match self.origin {
            FailureOrigin::SelfReporting => Some(format!(
                "{}{}",
                REPORT_MARKER,
                self.message.as_deref().unwrap_or_default()
            )),
            FailureOrigin::Plain => self.message.clone(),
        }
    }

    /// Captured frames, innermost call first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Direct cause, if any.
    pub fn cause(&self) -> Option<&Failure> {
        self.cause.as_deref()
    }

    /// Causal chain from the direct cause down to the root, excluding `self`.
    pub fn causes(&self) -> Causes<'_> {
        Causes {
            next: self.cause.as_deref(),
        }
    }

    /// The innermost cause, if this failure has any.
    pub fn root_cause(&self) -> Option<&Failure> {
        self.causes().last()
    }

    pub fn origin(&self) -> FailureOrigin {
        self.origin
    }

    pub fn is_self_reporting(&self) -> bool {
        self.origin == FailureOrigin::SelfReporting
    }

    /// Whether a diagnostic report has been written for this failure.
    pub fn is_reported(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }

    /// Mark the failure as reported. Returns `true` only for the call that
    /// performed the transition.
    pub fn mark_reported(&self) -> bool {
        !self.reported.swap(true, Ordering::AcqRel)
    }
}

const SELF_REPORTING_TYPE: &str = "ModhostFailure";

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{}: {}", self.type_name, message),
            None => write!(f, "{}", self.type_name),
        }
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Failure::from_anyhow(&err)
    }
}

/// Iterator over a failure's causal chain.
pub struct Causes<'a> {
    next: Option<&'a Failure>,
}

impl<'a> Iterator for Causes<'a> {
    type Item = &'a Failure;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.cause.as_deref();
        Some(current)
    }
}

/// Capture the current call stack, dropping the capture machinery itself.
pub fn capture_frames() -> Vec<Frame> {
    let rendered = Backtrace::force_capture().to_string();
    parse_backtrace(&rendered)
        .into_iter()
        .skip_while(|frame| is_capture_frame(&frame.symbol))
        .collect()
}

thread_local! {
    static PANIC_FRAMES: RefCell<Option<Vec<Frame>>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

// Unwinding machinery between the hook and the panicking function.
const PANIC_MACHINERY: &[&str] = &[
    "<alloc::boxed::Box<F,A> as core::ops::function::Fn",
    "std::panicking",
    "core::panicking",
    "std::panic::panic_any",
    "std::sys",
    "std::rt::begin_panic",
    "rust_begin_unwind",
    "__rustc::rust_begin_unwind",
];

/// Install a process-wide panic hook recording the panicking thread's call
/// stack, so that [`Failure::from_panic`] reports where the panic happened.
///
/// The previously installed hook still runs. Installing twice is a no-op.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let mut frames: Vec<Frame> = capture_frames()
                .into_iter()
                .skip_while(|frame| is_panic_machinery(&frame.symbol))
                .collect();
            if let Some(location) = info.location() {
                let located = frames
                    .first()
                    .and_then(|frame| frame.file.as_deref())
                    .is_some_and(|file| same_file(file, location.file()));
                if !located {
                    frames.insert(
                        0,
                        Frame::new(PANIC_SITE_SYMBOL).at(location.file(), location.line()),
                    );
                }
            }
            PANIC_FRAMES.with(|slot| *slot.borrow_mut() = Some(frames));
            previous(info);
        }));
    });
}

/// Symbol of the frame standing in for a panic location that the captured
/// call stack does not resolve.
pub const PANIC_SITE_SYMBOL: &str = "<panic site>";

// Backtraces and panic locations may render the same path differently.
fn same_file(a: &str, b: &str) -> bool {
    let a = a.trim_start_matches("./");
    let b = b.trim_start_matches("./");
    a.ends_with(b) || b.ends_with(a)
}

fn take_panic_frames() -> Option<Vec<Frame>> {
    PANIC_FRAMES.with(|slot| slot.borrow_mut().take())
}

fn is_panic_machinery(symbol: &str) -> bool {
    is_capture_frame(symbol) || PANIC_MACHINERY.iter().any(|prefix| symbol.starts_with(prefix))
}

fn is_capture_frame(symbol: &str) -> bool {
    if symbol.starts_with("modhost_core::failure::tests") {
        return false;
    }
    symbol.starts_with("std::backtrace")
        || symbol.starts_with("modhost_core::failure")
        || symbol.starts_with("<modhost_core::failure")
}

/// Parse the rendered form of a `std::backtrace::Backtrace`.
///
/// Frame lines look like `  3: path::to::symbol`, optionally followed by an
/// `at file:line:col` line.
pub fn parse_backtrace(rendered: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();

    for line in rendered.lines() {
        let line = line.trim();
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                if frame.file.is_none() {
                    let (file, number) = split_location(location);
                    frame.file = Some(file.to_string());
                    frame.line = number;
                }
            }
            continue;
        }

        let Some((index, symbol)) = line.split_once(": ") else {
            continue;
        };
        if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        frames.push(Frame::new(strip_hash(symbol.trim())));
    }

    frames
}

fn split_location(location: &str) -> (&str, Option<u32>) {
    // file:line:col, where file may itself contain ':' on some platforms
    let mut parts = location.rsplitn(3, ':');
    let col = parts.next();
    let line = parts.next();
    match (parts.next(), line, col) {
        (Some(file), Some(line), Some(_)) => (file, line.parse().ok()),
        _ => (location, None),
    }
}

fn strip_hash(symbol: &str) -> &str {
    match symbol.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) => {
            head
        }
        _ => symbol,
    }
}

/// Last path segment of a type name, without generic arguments.
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
