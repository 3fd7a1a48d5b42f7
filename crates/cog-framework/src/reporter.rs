//! Classification and surfacing of failures.
//!
//! Every genuine failure raised by module activation, command loading,
//! command execution or route handling ends up in [`ErrorReporter::handle_error`]
//! together with a [`ReportContext`]. The reporter logs it through `tracing`
//! with the full `source()` chain, forwards a [`Report`] to registered
//! [`ReportSink`]s and, for unrecoverable startup failures, raises a
//! termination flag the runtime honours.
//!
//! The reporter never panics: a misbehaving sink is contained and logged.

use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cog_core::{ErrorKind, Method};
use parking_lot::RwLock;
use tracing::{error, warn};

/// Where a failure happened and how severe it is.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub kind: ErrorKind,
    /// Command key, module name, manifest path or endpoint.
    pub subject: Option<String>,
    /// Request process termination after reporting.
    pub exit: bool,
}

impl ReportContext {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            subject: None,
            exit: false,
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn exit(mut self) -> Self {
        self.exit = true;
        self
    }

    pub fn command_run(command: impl Into<String>) -> Self {
        Self::new(ErrorKind::CommandRun).subject(command)
    }

    pub fn module_load(module: impl Into<String>) -> Self {
        Self::new(ErrorKind::ModuleLoad).subject(module)
    }

    pub fn api_endpoint(method: Method, path: &str) -> Self {
        Self::new(ErrorKind::ApiEndpoint).subject(format!("{method} {path}"))
    }
}

/// A reported failure, as handed to sinks.
#[derive(Debug, Clone)]
pub struct Report {
    pub kind: ErrorKind,
    pub subject: Option<String>,
    pub message: String,
    /// Messages of each `source()` below the top-level error.
    pub causes: Vec<String>,
    pub backtrace: Option<String>,
    pub exit: bool,
}

/// Observer notified of every report.
pub trait ReportSink: Send + Sync {
    fn on_report(&self, report: &Report);
}

/// Central failure reporter.
pub struct ErrorReporter {
    sinks: RwLock<Vec<Arc<dyn ReportSink>>>,
    capture_backtraces: bool,
    terminate: AtomicBool,
    reported: AtomicUsize,
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
            capture_backtraces: false,
            terminate: AtomicBool::new(false),
            reported: AtomicUsize::new(0),
        }
    }

    /// Captures a backtrace with every report (debug mode).
    pub fn with_backtraces(mut self, enabled: bool) -> Self {
        self.capture_backtraces = enabled;
        self
    }

    pub fn add_sink(&self, sink: Arc<dyn ReportSink>) {
        self.sinks.write().push(sink);
    }

    /// Classifies, logs and forwards a failure.
    pub fn handle_error(&self, err: &(dyn StdError + 'static), context: ReportContext) {
        let causes = source_chain(err);
        let backtrace = self
            .capture_backtraces
            .then(|| Backtrace::force_capture().to_string());

        error!(
            kind = %context.kind,
            subject = context.subject.as_deref().unwrap_or("-"),
            error = %err,
            causes = ?causes,
            "{}",
            context.kind.headline()
        );
        if let Some(trace) = &backtrace {
            error!(kind = %context.kind, "Backtrace:\n{trace}");
        }

        let report = Report {
            kind: context.kind,
            subject: context.subject,
            message: err.to_string(),
            causes,
            backtrace,
            exit: context.exit,
        };

        self.reported.fetch_add(1, Ordering::SeqCst);
        if report.exit {
            self.terminate.store(true, Ordering::SeqCst);
            error!(kind = %report.kind, "Unrecoverable failure, termination requested");
        }

        let sinks = self.sinks.read().clone();
        for sink in sinks {
            if catch_unwind(AssertUnwindSafe(|| sink.on_report(&report))).is_err() {
                warn!(kind = %report.kind, "Report sink panicked");
            }
        }
    }

    /// Reports an `anyhow::Error` (command, route and module handler results).
    pub fn report(&self, err: &anyhow::Error, context: ReportContext) {
        self.handle_error(&**err, context);
    }

    /// Whether an `exit` report has been handled.
    pub fn termination_requested(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    /// Number of reports handled so far.
    pub fn report_count(&self) -> usize {
        self.reported.load(Ordering::SeqCst)
    }
}

fn source_chain(err: &(dyn StdError + 'static)) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    causes
}

/// [`ReportSink`] that keeps every report in memory.
#[derive(Default)]
pub struct MemorySink {
    reports: parking_lot::Mutex<Vec<Report>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    /// Number of stored reports of `kind`.
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.reports.lock().iter().filter(|r| r.kind == kind).count()
    }
}

impl ReportSink for MemorySink {
    fn on_report(&self, report: &Report) {
        self.reports.lock().push(report.clone());
    }
}
