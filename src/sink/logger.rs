//! Text-rendering logger with console and file outputs.
//!
//! # Responsibilities
//! - Validate timezones before any output is opened
//! - Render each record once per formatter (with and without timestamps)
//! - Apply the overall and per-output severity thresholds
//! - Share outputs between scoped loggers
//!
//! # Design Decisions
//! - Write failures are reported through `tracing` and never reach the caller
//! - A logger closed by the environment gate drops every record

use parking_lot::Mutex;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::schema::LoggerConfig;
use crate::format::line::{LineContext, LineFormatter};
use crate::format::timestamp::{InvalidTimezone, TimezoneSet};
use crate::http::level::Severity;
use crate::sink::{Dispatch, LogCall, Sink};

/// Error type for logger construction.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error(transparent)]
    InvalidTimezone(#[from] InvalidTimezone),

    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Kind of output destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputKind {
    Console,
    File(PathBuf),
    Writer(String),
}

impl OutputKind {
    /// File-like outputs carry timestamps; the console does not.
    fn timestamps(&self) -> bool {
        !matches!(self, OutputKind::Console)
    }
}

struct Output {
    kind: OutputKind,
    threshold: Severity,
    writer: Mutex<Box<dyn Write + Send>>,
}

/// Builder for [`Logger`].
pub struct LoggerBuilder {
    label: String,
    level: Severity,
    timezones: TimezoneSet,
    enabled: bool,
    outputs: Vec<Output>,
}

impl LoggerBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            level: Severity::Info,
            timezones: TimezoneSet::empty(),
            enabled: true,
            outputs: Vec::new(),
        }
    }

    pub fn level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }

    pub fn timezones(mut self, timezones: TimezoneSet) -> Self {
        self.timezones = timezones;
        self
    }

    /// Drop every record when `false`.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Write to stdout without timestamps.
    pub fn console(self, level: Option<Severity>) -> Self {
        self.output(OutputKind::Console, Box::new(io::stdout()), level)
    }

    /// Add an output. Anything but [`OutputKind::Console`] gets timestamps.
    pub fn output(mut self, kind: OutputKind, writer: Box<dyn Write + Send>, level: Option<Severity>) -> Self {
        let threshold = level.unwrap_or(self.level);
        self.outputs.push(Output {
            kind,
            threshold,
            writer: Mutex::new(writer),
        });
        self
    }

    pub fn build(self) -> Logger {
        let context = Arc::new(LineContext::new(self.label, self.timezones));
        Logger {
            plain: LineFormatter::new(context.clone(), false),
            stamped: LineFormatter::new(context, true),
            outputs: Arc::new(self.outputs),
            enabled: self.enabled,
        }
    }
}

/// The crate's own sink: renders records as text to its outputs.
#[derive(Clone)]
pub struct Logger {
    plain: LineFormatter,
    stamped: LineFormatter,
    outputs: Arc<Vec<Output>>,
    enabled: bool,
}

impl Logger {
    pub fn builder(label: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder::new(label)
    }

    /// Build from configuration. Timezones are validated before the file
    /// output is opened, so a bad zone never leaves a half-built logger.
    pub fn from_config(config: &LoggerConfig) -> Result<Self, LoggerError> {
        let timezones = TimezoneSet::new(&config.timezones)?;
        let enabled = config.environment.is_enabled();

        let mut builder = LoggerBuilder::new(config.label.clone())
            .level(config.level)
            .timezones(timezones)
            .enabled(enabled);

        if config.console.enabled {
            builder = builder.console(config.console.level);
        }

        if config.file.enabled {
            let path = PathBuf::from(&config.file.path);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| LoggerError::Io {
                    path: path.clone(),
                    source,
                })?;
            builder = builder.output(OutputKind::File(path), Box::new(file), config.file.level);
        }

        tracing::debug!(
            label = %config.label,
            enabled,
            console = config.console.enabled,
            file = config.file.enabled,
            "Logger initialized"
        );

        Ok(builder.build())
    }

    /// A logger with a new label sharing this logger's outputs and zones.
    pub fn scoped(&self, label: impl Into<String>) -> Self {
        let context = Arc::new(LineContext::new(
            label,
            self.plain.context().timezones().clone(),
        ));
        Self {
            plain: LineFormatter::new(context.clone(), false),
            stamped: LineFormatter::new(context, true),
            outputs: self.outputs.clone(),
            enabled: self.enabled,
        }
    }

    pub fn label(&self) -> &str {
        self.plain.context().label()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn emit(&self, severity: Severity, call: &LogCall) {
        if !self.enabled {
            return;
        }

        let mut plain: Option<String> = None;
        let mut stamped: Option<String> = None;

        for output in self.outputs.iter() {
            if !severity.passes(output.threshold) {
                continue;
            }
            let text = if output.kind.timestamps() {
                stamped.get_or_insert_with(|| self.stamped.format(severity, call))
            } else {
                plain.get_or_insert_with(|| self.plain.format(severity, call))
            };

            let mut writer = output.writer.lock();
            if let Err(e) = writer.write_all(text.as_bytes()).and_then(|_| writer.flush()) {
                tracing::warn!(output = ?output.kind, error = %e, "Failed to write log record");
            }
        }
    }

    pub fn error(&self, message: impl Into<Value>) {
        self.emit(Severity::Error, &LogCall::new(message));
    }

    pub fn warn(&self, message: impl Into<Value>) {
        self.emit(Severity::Warn, &LogCall::new(message));
    }

    pub fn info(&self, message: impl Into<Value>) {
        self.emit(Severity::Info, &LogCall::new(message));
    }

    pub fn debug(&self, message: impl Into<Value>) {
        self.emit(Severity::Debug, &LogCall::new(message));
    }

    pub fn trace(&self, message: impl Into<Value>) {
        self.emit(Severity::Trace, &LogCall::new(message));
    }
}

impl Sink for Logger {
    fn write(&self, severity: Severity, call: &LogCall) -> Dispatch {
        self.emit(severity, call);
        Dispatch::Handled
    }

    fn log(&self, severity: Severity, line: &str) -> Dispatch {
        self.emit(severity, &LogCall::new(line));
        Dispatch::Handled
    }
}
