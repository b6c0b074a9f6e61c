//! In-memory sink for tests and embedders that inspect entries directly.

use parking_lot::Mutex;

use crate::http::entry::LogEntry;
use crate::http::level::Severity;
use crate::sink::{Dispatch, LogCall, Sink};

/// A call accepted through [`Sink::write`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedCall {
    pub severity: Severity,
    pub call: LogCall,
}

/// Captures calls in memory, optionally advertising only some capabilities.
#[derive(Debug)]
pub struct MemorySink {
    severities: Vec<Severity>,
    generic: bool,
    calls: Mutex<Vec<CapturedCall>>,
    lines: Mutex<Vec<(Severity, String)>>,
}

impl MemorySink {
    /// Accepts every severity and the generic entry point.
    pub fn new() -> Self {
        Self::with_capabilities(&Severity::ALL, true)
    }

    /// Accepts only `severities` through `write`, and generic `log` calls
    /// when `generic` is set.
    pub fn with_capabilities(severities: &[Severity], generic: bool) -> Self {
        Self {
            severities: severities.to_vec(),
            generic,
            calls: Mutex::new(Vec::new()),
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CapturedCall> {
        self.calls.lock().clone()
    }

    pub fn lines(&self) -> Vec<(Severity, String)> {
        self.lines.lock().clone()
    }

    /// Calls whose metadata decodes as a [`LogEntry`].
    pub fn entries(&self) -> Vec<(Severity, LogEntry)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|captured| {
                LogEntry::from_fields(&captured.call.metadata)
                    .ok()
                    .map(|entry| (captured.severity, entry))
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
        self.lines.lock().clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemorySink {
    fn write(&self, severity: Severity, call: &LogCall) -> Dispatch {
        if !self.severities.contains(&severity) {
            return Dispatch::Unsupported;
        }
        self.calls.lock().push(CapturedCall {
            severity,
            call: call.clone(),
        });
        Dispatch::Handled
    }

    fn log(&self, severity: Severity, line: &str) -> Dispatch {
        if !self.generic {
            return Dispatch::Unsupported;
        }
        self.lines.lock().push((severity, line.to_string()));
        Dispatch::Handled
    }
}
