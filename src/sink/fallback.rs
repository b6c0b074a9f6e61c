//! Graceful degradation for calls a sink does not support.
//!
//! # Responsibilities
//! - Pass supported calls straight through
//! - Reroute unsupported or unknown severity calls to the info entry point,
//!   or to the generic text entry point when info is missing too
//! - Warn once per distinct method name, per dispatcher
//!
//! # Design Decisions
//! - The warned-name set belongs to the dispatcher, not the process
//! - When the sink has no usable entry point at all, the warning goes to
//!   stderr and the call is dropped

use dashmap::DashSet;

use crate::http::level::Severity;
use crate::sink::{Dispatch, LogCall, Sink};

/// Decorator rerouting calls the wrapped sink cannot take.
#[derive(Debug)]
pub struct FallbackDispatcher<S> {
    sink: S,
    warned: DashSet<String>,
}

impl<S: Sink> FallbackDispatcher<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            warned: DashSet::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.sink
    }

    /// Deliver a call at `severity`, degrading when unsupported.
    pub fn dispatch(&self, severity: Severity, call: &LogCall) -> Dispatch {
        if self.sink.write(severity, call).is_handled() {
            return Dispatch::Handled;
        }
        self.reroute(severity.as_str(), call)
    }

    /// Escape hatch for a method name outside the severity set. Known names
    /// are dispatched normally.
    pub fn log_unknown(&self, name: &str, call: &LogCall) -> Dispatch {
        match name.parse::<Severity>() {
            Ok(severity) => self.dispatch(severity, call),
            Err(_) => self.reroute(name, call),
        }
    }

    pub fn has_warned(&self, name: &str) -> bool {
        self.warned.contains(name)
    }

    fn reroute(&self, name: &str, call: &LogCall) -> Dispatch {
        self.warn_once(name);
        if self.sink.write(Severity::Info, call).is_handled() {
            return Dispatch::Handled;
        }
        self.sink.log(Severity::Info, &call.message_text())
    }

    fn warn_once(&self, name: &str) {
        if !self.warned.insert(name.to_string()) {
            return;
        }
        let text = format!(
            "Unknown log method \"{}\"; routing the call to \"info\" instead",
            name
        );
        if self.sink.write(Severity::Warn, &LogCall::new(text.as_str())).is_handled() {
            return;
        }
        if self.sink.log(Severity::Warn, &text).is_handled() {
            return;
        }
        if self.sink.write(Severity::Info, &LogCall::new(text.as_str())).is_handled() {
            return;
        }
        eprintln!("{}", text);
    }
}

impl<S: Sink> Sink for FallbackDispatcher<S> {
    fn write(&self, severity: Severity, call: &LogCall) -> Dispatch {
        self.dispatch(severity, call)
    }

    fn log(&self, severity: Severity, line: &str) -> Dispatch {
        self.sink.log(severity, line)
    }
}
