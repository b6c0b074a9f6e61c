//! Sink subsystem.
//!
//! # Data Flow
//! ```text
//! RequestLoggingLayer / application code
//!     → fallback.rs (FallbackDispatcher: reroute unsupported calls, warn once)
//!     → Sink implementation
//!         → logger.rs  (text records to console and file outputs)
//!         → trace_sink.rs (events into the tracing subscriber)
//!         → memory.rs  (captured in memory)
//! ```
//!
//! # Design Decisions
//! - A sink declares what it supports by answering [`Dispatch`]; there is
//!   no reflection and no error path
//! - Severity entry points and the text-only generic entry point are
//!   separate capabilities

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::http::level::Severity;

pub mod fallback;
pub mod logger;
pub mod memory;
pub mod trace_sink;

pub use fallback::FallbackDispatcher;
pub use logger::Logger;
pub use memory::MemorySink;
pub use trace_sink::TracingSink;

/// One log call: a message (any value), an optional stack and attached
/// structured fields.
#[derive(Debug, Clone, PartialEq)]
pub struct LogCall {
    pub message: Value,
    pub stack: Option<Value>,
    pub metadata: Map<String, Value>,
}

impl LogCall {
    pub fn new(message: impl Into<Value>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            metadata: Map::new(),
        }
    }

    pub fn with_stack(mut self, stack: impl Into<Value>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    /// The message as text: strings verbatim, anything else as JSON.
    pub fn message_text(&self) -> String {
        coerce_text(&self.message)
    }
}

/// Whether a sink accepted a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Unsupported,
}

impl Dispatch {
    pub fn is_handled(&self) -> bool {
        matches!(self, Dispatch::Handled)
    }
}

/// Destination for finished log calls.
///
/// Both entry points default to [`Dispatch::Unsupported`]; implementors
/// override the ones they provide.
pub trait Sink: Send + Sync {
    /// Severity-specific entry point carrying the full call.
    fn write(&self, severity: Severity, call: &LogCall) -> Dispatch {
        let _ = (severity, call);
        Dispatch::Unsupported
    }

    /// Lower-level generic entry point accepting text only.
    fn log(&self, severity: Severity, line: &str) -> Dispatch {
        let _ = (severity, line);
        Dispatch::Unsupported
    }
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn write(&self, severity: Severity, call: &LogCall) -> Dispatch {
        (**self).write(severity, call)
    }

    fn log(&self, severity: Severity, line: &str) -> Dispatch {
        (**self).log(severity, line)
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&self, severity: Severity, call: &LogCall) -> Dispatch {
        (**self).write(severity, call)
    }

    fn log(&self, severity: Severity, line: &str) -> Dispatch {
        (**self).log(severity, line)
    }
}

pub(crate) fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
    }
}
