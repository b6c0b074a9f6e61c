//! Sink forwarding calls into the `tracing` subscriber.

use tracing::Level;

use crate::http::level::Severity;
use crate::sink::{coerce_text, Dispatch, LogCall, Sink};

/// Emits every call as a `tracing` event. Attached metadata becomes a JSON
/// `fields` value, so a JSON subscriber keeps the entry machine-readable.
#[derive(Debug, Clone)]
pub struct TracingSink {
    label: String,
}

impl TracingSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

macro_rules! emit {
    ($level:expr, $label:expr, $message:expr, $stack:expr, $fields:expr) => {
        tracing::event!(
            $level,
            label = %$label,
            stack = $stack,
            fields = $fields,
            "{}",
            $message
        )
    };
}

impl Sink for TracingSink {
    fn write(&self, severity: Severity, call: &LogCall) -> Dispatch {
        let message = call.message_text();
        let stack = call.stack.as_ref().map(coerce_text);
        let stack = stack.as_deref();
        let fields = if call.metadata.is_empty() {
            None
        } else {
            Some(serde_json::Value::Object(call.metadata.clone()).to_string())
        };
        let fields = fields.as_deref();

        match severity {
            Severity::Error => emit!(Level::ERROR, self.label, message, stack, fields),
            Severity::Warn => emit!(Level::WARN, self.label, message, stack, fields),
            Severity::Info => emit!(Level::INFO, self.label, message, stack, fields),
            Severity::Debug => emit!(Level::DEBUG, self.label, message, stack, fields),
            Severity::Trace => emit!(Level::TRACE, self.label, message, stack, fields),
        }
        Dispatch::Handled
    }

    fn log(&self, severity: Severity, line: &str) -> Dispatch {
        self.write(severity, &LogCall::new(line))
    }
}
