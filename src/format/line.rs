//! Text rendering of a single log record.
//!
//! A record is laid out as:
//!
//! ```text
//! 2024-03-09 23:30:05                   (timestamps, file outputs only)
//! Asia/Tokyo: 08:30:05 on 2024-03-10
//! [WARN] (payments)
//! GET /checkout 404 3.2ms (completed)
//! <stack, if any>
//! {                                     (remaining metadata, if any)
//!   "statusCode": 404
//! }
//! ```

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::format::timestamp::TimezoneSet;
use crate::http::level::Severity;
use crate::sink::LogCall;

/// Metadata keys already rendered elsewhere in the record.
const CONSUMED_KEYS: [&str; 4] = ["level", "severity", "message", "stack"];

/// Label and zones bound once per logger.
#[derive(Debug, Clone)]
pub struct LineContext {
    label: String,
    timezones: TimezoneSet,
}

impl LineContext {
    pub fn new(label: impl Into<String>, timezones: TimezoneSet) -> Self {
        Self {
            label: label.into(),
            timezones,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn timezones(&self) -> &TimezoneSet {
        &self.timezones
    }
}

/// Renders records against a shared [`LineContext`].
#[derive(Debug, Clone)]
pub struct LineFormatter {
    context: Arc<LineContext>,
    timestamps: bool,
}

impl LineFormatter {
    pub fn new(context: Arc<LineContext>, timestamps: bool) -> Self {
        Self {
            context,
            timestamps,
        }
    }

    pub fn context(&self) -> &Arc<LineContext> {
        &self.context
    }

    pub fn format(&self, severity: Severity, call: &LogCall) -> String {
        self.format_at(severity, call, Utc::now())
    }

    pub fn format_at(&self, severity: Severity, call: &LogCall, now: DateTime<Utc>) -> String {
        let mut lines: Vec<String> = Vec::new();

        if self.timestamps {
            lines.extend(self.context.timezones.render_at(now));
        }

        lines.push(format!(
            "[{}] ({})",
            severity.as_str().to_uppercase(),
            self.context.label
        ));
        lines.push(render_value(&call.message));

        if let Some(stack) = &call.stack {
            lines.push(render_value(stack));
        }

        let remaining: Map<String, Value> = call
            .metadata
            .iter()
            .filter(|(key, _)| !CONSUMED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if !remaining.is_empty() {
            lines.push(pretty(&Value::Object(remaining)));
        }

        let mut out = lines.join("\n");
        let trimmed = out.trim_end_matches(['\n', '\r']).len();
        out.truncate(trimmed);
        out.push('\n');
        out
    }
}

/// Strings verbatim, everything else as indented JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => pretty(other),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
