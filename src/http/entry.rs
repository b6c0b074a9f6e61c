//! Structured record of one observed HTTP exchange.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::http::headers::NormalizedHeaders;

/// How the exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeEvent {
    /// The response body was delivered in full.
    Completed,
    /// The exchange was dropped before the response finished.
    Aborted,
}

impl ExchangeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeEvent::Completed => "completed",
            ExchangeEvent::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ExchangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted exactly once per observed request.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub event: ExchangeEvent,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub response_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<NormalizedHeaders>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<NormalizedHeaders>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl LogEntry {
    /// An entry with the defaults used for missing request identifiers.
    pub fn new(event: ExchangeEvent) -> Self {
        Self {
            event,
            method: "GET".to_string(),
            url: String::new(),
            status_code: 0,
            response_time_ms: 0.0,
            content_length: None,
            ip: None,
            user_agent: None,
            request_id: None,
            request_body: None,
            request_headers: None,
            response_headers: None,
            context: None,
        }
    }

    /// Field map attached to the sink call.
    pub fn to_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(fields.clone()))
    }
}

/// Round to two decimals, clamping negatives to zero.
pub fn round_ms(ms: f64) -> f64 {
    if !ms.is_finite() || ms <= 0.0 {
        return 0.0;
    }
    (ms * 100.0).round() / 100.0
}

/// `"<method> <url> <status> <elapsed>ms (<event>)"`.
pub fn default_message(entry: &LogEntry) -> String {
    format!(
        "{} {} {} {}ms ({})",
        entry.method, entry.url, entry.status_code, entry.response_time_ms, entry.event
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_for_missing_identifiers() {
        let entry = LogEntry::new(ExchangeEvent::Aborted);
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.url, "");
        assert_eq!(entry.status_code, 0);
    }

    #[test]
    fn serializes_camel_case_and_skips_absent_fields() {
        let mut entry = LogEntry::new(ExchangeEvent::Completed);
        entry.url = "/a".into();
        entry.status_code = 201;
        entry.response_time_ms = 1.25;
        entry.request_id = Some("r-1".into());
        let fields = entry.to_fields();
        assert_eq!(
            Value::Object(fields.clone()),
            json!({
                "event": "completed",
                "method": "GET",
                "url": "/a",
                "statusCode": 201,
                "responseTimeMs": 1.25,
                "requestId": "r-1"
            })
        );
        assert_eq!(LogEntry::from_fields(&fields).unwrap(), entry);
    }

    #[test]
    fn default_message_format() {
        let mut entry = LogEntry::new(ExchangeEvent::Completed);
        entry.method = "POST".into();
        entry.url = "/orders".into();
        entry.status_code = 404;
        entry.response_time_ms = 12.5;
        assert_eq!(default_message(&entry), "POST /orders 404 12.5ms (completed)");
    }

    #[test]
    fn rounding() {
        assert_eq!(round_ms(1.23456), 1.23);
        assert_eq!(round_ms(-3.0), 0.0);
        assert_eq!(round_ms(f64::NAN), 0.0);
    }
}
