//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Every field
//! has a default so a minimal file (or none at all) is valid.

use serde::{Deserialize, Serialize};

use crate::config::environment::EnvironmentGate;
use crate::http::headers::HeaderInclusion;
use crate::http::level::Severity;

/// Root configuration for a logger and its request observer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Rendered label; also names the logical stream.
    pub label: String,

    /// Overall severity threshold.
    pub level: Severity,

    /// Extra IANA zones rendered in every file record.
    pub timezones: Vec<String>,

    /// Console output (no timestamps).
    pub console: OutputConfig,

    /// Append-only file output (with timestamps).
    pub file: FileOutputConfig,

    /// Environment-aware gating for the logger and the observer.
    pub environment: EnvironmentGate,

    /// Request/response observation settings.
    pub request: RequestLoggingConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            label: "app".to_string(),
            level: Severity::Info,
            timezones: Vec::new(),
            console: OutputConfig::default(),
            file: FileOutputConfig::default(),
            environment: EnvironmentGate::Always,
            request: RequestLoggingConfig::default(),
        }
    }
}

/// Console output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub enabled: bool,

    /// Overrides the overall level for this output.
    pub level: Option<Severity>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: None,
        }
    }
}

/// File output configuration. Rotation is left to external tooling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileOutputConfig {
    pub enabled: bool,

    /// Overrides the overall level for this output.
    pub level: Option<Severity>,

    /// File to append to. The parent directory must exist.
    pub path: String,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: None,
            path: "logs/app.log".to_string(),
        }
    }
}

/// Request observation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestLoggingConfig {
    /// Capture and serialize the request body.
    pub include_body: bool,

    /// `true`, `false`, or an allow-list of header names.
    pub include_request_headers: HeaderInclusion,

    /// `true`, `false`, or an allow-list of header names.
    pub include_response_headers: HeaderInclusion,

    /// Keys masked at any depth of the body (case-insensitive).
    pub masked_keys: Vec<String>,

    /// Serialized body length bound, in characters.
    pub max_body_length: usize,

    /// Largest declared request body that is buffered for capture.
    pub max_body_buffer_bytes: usize,

    /// Fixed severity for every entry instead of the status mapping.
    pub level: Option<Severity>,
}

impl Default for RequestLoggingConfig {
    fn default() -> Self {
        Self {
            include_body: false,
            include_request_headers: HeaderInclusion::Flag(false),
            include_response_headers: HeaderInclusion::Flag(false),
            masked_keys: ["password", "token", "authorization", "cookie", "secret"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            max_body_length: 2048,
            max_body_buffer_bytes: 1024 * 1024,
            level: None,
        }
    }
}
