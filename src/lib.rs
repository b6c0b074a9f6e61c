//! Structured logging core for HTTP services.
//!
//! A text [`Logger`] with console and file outputs, a redacting body
//! serializer, and a tower layer that turns every request/response exchange
//! into exactly one [`LogEntry`].

pub mod config;
pub mod format;
pub mod http;
pub mod redaction;
pub mod sink;

pub use config::LoggerConfig;
pub use http::{LogEntry, RequestLoggingLayer, Severity};
pub use sink::{FallbackDispatcher, Logger, Sink};
