//! HTTP request observation subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → request.rs (assign request ID)
//!     → observer.rs (start timer, snapshot request, capture body)
//!     → inner service
//!     → body.rs (wrap response body; end of stream = completed,
//!                drop before end = aborted)
//!     → observer.rs (latch, build LogEntry: level.rs, headers.rs, entry.rs)
//!     → sink (through FallbackDispatcher)
//! ```
//!
//! server.rs wires these layers in front of a small demo router.

pub mod body;
pub mod entry;
pub mod headers;
pub mod level;
pub mod observer;
pub mod request;
pub mod server;

pub use body::ObservedBody;
pub use entry::{default_message, ExchangeEvent, LogEntry};
pub use headers::{normalize, normalize_header_map, HeaderInclusion, NormalizedHeaders};
pub use level::{default_level_for_status, LevelResolver, Severity};
pub use observer::{
    RequestLoggingBuilder, RequestLoggingLayer, RequestLoggingService, RequestSnapshot,
    ResponseSnapshot,
};
pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::DemoServer;
