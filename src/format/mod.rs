//! Record formatting subsystem.
//!
//! # Data Flow
//! ```text
//! LoggerConfig.timezones
//!     → timestamp.rs (validate once into a TimezoneSet)
//!     → LineContext (label + zones, immutable, shared via Arc)
//!     → line.rs (one formatter with timestamps for file outputs,
//!                one without for the console)
//!     → rendered text handed to an output writer
//! ```
//!
//! # Design Decisions
//! - Zone validation happens at construction, never while rendering
//! - Rendering is pure apart from reading the clock

pub mod line;
pub mod timestamp;

pub use line::{LineContext, LineFormatter};
pub use timestamp::{InvalidTimezone, TimezoneSet};
