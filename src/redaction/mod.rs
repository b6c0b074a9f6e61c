//! Redaction subsystem.
//!
//! # Data Flow
//! ```text
//! request body / arbitrary value
//!     → payload.rs (shared, possibly cyclic value tree)
//!     → serializer.rs (mask keys, cut cycles, encode, bound length)
//!     → Serialized (structured value, or text when truncated/unencodable)
//! ```
//!
//! # Design Decisions
//! - Masking is by key name, case-insensitive, at every depth
//! - Masked values are never visited
//! - Encoding failures degrade to a lossy text form instead of erroring

pub mod payload;
pub mod serializer;

pub use payload::{Payload, SharedList, SharedMap};
pub use serializer::{MaskedKeys, RedactingSerializer, Serialized, CIRCULAR, REDACTED};
