//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors at once)
//!     → LoggerConfig (validated, immutable)
//!     → Logger::from_config / RequestLoggingLayer::from_config
//!
//! environment.rs decides once, at construction, whether logging runs.
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Closures (message builder, skip, enrichment, status level) are set
//!   in code on the layer, not in files

pub mod environment;
pub mod loader;
pub mod schema;
pub mod validation;

pub use environment::EnvironmentGate;
pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{FileOutputConfig, LoggerConfig, OutputConfig, RequestLoggingConfig};
pub use validation::{validate_config, ValidationError};
