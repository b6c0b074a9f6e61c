//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every configured timezone against the IANA database
//! - Validate value ranges and required paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: LoggerConfig → Result<(), Vec<ValidationError>>

use std::fmt;

use crate::config::environment::EnvironmentGate;
use crate::config::schema::LoggerConfig;
use crate::format::timestamp::TimezoneSet;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &LoggerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.label.trim().is_empty() {
        errors.push(ValidationError::new("label", "must not be empty"));
    }

    for zone in &config.timezones {
        if let Err(e) = TimezoneSet::new([zone]) {
            errors.push(ValidationError::new("timezones", e.to_string()));
        }
    }

    if config.file.enabled && config.file.path.trim().is_empty() {
        errors.push(ValidationError::new("file.path", "required when the file output is enabled"));
    }

    if config.request.max_body_length == 0 {
        errors.push(ValidationError::new("request.max_body_length", "must be greater than 0"));
    }

    if let EnvironmentGate::Custom { sources, .. } = &config.environment {
        if sources.is_empty() {
            errors.push(ValidationError::new(
                "environment.sources",
                "a custom rule needs at least one variable",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
