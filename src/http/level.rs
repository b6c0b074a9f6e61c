//! Severity labels and status-code level resolution.
//!
//! # Responsibilities
//! - Define the closed set of severities every sink understands
//! - Map a final HTTP status code to a severity
//! - Apply caller overrides (fixed severity or status function)
//!
//! # Design Decisions
//! - Variants are declared from least to most verbose so `Ord` doubles as
//!   the threshold comparison
//! - The function override wins over the fixed override

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Log severity, ordered from least to most verbose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Error,
        Severity::Warn,
        Severity::Info,
        Severity::Debug,
        Severity::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
            Severity::Debug => "debug",
            Severity::Trace => "trace",
        }
    }

    /// Returns true if a record of this severity passes `threshold`.
    pub fn passes(&self, threshold: Severity) -> bool {
        *self <= threshold
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a name is outside the closed severity set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity \"{0}\"")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warn" | "warning" => Ok(Severity::Warn),
            "info" => Ok(Severity::Info),
            "debug" => Ok(Severity::Debug),
            "trace" => Ok(Severity::Trace),
            _ => Err(UnknownSeverity(s.to_string())),
        }
    }
}

/// Caller-supplied status → severity function.
pub type StatusLevelFn = Arc<dyn Fn(u16) -> Severity + Send + Sync>;

/// Default mapping: 5xx → error, 4xx → warn, everything else → info.
pub fn default_level_for_status(status: u16) -> Severity {
    match status {
        s if s >= 500 => Severity::Error,
        400..=499 => Severity::Warn,
        _ => Severity::Info,
    }
}

/// Resolves the severity of a finalized exchange.
#[derive(Clone, Default)]
pub struct LevelResolver {
    fixed: Option<Severity>,
    dynamic: Option<StatusLevelFn>,
}

impl LevelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always use `severity`, unless a status function is also set.
    pub fn fixed(mut self, severity: Severity) -> Self {
        self.fixed = Some(severity);
        self
    }

    /// Compute the severity from the final status code.
    pub fn dynamic<F>(mut self, f: F) -> Self
    where
        F: Fn(u16) -> Severity + Send + Sync + 'static,
    {
        self.dynamic = Some(Arc::new(f));
        self
    }

    pub fn resolve(&self, status: u16) -> Severity {
        if let Some(f) = &self.dynamic {
            return f(status);
        }
        self.fixed.unwrap_or_else(|| default_level_for_status(status))
    }
}

impl fmt::Debug for LevelResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelResolver")
            .field("fixed", &self.fixed)
            .field("dynamic", &self.dynamic.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mapping_by_status_class() {
        assert_eq!(default_level_for_status(503), Severity::Error);
        assert_eq!(default_level_for_status(500), Severity::Error);
        assert_eq!(default_level_for_status(404), Severity::Warn);
        assert_eq!(default_level_for_status(400), Severity::Warn);
        assert_eq!(default_level_for_status(201), Severity::Info);
        assert_eq!(default_level_for_status(302), Severity::Info);
        assert_eq!(default_level_for_status(0), Severity::Info);
    }

    #[test]
    fn fixed_override_replaces_default() {
        let resolver = LevelResolver::new().fixed(Severity::Debug);
        assert_eq!(resolver.resolve(500), Severity::Debug);
    }

    #[test]
    fn function_override_takes_precedence() {
        let resolver = LevelResolver::new()
            .fixed(Severity::Debug)
            .dynamic(|status| if status == 418 { Severity::Error } else { Severity::Trace });
        assert_eq!(resolver.resolve(418), Severity::Error);
        assert_eq!(resolver.resolve(200), Severity::Trace);
    }

    #[test]
    fn threshold_ordering() {
        assert!(Severity::Error.passes(Severity::Info));
        assert!(Severity::Info.passes(Severity::Info));
        assert!(!Severity::Debug.passes(Severity::Info));
    }

    #[test]
    fn parse_names() {
        assert_eq!("WARN".parse::<Severity>(), Ok(Severity::Warn));
        assert_eq!("warning".parse::<Severity>(), Ok(Severity::Warn));
        assert!("verbose".parse::<Severity>().is_err());
    }
}
