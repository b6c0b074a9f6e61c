//! Environment-aware gating.
//!
//! # Design Decisions
//! - Preset modes read the first set variable of [`ENVIRONMENT_SOURCES`]
//! - Values compare case-insensitively after trimming
//! - With no variable set, only `development` stays enabled; a custom rule
//!   uses its own fallback

use serde::{Deserialize, Serialize};

/// Variables consulted by the preset modes, in order.
pub const ENVIRONMENT_SOURCES: [&str; 4] = ["APP_ENV", "RUST_ENV", "ENVIRONMENT", "ENV"];

pub const DEVELOPMENT_VALUES: [&str; 3] = ["dev", "development", "local"];
pub const PRODUCTION_VALUES: [&str; 3] = ["prod", "production", "live"];
pub const TEST_VALUES: [&str; 4] = ["test", "testing", "qa", "staging"];

/// When logging is allowed to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EnvironmentGate {
    #[default]
    Always,
    Development,
    Production,
    Test,
    Custom {
        /// Variables to read, first set one wins.
        sources: Vec<String>,
        /// Accepted values.
        allow: Vec<String>,
        /// Result when none of `sources` is set.
        #[serde(default)]
        fallback: bool,
    },
}

impl EnvironmentGate {
    /// Evaluate against the process environment.
    pub fn is_enabled(&self) -> bool {
        self.is_enabled_with(|name| std::env::var(name).ok())
    }

    /// Evaluate against an arbitrary variable lookup.
    pub fn is_enabled_with<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            EnvironmentGate::Always => true,
            EnvironmentGate::Development => {
                evaluate(&ENVIRONMENT_SOURCES, &DEVELOPMENT_VALUES, true, lookup)
            }
            EnvironmentGate::Production => {
                evaluate(&ENVIRONMENT_SOURCES, &PRODUCTION_VALUES, false, lookup)
            }
            EnvironmentGate::Test => evaluate(&ENVIRONMENT_SOURCES, &TEST_VALUES, false, lookup),
            EnvironmentGate::Custom {
                sources,
                allow,
                fallback,
            } => evaluate(sources, allow, *fallback, lookup),
        }
    }
}

fn evaluate<S, A, F>(sources: &[S], allow: &[A], fallback: bool, lookup: F) -> bool
where
    S: AsRef<str>,
    A: AsRef<str>,
    F: Fn(&str) -> Option<String>,
{
    let value = sources.iter().find_map(|name| {
        lookup(name.as_ref())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    });

    match value {
        Some(value) => allow
            .iter()
            .any(|allowed| allowed.as_ref().trim().eq_ignore_ascii_case(&value)),
        None => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn custom_stage_rule() -> EnvironmentGate {
        EnvironmentGate::Custom {
            sources: vec!["DEPLOYMENT_STAGE".into()],
            allow: vec!["staging".into(), "qa".into()],
            fallback: false,
        }
    }

    #[test]
    fn always_is_enabled() {
        assert!(EnvironmentGate::Always.is_enabled_with(env(&[])));
    }

    #[test]
    fn custom_rule_matches_case_insensitively() {
        let gate = custom_stage_rule();
        assert!(gate.is_enabled_with(env(&[("DEPLOYMENT_STAGE", "STAGING")])));
        assert!(gate.is_enabled_with(env(&[("DEPLOYMENT_STAGE", " qa ")])));
        assert!(!gate.is_enabled_with(env(&[("DEPLOYMENT_STAGE", "production")])));
    }

    #[test]
    fn custom_rule_uses_fallback_when_unset() {
        assert!(!custom_stage_rule().is_enabled_with(env(&[])));
        let open = EnvironmentGate::Custom {
            sources: vec!["DEPLOYMENT_STAGE".into()],
            allow: vec!["qa".into()],
            fallback: true,
        };
        assert!(open.is_enabled_with(env(&[])));
    }

    #[test]
    fn presets_read_first_set_source() {
        let lookup = env(&[("RUST_ENV", "Production"), ("ENV", "dev")]);
        assert!(EnvironmentGate::Production.is_enabled_with(&lookup));
        assert!(!EnvironmentGate::Development.is_enabled_with(&lookup));
        assert!(!EnvironmentGate::Test.is_enabled_with(&lookup));
    }

    #[test]
    fn presets_without_variables() {
        assert!(EnvironmentGate::Development.is_enabled_with(env(&[])));
        assert!(!EnvironmentGate::Production.is_enabled_with(env(&[])));
        assert!(!EnvironmentGate::Test.is_enabled_with(env(&[])));
    }

    #[test]
    fn test_preset_accepts_staging() {
        assert!(EnvironmentGate::Test.is_enabled_with(env(&[("APP_ENV", "staging")])));
    }
}
