//! Header normalization for log entries.
//!
//! # Design Decisions
//! - `true` with no headers yields an empty map, so "enabled but empty"
//!   stays distinguishable from "disabled"
//! - An allow-list that matches nothing yields `None`
//! - Repeated headers are joined with `", "`

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lower-cased header name → value.
pub type NormalizedHeaders = BTreeMap<String, String>;

/// Whether, and which, headers are copied into an entry.
///
/// Deserializes from `true`, `false`, or a list of header names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum HeaderInclusion {
    Flag(bool),
    Only(Vec<String>),
}

impl Default for HeaderInclusion {
    fn default() -> Self {
        HeaderInclusion::Flag(false)
    }
}

impl HeaderInclusion {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, HeaderInclusion::Flag(false))
    }
}

impl From<bool> for HeaderInclusion {
    fn from(flag: bool) -> Self {
        HeaderInclusion::Flag(flag)
    }
}

/// Normalize `(name, value)` pairs according to `include`.
pub fn normalize<I, K, V>(headers: I, include: &HeaderInclusion) -> Option<NormalizedHeaders>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    match include {
        HeaderInclusion::Flag(false) => None,
        HeaderInclusion::Flag(true) => Some(collect(headers, |_| true)),
        HeaderInclusion::Only(allow) => {
            let allow: Vec<String> = allow.iter().map(|name| name.to_lowercase()).collect();
            let kept = collect(headers, |name| allow.iter().any(|a| a == name));
            if kept.is_empty() {
                None
            } else {
                Some(kept)
            }
        }
    }
}

/// [`normalize`] over an `http` header map. Non UTF-8 values are decoded
/// lossily.
pub fn normalize_header_map(headers: &HeaderMap, include: &HeaderInclusion) -> Option<NormalizedHeaders> {
    if !include.is_enabled() {
        return None;
    }
    normalize(
        headers.iter().map(|(name, value)| {
            (
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        }),
        include,
    )
}

fn collect<I, K, V>(headers: I, keep: impl Fn(&str) -> bool) -> NormalizedHeaders
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = NormalizedHeaders::new();
    for (name, value) in headers {
        let name = name.as_ref().to_lowercase();
        if !keep(&name) {
            continue;
        }
        out.entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value.as_ref());
            })
            .or_insert_with(|| value.as_ref().to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const NONE: [(&str, &str); 0] = [];

    #[test]
    fn disabled_is_always_none() {
        assert_eq!(normalize([("Host", "a")], &HeaderInclusion::Flag(false)), None);
        assert_eq!(normalize(NONE, &HeaderInclusion::Flag(false)), None);
    }

    #[test]
    fn enabled_with_no_headers_is_empty_map() {
        assert_eq!(normalize(NONE, &HeaderInclusion::Flag(true)), Some(NormalizedHeaders::new()));
    }

    #[test]
    fn enabled_lowercases_keys() {
        let out = normalize([("Content-Type", "text/plain"), ("X-Trace", "1")], &true.into()).unwrap();
        assert_eq!(out.get("content-type").map(String::as_str), Some("text/plain"));
        assert_eq!(out.get("x-trace").map(String::as_str), Some("1"));
    }

    #[test]
    fn allow_list_is_case_insensitive() {
        let include = HeaderInclusion::Only(vec!["User-Agent".into()]);
        let out = normalize([("USER-AGENT", "curl"), ("Cookie", "s=1")], &include).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out["user-agent"], "curl");
    }

    #[test]
    fn allow_list_without_match_is_none() {
        let include = HeaderInclusion::Only(vec!["x-missing".into()]);
        assert_eq!(normalize([("Host", "a")], &include), None);
        assert_eq!(normalize(NONE, &include), None);
    }

    #[test]
    fn repeated_header_values_are_joined() {
        let mut map = HeaderMap::new();
        map.append("accept", HeaderValue::from_static("text/html"));
        map.append("accept", HeaderValue::from_static("application/json"));
        let out = normalize_header_map(&map, &true.into()).unwrap();
        assert_eq!(out["accept"], "text/html, application/json");
    }

    #[test]
    fn deserializes_flag_or_list() {
        #[derive(Deserialize)]
        struct Wrapper {
            include: HeaderInclusion,
        }
        let flag: Wrapper = toml::from_str("include = true").unwrap();
        assert_eq!(flag.include, HeaderInclusion::Flag(true));
        let list: Wrapper = toml::from_str("include = [\"host\"]").unwrap();
        assert_eq!(list.include, HeaderInclusion::Only(vec!["host".into()]));
    }
}
