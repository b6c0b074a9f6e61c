//! Recursive redaction with cycle cutting and a length bound.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::redaction::payload::{Payload, SharedList, SharedMap};

pub const REDACTED: &str = "[REDACTED]";
pub const CIRCULAR: &str = "[Circular]";
pub const ELLIPSIS: char = '…';

/// Case-insensitive set of keys whose values are masked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskedKeys(HashSet<String>);

impl MaskedKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(keys.into_iter().map(|k| k.as_ref().to_lowercase()).collect())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(&key.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Serializer output: the redacted value when it encoded cleanly and fit
/// the bound, otherwise its text form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Serialized {
    Structured(Value),
    Text(String),
}

impl Serialized {
    pub fn into_value(self) -> Value {
        match self {
            Serialized::Structured(v) => v,
            Serialized::Text(s) => Value::String(s),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Serialized::Text(_))
    }
}

/// Redacting, size-bounded serializer for untrusted payloads.
#[derive(Debug, Clone)]
pub struct RedactingSerializer {
    masked: MaskedKeys,
    max_length: usize,
}

impl RedactingSerializer {
    pub fn new(masked: MaskedKeys, max_length: usize) -> Self {
        Self { masked, max_length }
    }

    pub fn masked_keys(&self) -> &MaskedKeys {
        &self.masked
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn serialize(&self, value: &Payload) -> Serialized {
        let shape = redact(value, &self.masked);

        let (text, structured) = match &shape {
            Payload::Text(s) => (s.clone(), Some(Value::String(s.clone()))),
            other => match other.to_json() {
                Ok(json) => (json.to_string(), Some(json)),
                Err(e) => {
                    tracing::debug!(error = %e, "Body not JSON-encodable, using text form");
                    (other.to_lossy_string(), None)
                }
            },
        };

        if text.chars().count() > self.max_length {
            let mut truncated: String = text.chars().take(self.max_length).collect();
            truncated.push(ELLIPSIS);
            return Serialized::Text(truncated);
        }

        match structured {
            Some(json) => Serialized::Structured(json),
            None => Serialized::Text(text),
        }
    }
}

/// Depth-first copy of `value` with masked keys replaced and revisited
/// composites replaced by [`CIRCULAR`]. Visited identities live only for
/// this call.
pub fn redact(value: &Payload, masked: &MaskedKeys) -> Payload {
    let mut visited = HashSet::new();
    walk(value, masked, &mut visited)
}

fn walk(value: &Payload, masked: &MaskedKeys, visited: &mut HashSet<usize>) -> Payload {
    match value {
        Payload::List(list) => {
            if !visited.insert(list.id()) {
                return Payload::Text(CIRCULAR.to_string());
            }
            walk_list(list, masked, visited)
        }
        Payload::Map(map) => {
            if !visited.insert(map.id()) {
                return Payload::Text(CIRCULAR.to_string());
            }
            walk_map(map, masked, visited)
        }
        leaf => leaf.clone(),
    }
}

fn walk_list(list: &SharedList, masked: &MaskedKeys, visited: &mut HashSet<usize>) -> Payload {
    Payload::list(
        list.items()
            .iter()
            .map(|item| walk(item, masked, visited))
            .collect::<Vec<_>>(),
    )
}

fn walk_map(map: &SharedMap, masked: &MaskedKeys, visited: &mut HashSet<usize>) -> Payload {
    let entries: Vec<(String, Payload)> = map
        .entries()
        .into_iter()
        .map(|(key, value)| {
            if masked.contains(&key) {
                (key, Payload::Text(REDACTED.to_string()))
            } else {
                let redacted = walk(&value, masked, visited);
                (key, redacted)
            }
        })
        .collect();
    Payload::map(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn serializer(keys: &[&str], max: usize) -> RedactingSerializer {
        RedactingSerializer::new(MaskedKeys::new(keys), max)
    }

    #[test]
    fn masks_listed_key() {
        let body = Payload::from(json!({"email": "a@b.c", "password": "hunter2"}));
        let out = serializer(&["password"], 1000).serialize(&body);
        assert_eq!(
            out,
            Serialized::Structured(json!({"email": "a@b.c", "password": "[REDACTED]"}))
        );
    }

    #[test]
    fn masks_at_every_depth_and_inside_lists() {
        let body = Payload::from(json!({
            "Token": "t0",
            "users": [{"name": "x", "TOKEN": "t1"}, {"nested": {"token": {"deep": true}}}]
        }));
        let out = serializer(&["token"], 10_000).serialize(&body).into_value();
        assert_eq!(
            out,
            json!({
                "Token": "[REDACTED]",
                "users": [{"name": "x", "TOKEN": "[REDACTED]"}, {"nested": {"token": "[REDACTED]"}}]
            })
        );
    }

    #[test]
    fn self_reference_becomes_circular() {
        let map = SharedMap::new();
        map.insert("name", Payload::from("root"));
        map.insert("self", Payload::Map(map.clone()));
        let out = serializer(&[], 1000).serialize(&Payload::Map(map)).into_value();
        assert_eq!(out, json!({"name": "root", "self": "[Circular]"}));
    }

    #[test]
    fn cycle_through_list_terminates() {
        let list = SharedList::new();
        let map = SharedMap::new();
        map.insert("parent", Payload::List(list.clone()));
        list.push(Payload::Map(map));
        let out = serializer(&[], 1000).serialize(&Payload::List(list)).into_value();
        assert_eq!(out, json!([{"parent": "[Circular]"}]));
    }

    #[test]
    fn masked_value_is_not_walked() {
        let map = SharedMap::new();
        map.insert("secret", Payload::Map(map.clone()));
        let out = serializer(&["secret"], 1000).serialize(&Payload::Map(map)).into_value();
        assert_eq!(out, json!({"secret": "[REDACTED]"}));
    }

    #[test]
    fn truncates_to_bound_plus_ellipsis() {
        let body = Payload::from(json!({"data": "x".repeat(100)}));
        let out = serializer(&[], 20).serialize(&body);
        match out {
            Serialized::Text(text) => {
                assert_eq!(text.chars().count(), 21);
                assert!(text.starts_with("{\"data\":\"xxxx"));
                assert!(text.ends_with(ELLIPSIS));
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn string_body_is_used_as_is() {
        let out = serializer(&["password"], 100).serialize(&Payload::from("password=1"));
        assert_eq!(out, Serialized::Structured(json!("password=1")));

        let long = serializer(&[], 4).serialize(&Payload::from("abcdefgh"));
        assert_eq!(long, Serialized::Text("abcd…".to_string()));
    }

    #[test]
    fn unencodable_leaf_falls_back_to_text() {
        let body = Payload::map([("ratio".to_string(), Payload::Float(f64::NAN))]);
        let out = serializer(&[], 100).serialize(&body);
        assert_eq!(out, Serialized::Text("{\"ratio\":NaN}".to_string()));
    }

    #[test]
    fn primitives_pass_through() {
        let out = serializer(&["x"], 100).serialize(&Payload::Int(42));
        assert_eq!(out, Serialized::Structured(json!(42)));
    }
}
