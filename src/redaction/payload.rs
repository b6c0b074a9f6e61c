//! Arbitrary value tree accepted by the redacting serializer.
//!
//! Composite nodes are shared handles, so a tree can alias itself and form
//! cycles. Identity is the address of the shared allocation.

use parking_lot::RwLock;
use serde_json::{Number, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A node of an arbitrary, possibly cyclic, value tree.
#[derive(Debug, Clone)]
pub enum Payload {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    List(SharedList),
    Map(SharedMap),
}

/// Shared, mutable sequence node.
#[derive(Clone, Default)]
pub struct SharedList(Arc<RwLock<Vec<Payload>>>);

impl SharedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Payload>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }

    pub fn push(&self, item: Payload) {
        self.0.write().push(item);
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Clones the direct children; nested composites stay shared.
    pub fn items(&self) -> Vec<Payload> {
        self.0.read().clone()
    }

    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for SharedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedList(#{:x}, len={})", self.id(), self.len())
    }
}

/// Shared, mutable key/value node. Keeps insertion order.
#[derive(Clone, Default)]
pub struct SharedMap(Arc<RwLock<Vec<(String, Payload)>>>);

impl SharedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`.
    pub fn insert(&self, key: impl Into<String>, value: Payload) {
        let key = key.into();
        let mut entries = self.0.write();
        match entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => entries.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Clones the direct entries; nested composites stay shared.
    pub fn entries(&self) -> Vec<(String, Payload)> {
        self.0.read().clone()
    }

    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for SharedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedMap(#{:x}, len={})", self.id(), self.len())
    }
}

/// A leaf with no JSON representation (non-finite float).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("value has no JSON representation: {0}")]
pub struct NotRepresentable(pub String);

impl Payload {
    pub fn map(entries: impl IntoIterator<Item = (String, Payload)>) -> Self {
        let map = SharedMap::new();
        for (key, value) in entries {
            map.insert(key, value);
        }
        Payload::Map(map)
    }

    pub fn list(items: impl IntoIterator<Item = Payload>) -> Self {
        Payload::List(SharedList::from_vec(items.into_iter().collect()))
    }

    /// Converts an acyclic tree to JSON. A cyclic tree recurses without bound;
    /// callers run it on redacted output only.
    pub fn to_json(&self) -> Result<Value, NotRepresentable> {
        Ok(match self {
            Payload::Null => Value::Null,
            Payload::Bool(b) => Value::Bool(*b),
            Payload::Int(i) => Value::from(*i),
            Payload::UInt(u) => Value::from(*u),
            Payload::Float(f) => Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| NotRepresentable(f.to_string()))?,
            Payload::Text(s) => Value::String(s.clone()),
            Payload::List(list) => Value::Array(
                list.items()
                    .iter()
                    .map(Payload::to_json)
                    .collect::<Result<_, _>>()?,
            ),
            Payload::Map(map) => {
                let mut out = serde_json::Map::new();
                for (key, value) in map.entries() {
                    out.insert(key, value.to_json()?);
                }
                Value::Object(out)
            }
        })
    }

    /// Best-effort text rendering that never fails: JSON-like, with
    /// non-finite floats spelled out and cycles cut.
    pub fn to_lossy_string(&self) -> String {
        let mut out = String::new();
        self.write_lossy(&mut out, &mut HashSet::new());
        out
    }

    fn write_lossy(&self, out: &mut String, seen: &mut HashSet<usize>) {
        match self {
            Payload::Null => out.push_str("null"),
            Payload::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Payload::Int(i) => out.push_str(&i.to_string()),
            Payload::UInt(u) => out.push_str(&u.to_string()),
            Payload::Float(f) => out.push_str(&f.to_string()),
            Payload::Text(s) => out.push_str(&Value::String(s.clone()).to_string()),
            Payload::List(list) => {
                if !seen.insert(list.id()) {
                    out.push_str("\"[Circular]\"");
                    return;
                }
                out.push('[');
                for (idx, item) in list.items().iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    item.write_lossy(out, seen);
                }
                out.push(']');
            }
            Payload::Map(map) => {
                if !seen.insert(map.id()) {
                    out.push_str("\"[Circular]\"");
                    return;
                }
                out.push('{');
                for (idx, (key, value)) in map.entries().iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    out.push_str(&Value::String(key.clone()).to_string());
                    out.push(':');
                    value.write_lossy(out, seen);
                }
                out.push('}');
            }
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::Null,
            Value::Bool(b) => Payload::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Payload::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Payload::UInt(u)
                } else {
                    Payload::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Payload::Text(s),
            Value::Array(items) => Payload::list(items.into_iter().map(Payload::from)),
            Value::Object(map) => Payload::map(map.into_iter().map(|(k, v)| (k, Payload::from(v)))),
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<bool> for Payload {
    fn from(b: bool) -> Self {
        Payload::Bool(b)
    }
}

impl From<i64> for Payload {
    fn from(i: i64) -> Self {
        Payload::Int(i)
    }
}

impl From<f64> for Payload {
    fn from(f: f64) -> Self {
        Payload::Float(f)
    }
}
