//! Pipeline memory: an insertion-ordered `String -> JSON` map.
//!
//! Memory carries pipeline state between transitions. It is seeded from
//! `initial_memory`, then the caller-supplied memory, then trigger params
//! (later operands win) and mutated only
//! by the output dispatcher; reads during streaming observe the values
//! committed by prior outputs, never the output currently being produced.

use serde_json::{Map, Value};

/// Ordered key -> JSON value mapping owned by one orchestrator instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Memory {
    entries: Map<String, Value>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build memory from a JSON object. Non-object values are ignored.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(entries) => Self { entries },
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns the stored value, or `default` if the key is absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.entries.get(key).cloned().unwrap_or(default)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Push `value` onto the list stored at `key`, creating an empty list
    /// first when the key is absent or holds a non-list value.
    pub fn append(&mut self, key: &str, value: Value) {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
        if let Value::Array(items) = entry {
            items.push(value);
        }
    }

    /// Discard a slot entirely. Used when a failed output is rolled back to
    /// "never written"; pipeline operations themselves only set or append.
    pub(crate) fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Overlay merge: every entry of `overlay` wins over the current value.
    pub fn merge(&mut self, overlay: Value) {
        if let Value::Object(overlay) = overlay {
            for (key, value) in overlay {
                self.entries.insert(key, value);
            }
        }
    }

    /// Stable snapshot of the whole map as a JSON object.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.entries.clone())
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Map<String, Value>> for Memory {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}
