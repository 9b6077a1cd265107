//! User-defined function registry.
//!
//! A `udf` output invokes a function registered by name with the current
//! memory and stores whatever it returns. Functions run in-process with full
//! access to pipeline state; registering one is an explicit opt-in.

use crate::memory::Memory;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub type UdfFn = Arc<dyn Fn(&Memory) -> Value + Send + Sync>;

#[derive(Clone, Default)]
pub struct UdfRegistry {
    functions: HashMap<String, UdfFn>,
}

impl UdfRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&Memory) -> Value + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<UdfFn> {
        self.functions.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registered_function_reads_memory() {
        let mut registry = UdfRegistry::new();
        registry.register("double", |memory: &Memory| {
            let text = memory
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            json!(format!("{text}{text}"))
        });

        let mut memory = Memory::new();
        memory.set("text", json!("ab"));

        let function = registry.get("double").unwrap();
        assert_eq!(function(&memory), json!("abab"));
        assert!(registry.get("missing").is_none());
    }
}
