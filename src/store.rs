//! Object-store contract for binary tool outputs.
//!
//! Tools that declare non-JSON response mime types have their bodies written
//! to an injected store; the output slot then records the blob's name, mime
//! type, and URL instead of the body itself.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, name: &str, body: Bytes) -> anyhow::Result<()>;

    /// Base URL blobs are reachable under; joined with the object name.
    fn root_url(&self) -> String;
}

/// Process-local store. The default when no store is injected, and the
/// test double.
pub struct InMemoryStore {
    root: String,
    objects: Mutex<HashMap<String, Bytes>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            root: "memory://".to_string(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.objects.lock().expect("store lock poisoned").get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put(&self, name: &str, body: Bytes) -> anyhow::Result<()> {
        self.objects
            .lock()
            .expect("store lock poisoned")
            .insert(name.to_string(), body);
        Ok(())
    }

    fn root_url(&self) -> String {
        self.root.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryStore::new();
        store.put("report.pdf", Bytes::from_static(b"%PDF")).await.unwrap();

        assert_eq!(store.get("report.pdf"), Some(Bytes::from_static(b"%PDF")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.root_url(), "memory://");
    }
}
