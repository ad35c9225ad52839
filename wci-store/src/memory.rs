//! In-process object store, used in tests and as a stand-in durable tier.

use crate::{validate_key, ObjectStore, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Cloneable in-memory store; clones share the same objects.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every object, simulating a cold tier.
    pub fn clear(&self) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.clear();
        }
    }
}

impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let objects = self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(objects.get(key).cloned())
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        let mut objects = self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        objects.insert(key.to_string(), body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = MemoryStore::new();
        store.put("wci/a.json", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.get("wci/a.json").await.unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.get("wci/b.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_objects() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.put("k", vec![1, 2, 3]).await.unwrap();
        assert_eq!(other.len(), 1);
        other.clear();
        assert!(store.is_empty());
    }
}
