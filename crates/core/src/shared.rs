//! Concurrency-safe maps shared by reference between call nodes.
//!
//! `shared_data`, `group_data` and `parallel_dict` are all a [`SharedMap`]:
//! cloning the handle never copies the entries, it hands out another
//! reference to the same store. Fan-out siblings may write concurrently.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A cheaply clonable handle to a concurrent `String -> Value` map.
#[derive(Clone, Default)]
pub struct SharedMap {
    inner: Arc<DashMap<String, Value>>,
}

impl SharedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Atomically read-modify-write one entry. `update` sees `Value::Null`
    /// when the key is absent.
    pub fn update<F>(&self, key: impl Into<String>, update: F) -> Value
    where
        F: FnOnce(&Value) -> Value,
    {
        let mut entry = self.inner.entry(key.into()).or_insert(Value::Null);
        let next = update(entry.value());
        *entry.value_mut() = next.clone();
        next
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Whether both handles refer to the same underlying store.
    pub fn same_instance(&self, other: &SharedMap) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for SharedMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_storage() {
        let a = SharedMap::new();
        let b = a.clone();
        b.insert("k", json!(1));
        assert_eq!(a.get("k"), Some(json!(1)));
        assert!(a.same_instance(&b));
        assert!(!a.same_instance(&SharedMap::new()));
    }

    #[test]
    fn update_starts_from_null() {
        let map = SharedMap::new();
        let next = map.update("count", |v| json!(v.as_i64().unwrap_or(0) + 1));
        assert_eq!(next, json!(1));
        map.update("count", |v| json!(v.as_i64().unwrap_or(0) + 1));
        assert_eq!(map.get("count"), Some(json!(2)));
    }

    #[tokio::test]
    async fn concurrent_writers_are_all_visible() {
        let map = SharedMap::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let map = map.clone();
            handles.push(tokio::spawn(async move {
                map.insert(format!("k{i}"), json!(i));
                map.update("total", |v| json!(v.as_i64().unwrap_or(0) + 1));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(map.len(), 17);
        assert_eq!(map.get("total"), Some(json!(16)));
    }
}
