//! Generic in-memory read-model storage.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

/// Keyed in-memory store backing a read-model projection.
///
/// Short map-level critical sections only; per-entry semantics are enough
/// for the projections built on top.
#[derive(Debug)]
pub struct InMemoryStore<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for InMemoryStore<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> InMemoryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().ok()?.get(key).cloned()
    }

    pub fn upsert(&self, key: K, value: V) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, value);
        }
    }

    pub fn list(&self) -> Vec<V> {
        self.entries
            .read()
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    /// First value matching the predicate (iteration order unspecified).
    pub fn find(&self, pred: impl Fn(&V) -> bool) -> Option<V> {
        self.entries
            .read()
            .ok()?
            .values()
            .find(|v| pred(v))
            .cloned()
    }

    /// All values matching the predicate.
    pub fn filter(&self, pred: impl Fn(&V) -> bool) -> Vec<V> {
        self.entries
            .read()
            .map(|entries| entries.values().filter(|v| pred(v)).cloned().collect())
            .unwrap_or_default()
    }
}
