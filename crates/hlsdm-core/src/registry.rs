//! Id-keyed record store.
//!
//! Each record is owned by exactly one registry entry and is shared out as
//! an `Arc`; mutable state inside a record carries its own lock, so the map
//! lock is only held for lookup/insert/remove.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Store of records of type `V` keyed by ids minted from a private counter.
#[derive(Debug)]
pub struct Registry<K, V> {
    next_id: AtomicU64,
    entries: RwLock<HashMap<K, Arc<V>>>,
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Registry<K, V>
where
    K: Copy + Eq + Hash + From<u64>,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh id without inserting anything.
    pub fn next_id(&self) -> K {
        K::from(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Mint an id, build the record from it, and insert it.
    pub fn insert_with(&self, build: impl FnOnce(K) -> V) -> (K, Arc<V>) {
        let id = self.next_id();
        let record = Arc::new(build(id));
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Arc::clone(&record));
        (id, record)
    }

    pub fn get(&self, id: &K) -> Option<Arc<V>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &K) -> Option<Arc<V>> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }

    /// Remove `id` only if `pred` holds for its record.
    pub fn remove_if(&self, id: &K, pred: impl FnOnce(&V) -> bool) -> Option<Arc<V>> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.get(id) {
            Some(v) if pred(v) => entries.remove(id),
            _ => None,
        }
    }

    /// All records, ordered by id.
    pub fn entries(&self) -> Vec<(K, Arc<V>)>
    where
        K: Ord,
    {
        let mut all: Vec<(K, Arc<V>)> = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (*k, Arc::clone(v)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
