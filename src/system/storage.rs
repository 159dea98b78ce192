use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use slotmap::{Key, SlotMap};

// Internal data structure, protected by a lock.
struct StorageInner<Id: Key, K, T> {
    map: SlotMap<Id, (K, Arc<T>)>,
    lookup: FxHashMap<K, Id>,
}

impl<Id: Key, K, T> Default for StorageInner<Id, K, T> {
    fn default() -> Self {
        Self {
            map: SlotMap::default(),
            lookup: FxHashMap::default(),
        }
    }
}

/// Thread-safe registry of shared instances, deduplicated by identity key.
pub struct KeyedStorage<Id: Key, K, T> {
    inner: RwLock<StorageInner<Id, K, T>>,
}

impl<Id: Key, K: Hash + Eq + Clone, T> Default for KeyedStorage<Id, K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Key, K: Hash + Eq + Clone, T> KeyedStorage<Id, K, T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::default(),
        }
    }

    /// [Write] Returns the instance registered under `key`, creating it with
    /// `make` if there is none. `make` runs under the write lock.
    pub fn get_or_insert_with(&self, key: &K, make: impl FnOnce() -> Arc<T>) -> Arc<T> {
        let mut guard = self.inner.write();
        if let Some(&id) = guard.lookup.get(key) {
            if let Some((_, value)) = guard.map.get(id) {
                return Arc::clone(value);
            }
        }
        let value = make();
        let id = guard.map.insert((key.clone(), Arc::clone(&value)));
        guard.lookup.insert(key.clone(), id);
        value
    }

    /// [Read] Gets the instance registered under `key`.
    pub fn get_by_key(&self, key: &K) -> Option<Arc<T>> {
        let guard = self.inner.read();
        let id = guard.lookup.get(key)?;
        guard.map.get(*id).map(|(_, value)| Arc::clone(value))
    }

    /// [Read] Snapshot of every instance, so callers can drive them without
    /// holding the lock.
    pub fn values(&self) -> Vec<Arc<T>> {
        let guard = self.inner.read();
        guard.map.values().map(|(_, value)| Arc::clone(value)).collect()
    }

    /// [Write] Removes and returns every instance matching `predicate`.
    pub fn remove_where(&self, mut predicate: impl FnMut(&T) -> bool) -> Vec<Arc<T>> {
        let mut guard = self.inner.write();
        let doomed: Vec<Id> = guard
            .map
            .iter()
            .filter(|(_, (_, value))| predicate(value))
            .map(|(id, _)| id)
            .collect();

        let mut removed = Vec::with_capacity(doomed.len());
        for id in doomed {
            if let Some((key, value)) = guard.map.remove(id) {
                guard.lookup.remove(&key);
                removed.push(value);
            }
        }
        removed
    }

    /// [Write] Removes and returns everything.
    pub fn drain(&self) -> Vec<Arc<T>> {
        let mut guard = self.inner.write();
        guard.lookup.clear();
        guard.map.drain().map(|(_, (_, value))| value).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
