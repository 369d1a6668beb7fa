//! State-key cache
//!
//! Maps a value-typed render state key to a lazily created backend object.
//! Entries are handed out as `Arc` so that two lookups with equal keys return
//! pointer-equal handles.

use crate::error::Result;
use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Lookup counters for one cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Number of `get_or_try_create` calls
    pub lookups: u64,
    /// Lookups served from the map
    pub hits: u64,
    /// Lookups that created a new object
    pub creations: u64,
}

impl CacheStats {
    pub fn misses(&self) -> u64 {
        self.lookups - self.hits
    }
}

/// Composite-key cache of backend objects
pub struct StateCache<K, V> {
    entries: FxHashMap<K, Arc<V>>,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V> StateCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            stats: CacheStats::default(),
        }
    }

    /// Return the cached object for `key`, building it with `create` on a miss
    ///
    /// A failed creation leaves the cache untouched.
    pub fn get_or_try_create<F>(&mut self, key: &K, create: F) -> Result<Arc<V>>
    where
        F: FnOnce(&K) -> Result<V>,
    {
        self.stats.lookups += 1;
        if let Some(value) = self.entries.get(key) {
            self.stats.hits += 1;
            return Ok(Arc::clone(value));
        }

        let value = Arc::new(create(key)?);
        self.stats.creations += 1;
        self.entries.insert(key.clone(), Arc::clone(&value));
        Ok(value)
    }

    pub fn get(&self, key: &K) -> Option<&Arc<V>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Keep only the entries matching `keep`
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.entries.retain(|key, _| keep(key));
    }

    /// Remove the entries matching `remove` and hand their objects back
    pub fn drain_where<F>(&mut self, mut remove: F) -> Vec<Arc<V>>
    where
        F: FnMut(&K) -> bool,
    {
        let keys: Vec<K> = self.entries.keys().filter(|key| remove(key)).cloned().collect();
        keys.iter().filter_map(|key| self.entries.remove(key)).collect()
    }

    /// Remove every entry and hand the objects back to the caller
    pub fn drain(&mut self) -> Vec<Arc<V>> {
        self.entries.drain().map(|(_, value)| value).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl<K: Eq + Hash + Clone, V> Default for StateCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "state_cache_tests.rs"]
mod tests;
