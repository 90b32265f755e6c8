//! Sharded Table
//!
//! Concurrent key table for the memory tier. Each shard owns its own
//! `RwLock`, so lookups on different shards never contend.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::key::CacheKey;

/// Values stored in a [`ShardedTable`] report their own byte cost
pub trait Weighted {
    /// Cost of this value in bytes
    fn weight(&self) -> u64;
}

/// Single shard containing a hashmap and its running totals
pub struct Shard<V> {
    map: RwLock<HashMap<CacheKey, V>>,
    /// Total weight of values in this shard
    weight: AtomicU64,
}

impl<V> Default for Shard<V> {
    fn default() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            weight: AtomicU64::new(0),
        }
    }
}

impl<V: Weighted + Clone> Shard<V> {
    /// Get a clone of a value
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.map.read().get(key).cloned()
    }

    /// Insert a value, returning the replaced one
    pub fn insert(&self, key: CacheKey, value: V) -> Option<V> {
        // Totals move under the write lock so they never go transiently negative
        let mut guard = self.map.write();
        self.weight.fetch_add(value.weight(), Ordering::Relaxed);
        let old = guard.insert(key, value);
        if let Some(old) = &old {
            self.weight.fetch_sub(old.weight(), Ordering::Relaxed);
        }
        old
    }

    /// Remove a value
    pub fn remove(&self, key: &CacheKey) -> Option<V> {
        let mut guard = self.map.write();
        let removed = guard.remove(key);
        if let Some(v) = &removed {
            self.weight.fetch_sub(v.weight(), Ordering::Relaxed);
        }
        removed
    }

    /// Snapshot all entries (for eviction scans)
    pub fn entries(&self) -> Vec<(CacheKey, V)> {
        self.map
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Total weight in bytes
    pub fn weight(&self) -> u64 {
        self.weight.load(Ordering::Relaxed)
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut guard = self.map.write();
        guard.clear();
        self.weight.store(0, Ordering::Relaxed);
    }
}

/// Table split into `N` independently locked shards
pub struct ShardedTable<V, const N: usize> {
    shards: Box<[Shard<V>]>,
}

impl<V, const N: usize> Default for ShardedTable<V, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, const N: usize> ShardedTable<V, N> {
    /// Create an empty table
    pub fn new() -> Self {
        assert!(N.is_power_of_two(), "shard count must be a power of two");
        Self {
            shards: (0..N).map(|_| Shard::default()).collect(),
        }
    }

    #[inline]
    fn shard_for(&self, key: &CacheKey) -> &Shard<V> {
        &self.shards[key.shard_index(N)]
    }

    /// Iterate over shards
    pub fn shards(&self) -> impl Iterator<Item = &Shard<V>> {
        self.shards.iter()
    }
}

impl<V: Weighted + Clone, const N: usize> ShardedTable<V, N> {
    /// Get a value
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.shard_for(key).get(key)
    }

    /// Check whether a key is present
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.shard_for(key).map.read().contains_key(key)
    }

    /// Insert a value
    pub fn insert(&self, key: CacheKey, value: V) -> Option<V> {
        self.shard_for(&key).insert(key, value)
    }

    /// Remove a value
    pub fn remove(&self, key: &CacheKey) -> Option<V> {
        self.shard_for(key).remove(key)
    }

    /// Total entries across shards
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    /// Whether every shard is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total weight across shards
    pub fn weight(&self) -> u64 {
        self.shards.iter().map(|s| s.weight()).sum()
    }

    /// Clear every shard
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.clear();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Blob(u64);

    impl Weighted for Blob {
        fn weight(&self) -> u64 {
            self.0
        }
    }

    fn key(i: usize) -> CacheKey {
        CacheKey::from_normalized(&format!("https://img.example.com/{}.png", i))
    }

    #[test]
    fn test_insert_tracks_weight() {
        let table: ShardedTable<Blob, 8> = ShardedTable::new();

        table.insert(key(1), Blob(100));
        table.insert(key(2), Blob(50));
        assert_eq!(table.len(), 2);
        assert_eq!(table.weight(), 150);

        // Replacing adjusts by the delta
        table.insert(key(1), Blob(10));
        assert_eq!(table.len(), 2);
        assert_eq!(table.weight(), 60);
    }

    #[test]
    fn test_remove_and_clear() {
        let table: ShardedTable<Blob, 8> = ShardedTable::new();
        table.insert(key(1), Blob(100));
        table.insert(key(2), Blob(50));

        assert_eq!(table.remove(&key(1)), Some(Blob(100)));
        assert_eq!(table.remove(&key(1)), None);
        assert_eq!(table.weight(), 50);
        assert!(table.contains_key(&key(2)));

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.weight(), 0);
    }

    #[test]
    fn test_entries_spread_over_shards() {
        let table: ShardedTable<Blob, 16> = ShardedTable::new();
        for i in 0..1000 {
            table.insert(key(i), Blob(1));
        }

        let max = table.shards().map(|s| s.len()).max().unwrap();
        assert!(max < 200, "uneven shard distribution: max = {}", max);
    }
}
