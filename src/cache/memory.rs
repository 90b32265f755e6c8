//! Memory Cache - In-Process Hot Tier
//!
//! Decoded images keyed by [`CacheKey`], bounded by a byte-cost budget.
//!
//! # Design
//!
//! - Sharded table, so the calling-thread fast path and the serial worker can
//!   read and write concurrently
//! - Cost of each entry is supplied by the image decoder
//! - Watermark eviction: once usage crosses the high watermark, least recently
//!   used entries are dropped until usage falls below the low watermark
//! - Eviction is best-effort and silent

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::key::CacheKey;
use super::shard::{ShardedTable, Weighted};
use super::size::ByteCount;
use super::{DEFAULT_MEMORY_CAPACITY, MEMORY_SHARD_COUNT};

/// Memory cache configuration
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum total cost
    pub capacity: ByteCount,
    /// Usage fraction that triggers eviction
    pub high_watermark: f64,
    /// Usage fraction eviction stops at
    pub low_watermark: f64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MEMORY_CAPACITY,
            high_watermark: 0.90,
            low_watermark: 0.80,
        }
    }
}

/// Table value: the decoded image plus its bookkeeping
struct MemoryEntry<I> {
    image: Arc<I>,
    cost: u64,
    /// Logical clock value of the last access
    last_access: Arc<AtomicU64>,
}

impl<I> Clone for MemoryEntry<I> {
    fn clone(&self) -> Self {
        Self {
            image: Arc::clone(&self.image),
            cost: self.cost,
            last_access: Arc::clone(&self.last_access),
        }
    }
}

impl<I> Weighted for MemoryEntry<I> {
    fn weight(&self) -> u64 {
        self.cost
    }
}

/// Bounded, thread-safe memory tier
pub struct MemoryCache<I> {
    table: ShardedTable<MemoryEntry<I>, MEMORY_SHARD_COUNT>,
    config: MemoryCacheConfig,
    /// Logical clock for recency ordering
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<I> MemoryCache<I> {
    /// Create a memory cache with default configuration
    pub fn new() -> Self {
        Self::with_config(MemoryCacheConfig::default())
    }

    /// Create a memory cache with custom configuration
    pub fn with_config(config: MemoryCacheConfig) -> Self {
        Self {
            table: ShardedTable::new(),
            config,
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    #[inline]
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Look up a decoded image
    pub fn lookup(&self, key: &CacheKey) -> Option<Arc<I>> {
        match self.table.get(key) {
            Some(entry) => {
                entry.last_access.store(self.tick(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.image)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a decoded image with the given cost.
    ///
    /// Returns `false` when the image alone exceeds the whole budget.
    pub fn store(&self, key: CacheKey, image: Arc<I>, cost: u64) -> bool {
        if cost > self.config.capacity.as_u64() {
            debug!(key = %key, cost, "image larger than memory budget, not cached");
            return false;
        }

        let entry = MemoryEntry {
            image,
            cost,
            last_access: Arc::new(AtomicU64::new(self.tick())),
        };
        self.table.insert(key.clone(), entry);

        if self.should_evict() {
            self.evict(&key);
        }
        true
    }

    /// Drop an entry; returns whether one was present
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.table.remove(key).is_some()
    }

    /// Whether a key is cached (does not count as an access)
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.table.contains_key(key)
    }

    fn usage(&self) -> f64 {
        let capacity = self.config.capacity.as_u64();
        if capacity == 0 {
            return f64::INFINITY;
        }
        self.size() as f64 / capacity as f64
    }

    fn should_evict(&self) -> bool {
        self.usage() > self.config.high_watermark
    }

    /// Evict least recently used entries down to the low watermark.
    ///
    /// `keep` is the entry that triggered eviction; it is never a candidate.
    fn evict(&self, keep: &CacheKey) {
        let mut candidates: Vec<(CacheKey, u64)> = self
            .table
            .shards()
            .flat_map(|shard| shard.entries())
            .filter(|(key, _)| key != keep)
            .map(|(key, entry)| {
                let last = entry.last_access.load(Ordering::Relaxed);
                (key, last)
            })
            .collect();

        candidates.sort_by_key(|(_, last)| *last);

        let mut evicted = 0u64;
        for (key, _) in candidates {
            if self.usage() <= self.config.low_watermark {
                break;
            }
            if self.table.remove(&key).is_some() {
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
            debug!(evicted, size = self.size(), "memory cache eviction");
        }
    }

    /// Current total cost in bytes
    pub fn size(&self) -> u64 {
        self.table.weight()
    }

    /// Configured budget
    pub fn capacity(&self) -> ByteCount {
        self.config.capacity
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.table.clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> MemoryStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        MemoryStats {
            size: self.size(),
            capacity: self.config.capacity.as_u64(),
            entries: self.len(),
            hits,
            misses,
            hit_ratio: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl<I> Default for MemoryCache<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Memory cache statistics
#[derive(Debug, Clone)]
pub struct MemoryStats {
    /// Current cost in bytes
    pub size: u64,
    /// Budget in bytes
    pub capacity: u64,
    /// Number of entries
    pub entries: usize,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Hit ratio (0.0 - 1.0)
    pub hit_ratio: f64,
    /// Eviction count
    pub evictions: u64,
}

// =============================================================================
// Tests
// =============================================================================
