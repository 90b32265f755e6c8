//! Disk Cache - Persistent Warm Tier
//!
//! Raw image bytes persisted through a [`DiskStore`], decoded lazily on read.
//!
//! # Design
//!
//! - Every entry expires `max_age` after it was written (24h by default);
//!   the freshness check on read is authoritative
//! - `invalidate` writes a zero-freshness marker instead of deleting
//! - Size index rebuilt from the store's records on first use, so capacity
//!   holds across restarts
//! - Capacity eviction drops expired entries first, then least recently used
//! - Store and decode failures degrade to a miss
//!
//! The cache is owned by the coordinator's serial worker and is not
//! synchronized itself; every operation takes `&mut self`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::entry::DiskRecord;
use super::key::CacheKey;
use super::size::ByteCount;
use super::{DEFAULT_DISK_CAPACITY, DEFAULT_DISK_MAX_AGE};
use crate::domain::{DiskStore, ImageDecoder};

/// Disk cache configuration
#[derive(Debug, Clone)]
pub struct DiskCacheConfig {
    /// Maximum total payload bytes
    pub capacity: ByteCount,
    /// Freshness window applied to every write
    pub max_age: Duration,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_DISK_CAPACITY,
            max_age: DEFAULT_DISK_MAX_AGE,
        }
    }
}

/// Index entry for a persisted payload
#[derive(Debug, Clone)]
struct IndexEntry {
    size: u64,
    expires_at: DateTime<Utc>,
    /// Logical clock value of the last read or write
    last_access: u64,
}

/// Disk tier over a pluggable persistent store
pub struct DiskCache<D: ImageDecoder> {
    store: Arc<dyn DiskStore>,
    decoder: Arc<D>,
    config: DiskCacheConfig,
    /// Loaded from the store on first use
    index: Option<HashMap<CacheKey, IndexEntry>>,
    current_size: u64,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<D: ImageDecoder> DiskCache<D> {
    /// Create a disk cache over `store`
    pub fn new(store: Arc<dyn DiskStore>, decoder: Arc<D>, config: DiskCacheConfig) -> Self {
        Self {
            store,
            decoder,
            config,
            index: None,
            current_size: 0,
            clock: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Load the size index from the store if not done yet
    async fn ensure_index(&mut self) {
        if self.index.is_some() {
            return;
        }

        let mut records = match self.store.records().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "failed to list disk cache records, starting empty");
                Vec::new()
            }
        };
        // Oldest writes become the least recently used
        records.sort_by_key(|r| r.stored_at);

        let mut index = HashMap::with_capacity(records.len());
        let mut size = 0u64;
        for record in records {
            self.clock += 1;
            size += record.size;
            let previous = index.insert(
                record.cache_key(),
                IndexEntry {
                    size: record.size,
                    expires_at: record.expires_at(),
                    last_access: self.clock,
                },
            );
            if let Some(previous) = previous {
                size -= previous.size;
            }
        }

        debug!(entries = index.len(), size, "disk cache index loaded");
        self.current_size = size;
        self.index = Some(index);
    }

    fn index_remove(&mut self, key: &CacheKey) {
        if let Some(entry) = self.index.as_mut().and_then(|index| index.remove(key)) {
            self.current_size -= entry.size;
        }
    }

    fn index_insert(&mut self, key: CacheKey, entry: IndexEntry) {
        let size = entry.size;
        if let Some(previous) = self.index.get_or_insert_with(HashMap::new).insert(key, entry) {
            self.current_size -= previous.size;
        }
        self.current_size += size;
    }

    /// Delete an entry from the store and the index, logging failures
    async fn discard(&mut self, key: &CacheKey) {
        if let Err(e) = self.store.remove(key).await {
            warn!(key = %key, error = %e, "failed to delete disk cache entry");
        }
        self.index_remove(key);
    }

    /// Look up and decode a fresh entry
    pub async fn lookup(&mut self, key: &CacheKey) -> Option<Arc<D::Image>> {
        self.ensure_index().await;

        let entry = match self.store.read(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.index_remove(key);
                self.misses += 1;
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "disk cache read failed");
                self.discard(key).await;
                self.misses += 1;
                return None;
            }
        };

        if entry.record.key != key.as_str() {
            // Foreign record under a colliding file name; leave it alone
            self.misses += 1;
            return None;
        }

        if !entry.record.is_fresh(Utc::now()) {
            debug!(key = %key, "disk cache entry expired");
            self.discard(key).await;
            self.misses += 1;
            return None;
        }

        match self.decoder.decode(&entry.data) {
            Ok(image) => {
                let tick = self.tick();
                if let Some(indexed) = self.index.as_mut().and_then(|index| index.get_mut(key)) {
                    indexed.last_access = tick;
                }
                self.hits += 1;
                Some(Arc::new(image))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "corrupt disk cache entry");
                self.discard(key).await;
                self.misses += 1;
                None
            }
        }
    }

    /// Persist raw bytes for a key with a fresh expiry window.
    ///
    /// Returns `false` if the payload was not written.
    pub async fn store(&mut self, key: &CacheKey, data: Bytes) -> bool {
        let size = data.len() as u64;
        if size > self.config.capacity.as_u64() {
            debug!(key = %key, size, "payload larger than disk budget, not cached");
            return false;
        }

        self.ensure_index().await;
        self.make_room(key, size).await;

        let now = Utc::now();
        let record = DiskRecord::new(key, size, self.config.max_age, now);
        if let Err(e) = self.store.write(&record, data).await {
            warn!(key = %key, error = %e, "disk cache write failed");
            return false;
        }

        let tick = self.tick();
        self.index_insert(
            key.clone(),
            IndexEntry {
                size,
                expires_at: record.expires_at(),
                last_access: tick,
            },
        );
        true
    }

    /// Mark an entry stale so later lookups miss
    pub async fn invalidate(&mut self, key: &CacheKey) {
        self.ensure_index().await;

        let marker = DiskRecord::invalidated(key, Utc::now());
        if let Err(e) = self.store.write(&marker, Bytes::new()).await {
            warn!(key = %key, error = %e, "failed to write disk invalidation marker");
            return;
        }

        let tick = self.tick();
        self.index_insert(
            key.clone(),
            IndexEntry {
                size: 0,
                expires_at: marker.expires_at(),
                last_access: tick,
            },
        );
    }

    /// Evict until `incoming` more bytes fit for `key`
    async fn make_room(&mut self, key: &CacheKey, incoming: u64) {
        let capacity = self.config.capacity.as_u64();
        let replaced = self
            .index
            .as_ref()
            .and_then(|index| index.get(key))
            .map_or(0, |e| e.size);

        if self.current_size - replaced + incoming <= capacity {
            return;
        }

        let now = Utc::now();
        let mut candidates: Vec<(CacheKey, bool, u64)> = self
            .index
            .iter()
            .flat_map(|index| index.iter())
            .filter(|(k, _)| *k != key)
            .map(|(k, e)| (k.clone(), e.expires_at > now, e.last_access))
            .collect();
        // Expired entries (false) sort first, then oldest access
        candidates.sort_by_key(|(_, fresh, last)| (*fresh, *last));

        for (candidate, _, _) in candidates {
            if self.current_size - replaced + incoming <= capacity {
                break;
            }
            self.discard(&candidate).await;
            self.evictions += 1;
        }
    }

    /// Total indexed payload bytes
    pub fn size(&self) -> u64 {
        self.current_size
    }

    /// Number of indexed entries, including invalidation markers
    pub fn len(&self) -> usize {
        self.index.as_ref().map_or(0, HashMap::len)
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> DiskStats {
        DiskStats {
            size: self.current_size,
            capacity: self.config.capacity.as_u64(),
            entries: self.len(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

/// Disk cache statistics
#[derive(Debug, Clone, Default)]
pub struct DiskStats {
    /// Indexed payload bytes
    pub size: u64,
    /// Budget in bytes
    pub capacity: u64,
    /// Indexed entries
    pub entries: usize,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Eviction count
    pub evictions: u64,
}

// =============================================================================
// Tests
// =============================================================================
