//! Two-Tier Image Cache
//!
//! Decoded images in memory, raw bytes on disk, both keyed by the
//! query-stripped request URL.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Fetch Coordinator                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Memory Tier (decoded)          │  Disk Tier (raw bytes)          │
//! │  ┌──────────────────────────┐   │  ┌──────────────────────────┐   │
//! │  │ ShardedTable (16-way)    │   │  │ DiskStore + size index   │   │
//! │  │ Capacity: 4MB            │   │  │ Capacity: 50MB           │   │
//! │  │ LRU, cost-weighted       │   │  │ max-age 24h, LRU         │   │
//! │  └──────────────────────────┘   │  └──────────────────────────┘   │
//! │        any thread               │        serial worker only       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Disk hits are decoded on the worker and always promoted into memory.
//! Network bytes are decoded first; only a successful decode is written to
//! disk and memory, each according to the triggering caller's options.

mod disk;
mod entry;
mod key;
mod memory;
mod metrics;
mod shard;
mod size;

#[cfg(test)]
mod proptest;

pub use disk::{DiskCache, DiskCacheConfig, DiskStats};
pub use entry::{DiskRecord, StoredEntry};
pub use key::CacheKey;
pub use memory::{MemoryCache, MemoryCacheConfig, MemoryStats};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use shard::{Shard, ShardedTable, Weighted};
pub use size::ByteCount;

use std::time::Duration;

/// Number of memory shards
pub const MEMORY_SHARD_COUNT: usize = 16;

/// Default memory budget (4MB)
pub const DEFAULT_MEMORY_CAPACITY: ByteCount = ByteCount::megabytes(4);

/// Default disk budget (50MB)
pub const DEFAULT_DISK_CAPACITY: ByteCount = ByteCount::megabytes(50);

/// Default disk freshness window (24h)
pub const DEFAULT_DISK_MAX_AGE: Duration = Duration::from_secs(86_400);


// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_count_is_power_of_two() {
        assert!(MEMORY_SHARD_COUNT.is_power_of_two());
    }

    #[test]
    fn test_default_capacities() {
        assert_eq!(DEFAULT_MEMORY_CAPACITY.as_u64(), 4_000_000);
        assert_eq!(DEFAULT_DISK_CAPACITY.as_u64(), 50_000_000);
        assert_eq!(DEFAULT_DISK_MAX_AGE.as_secs(), 24 * 60 * 60);
    }
}
