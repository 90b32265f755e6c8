//! In-Memory Disk Store
//!
//! [`DiskStore`] backed by a `DashMap`. Nothing survives the process; used
//! with `--no-disk` style setups and in tests.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::cache::{CacheKey, DiskRecord, StoredEntry};
use crate::domain::DiskStore;
use crate::error::Result;

/// Volatile store for the disk tier
#[derive(Debug, Default)]
pub struct InMemoryDiskStore {
    entries: DashMap<CacheKey, StoredEntry>,
    total_bytes: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl InMemoryDiskStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total payload bytes held
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Read/write/delete call counts
    pub fn op_counts(&self) -> (u64, u64, u64) {
        (
            self.reads.load(Ordering::Relaxed),
            self.writes.load(Ordering::Relaxed),
            self.deletes.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl DiskStore for InMemoryDiskStore {
    async fn read(&self, key: &CacheKey) -> Result<Option<StoredEntry>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn write(&self, record: &DiskRecord, data: Bytes) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);

        let size = data.len() as u64;
        let previous = self.entries.insert(
            record.cache_key(),
            StoredEntry {
                record: record.clone(),
                data,
            },
        );
        if let Some(previous) = previous {
            self.total_bytes
                .fetch_sub(previous.data.len() as u64, Ordering::Relaxed);
        }
        self.total_bytes.fetch_add(size, Ordering::Relaxed);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::Relaxed);

        match self.entries.remove(key) {
            Some((_, entry)) => {
                self.total_bytes
                    .fetch_sub(entry.data.len() as u64, Ordering::Relaxed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn records(&self) -> Result<Vec<DiskRecord>> {
        Ok(self
            .entries
            .iter()
            .map(|entry| entry.value().record.clone())
            .collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;

    fn record(name: &str, size: u64) -> DiskRecord {
        let key = CacheKey::from_normalized(&format!("https://img.example.com/{}", name));
        DiskRecord::new(&key, size, Duration::from_secs(60), Utc::now())
    }

    #[tokio::test]
    async fn test_write_read_remove() {
        let store = InMemoryDiskStore::new();
        let rec = record("a.png", 3);

        store.write(&rec, Bytes::from_static(b"abc")).await.unwrap();
        let entry = store.read(&rec.cache_key()).await.unwrap().unwrap();
        assert_eq!(entry.data, Bytes::from_static(b"abc"));
        assert_eq!(store.total_bytes(), 3);

        assert!(store.remove(&rec.cache_key()).await.unwrap());
        assert!(!store.remove(&rec.cache_key()).await.unwrap());
        assert!(store.is_empty());
        assert_eq!(store.total_bytes(), 0);
        assert_eq!(store.op_counts(), (1, 1, 2));
    }

    #[tokio::test]
    async fn test_overwrite_adjusts_total() {
        let store = InMemoryDiskStore::new();
        store.write(&record("a.png", 5), Bytes::from_static(b"12345")).await.unwrap();
        store.write(&record("a.png", 2), Bytes::from_static(b"12")).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.total_bytes(), 2);
        assert_eq!(store.records().await.unwrap()[0].size, 2);
    }
}
