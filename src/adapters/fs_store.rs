//! Filesystem Disk Store
//!
//! [`DiskStore`] over a flat directory. Each entry is two files named by
//! [`CacheKey::file_stem`]:
//!
//! - `<stem>.bin`  raw payload
//! - `<stem>.json` [`DiskRecord`] metadata
//!
//! Both are written to a temp file and renamed into place. The payload goes
//! first so a record on disk always has its bytes next to it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::{CacheKey, DiskRecord, StoredEntry};
use crate::domain::DiskStore;
use crate::error::Result;

const RECORD_EXT: &str = "json";
const PAYLOAD_EXT: &str = "bin";

/// Directory-backed store for the disk tier
#[derive(Debug, Clone)]
pub struct FsDiskStore {
    root: PathBuf,
}

impl FsDiskStore {
    /// Open (creating if needed) a cache directory
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "disk store opened");
        Ok(Self { root })
    }

    /// Cache directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &CacheKey, ext: &str) -> PathBuf {
        self.root.join(format!("{}.{}", key.file_stem(), ext))
    }

    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

/// Remove a file, treating "already gone" as success
async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl DiskStore for FsDiskStore {
    async fn read(&self, key: &CacheKey) -> Result<Option<StoredEntry>> {
        let raw = match tokio::fs::read(self.path(key, RECORD_EXT)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: DiskRecord = serde_json::from_slice(&raw)?;

        // A record without its payload is corrupt; surface it so the caller drops both
        let data = tokio::fs::read(self.path(key, PAYLOAD_EXT)).await?;

        Ok(Some(StoredEntry {
            record,
            data: Bytes::from(data),
        }))
    }

    async fn write(&self, record: &DiskRecord, data: Bytes) -> Result<()> {
        let key = record.cache_key();
        self.write_atomic(&self.path(&key, PAYLOAD_EXT), &data).await?;

        let json = serde_json::to_vec(record)?;
        self.write_atomic(&self.path(&key, RECORD_EXT), &json).await
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        // Record first: once it is gone the entry no longer exists
        let existed = remove_if_exists(&self.path(key, RECORD_EXT)).await?;
        remove_if_exists(&self.path(key, PAYLOAD_EXT)).await?;
        Ok(existed)
    }

    async fn records(&self) -> Result<Vec<DiskRecord>> {
        let mut records = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }

            let parsed = match tokio::fs::read(&path).await {
                Ok(raw) => serde_json::from_slice::<DiskRecord>(&raw).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable cache record"),
            }
        }

        Ok(records)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::error::Error;

    fn make_key(name: &str) -> CacheKey {
        CacheKey::from_normalized(&format!("https://img.example.com/{}", name))
    }

    fn record(key: &CacheKey, size: u64) -> DiskRecord {
        DiskRecord::new(key, size, Duration::from_secs(86_400), Utc::now())
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = FsDiskStore::open(dir.path()).await.unwrap();
        let key = make_key("a.png");

        store
            .write(&record(&key, 5), Bytes::from_static(b"hello"))
            .await
            .unwrap();

        let entry = store.read(&key).await.unwrap().unwrap();
        assert_eq!(entry.record.key, key.as_str());
        assert_eq!(entry.data, Bytes::from_static(b"hello"));
        assert!(dir.path().join(format!("{}.bin", key.file_stem())).exists());
        assert!(!dir.path().join(format!("{}.tmp", key.file_stem())).exists());
    }

    #[tokio::test]
    async fn test_missing_entry_reads_none() {
        let dir = TempDir::new().unwrap();
        let store = FsDiskStore::open(dir.path()).await.unwrap();
        assert!(store.read(&make_key("none.png")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = FsDiskStore::open(dir.path()).await.unwrap();
        let key = make_key("a.png");

        store.write(&record(&key, 1), Bytes::from_static(b"x")).await.unwrap();
        assert!(store.remove(&key).await.unwrap());
        assert!(!store.remove(&key).await.unwrap());
        assert!(store.read(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FsDiskStore::open(dir.path()).await.unwrap();
        let key = make_key("a.png");

        std::fs::write(dir.path().join(format!("{}.json", key.file_stem())), b"{not json").unwrap();
        assert_matches!(store.read(&key).await, Err(Error::Json(_)));
    }

    #[tokio::test]
    async fn test_record_without_payload_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FsDiskStore::open(dir.path()).await.unwrap();
        let key = make_key("a.png");

        store.write(&record(&key, 1), Bytes::from_static(b"x")).await.unwrap();
        std::fs::remove_file(dir.path().join(format!("{}.bin", key.file_stem()))).unwrap();
        assert_matches!(store.read(&key).await, Err(Error::Io(_)));
    }

    #[tokio::test]
    async fn test_records_skips_garbage() {
        let dir = TempDir::new().unwrap();
        let store = FsDiskStore::open(dir.path()).await.unwrap();

        for name in ["a.png", "b.png"] {
            let key = make_key(name);
            store.write(&record(&key, 1), Bytes::from_static(b"x")).await.unwrap();
        }
        std::fs::write(dir.path().join("junk.json"), b"nope").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut keys: Vec<String> = store.records().await.unwrap().into_iter().map(|r| r.key).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "https://img.example.com/a.png".to_string(),
                "https://img.example.com/b.png".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let key = make_key("a.png");
        {
            let store = FsDiskStore::open(dir.path()).await.unwrap();
            store.write(&record(&key, 3), Bytes::from_static(b"abc")).await.unwrap();
        }

        let reopened = FsDiskStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.read(&key).await.unwrap().unwrap().data, Bytes::from_static(b"abc"));
    }
}
