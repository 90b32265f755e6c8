//! Disk Entry Types
//!
//! Persisted metadata for disk-tier entries. Each record carries its own
//! freshness window, equivalent to a `Cache-Control: private, max-age=N`
//! response header.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::CacheKey;

/// Metadata stored alongside each disk payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskRecord {
    /// Normalized URL the payload belongs to
    pub key: String,
    /// Write time
    pub stored_at: DateTime<Utc>,
    /// Freshness window in seconds; `0` marks an invalidated entry
    pub max_age_secs: u64,
    /// Payload length in bytes
    pub size: u64,
}

impl DiskRecord {
    /// Record for a payload written at `now`
    pub fn new(key: &CacheKey, size: u64, max_age: Duration, now: DateTime<Utc>) -> Self {
        Self {
            key: key.as_str().to_string(),
            stored_at: now,
            max_age_secs: max_age.as_secs(),
            size,
        }
    }

    /// Zero-freshness marker that forces later lookups to miss
    pub fn invalidated(key: &CacheKey, now: DateTime<Utc>) -> Self {
        Self {
            key: key.as_str().to_string(),
            stored_at: now,
            max_age_secs: 0,
            size: 0,
        }
    }

    /// Key this record belongs to
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from_normalized(&self.key)
    }

    /// Instant the record stops being fresh
    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.max_age_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|max_age| self.stored_at.checked_add_signed(max_age))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the record is still fresh at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

/// A record together with its payload, as read back from a store
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// Entry metadata
    pub record: DiskRecord,
    /// Raw image bytes
    pub data: Bytes,
}

// =============================================================================
// Tests
// =============================================================================
