//! Domain Ports (Port/Adapter Pattern)
//!
//! Narrow interfaces the fetch coordinator depends on. Concrete
//! implementations live in [`crate::adapters`]; tests substitute their own.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Fetch Coordinator                        │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │ NetworkFetcher │ ImageDecoder │ DiskStore │ Delivery│    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │ HttpFetcher │ RasterDecoder │ FsDiskStore │ Serial  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::cache::{CacheKey, DiskRecord, StoredEntry};
use crate::error::{DecodeError, Result, TransportError};

// =============================================================================
// Network Port
// =============================================================================

/// Port for retrieving raw image bytes.
///
/// A single attempt per call; implementations must not retry.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    /// Fetch the body at `url`
    async fn fetch(&self, url: &Url) -> std::result::Result<Bytes, TransportError>;
}

// =============================================================================
// Decoder Port
// =============================================================================

/// Port for turning bytes into a decoded image.
///
/// Decoding must be pure: identical bytes yield equivalent images.
pub trait ImageDecoder: Send + Sync + 'static {
    /// Decoded image representation, opaque to the cache
    type Image: Send + Sync + 'static;

    /// Decode raw bytes
    fn decode(&self, bytes: &[u8]) -> std::result::Result<Self::Image, DecodeError>;

    /// Memory cost of a decoded image in bytes
    fn cost(&self, image: &Self::Image) -> u64;
}

// =============================================================================
// Persistent Store Port
// =============================================================================

/// Port for the key-value byte storage behind the disk tier.
///
/// Stores are not required to understand freshness; the disk cache applies
/// the expiry rule on every read.
#[async_trait]
pub trait DiskStore: Send + Sync {
    /// Read the record and payload for a key
    async fn read(&self, key: &CacheKey) -> Result<Option<StoredEntry>>;

    /// Write (or overwrite) a record and its payload
    async fn write(&self, record: &DiskRecord, data: Bytes) -> Result<()>;

    /// Delete an entry; returns whether one existed
    async fn remove(&self, key: &CacheKey) -> Result<bool>;

    /// List every persisted record
    async fn records(&self) -> Result<Vec<DiskRecord>>;
}

// =============================================================================
// Delivery Port
// =============================================================================

/// Unit of work handed to a [`Delivery`] context
pub type DeliveryJob = Box<dyn FnOnce() + Send + 'static>;

/// Port choosing where result callbacks run.
///
/// Jobs submitted from one thread must run in submission order.
pub trait Delivery: Send + Sync {
    /// Run `job` on this context
    fn deliver(&self, job: DeliveryJob);
}
