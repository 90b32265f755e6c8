//! Infrastructure Adapters
//!
//! Concrete implementations of the domain ports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  NetworkFetcher │ ImageDecoder │ DiskStore │ Delivery      │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ HttpFetcher │ RasterDecoder │ FsDiskStore │ SerialDelivery │ │
//! │  │ InMemoryDiskStore │ InlineDelivery                         │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use imagefetch::adapters::{
//!     FsDiskStore, HttpFetcher, RasterDecoder, SerialDelivery, DEFAULT_HTTP_TIMEOUT,
//!     DEFAULT_USER_AGENT,
//! };
//! use imagefetch::{CacheConfig, FetchCoordinator};
//!
//! let fetcher = HttpFetcher::new(DEFAULT_HTTP_TIMEOUT, DEFAULT_USER_AGENT)?;
//! let store = FsDiskStore::open("/var/cache/imagefetch").await?;
//! let coordinator = FetchCoordinator::with_config(
//!     CacheConfig::default(),
//!     Arc::new(fetcher),
//!     Arc::new(RasterDecoder),
//!     Arc::new(store),
//!     Arc::new(SerialDelivery::spawn()),
//! );
//! ```

mod decoder;
mod delivery;
mod fs_store;
mod http;
mod memory_store;

pub use decoder::RasterDecoder;
pub use delivery::{InlineDelivery, SerialDelivery};
pub use fs_store::FsDiskStore;
pub use http::{HttpFetcher, DEFAULT_HTTP_TIMEOUT, DEFAULT_USER_AGENT};
pub use memory_store::InMemoryDiskStore;
