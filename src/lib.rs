//! imagefetch - Two-Tier Image Fetch Cache
//!
//! Fetches images by URL through a memory tier, a disk tier and the network,
//! issuing at most one network request per image at a time and fanning the
//! result out to every caller that asked for it.
//!
//! # Architecture
//!
//! ```text
//! FetchCoordinator → MemoryCache → (serial worker) DiskCache → NetworkFetcher
//! ```
//!
//! Cache keys are request URLs with the query string removed, so signed or
//! tokenized URLs for the same image share one cache entry.
//!
//! # Modules
//!
//! - [`adapters`] - HTTP, decoder, store and delivery implementations
//! - [`cache`] - Memory and disk tiers, cache keys, metrics
//! - [`config`] - YAML-loadable coordinator configuration
//! - [`domain`] - Port traits the coordinator depends on
//! - [`error`] - Error types
//! - [`fetch`] - The fetch coordinator and its serial worker

pub mod adapters;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;

// Re-export commonly used types
pub use cache::{ByteCount, CacheKey, MetricsSnapshot};
pub use config::CoordinatorConfig;
pub use error::{DecodeError, Error, FetchError, Result, TransportError};
pub use fetch::{CacheConfig, Dispatch, FetchCoordinator, FetchOptions, FetchResult, ResultStream};
