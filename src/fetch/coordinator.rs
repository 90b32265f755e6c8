//! Fetch Coordinator - Unified Two-Tier Fetch Path
//!
//! Resolves image URLs through memory, disk and network, de-duplicating
//! concurrent requests for the same key and fanning each network result out
//! to every waiter.
//!
//! ```text
//! caller ──► normalize ──► memory ──hit──► deliver
//!                            │ miss (or force)
//!                            ▼
//!                     serial worker ──► disk ──hit──► promote + deliver
//!                            │ miss (or force)
//!                            ▼
//!                     pending table ──joined──► wait
//!                            │ first
//!                            ▼
//!                     network task ──► Complete ──► store + fan out
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::options::{Dispatch, FetchOptions};
use super::pending::{FetchResult, ResultCallback, Waiter};
use super::worker::{Command, Worker};
use crate::adapters::{FsDiskStore, HttpFetcher, InMemoryDiskStore, InlineDelivery, RasterDecoder, SerialDelivery};
use crate::cache::{CacheKey, CacheMetrics, DiskCache, DiskCacheConfig, MemoryCache, MemoryCacheConfig, MetricsSnapshot};
use crate::config::CoordinatorConfig;
use crate::domain::{Delivery, DiskStore, ImageDecoder, NetworkFetcher};
use crate::error::{FetchError, Result};

/// Tier configuration
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Memory tier configuration
    pub memory: MemoryCacheConfig,
    /// Disk tier configuration
    pub disk: DiskCacheConfig,
}

/// Entry point for image fetches.
///
/// Must be created inside a tokio runtime; construction spawns the serial
/// worker. Dropping the coordinator lets in-flight fetches finish and then
/// stops the worker.
pub struct FetchCoordinator<D: ImageDecoder> {
    tx: mpsc::UnboundedSender<Command<D::Image>>,
    memory: Arc<MemoryCache<D::Image>>,
    delivery: Arc<dyn Delivery>,
    metrics: Arc<CacheMetrics>,
}

impl<D: ImageDecoder> FetchCoordinator<D> {
    /// Create a coordinator with default tiers, a volatile disk store and
    /// serial delivery
    pub fn new(fetcher: Arc<dyn NetworkFetcher>, decoder: Arc<D>) -> Self {
        Self::with_config(
            CacheConfig::default(),
            fetcher,
            decoder,
            Arc::new(InMemoryDiskStore::new()),
            Arc::new(SerialDelivery::spawn()),
        )
    }

    /// Create a coordinator with explicit configuration and ports
    pub fn with_config(
        config: CacheConfig,
        fetcher: Arc<dyn NetworkFetcher>,
        decoder: Arc<D>,
        store: Arc<dyn DiskStore>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let memory = Arc::new(MemoryCache::with_config(config.memory));
        let metrics = Arc::new(CacheMetrics::new());
        let disk = DiskCache::new(store, Arc::clone(&decoder), config.disk);

        let worker = Worker::new(
            rx,
            tx.downgrade(),
            disk,
            Arc::clone(&memory),
            fetcher,
            decoder,
            Arc::clone(&metrics),
        );
        tokio::spawn(worker.run());

        Self {
            tx,
            memory,
            delivery,
            metrics,
        }
    }

    /// Fetch `url`, delivering results on the default delivery context
    pub fn fetch<F>(&self, url: &str, options: FetchOptions, on_result: F) -> Dispatch
    where
        F: Fn(FetchResult<D::Image>) + Send + Sync + 'static,
    {
        self.fetch_with_delivery(url, options, Arc::clone(&self.delivery), on_result)
    }

    /// Fetch `url`, delivering results on `delivery`.
    ///
    /// `on_result` runs once, or twice for a force-remote request that hit a
    /// cache tier (cached result first, then the network result).
    pub fn fetch_with_delivery<F>(
        &self,
        url: &str,
        options: FetchOptions,
        delivery: Arc<dyn Delivery>,
        on_result: F,
    ) -> Dispatch
    where
        F: Fn(FetchResult<D::Image>) + Send + Sync + 'static,
    {
        let callback: ResultCallback<D::Image> = Arc::new(on_result);
        let waiter = Waiter::new(callback, delivery);

        let (url, key) = match CacheKey::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.metrics.record_rejected_request();
                debug!(error = %e, "rejected fetch request");
                waiter.notify(Err(e));
                return Dispatch::Rejected;
            }
        };

        let memory_hit = match self.memory.lookup(&key) {
            Some(image) => {
                self.metrics.record_memory_hit();
                debug!(key = %key, "memory cache hit");
                waiter.notify(Ok(image));
                if !options.force_remote_fetching {
                    return Dispatch::ServedFromMemory;
                }
                true
            }
            None => {
                self.metrics.record_memory_miss();
                false
            }
        };

        let command = Command::Resolve {
            key,
            url,
            options,
            memory_hit,
            waiter,
        };
        if let Err(mpsc::error::SendError(command)) = self.tx.send(command) {
            if let Command::Resolve { waiter, .. } = command {
                waiter.notify(Err(FetchError::Shutdown));
            }
        }
        Dispatch::Submitted
    }

    /// Stream every result for a request.
    ///
    /// The stream ends once no more results can arrive.
    pub fn updates(&self, url: &str, options: FetchOptions) -> ResultStream<D::Image> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.fetch_with_delivery(url, options, Arc::new(InlineDelivery), move |result| {
            let _ = tx.send(result);
        });
        ResultStream { rx }
    }

    /// Await the first result for a request
    pub async fn get(&self, url: &str, options: FetchOptions) -> FetchResult<D::Image> {
        self.updates(url, options)
            .next_result()
            .await
            .unwrap_or(Err(FetchError::Shutdown))
    }

    /// Drop cached copies of `url`.
    ///
    /// Memory is invalidated before returning; the disk entry is invalidated
    /// on the serial worker, ahead of any request submitted afterwards.
    /// In-flight fetches are left alone.
    pub fn clear_cache(&self, url: &str) -> std::result::Result<(), FetchError> {
        let (_, key) = CacheKey::parse(url)?;

        self.memory.invalidate(&key);
        self.metrics.record_invalidation();
        if self.tx.send(Command::Invalidate { key }).is_err() {
            warn!("fetch worker stopped, disk entry not invalidated");
        }
        Ok(())
    }

    /// Wait until every previously submitted worker command has been handled
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Barrier(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Counter snapshot, including current memory usage
    pub fn metrics(&self) -> MetricsSnapshot {
        let mut snapshot = self.metrics.snapshot();
        snapshot.memory_size_bytes = self.memory.size();
        snapshot.memory_entries = self.memory.len() as u64;
        snapshot
    }

    /// The memory tier
    pub fn memory(&self) -> &MemoryCache<D::Image> {
        &self.memory
    }
}

impl FetchCoordinator<RasterDecoder> {
    /// Build the default HTTP + raster stack from configuration.
    ///
    /// Uses a filesystem store when `cache_dir` is set, a volatile one otherwise.
    pub async fn from_config(config: &CoordinatorConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.http_timeout(), &config.user_agent)?;
        let store: Arc<dyn DiskStore> = match &config.cache_dir {
            Some(dir) => Arc::new(FsDiskStore::open(dir).await?),
            None => Arc::new(InMemoryDiskStore::new()),
        };

        Ok(Self::with_config(
            config.cache_config(),
            Arc::new(fetcher),
            Arc::new(RasterDecoder),
            store,
            Arc::new(SerialDelivery::spawn()),
        ))
    }
}

/// Results for one request, in delivery order
pub struct ResultStream<I> {
    rx: mpsc::UnboundedReceiver<FetchResult<I>>,
}

impl<I> ResultStream<I> {
    /// Next result, or `None` once the request is finished
    pub async fn next_result(&mut self) -> Option<FetchResult<I>> {
        self.rx.recv().await
    }
}

impl<I> Stream for ResultStream<I> {
    type Item = FetchResult<I>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bytes::Bytes;
    use url::Url;

    use super::*;
    use crate::cache::testing::TextDecoder;
    use crate::error::TransportError;

    struct EchoFetcher;

    #[async_trait]
    impl NetworkFetcher for EchoFetcher {
        async fn fetch(&self, url: &Url) -> std::result::Result<Bytes, TransportError> {
            Ok(Bytes::from(format!("img:{}", url.path())))
        }
    }

    fn coordinator() -> FetchCoordinator<TextDecoder> {
        FetchCoordinator::new(Arc::new(EchoFetcher), Arc::new(TextDecoder))
    }

    #[tokio::test]
    async fn test_default_coordinator_round_trip() {
        let coord = coordinator();
        let image = coord.get("https://img.example.com/a.png", FetchOptions::default()).await;
        assert_eq!(image.unwrap().as_str(), "/a.png");
    }

    #[tokio::test]
    async fn test_serial_delivery_runs_callback() {
        let coord = coordinator();
        let (tx, rx) = oneshot::channel();
        let tx = std::sync::Mutex::new(Some(tx));

        let dispatch = coord.fetch("https://img.example.com/b.png", FetchOptions::default(), move |result| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(result);
            }
        });

        assert_eq!(dispatch, Dispatch::Submitted);
        assert_eq!(rx.await.unwrap().unwrap().as_str(), "/b.png");
    }

    #[tokio::test]
    async fn test_rejected_stream_ends_after_error() {
        let coord = coordinator();
        let mut results = coord.updates("", FetchOptions::default());

        assert!(matches!(
            results.next_result().await,
            Some(Err(FetchError::InvalidRequestData(_)))
        ));
        assert!(results.next_result().await.is_none());
    }

    #[tokio::test]
    async fn test_flush_on_idle_coordinator() {
        let coord = coordinator();
        coord.flush().await;
        assert_eq!(coord.metrics(), MetricsSnapshot::default());
    }
}
