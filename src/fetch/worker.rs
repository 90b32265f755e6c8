//! Serial Worker
//!
//! One tokio task drains the command queue in submission order. It owns the
//! pending request table and the disk tier, so neither needs locking. Network
//! fetches run on their own tasks and report back through the same queue.
//!
//! The worker keeps only a weak sender; it stops once the coordinator and
//! every in-flight network task have dropped theirs.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use url::Url;

use super::options::FetchOptions;
use super::pending::{Enqueued, PendingTable, Waiter};
use crate::cache::{CacheKey, CacheMetrics, DiskCache, MemoryCache};
use crate::domain::{ImageDecoder, NetworkFetcher};
use crate::error::{FetchError, TransportError};

/// Network outcome: the decoded image plus the bytes it came from
pub(crate) type Outcome<I> = Result<(Arc<I>, Bytes), FetchError>;

/// Work items for the serial worker
pub(crate) enum Command<I> {
    /// Continue a request past the memory tier
    Resolve {
        key: CacheKey,
        url: Url,
        options: FetchOptions,
        /// The caller already received a memory hit
        memory_hit: bool,
        waiter: Waiter<I>,
    },
    /// A network fetch finished; `options` are the triggering caller's
    Complete {
        key: CacheKey,
        options: FetchOptions,
        outcome: Outcome<I>,
    },
    /// Invalidate the disk entry for a key
    Invalidate { key: CacheKey },
    /// Resolves once every earlier command has been handled
    Barrier(oneshot::Sender<()>),
}

pub(crate) struct Worker<D: ImageDecoder> {
    rx: mpsc::UnboundedReceiver<Command<D::Image>>,
    tx: mpsc::WeakUnboundedSender<Command<D::Image>>,
    pending: PendingTable<D::Image>,
    disk: DiskCache<D>,
    memory: Arc<MemoryCache<D::Image>>,
    fetcher: Arc<dyn NetworkFetcher>,
    decoder: Arc<D>,
    metrics: Arc<CacheMetrics>,
}

impl<D: ImageDecoder> Worker<D> {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<Command<D::Image>>,
        tx: mpsc::WeakUnboundedSender<Command<D::Image>>,
        disk: DiskCache<D>,
        memory: Arc<MemoryCache<D::Image>>,
        fetcher: Arc<dyn NetworkFetcher>,
        decoder: Arc<D>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            rx,
            tx,
            pending: PendingTable::new(),
            disk,
            memory,
            fetcher,
            decoder,
            metrics,
        }
    }

    /// Drain the queue until every sender is gone
    pub(crate) async fn run(mut self) {
        debug!("fetch worker started");
        while let Some(command) = self.rx.recv().await {
            self.handle(command).await;
            self.metrics.set_disk_usage(&self.disk.stats());
        }
        debug!("fetch worker stopped");
    }

    async fn handle(&mut self, command: Command<D::Image>) {
        match command {
            Command::Resolve {
                key,
                url,
                options,
                memory_hit,
                waiter,
            } => self.resolve(key, url, options, memory_hit, waiter).await,
            Command::Complete {
                key,
                options,
                outcome,
            } => self.complete(key, options, outcome).await,
            Command::Invalidate { key } => {
                debug!(key = %key, "invalidating disk entry");
                self.disk.invalidate(&key).await;
            }
            Command::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }

    async fn resolve(
        &mut self,
        key: CacheKey,
        url: Url,
        options: FetchOptions,
        memory_hit: bool,
        waiter: Waiter<D::Image>,
    ) {
        if !memory_hit {
            match self.disk.lookup(&key).await {
                Some(image) => {
                    self.metrics.record_disk_hit();
                    debug!(key = %key, "disk cache hit");
                    // Disk hits are promoted regardless of cache_in_memory
                    let cost = self.decoder.cost(&image);
                    self.memory.store(key.clone(), Arc::clone(&image), cost);
                    waiter.notify(Ok(image));
                    if !options.force_remote_fetching {
                        return;
                    }
                }
                None => {
                    self.metrics.record_disk_miss();
                    debug!(key = %key, "disk cache miss");
                }
            }
        }

        if self.pending.enqueue(&key, waiter) == Enqueued::Joined {
            self.metrics.record_joined_waiter();
            debug!(key = %key, "joined in-flight fetch");
            return;
        }

        self.spawn_fetch(key, url, options);
    }

    fn spawn_fetch(&mut self, key: CacheKey, url: Url, options: FetchOptions) {
        let Some(tx) = self.tx.upgrade() else {
            // Only reachable while draining after the coordinator is gone
            for waiter in self.pending.drain(&key) {
                waiter.notify(Err(FetchError::Shutdown));
            }
            return;
        };

        self.metrics.record_network_fetch();
        info!(key = %key, url = %url, "network fetch started");

        let fetcher = Arc::clone(&self.fetcher);
        let decoder = Arc::clone(&self.decoder);
        tokio::spawn(async move {
            let outcome = fetch_and_decode(fetcher, decoder, &url).await;
            // The worker outlives every task holding a strong sender
            let _ = tx.send(Command::Complete {
                key,
                options,
                outcome,
            });
        });
    }

    async fn complete(&mut self, key: CacheKey, options: FetchOptions, outcome: Outcome<D::Image>) {
        let waiters = self.pending.drain(&key);

        match &outcome {
            Ok((image, bytes)) => {
                self.metrics.record_fetch_success();
                info!(key = %key, bytes = bytes.len(), waiters = waiters.len(), "network fetch completed");
                if options.cache_in_disk {
                    self.disk.store(&key, bytes.clone()).await;
                }
                if options.cache_in_memory {
                    let cost = self.decoder.cost(image);
                    self.memory.store(key.clone(), Arc::clone(image), cost);
                }
            }
            Err(e) => {
                self.metrics.record_fetch_failure();
                warn!(key = %key, error = %e, waiters = waiters.len(), "network fetch failed");
            }
        }

        let result = outcome.map(|(image, _)| image);
        for waiter in waiters {
            waiter.notify(result.clone());
        }
    }
}

/// One network attempt followed by an off-thread decode
async fn fetch_and_decode<D: ImageDecoder>(
    fetcher: Arc<dyn NetworkFetcher>,
    decoder: Arc<D>,
    url: &Url,
) -> Outcome<D::Image> {
    let bytes = match AssertUnwindSafe(fetcher.fetch(url)).catch_unwind().await {
        Ok(result) => result?,
        Err(_) => {
            return Err(TransportError::Other {
                url: url.to_string(),
                reason: "network fetcher panicked".to_string(),
            }
            .into())
        }
    };

    let payload = bytes.clone();
    let decoded = tokio::task::spawn_blocking(move || decoder.decode(&payload)).await;
    match decoded {
        Ok(Ok(image)) => Ok((Arc::new(image), bytes)),
        Ok(Err(e)) => {
            debug!(url = %url, error = %e, "response did not decode");
            Err(FetchError::InvalidResponseData {
                url: url.to_string(),
            })
        }
        Err(e) => {
            warn!(url = %url, error = %e, "decode task failed");
            Err(FetchError::InvalidResponseData {
                url: url.to_string(),
            })
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use crate::cache::testing::TextDecoder;

    struct StaticFetcher(&'static [u8]);

    #[async_trait]
    impl NetworkFetcher for StaticFetcher {
        async fn fetch(&self, _url: &Url) -> Result<Bytes, TransportError> {
            Ok(Bytes::from_static(self.0))
        }
    }

    struct PanickingFetcher;

    #[async_trait]
    impl NetworkFetcher for PanickingFetcher {
        async fn fetch(&self, _url: &Url) -> Result<Bytes, TransportError> {
            panic!("fetcher bug")
        }
    }

    fn url() -> Url {
        Url::parse("https://img.example.com/a.png").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_and_decode_success_keeps_bytes() {
        let outcome = fetch_and_decode(Arc::new(StaticFetcher(b"img:alpha")), Arc::new(TextDecoder), &url()).await;

        let (image, bytes) = outcome.unwrap();
        assert_eq!(image.as_str(), "alpha");
        assert_eq!(bytes, Bytes::from_static(b"img:alpha"));
    }

    #[tokio::test]
    async fn test_undecodable_bytes_are_invalid_response() {
        let outcome = fetch_and_decode(Arc::new(StaticFetcher(b"<html>")), Arc::new(TextDecoder), &url()).await;

        assert_matches!(
            outcome,
            Err(FetchError::InvalidResponseData { url }) if url == "https://img.example.com/a.png"
        );
    }

    #[tokio::test]
    async fn test_panicking_fetcher_becomes_transport_error() {
        let outcome = fetch_and_decode(Arc::new(PanickingFetcher), Arc::new(TextDecoder), &url()).await;

        assert_matches!(outcome, Err(FetchError::Transport(TransportError::Other { .. })));
    }
}
