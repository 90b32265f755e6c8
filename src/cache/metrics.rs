//! Cache Metrics Collection
//!
//! Lock-free counters for the fetch path, with a Prometheus text rendering.

use std::sync::atomic::{AtomicU64, Ordering};

use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

use super::disk::DiskStats;

/// Fetch/cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    disk_hits: AtomicU64,
    disk_misses: AtomicU64,
    network_fetches: AtomicU64,
    joined_waiters: AtomicU64,
    fetch_successes: AtomicU64,
    fetch_failures: AtomicU64,
    rejected_requests: AtomicU64,
    invalidations: AtomicU64,
    disk_size_bytes: AtomicU64,
    disk_entries: AtomicU64,
    disk_evictions: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_memory_miss(&self) {
        self.memory_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_miss(&self) {
        self.disk_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_fetch(&self) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_joined_waiter(&self) {
        self.joined_waiters.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_success(&self) {
        self.fetch_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_request(&self) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the disk tier's usage; the tier lives on the serial worker
    pub fn set_disk_usage(&self, stats: &DiskStats) {
        self.disk_size_bytes.store(stats.size, Ordering::Relaxed);
        self.disk_entries.store(stats.entries as u64, Ordering::Relaxed);
        self.disk_evictions.store(stats.evictions, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            memory_misses: self.memory_misses.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            disk_misses: self.disk_misses.load(Ordering::Relaxed),
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            joined_waiters: self.joined_waiters.load(Ordering::Relaxed),
            fetch_successes: self.fetch_successes.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            disk_evictions: self.disk_evictions.load(Ordering::Relaxed),
            memory_size_bytes: 0,
            memory_entries: 0,
            disk_size_bytes: self.disk_size_bytes.load(Ordering::Relaxed),
            disk_entries: self.disk_entries.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub disk_hits: u64,
    pub disk_misses: u64,
    /// Network requests actually issued
    pub network_fetches: u64,
    /// Callers that joined an in-flight fetch instead of issuing one
    pub joined_waiters: u64,
    pub fetch_successes: u64,
    pub fetch_failures: u64,
    pub rejected_requests: u64,
    pub invalidations: u64,
    /// Disk entries removed to stay within budget
    pub disk_evictions: u64,
    pub memory_size_bytes: u64,
    pub memory_entries: u64,
    pub disk_size_bytes: u64,
    /// Indexed disk entries, including invalidation markers
    pub disk_entries: u64,
}

impl MetricsSnapshot {
    /// Share of lookups served by either cache tier
    pub fn cache_hit_ratio(&self) -> f64 {
        let hits = self.memory_hits + self.disk_hits;
        let total = self.memory_hits + self.memory_misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Render in the Prometheus text exposition format
    pub fn to_prometheus(&self) -> prometheus::Result<String> {
        let registry = Registry::new_custom(Some("imagefetch".to_string()), None)?;

        let counters = [
            ("memory_hits_total", "Memory tier hits", self.memory_hits),
            ("memory_misses_total", "Memory tier misses", self.memory_misses),
            ("disk_hits_total", "Disk tier hits", self.disk_hits),
            ("disk_misses_total", "Disk tier misses", self.disk_misses),
            ("network_fetches_total", "Network requests issued", self.network_fetches),
            ("joined_waiters_total", "Requests joined to an in-flight fetch", self.joined_waiters),
            ("fetch_successes_total", "Completed network fetches", self.fetch_successes),
            ("fetch_failures_total", "Failed network fetches", self.fetch_failures),
            ("rejected_requests_total", "Requests with an invalid URL", self.rejected_requests),
            ("invalidations_total", "Cache invalidations", self.invalidations),
            ("disk_evictions_total", "Disk tier evictions", self.disk_evictions),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(Opts::new(name, help))?;
            counter.inc_by(value);
            registry.register(Box::new(counter))?;
        }

        let gauges = [
            ("memory_size_bytes", "Memory tier cost in bytes", self.memory_size_bytes),
            ("memory_entries", "Memory tier entries", self.memory_entries),
            ("disk_size_bytes", "Disk tier payload bytes", self.disk_size_bytes),
            ("disk_entries", "Disk tier entries", self.disk_entries),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(Opts::new(name, help))?;
            gauge.set(i64::try_from(value).unwrap_or(i64::MAX));
            registry.register(Box::new(gauge))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = CacheMetrics::new();

        metrics.record_memory_hit();
        metrics.record_memory_miss();
        metrics.record_memory_miss();
        metrics.record_disk_hit();
        metrics.record_network_fetch();
        metrics.record_joined_waiter();
        metrics.record_joined_waiter();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.memory_hits, 1);
        assert_eq!(snapshot.memory_misses, 2);
        assert_eq!(snapshot.disk_hits, 1);
        assert_eq!(snapshot.network_fetches, 1);
        assert_eq!(snapshot.joined_waiters, 2);
        assert!((snapshot.cache_hit_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_disk_usage_is_a_gauge() {
        let metrics = CacheMetrics::new();
        let mut stats = DiskStats {
            size: 120,
            entries: 3,
            evictions: 2,
            ..Default::default()
        };
        metrics.set_disk_usage(&stats);

        stats.size = 40;
        stats.entries = 1;
        metrics.set_disk_usage(&stats);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.disk_size_bytes, 40);
        assert_eq!(snapshot.disk_entries, 1);
        assert_eq!(snapshot.disk_evictions, 2);
    }

    #[test]
    fn test_empty_hit_ratio() {
        assert_eq!(MetricsSnapshot::default().cache_hit_ratio(), 0.0);
    }

    #[test]
    fn test_prometheus_rendering() {
        let snapshot = MetricsSnapshot {
            network_fetches: 3,
            memory_entries: 7,
            disk_size_bytes: 512,
            ..Default::default()
        };

        let text = snapshot.to_prometheus().unwrap();
        assert!(text.contains("imagefetch_network_fetches_total 3"));
        assert!(text.contains("imagefetch_memory_entries 7"));
        assert!(text.contains("imagefetch_disk_size_bytes 512"));
        assert!(text.contains("# HELP imagefetch_disk_hits_total Disk tier hits"));
    }
}
