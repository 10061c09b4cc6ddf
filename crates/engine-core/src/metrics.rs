use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    validations: AtomicU64,
    fetches_issued: AtomicU64,
    rows_fetched: AtomicU64,
    blocks_evicted: AtomicU64,
    fetch_failures: AtomicU64,
    stale_discarded: AtomicU64,
}

/// Counters of one cache instance, shared with its background fetches.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub validations: u64,
    pub fetches_issued: u64,
    pub rows_fetched: u64,
    pub blocks_evicted: u64,
    pub fetch_failures: u64,
    pub stale_discarded: u64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        CacheMetrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_validations(&self) {
        self.inner.validations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_fetches(&self) {
        self.inner.fetches_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rows(&self, count: u64) {
        self.inner.rows_fetched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_evictions(&self, count: u64) {
        self.inner.blocks_evicted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self) {
        self.inner.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stale(&self) {
        self.inner.stale_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            validations: self.inner.validations.load(Ordering::Relaxed),
            fetches_issued: self.inner.fetches_issued.load(Ordering::Relaxed),
            rows_fetched: self.inner.rows_fetched.load(Ordering::Relaxed),
            blocks_evicted: self.inner.blocks_evicted.load(Ordering::Relaxed),
            fetch_failures: self.inner.fetch_failures.load(Ordering::Relaxed),
            stale_discarded: self.inner.stale_discarded.load(Ordering::Relaxed),
        }
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_shared_across_clones() {
        let metrics = CacheMetrics::new();
        let handle = metrics.clone();

        handle.increment_fetches();
        handle.increment_rows(50);
        metrics.increment_evictions(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fetches_issued, 1);
        assert_eq!(snapshot.rows_fetched, 50);
        assert_eq!(snapshot.blocks_evicted, 2);
        assert_eq!(snapshot.fetch_failures, 0);
    }
}
