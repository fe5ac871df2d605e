//! Cache statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters for one content cache
#[derive(Debug)]
pub struct CacheStatistics {
    /// Lookups that found an entry
    pub cache_hits: AtomicU64,
    /// Lookups that found nothing
    pub cache_misses: AtomicU64,
    /// Puts that created a new key
    pub insertions: AtomicU64,
    /// Puts that replaced an existing key
    pub updates: AtomicU64,
    /// Puts whose write-through failed
    pub persist_errors: AtomicU64,
    start_time: Instant,
}

/// Shared handle to cache statistics
pub type SharedCacheStatistics = Arc<CacheStatistics>;

impl CacheStatistics {
    /// Create new statistics instance
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            persist_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a cache hit
    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a put that created a key
    pub fn record_insertion(&self) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a put that replaced a key
    pub fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed write-through
    pub fn record_persist_error(&self) {
        self.persist_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Cache uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> CacheMetrics {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheMetrics {
            cache_hits: hits,
            cache_misses: misses,
            insertions: self.insertions.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            persist_errors: self.persist_errors.load(Ordering::Relaxed),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            uptime: self.uptime(),
        }
    }
}

impl Default for CacheStatistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`CacheStatistics`]
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CacheMetrics {
    /// Lookups that found an entry
    pub cache_hits: u64,
    /// Lookups that found nothing
    pub cache_misses: u64,
    /// Puts that created a new key
    pub insertions: u64,
    /// Puts that replaced an existing key
    pub updates: u64,
    /// Puts whose write-through failed
    pub persist_errors: u64,
    /// Hits over lookups (0.0 to 1.0)
    pub hit_rate: f64,
    /// Time since the cache was constructed
    pub uptime: Duration,
}

impl CacheMetrics {
    /// Log the metrics at info level
    pub fn print(&self, namespace: &str) {
        tracing::info!(
            namespace,
            hits = self.cache_hits,
            misses = self.cache_misses,
            insertions = self.insertions,
            updates = self.updates,
            persist_errors = self.persist_errors,
            hit_rate = format!("{:.1}%", self.hit_rate * 100.0),
            "Cache statistics"
        );
    }
}
