//! Coordinator counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters for a [`PrefetchCoordinator`](super::PrefetchCoordinator)
#[derive(Debug, Default)]
pub struct CoordinatorStatistics {
    generations: AtomicU64,
    coalesced: AtomicU64,
    superseded: AtomicU64,
    background_failures: AtomicU64,
}

impl CoordinatorStatistics {
    pub(crate) fn record_generation(&self) {
        self.generations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_superseded(&self) {
        self.superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_background_failure(&self) {
        self.background_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> CoordinatorMetrics {
        CoordinatorMetrics {
            generations: self.generations.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            background_failures: self.background_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of coordinator activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorMetrics {
    /// Generations started
    pub generations: u64,
    /// Requests that joined an in-flight generation
    pub coalesced: u64,
    /// Results discarded because a newer generation replaced them
    pub superseded: u64,
    /// Warm-ups that failed silently
    pub background_failures: u64,
}
