//! Request coalescing over a content cache
//!
//! [`PrefetchCoordinator::ensure`] is the one primitive every fetch goes
//! through: cache hit, or join the in-flight generation for the key, or start
//! one. Generations run as tracked tasks behind a [`Shared`] future so they
//! finish and write through even when every caller has gone away.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use super::stats::{CoordinatorMetrics, CoordinatorStatistics};
use super::tasks::TaskTracker;
use crate::caching::{CacheKey, ContentCache};
use crate::generation::{ErrorClassification, GenerationError};

type SharedGeneration<T> = Shared<BoxFuture<'static, Result<T, GenerationError>>>;

/// Pending generation for one key
struct InFlight<T> {
    ticket: u64,
    generation: SharedGeneration<T>,
}

struct Inner<T> {
    cache: Arc<ContentCache<T>>,
    // Lock order: `in_flight` before the cache's own lock.
    in_flight: Mutex<HashMap<CacheKey, InFlight<T>>>,
    next_ticket: AtomicU64,
    tasks: Arc<TaskTracker>,
    stats: CoordinatorStatistics,
}

/// Coalescing front for one [`ContentCache`]
///
/// Cheap to clone; clones share the registry and the cache.
pub struct PrefetchCoordinator<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for PrefetchCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PrefetchCoordinator<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Coordinate access to `cache`, tracking background work in `tasks`
    pub fn new(cache: Arc<ContentCache<T>>, tasks: Arc<TaskTracker>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                in_flight: Mutex::new(HashMap::new()),
                next_ticket: AtomicU64::new(1),
                tasks,
                stats: CoordinatorStatistics::default(),
            }),
        }
    }

    /// Return the cached value for `key`, generating it at most once
    ///
    /// Concurrent calls for the same key share one invocation of a
    /// `generator` and receive the same result. Failures are not cached.
    pub async fn ensure<F, Fut>(&self, key: CacheKey, generator: F) -> Result<T, GenerationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GenerationError>> + Send + 'static,
    {
        if let Some(value) = self.inner.cache.get(&key) {
            return Ok(value);
        }

        let generation = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(pending) = in_flight.get(&key) {
                self.inner.stats.record_coalesced();
                tracing::debug!(key = %key, ticket = pending.ticket, "Joining in-flight generation");
                pending.generation.clone()
            } else if let Some(value) = self.inner.cache.peek(&key) {
                // Settled between the first lookup and taking the registry lock
                return Ok(value);
            } else {
                self.start(&mut in_flight, key, generator())
            }
        };

        generation.await
    }

    /// Generate a fresh value for `key` even if it is cached or in flight
    ///
    /// The new generation supersedes any pending one: the older result still
    /// reaches its own waiters but is never written to the cache.
    pub async fn refresh<F, Fut>(&self, key: CacheKey, generator: F) -> Result<T, GenerationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GenerationError>> + Send + 'static,
    {
        let generation = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(pending) = in_flight.get(&key) {
                tracing::debug!(key = %key, superseded = pending.ticket, "Superseding in-flight generation");
            }
            self.start(&mut in_flight, key, generator())
        };

        generation.await
    }

    /// Warm `key` in the background, swallowing failures
    pub fn warm<F, Fut>(&self, key: CacheKey, generator: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, GenerationError>> + Send + 'static,
    {
        if self.inner.cache.contains(&key) {
            return;
        }

        let coordinator = self.clone();
        self.inner.tasks.spawn(async move {
            coordinator.warm_now(key, generator).await;
        });
    }

    /// Warm `key` on the current task, swallowing failures
    pub async fn warm_now<F, Fut>(&self, key: CacheKey, generator: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GenerationError>> + Send + 'static,
    {
        if let Err(e) = self.ensure(key.clone(), generator).await {
            self.inner.stats.record_background_failure();
            tracing::warn!(
                namespace = self.inner.cache.namespace(),
                key = %key,
                classification = %e.classification,
                error = %e.message,
                "Background warm-up failed"
            );
        }
    }

    /// Whether a generation for `key` is pending
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.inner.in_flight.lock().contains_key(key)
    }

    /// Number of pending generations
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// The coordinated cache
    pub fn cache(&self) -> &Arc<ContentCache<T>> {
        &self.inner.cache
    }

    /// Tracker holding this coordinator's background work
    pub fn tasks(&self) -> &Arc<TaskTracker> {
        &self.inner.tasks
    }

    /// Snapshot of coordinator counters
    pub fn statistics(&self) -> CoordinatorMetrics {
        self.inner.stats.snapshot()
    }

    /// Register a new generation under `key` and spawn it
    fn start<Fut>(
        &self,
        in_flight: &mut HashMap<CacheKey, InFlight<T>>,
        key: CacheKey,
        work: Fut,
    ) -> SharedGeneration<T>
    where
        Fut: Future<Output = Result<T, GenerationError>> + Send + 'static,
    {
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.inner.stats.record_generation();

        let inner = Arc::clone(&self.inner);
        let settle_key = key.clone();
        let generation = async move {
            // A panicking generator must still settle, or the key stays blocked
            let result = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!(key = %settle_key, ticket, "Generator panicked");
                    Err(GenerationError::new(
                        ErrorClassification::Unclassified,
                        "Generator panicked",
                    ))
                },
            };
            inner.settle(&settle_key, ticket, &result);
            result
        }
        .boxed()
        .shared();

        tracing::debug!(
            namespace = self.inner.cache.namespace(),
            key = %key,
            ticket,
            "Starting generation"
        );

        in_flight.insert(
            key,
            InFlight {
                ticket,
                generation: generation.clone(),
            },
        );

        // Drive to completion independently of the callers
        self.inner.tasks.spawn(generation.clone().map(|_| ()));

        generation
    }
}

impl<T> Inner<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Write through and clear the marker, unless superseded
    fn settle(&self, key: &CacheKey, ticket: u64, result: &Result<T, GenerationError>) {
        let mut in_flight = self.in_flight.lock();
        let current = in_flight.get(key).map(|pending| pending.ticket) == Some(ticket);
        if !current {
            self.stats.record_superseded();
            tracing::debug!(key = %key, ticket, "Discarding superseded generation");
            return;
        }

        if let Ok(value) = result {
            // Persist failures are logged by the cache; the value stays in memory
            let _ = self.cache.put(key.clone(), value.clone());
        }
        in_flight.remove(key);
    }
}

impl<T> std::fmt::Debug for PrefetchCoordinator<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefetchCoordinator")
            .field("namespace", &self.inner.cache.namespace())
            .field("in_flight", &self.inner.in_flight.lock().len())
            .finish()
    }
}
