//! Write-through content cache for one content kind

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use super::stats::{CacheMetrics, CacheStatistics, SharedCacheStatistics};
use super::store::NamespaceStore;
use super::{CacheKey, StoreError};

/// Memoized, durable mapping from [`CacheKey`] to generated content
///
/// The namespace is loaded once at construction. Every [`put`](Self::put)
/// rewrites the whole namespace before returning, so the persisted snapshot
/// always matches memory. There is no eviction.
pub struct ContentCache<T> {
    namespace: String,
    store: NamespaceStore,
    entries: Mutex<IndexMap<CacheKey, T>>,
    stats: SharedCacheStatistics,
}

impl<T> ContentCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    /// Construct the cache from whatever the store holds for `namespace`
    pub fn load(namespace: impl Into<String>, store: NamespaceStore) -> Self {
        let namespace = namespace.into();
        let entries: IndexMap<CacheKey, T> = store.load::<T>(&namespace).into_iter().collect();

        tracing::debug!(
            namespace = %namespace,
            entries = entries.len(),
            "Content cache ready"
        );

        Self {
            namespace,
            store,
            entries: Mutex::new(entries),
            stats: SharedCacheStatistics::new(CacheStatistics::new()),
        }
    }

    /// Look up a key in memory
    pub fn get(&self, key: &CacheKey) -> Option<T> {
        let value = self.entries.lock().get(key).cloned();
        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        value
    }

    /// Insert or replace an entry, then persist the full namespace
    ///
    /// The in-memory write always applies. A failed persist is reported but
    /// the next successful put will carry the entry to disk.
    pub fn put(&self, key: CacheKey, value: T) -> Result<(), StoreError> {
        // The lock spans insert and persist so concurrent puts reach the
        // store in the order they were applied.
        let mut entries = self.entries.lock();
        if entries.insert(key.clone(), value).is_some() {
            self.stats.record_update();
        } else {
            self.stats.record_insertion();
        }

        let result = self.store.save(&self.namespace, entries.iter());
        drop(entries);

        if let Err(e) = &result {
            self.stats.record_persist_error();
            tracing::warn!(
                namespace = %self.namespace,
                key = %key,
                error = %e,
                "Write-through failed, entry kept in memory"
            );
        }
        result
    }

    /// Look up a key without counting it as a hit or miss
    pub(crate) fn peek(&self, key: &CacheKey) -> Option<T> {
        self.entries.lock().get(key).cloned()
    }

    /// Whether a key is present (not counted as a lookup)
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Keys in insertion order
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Namespace this cache persists under
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Snapshot of the cache counters
    pub fn statistics(&self) -> CacheMetrics {
        self.stats.snapshot()
    }
}

impl<T> std::fmt::Debug for ContentCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("namespace", &self.namespace)
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}
