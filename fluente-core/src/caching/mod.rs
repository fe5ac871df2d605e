//! Durable caching of generated content
//!
//! Each content kind owns one [`ContentCache`], persisted under its own
//! namespace through a [`NamespaceStore`]. Caches are plain objects built once
//! at startup and shared by `Arc`; nothing here is global.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use fluente_core::caching::{CacheKey, ContentCache, MemoryStore, NamespaceStore};
//!
//! let store = NamespaceStore::new(Arc::new(MemoryStore::new()));
//! let cache: ContentCache<String> = ContentCache::load("verbs", store);
//!
//! cache.put(CacheKey::for_verb("falar"), "to speak".to_string()).unwrap();
//! assert_eq!(cache.get(&CacheKey::for_verb("Falar")).as_deref(), Some("to speak"));
//! ```

pub mod cache_key;
pub mod content_cache;
pub mod stats;
pub mod store;

pub use cache_key::CacheKey;
pub use content_cache::ContentCache;
pub use stats::{CacheMetrics, CacheStatistics, SharedCacheStatistics};
pub use store::{FileStore, MemoryStore, NamespaceStore};

/// Store-specific error types
///
/// Corruption on load is recovered inside [`NamespaceStore::load`] and never
/// produces one of these.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The namespace could not be serialized
    #[error("Failed to serialize namespace '{namespace}': {source}")]
    Serialize {
        /// Namespace being written
        namespace: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// The backend rejected the write
    #[error("Failed to write namespace '{namespace}': {source}")]
    Write {
        /// Namespace being written
        namespace: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
