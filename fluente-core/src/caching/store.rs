//! Persistent key-value store adapter
//!
//! Caches persist as one namespace per content kind. A namespace is a JSON
//! association list: `[[key, value], ...]`.
//!
//! - [`FileStore`]: one `<namespace>.json` per namespace in a directory
//! - [`MemoryStore`]: process-lifetime storage for tests and volatile data
//! - [`NamespaceStore`]: typed load/save over any [`KeyValueStore`], with
//!   corruption recovery

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};

use super::{CacheKey, StoreError};
use crate::core::traits::KeyValueStore;

/// Disk-backed store, one JSON file per namespace
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `directory`, creating it if needed
    pub fn open(directory: impl AsRef<Path>) -> std::io::Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    /// Directory holding the namespace files
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn namespace_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn read_namespace(&self, name: &str) -> std::io::Result<Option<String>> {
        match fs::read_to_string(self.namespace_path(name)) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_namespace(&self, name: &str, blob: &str) -> std::io::Result<()> {
        // Write-then-rename so readers never observe a half-written namespace
        let target = self.namespace_path(name);
        let staging = self.directory.join(format!(".{name}.json.tmp"));
        fs::write(&staging, blob)?;
        fs::rename(&staging, &target)
    }

    fn clear_namespace(&self, name: &str) -> std::io::Result<()> {
        match fs::remove_file(self.namespace_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-memory store that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a namespace with a raw blob (useful to simulate corruption)
    pub fn insert_raw(&self, name: &str, blob: impl Into<String>) {
        self.namespaces.write().insert(name.to_string(), blob.into());
    }

    /// Raw blob currently stored for a namespace
    pub fn raw(&self, name: &str) -> Option<String> {
        self.namespaces.read().get(name).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn read_namespace(&self, name: &str) -> std::io::Result<Option<String>> {
        Ok(self.namespaces.read().get(name).cloned())
    }

    fn write_namespace(&self, name: &str, blob: &str) -> std::io::Result<()> {
        self.namespaces
            .write()
            .insert(name.to_string(), blob.to_string());
        Ok(())
    }

    fn clear_namespace(&self, name: &str) -> std::io::Result<()> {
        self.namespaces.write().remove(name);
        Ok(())
    }
}

/// Typed view over a [`KeyValueStore`]
#[derive(Clone)]
pub struct NamespaceStore {
    backend: Arc<dyn KeyValueStore>,
}

impl NamespaceStore {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Load a namespace as ordered `(key, value)` pairs
    ///
    /// Absent, unreadable or malformed namespaces load as empty. A malformed
    /// namespace is cleared so it cannot poison later loads.
    pub fn load<T: DeserializeOwned>(&self, namespace: &str) -> Vec<(CacheKey, T)> {
        let blob = match self.backend.read_namespace(namespace) {
            Ok(Some(blob)) => blob,
            Ok(None) => return Vec::new(),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                // Not valid UTF-8: as corrupt as malformed JSON
                self.discard_corrupt(namespace, &e);
                return Vec::new();
            },
            Err(e) => {
                tracing::warn!(namespace, error = %e, "Failed to read cache namespace, starting empty");
                return Vec::new();
            },
        };

        match serde_json::from_str::<Vec<(CacheKey, T)>>(&blob) {
            Ok(pairs) => {
                tracing::debug!(namespace, entries = pairs.len(), "Loaded cache namespace");
                pairs
            },
            Err(e) => {
                self.discard_corrupt(namespace, &e);
                Vec::new()
            },
        }
    }

    fn discard_corrupt(&self, namespace: &str, error: &dyn std::error::Error) {
        tracing::warn!(
            namespace,
            error = %error,
            "Cache namespace is corrupt, clearing it"
        );
        if let Err(clear_err) = self.backend.clear_namespace(namespace) {
            tracing::warn!(namespace, error = %clear_err, "Failed to clear corrupt namespace");
        }
    }

    /// Replace a namespace with the given pairs
    pub fn save<'a, T, I>(&self, namespace: &str, pairs: I) -> Result<(), StoreError>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = (&'a CacheKey, &'a T)>,
    {
        let pairs: Vec<(&CacheKey, &T)> = pairs.into_iter().collect();
        let blob = serde_json::to_string(&pairs).map_err(|e| StoreError::Serialize {
            namespace: namespace.to_string(),
            source: e,
        })?;
        self.backend
            .write_namespace(namespace, &blob)
            .map_err(|e| StoreError::Write {
                namespace: namespace.to_string(),
                source: e,
            })
    }
}

impl std::fmt::Debug for NamespaceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceStore").finish_non_exhaustive()
    }
}
