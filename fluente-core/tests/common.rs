//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use fluente_core::{Config, ContentLibrary, KeyValueStore, MemoryStore, MockGenerator};

/// Library over an in-memory store with a mock generator, no startup delay
pub struct Fixture {
    pub library: ContentLibrary,
    pub generator: Arc<MockGenerator>,
    pub store: Arc<MemoryStore>,
}

pub fn config() -> Config {
    let mut config = Config::default();
    config.prefetch.startup_delay_ms = 0;
    config
}

pub fn fixture() -> Fixture {
    fixture_with(config(), Arc::new(MemoryStore::new()), MockGenerator::new())
}

pub fn fixture_with(config: Config, store: Arc<MemoryStore>, generator: MockGenerator) -> Fixture {
    let generator = Arc::new(generator);
    let backend: Arc<dyn KeyValueStore> = store.clone();
    let library = ContentLibrary::new(&config, backend, generator.clone());
    Fixture {
        library,
        generator,
        store,
    }
}

/// Verb list in display order
pub fn verbs(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
