//! # Fluente Core
//!
//! Caching, prefetch and streaming core for a language-learning app whose
//! content is generated on demand.
//!
//! This crate provides:
//! - Durable per-kind caches of generated content (conjugations, examples,
//!   vocabulary, scenes, speech)
//! - A prefetch coordinator that runs at most one generation per key and
//!   warms likely-next content in the background
//! - A generation gateway that classifies backend failures
//! - A tutor reply sequencer that delivers correction, reply text and
//!   translation in strict order
//!
//! ## Feature Flags
//!
//! - `ureq`: Ollama HTTP backend
//! - `toml-support`: TOML configuration files
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use fluente_core::{Config, ContentLibrary, ExclusionSet, MemoryStore, MockGenerator};
//!
//! # async fn example() -> fluente_core::Result<()> {
//! let config = Config::default();
//! let library = ContentLibrary::new(
//!     &config,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MockGenerator::new()),
//! );
//!
//! let _table = library.conjugation("falar").await?;
//! let _words = library.vocabulary("Food", &ExclusionSet::new()).await?;
//! library.on_verb_selected(&["falar".to_string(), "comer".to_string()], 0);
//! library.quiesce().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Durable content caches and their store
pub mod caching;
/// Configuration management and loading
pub mod config;
/// Error taxonomy and shared traits
pub mod core;
/// Content shapes, generation gateway and mock generator
pub mod generation;
/// Facade wiring caches, coordinator and gateway
pub mod library;
/// Ollama LLM integration
pub mod ollama;
/// Request coalescing and predictive warm-up
pub mod prefetch;
/// Streamed tutor replies
pub mod tutor;

pub use crate::caching::{CacheKey, ContentCache, FileStore, MemoryStore, NamespaceStore, StoreError};
pub use crate::config::Config;
pub use crate::core::{
    ContentGenerator, ErrorContext, FluenteError, GenerationRequest, KeyValueStore, RenderSink,
    ReplyStream, Result, ServiceError, TutorBackend,
};
pub use crate::generation::{
    ContentKind, ErrorClassification, ExclusionSet, GenerationError, GenerationGateway,
    MockGenerator,
};
pub use crate::library::{ContentLibrary, ContentSource};
pub use crate::prefetch::{PrefetchCoordinator, TaskTracker};
pub use crate::tutor::{
    drive_reply, ChatMessage, Conversation, Correction, FailurePolicy, MockTutor, StreamFailure,
    StreamedReply, TutorError,
};

#[cfg(feature = "ureq")]
pub use crate::ollama::OllamaClient;
pub use crate::ollama::OllamaConfig;
