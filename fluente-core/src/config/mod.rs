//! Runtime configuration
//!
//! Every section has defaults, so an empty file (or none at all) is a valid
//! configuration.

pub mod loader;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{FluenteError, Result};
use crate::ollama::OllamaConfig;
use crate::tutor::FailurePolicy;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where caches are persisted
    pub store: StoreConfig,
    /// Background warm-up behaviour
    pub prefetch: PrefetchConfig,
    /// Content generation limits
    pub generation: GenerationConfig,
    /// Chat tutor behaviour
    pub tutor: TutorConfig,
    /// Local Ollama server
    pub ollama: OllamaConfig,
}

/// Persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one JSON file per namespace
    pub directory: PathBuf,
    /// Persist synthesized speech across restarts
    pub persist_speech: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".fluente/cache"),
            persist_speech: false,
        }
    }
}

/// Prefetch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Idle delay before the startup warm-up begins
    pub startup_delay_ms: u64,
    /// Items after the selected one to warm
    pub lookahead: usize,
    /// Warm speech for sentences as they are shown
    pub warm_speech: bool,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: 1500,
            lookahead: 2,
            warm_speech: true,
        }
    }
}

impl PrefetchConfig {
    /// Startup delay as a [`Duration`]
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

/// Generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Deadline for a single generation request
    pub timeout_seconds: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
        }
    }
}

impl GenerationConfig {
    /// Deadline as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Tutor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    /// What happens to a message whose reply failed
    pub failure_policy: FailurePolicy,
    /// Prior turns sent as context
    pub history_limit: usize,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            history_limit: 20,
        }
    }
}

impl Config {
    /// Check values that would make the runtime misbehave
    pub fn validate(&self) -> Result<()> {
        if self.generation.timeout_seconds == 0 {
            return Err(FluenteError::Config {
                message: "generation.timeout_seconds must be greater than zero".to_string(),
            });
        }
        if self.ollama.timeout_seconds == 0 {
            return Err(FluenteError::Config {
                message: "ollama.timeout_seconds must be greater than zero".to_string(),
            });
        }
        if self.prefetch.lookahead == 0 {
            return Err(FluenteError::Config {
                message: "prefetch.lookahead must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
