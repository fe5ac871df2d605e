use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::core::{FluenteError, Result};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML configuration format
    Toml,
    /// JSON configuration format
    Json,
}

impl ConfigFormat {
    /// Determine configuration format from file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml, // Default
        }
    }
}

/// Load and validate configuration from file
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(FluenteError::Config {
            message: format!("Configuration file not found: {}", path.display()),
        });
    }

    let content = fs::read_to_string(path)?;

    let config = match ConfigFormat::from_path(path) {
        ConfigFormat::Toml => parse_toml(&content)?,
        ConfigFormat::Json => parse_json(&content)?,
    };

    config.validate()?;
    tracing::debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

#[cfg(feature = "toml-support")]
fn parse_toml(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| FluenteError::Config {
        message: format!("Failed to parse TOML config: {e}"),
    })
}

#[cfg(not(feature = "toml-support"))]
fn parse_toml(_content: &str) -> Result<Config> {
    Err(FluenteError::Config {
        message: "TOML support not enabled. Enable 'toml-support' feature.".to_string(),
    })
}

fn parse_json(content: &str) -> Result<Config> {
    serde_json::from_str(content).map_err(|e| FluenteError::Config {
        message: format!("Failed to parse JSON config: {e}"),
    })
}
