//! Configuration for freezing and session storage.

use crate::error::{FragmentError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration, read from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FragmentConfig {
    /// Freeze-related configuration.
    #[serde(default)]
    pub freeze: FreezeConfig,

    /// Storage-related configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl FragmentConfig {
    /// Load configuration from `<dir>/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("config.toml");
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| FragmentError::ConfigError(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| FragmentError::ConfigError(format!("failed to parse config: {}", e)))
        } else {
            Ok(FragmentConfig::default())
        }
    }

    /// Save configuration to `<dir>/config.toml`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join("config.toml");
        let content = toml::to_string_pretty(self)
            .map_err(|e| FragmentError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| FragmentError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// Freeze-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FreezeConfig {
    /// How long freeze waits for a pasted fragment's description
    /// before substituting a placeholder (default: 10000).
    pub paste_description_timeout_ms: u64,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            paste_description_timeout_ms: 10_000,
        }
    }
}

impl FreezeConfig {
    /// Get the paste description timeout as a Duration.
    pub fn paste_description_timeout(&self) -> Duration {
        Duration::from_millis(self.paste_description_timeout_ms)
    }
}

/// Storage-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Compression level for zstd (1-22, default: 3).
    pub compression_level: i32,

    /// Largest image payload accepted when reading image files (default: 20 MiB).
    pub max_image_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            compression_level: 3,
            max_image_bytes: 20 * 1024 * 1024,
        }
    }
}
