//! `vindex-core` ambient configuration.
//!
//! Layered configuration following profile → file → environment precedence:
//! compiled-in defaults, an optional TOML file, then `VIDX_`-prefixed
//! environment variables.
//!
//! This layer is orthogonal to [`crate::meta::IndexMeta`]: `IndexMeta`
//! describes one index's parameters and is persisted with it; `Config`
//! describes process-wide ambient policy (cache sizing, I/O strategy,
//! parallelism) that is never serialized into an index file.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`VIDX_*`)
//! 2. Configuration file (`vindex.toml`)
//! 3. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration from file or environment.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A value failed validation.
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

/// Cache configuration section (backs the default [`crate::cache::SharedCache`], C11).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Total capacity of the default cache, in bytes.
    pub capacity_bytes: u64,
    /// Number of shards; must be a power of two.
    pub shard_count: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 1 << 30, // 1 GiB
            shard_count: 16,
        }
    }
}

/// I/O configuration section (block-cache inverted-list reads, C7/4.4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Prefer `O_DIRECT` opens when the filesystem supports them.
    pub prefer_direct: bool,
    /// Aligned block size in bytes for list reads.
    pub block_size: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            prefer_direct: true,
            block_size: 4096,
        }
    }
}

/// Parallelism configuration section (IVF-PQ scan, C7/4.4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelismConfig {
    /// Scan partitioning mode: 0 = per-query, 1 = per-probe, 2 = flat product.
    pub scan_mode: u8,
    /// Maximum worker threads; 0 = use all available cores.
    pub max_threads: usize,
}

impl Default for ParallelismConfig {
    fn default() -> Self {
        Self {
            scan_mode: 0,
            max_threads: 0,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Root configuration structure for `vindex-core`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Default cache sizing.
    pub cache: CacheConfig,
    /// Block-cache I/O policy.
    pub io: IoConfig,
    /// Scan parallelism policy.
    pub parallelism: ParallelismConfig,
    /// Logging policy.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from `vindex.toml` in the current directory,
    /// falling back to defaults when absent, then applies `VIDX_*` env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or environment values fail to parse.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("vindex.toml")
    }

    /// Loads configuration from a specific TOML file path.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("VIDX_").split("_").lowercase(false));

        let cfg: Self = figment.extract().map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Builds a configuration from a TOML string (mainly for tests).
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        let cfg: Self = figment.extract().map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cache.shard_count.is_power_of_two() || self.cache.shard_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache.shard_count".to_string(),
                message: format!(
                    "value {} must be a non-zero power of two",
                    self.cache.shard_count
                ),
            });
        }

        if self.io.block_size == 0 || self.io.block_size % 4096 != 0 {
            return Err(ConfigError::InvalidValue {
                key: "io.block_size".to_string(),
                message: format!(
                    "value {} must be a non-zero multiple of 4096",
                    self.io.block_size
                ),
            });
        }

        if self.parallelism.scan_mode > 2 {
            return Err(ConfigError::InvalidValue {
                key: "parallelism.scan_mode".to_string(),
                message: format!(
                    "value {} is out of range [0, 2]",
                    self.parallelism.scan_mode
                ),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                message: format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        Ok(())
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
