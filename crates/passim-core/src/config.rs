//! `Passim` Configuration Module
//!
//! Provides configuration file support via `passim.toml` and environment
//! variables.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`PASSIM_*`, nested keys split on `__`,
//!    e.g. `PASSIM_SERVER__PORT=9000`)
//! 2. Configuration file (`passim.toml`)
//! 3. Default values

use crate::distance::DistanceMetric;
use crate::index::hnsw::{HnswParams, DEFAULT_SEED};
use crate::source::DEFAULT_BATCH_SIZE;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "passim.toml";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// HNSW index configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Similarity metric.
    pub metric: DistanceMetric,
    /// Number of connections per node (M parameter).
    pub m: usize,
    /// Size of the candidate pool during construction.
    pub ef_construction: usize,
    /// Default candidate pool size at query time.
    pub ef_search: usize,
    /// Level cap.
    pub max_level: usize,
    /// Level generator seed.
    pub seed: u64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::InnerProduct,
            m: 8,
            ef_construction: 200,
            ef_search: 64,
            max_level: 16,
            seed: DEFAULT_SEED,
        }
    }
}

impl HnswConfig {
    /// Builds validated graph parameters.
    pub fn to_params(&self) -> Result<HnswParams, ConfigError> {
        let params = HnswParams::new(self.m, self.ef_construction)
            .with_ef_search(self.ef_search)
            .with_max_level(self.max_level)
            .with_seed(self.seed);
        params
            .validate()
            .map_err(|e| ConfigError::invalid("hnsw", e.to_string()))?;
        Ok(params)
    }
}

/// Index build configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Rows per source batch.
    pub batch_size: usize,
    /// Save a checkpoint every N batches (0 = never).
    pub checkpoint_every: usize,
    /// Checkpoint file; required when `checkpoint_every > 0`.
    pub checkpoint_path: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            checkpoint_every: 0,
            checkpoint_path: None,
        }
    }
}

/// Search configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned by `POST /search`.
    pub default_top_k: usize,
    /// Upper bound on any requested `top_k`.
    pub max_top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 3,
            max_top_k: 1000,
        }
    }
}

/// Server configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address.
    pub host: String,
    /// Port number.
    pub port: u16,
    /// Persisted index file.
    pub index_path: String,
    /// Passage table (`doc_id \t text`).
    pub passages_path: String,
    /// Encoder endpoint.
    pub encoder_url: String,
    /// Encoder request timeout in milliseconds.
    pub encoder_timeout_ms: u64,
    /// Maximum HTTP body size in bytes.
    pub max_body_size: usize,
    /// Enable permissive CORS.
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            index_path: "hnsw_index.psm".to_string(),
            passages_path: "collection.tsv".to_string(),
            encoder_url: "http://127.0.0.1:8001/embed".to_string(),
            encoder_timeout_ms: 5_000,
            max_body_size: 1_048_576, // 1 MB
            cors_enabled: true,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,
    /// Log format: text or json.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Main `Passim` configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PassimConfig {
    /// HNSW index configuration.
    pub hnsw: HnswConfig,
    /// Build configuration.
    pub build: BuildConfig,
    /// Search configuration.
    pub search: SearchConfig,
    /// Server configuration.
    pub server: ServerConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl PassimConfig {
    /// Loads configuration from `passim.toml` in the working directory.
    ///
    /// Priority: defaults < file < environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(DEFAULT_CONFIG_FILE)
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("PASSIM_").split("__"))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hnsw.to_params()?;

        if self.build.batch_size == 0 {
            return Err(ConfigError::invalid("build.batch_size", "must be > 0"));
        }
        if self.build.checkpoint_every > 0 && self.build.checkpoint_path.is_none() {
            return Err(ConfigError::invalid(
                "build.checkpoint_path",
                "required when build.checkpoint_every > 0",
            ));
        }

        if self.search.max_top_k == 0 {
            return Err(ConfigError::invalid("search.max_top_k", "must be > 0"));
        }
        if self.search.default_top_k == 0 || self.search.default_top_k > self.search.max_top_k {
            return Err(ConfigError::invalid(
                "search.default_top_k",
                format!(
                    "value {} is out of range [1, {}]",
                    self.search.default_top_k, self.search.max_top_k
                ),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "must be > 0"));
        }
        if self.server.encoder_timeout_ms == 0 {
            return Err(ConfigError::invalid("server.encoder_timeout_ms", "must be > 0"));
        }
        if self.server.max_body_size == 0 {
            return Err(ConfigError::invalid("server.max_body_size", "must be > 0"));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!(
                    "value '{}' is invalid, expected one of: {valid_levels:?}",
                    self.logging.level
                ),
            ));
        }
        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::invalid(
                "logging.format",
                format!(
                    "value '{}' is invalid, expected one of: {valid_formats:?}",
                    self.logging.format
                ),
            ));
        }

        Ok(())
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
