//! Configuration loading
//!
//! Settings are layered, lowest priority first:
//! 1. Built-in defaults
//! 2. A TOML file (`valbridge.toml` in the working directory when present, or
//!    the path given to the builder / `VALBRIDGE_CONFIG_PATH`, which must exist)
//! 3. `VALBRIDGE_*` environment variables, with `__` between section and key
//!    (`VALBRIDGE_ENGINE__MAX_STACK_SIZE=2048`)
//!
//! A `.env` file in the working directory is loaded first when present.
//!
//! # Example
//!
//! ```no_run
//! use valbridge_core::config::Config;
//!
//! let config = Config::builder()
//!     .config_path(Some("bridge.toml".into()))
//!     .build()?;
//! assert!(config.engine.max_stack_size > 0);
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "VALBRIDGE";

const CONFIG_PATH_VAR: &str = "VALBRIDGE_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "valbridge";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub record: RecordConfig,
}

/// Limits of the script engine surface
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of stack slots across all frames
    pub max_stack_size: usize,

    /// Box allocations between automatic collections (0 disables them)
    pub gc_pause: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_stack_size: 1024,
            gc_pause: 256,
        }
    }
}

/// Settings for the in-memory record store
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    /// Longest accepted bin name
    pub max_bin_name_len: usize,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            max_bin_name_len: 14,
        }
    }
}

impl Config {
    /// Start building a layered configuration
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load configuration from the default file search and environment
    pub fn load() -> Result<Config> {
        Self::builder().build()
    }

    /// Parse an inline TOML document; missing keys take their defaults
    pub fn from_toml_str(source: &str) -> Result<Config> {
        toml::from_str(source).context("Failed to parse configuration TOML")
    }
}

/// Builder for layered configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Set the config file path (overrides the default search)
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Resolve every layer into a `Config`
    pub fn build(self) -> Result<Config> {
        // A missing .env is the common case
        let _ = dotenvy::dotenv();

        let path = self
            .config_path
            .or_else(|| std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from));

        let builder = match &path {
            Some(path) => config::Config::builder()
                .add_source(config::File::from(path.as_path()).required(true)),
            None => config::Config::builder()
                .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration values")
    }
}
