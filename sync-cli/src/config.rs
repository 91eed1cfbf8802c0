//! Configuration loading for mirror-sync.
//!
//! Configuration is loaded from a TOML file (default: `mirror-sync.toml`
//! in the working directory, if present). Every section is optional.

use mirror_sync_types::{CollectionSpec, OrderBy, SortDirection};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "mirror-sync.toml";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Mirrored collection.
    #[serde(default)]
    pub collection: CollectionConfig,
    /// Session behaviour.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, used when `RUST_LOG` is unset (default: info).
    #[serde(default = "default_filter")]
    pub filter: String,
}

/// Collection configuration (default: chat history).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollectionConfig {
    /// Collection name under each subject.
    #[serde(default = "default_collection_name")]
    pub name: String,
    /// Field the subscription is ordered by.
    #[serde(default = "default_order_field")]
    pub order_field: String,
    /// Sort direction.
    #[serde(default = "default_direction")]
    pub direction: SortDirection,
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// How long to wait for the mirror to catch up after each step (default: 2000).
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_collection_name() -> String {
    "messages".to_string()
}

fn default_order_field() -> String {
    "timestamp".to_string()
}

fn default_direction() -> SortDirection {
    SortDirection::Ascending
}

fn default_settle_timeout_ms() -> u64 {
    2000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: default_collection_name(),
            order_field: default_order_field(),
            direction: default_direction(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_timeout_ms: default_settle_timeout_ms(),
        }
    }
}

impl From<CollectionSpec> for CollectionConfig {
    fn from(spec: CollectionSpec) -> Self {
        Self {
            name: spec.name,
            order_field: spec.order_by.field,
            direction: spec.order_by.direction,
        }
    }
}

impl CollectionConfig {
    /// The collection spec this section describes.
    pub fn spec(&self) -> CollectionSpec {
        let order_by = OrderBy {
            field: self.order_field.clone(),
            direction: self.direction,
        };
        CollectionSpec::new(&self.name, order_by)
    }
}

impl SessionConfig {
    /// Settle timeout as a duration.
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load an explicit config file, or the default file if it exists, or
    /// fall back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
