//! Configuration loading and validation.
//!
//! Configuration comes from an optional YAML file (with environment variable
//! interpolation) and is then overridden field by field from the command line.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{
    ConfigError, EmptyDirectorySnafu, EnvInterpolationSnafu, InvalidDelimiterSnafu,
    ReadFileSnafu, YamlParseSnafu, ZeroMaxRowsSnafu, ZeroPollIntervalSnafu,
};
use crate::source::ReaderConfig;
use crate::store::{DEFAULT_MAX_ROWS, StoreConfig};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub store: StoreSection,
    /// Milliseconds between poll cycles (default: 200).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Columns to follow. Empty means every column of every selected file.
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            store: StoreSection::default(),
            poll_interval_ms: default_poll_interval_ms(),
            columns: Vec::new(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    200
}

/// Where to look for files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Directory scanned recursively for delimited files (default: `.`).
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Only files modified within this many seconds (default: one day,
    /// `null`: no limit).
    #[serde(default = "default_changed_since_secs")]
    pub changed_since_secs: Option<u64>,
    /// Seconds between directory rescans (default: 5).
    #[serde(default = "default_rescan_interval_secs")]
    pub rescan_interval_secs: u64,
    /// How many of the most recent files to follow (default: 1).
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            changed_since_secs: default_changed_since_secs(),
            rescan_interval_secs: default_rescan_interval_secs(),
            max_files: default_max_files(),
        }
    }
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_changed_since_secs() -> Option<u64> {
    Some(24 * 60 * 60)
}

fn default_rescan_interval_secs() -> u64 {
    5
}

fn default_max_files() -> usize {
    1
}

impl SourceConfig {
    pub fn changed_since(&self) -> Option<Duration> {
        self.changed_since_secs.map(Duration::from_secs)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_interval_secs)
    }
}

/// Buffer and parsing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Per-column buffer capacity (default: 15000).
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    /// Field delimiter (default: `,`).
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

fn default_delimiter() -> String {
    ",".to_string()
}

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether to serve metrics (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "127.0.0.1:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_address() -> String {
    "127.0.0.1:9090".to_string()
}

impl Config {
    /// Load configuration from a YAML file, interpolating environment variables.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, interpolating environment variables.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let text = vars::interpolate(yaml).map_err(|problems| {
            EnvInterpolationSnafu {
                message: problems.join("\n"),
            }
            .build()
        })?;
        serde_yaml::from_str(&text).context(YamlParseSnafu)
    }

    /// Check values that serde can't.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.source.directory.as_os_str().is_empty(), EmptyDirectorySnafu);
        ensure!(self.store.max_rows > 0, ZeroMaxRowsSnafu);
        ensure!(self.poll_interval_ms > 0, ZeroPollIntervalSnafu);
        self.delimiter_byte()?;
        Ok(())
    }

    /// The delimiter as a single byte.
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        match self.store.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => InvalidDelimiterSnafu {
                delimiter: self.store.delimiter.clone(),
            }
            .fail(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Store settings. Call after [`Config::validate`].
    pub fn store_config(&self) -> Result<StoreConfig, ConfigError> {
        Ok(StoreConfig {
            max_rows: self.store.max_rows,
            reader: ReaderConfig {
                delimiter: self.delimiter_byte()?,
            },
        })
    }
}
