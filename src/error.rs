//! Error types for fileplotter using snafu.
//!
//! Every failure in the core is scoped to one path for one poll cycle; only
//! configuration and metrics setup errors can stop the binary.

use snafu::prelude::*;
use std::path::PathBuf;

// ============ Reader Errors ============

/// Errors that can occur while reading a delimited file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReaderError {
    /// The file could not be opened.
    #[snafu(display("Failed to open {}", path.display()))]
    Open {
        source: std::io::Error,
        path: PathBuf,
    },

    /// The decoder for a compressed file could not be created.
    #[snafu(display("Failed to create {codec} decoder for {}", path.display()))]
    Decoder {
        source: std::io::Error,
        path: PathBuf,
        codec: &'static str,
    },

    /// Reading decoded bytes failed for a reason other than a truncated stream.
    #[snafu(display("Failed to read {}", path.display()))]
    Read {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Delimited records could not be split.
    #[snafu(display("Failed to parse records in {}", path.display()))]
    Parse { source: csv::Error, path: PathBuf },

    /// The file has no header line yet.
    #[snafu(display("No header line in {}", path.display()))]
    MissingHeader { path: PathBuf },
}

// ============ Poll Errors ============

/// Errors raised by a single `DataStore::poll` call.
///
/// These never abort a poll cycle; the path is retried on the next one.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PollError {
    /// The header could not be read, so no entry was created.
    #[snafu(display("Failed to read header of {}", path.display()))]
    Header { source: ReaderError, path: PathBuf },

    /// New rows could not be read; the entry is left unchanged.
    #[snafu(display("Failed to read new rows from {}", path.display()))]
    Increment { source: ReaderError, path: PathBuf },
}

impl PollError {
    /// Stage label used for metrics and logs.
    pub fn stage(&self) -> &'static str {
        match self {
            PollError::Header { .. } => "header",
            PollError::Increment { .. } => "increment",
        }
    }
}

// ============ Discovery Errors ============

/// Errors that can occur while scanning a directory for delimited files.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DiscoveryError {
    /// The directory walk failed.
    #[snafu(display("Failed to scan {}", dir.display()))]
    Walk {
        source: walkdir::Error,
        dir: PathBuf,
    },
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Directory is empty.
    #[snafu(display("Source directory cannot be empty"))]
    EmptyDirectory,

    /// Column capacity is zero.
    #[snafu(display("store.max_rows must be at least 1"))]
    ZeroMaxRows,

    /// Poll interval is zero.
    #[snafu(display("poll_interval_ms must be at least 1"))]
    ZeroPollInterval,

    /// Delimiter is not a single byte.
    #[snafu(display("Delimiter must be a single ASCII character, got {delimiter:?}"))]
    InvalidDelimiter { delimiter: String },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file {}", path.display()))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ App Error (top-level) ============

/// Top-level errors for the `fileplotter` binary.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Discovery error.
    #[snafu(display("Discovery error"))]
    Discovery { source: DiscoveryError },

    /// Address parsing error.
    #[snafu(display("Failed to parse metrics address"))]
    AddressParse { source: std::net::AddrParseError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },
}

impl From<ConfigError> for AppError {
    fn from(source: ConfigError) -> Self {
        AppError::Config { source }
    }
}

impl From<DiscoveryError> for AppError {
    fn from(source: DiscoveryError) -> Self {
        AppError::Discovery { source }
    }
}
