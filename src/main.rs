//! fileplotter: follow the newest delimited files in a directory and keep a
//! rolling window of their columns.
//!
//! Series lifecycle is logged through `tracing`; set `--log-level debug` to
//! see every update.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use fileplotter::config::Config;
use fileplotter::error::{AddressParseSnafu, AppError, ConfigSnafu, MetricsSnafu};
use fileplotter::metrics;
use fileplotter::polling::run_polling_loop;
use fileplotter::render::TracingSink;
use fileplotter::session::Session;
use fileplotter::signal::shutdown_token;
use fileplotter::watch::Watcher;

/// Tail growing (optionally gzip/bzip2/zstd-compressed) CSV files.
#[derive(Parser, Debug)]
#[command(name = "fileplotter")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to scan for delimited files.
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Per-column buffer capacity.
    #[arg(long)]
    max_rows: Option<usize>,

    /// Milliseconds between poll cycles.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Column to follow (repeatable). Default: every column.
    #[arg(long = "column", value_name = "NAME")]
    columns: Vec<String>,

    /// Number of most recently modified files to follow.
    #[arg(long)]
    max_files: Option<usize>,

    /// Ignore files not modified within this many seconds.
    #[arg(long)]
    changed_since_secs: Option<u64>,

    /// Field delimiter.
    #[arg(long)]
    delimiter: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // No rate-limiting layer: DataStore logs a failing path at warn once,
    // then at debug until it recovers.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = build_config(&args)?;
    config.validate().context(ConfigSnafu)?;

    let shutdown = shutdown_token();

    if config.metrics.enabled {
        let addr = config.metrics.address.parse().context(AddressParseSnafu)?;
        metrics::init(addr, shutdown.clone()).context(MetricsSnafu)?;
        debug!(%addr, "Metrics enabled");
    }

    info!(
        directory = %config.source.directory.display(),
        max_files = config.source.max_files,
        max_rows = config.store.max_rows,
        poll_interval_ms = config.poll_interval_ms,
        "fileplotter starting"
    );

    let session = Session::new(
        config.store_config().context(ConfigSnafu)?,
        TracingSink::default(),
    );
    let mut watcher = Watcher::new(session, config.source.clone(), config.columns.clone());

    run_polling_loop(&mut watcher, config.poll_interval(), shutdown).await?;

    info!(
        files = watcher.session().store().len(),
        "fileplotter stopped"
    );
    Ok(())
}

/// Load the config file (if any) and apply command-line overrides.
fn build_config(args: &Args) -> Result<Config, AppError> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).context(ConfigSnafu)?,
        None => Config::default(),
    };

    if let Some(directory) = &args.directory {
        config.source.directory = directory.clone();
    }
    if let Some(max_rows) = args.max_rows {
        config.store.max_rows = max_rows;
    }
    if let Some(poll_interval_ms) = args.poll_interval_ms {
        config.poll_interval_ms = poll_interval_ms;
    }
    if !args.columns.is_empty() {
        config.columns = args.columns.clone();
    }
    if let Some(max_files) = args.max_files {
        config.source.max_files = max_files;
    }
    if let Some(secs) = args.changed_since_secs {
        config.source.changed_since_secs = Some(secs);
    }
    if let Some(delimiter) = &args.delimiter {
        config.store.delimiter = delimiter.clone();
    }

    Ok(config)
}
