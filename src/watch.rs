//! Directory watcher: keeps the selection pointed at the newest files and
//! polls them on every tick.

use std::path::PathBuf;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::SourceConfig;
use crate::error::DiscoveryError;
use crate::polling::{IterationResult, PollingProcessor};
use crate::render::RenderSink;
use crate::session::Session;
use crate::source::find_latest_files;
use crate::store::Selection;

/// Rescans `source.directory` every `source.rescan_interval_secs`, follows
/// the `source.max_files` most recently modified files, and polls them.
///
/// With no configured columns, every column of every selected file is followed.
pub struct Watcher<S: RenderSink> {
    session: Session<S>,
    source: SourceConfig,
    columns: Vec<String>,
    last_scan: Option<Instant>,
}

impl<S: RenderSink> Watcher<S> {
    pub fn new(session: Session<S>, source: SourceConfig, columns: Vec<String>) -> Self {
        Self {
            session,
            source,
            columns,
            last_scan: None,
        }
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    fn rescan_due(&self) -> bool {
        self.last_scan
            .is_none_or(|at| at.elapsed() >= self.source.rescan_interval())
    }

    /// Rescan the directory and update the selection.
    pub fn rescan(&mut self) -> Result<(), DiscoveryError> {
        self.last_scan = Some(Instant::now());

        let mut files = find_latest_files(&self.source.directory, self.source.changed_since())?;
        files.truncate(self.source.max_files);

        let columns = if self.columns.is_empty() {
            self.all_columns(&files)
        } else {
            self.columns.clone()
        };
        debug!(files = files.len(), columns = columns.len(), "Rescanned directory");
        self.session.select(Selection::new(files, columns));
        Ok(())
    }

    /// Union of the selected files' columns, in first-seen order.
    fn all_columns(&self, files: &[PathBuf]) -> Vec<String> {
        let schemas = self.session.store().reader().read_column_names(files);
        let mut columns: Vec<String> = Vec::new();
        for path in files {
            let schema = match self.session.store().get(path) {
                Some(entry) => Some(entry.schema()),
                None => schemas.get(path),
            };
            for column in schema.into_iter().flat_map(|s| s.columns()) {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        columns
    }
}

impl<S: RenderSink> PollingProcessor for Watcher<S> {
    type Error = DiscoveryError;

    async fn process(&mut self, cold_start: bool) -> Result<IterationResult, DiscoveryError> {
        if self.rescan_due() {
            match self.rescan() {
                Ok(()) => {}
                // A directory that can't be listed at startup is a setup error.
                Err(e) if cold_start => return Err(e),
                Err(e) => {
                    warn!(error = %snafu::Report::from_error(&e), "Rescan failed, keeping previous selection");
                }
            }
        }

        let summary = self.session.poll_cycle();
        let processed = summary.rows_added > 0;
        if processed {
            debug!(
                polled = summary.polled,
                skipped = summary.skipped,
                failed = summary.failed,
                rows_added = summary.rows_added,
                "Poll cycle"
            );
        }
        if processed {
            Ok(IterationResult::ProcessedItems)
        } else {
            Ok(IterationResult::NoItems)
        }
    }
}
