//! The data store: tracked files and their per-column rolling buffers.
//!
//! An external scheduler calls [`DataStore::poll_selection`] (or
//! [`DataStore::poll`] per path) once per cycle with the current selection,
//! and [`DataStore::evict`] whenever the selected files change. Polling is
//! not reentrant; the store assumes one caller at a time.

mod buffer;
mod entry;

pub use buffer::{ColumnBuffer, Point};
pub use entry::TrackedFile;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::emit;
use crate::error::{HeaderSnafu, IncrementSnafu, PollError};
use crate::metrics::events::{
    FilesEvicted, FilesTracked, PollCycleCompleted, PollFailed, RowsDropped, RowsRead,
};
use crate::render::{RenderSink, SeriesKey};
use crate::source::{DelimitedReader, ReaderConfig};

/// Default per-column capacity.
pub const DEFAULT_MAX_ROWS: usize = 15_000;

/// Store settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Per-column buffer capacity, and the most rows taken from one increment.
    pub max_rows: usize,
    pub reader: ReaderConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            reader: ReaderConfig::default(),
        }
    }
}

/// The files and columns currently of interest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub files: Vec<PathBuf>,
    pub columns: Vec<String>,
}

impl Selection {
    pub fn new(files: Vec<PathBuf>, columns: Vec<String>) -> Self {
        Self { files, columns }
    }
}

/// Result of polling one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// None of the requested columns exist in the file; nothing changed.
    Skipped,
    /// The file was read.
    Updated {
        /// Row counter after this poll.
        rows: u64,
        /// Rows added to the buffers by this poll.
        added: usize,
    },
}

/// Totals for one poll cycle over a selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub polled: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rows_added: usize,
}

/// Owns every tracked file. The only mutator of the path → entry mapping.
#[derive(Debug)]
pub struct DataStore {
    config: StoreConfig,
    reader: DelimitedReader,
    entries: BTreeMap<PathBuf, TrackedFile>,
    /// Consecutive failures per path, for log de-duplication.
    failures: HashMap<PathBuf, u32>,
}

impl DataStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            reader: DelimitedReader::new(config.reader),
            entries: BTreeMap::new(),
            failures: HashMap::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn reader(&self) -> &DelimitedReader {
        &self.reader
    }

    pub fn get(&self, path: &Path) -> Option<&TrackedFile> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// Poll one path for new rows of `requested` columns.
    ///
    /// Creates the entry on first sight by reading the header. Requested
    /// columns missing from the schema are ignored; if none remain the file
    /// is skipped. On error the entry is left as it was (or not created).
    pub fn poll(
        &mut self,
        path: &Path,
        requested: &[String],
        sink: &mut dyn RenderSink,
    ) -> Result<PollOutcome, PollError> {
        let max_rows = self.config.max_rows;
        let reader = &self.reader;

        if !self.entries.contains_key(path) {
            let schema = reader.read_schema(path).context(HeaderSnafu { path })?;
            debug!(path = %path.display(), %schema, "Tracking file");
            self.entries
                .insert(path.to_path_buf(), TrackedFile::new(schema));
            emit!(FilesTracked {
                count: self.entries.len()
            });
        }
        let Some(entry) = self.entries.get_mut(path) else {
            return Ok(PollOutcome::Skipped);
        };

        let columns = entry.schema().select(requested);
        if columns.is_empty() {
            return Ok(PollOutcome::Skipped);
        }

        let increment = entry
            .read_increment(reader, path, &columns)
            .context(IncrementSnafu { path })?;

        let read = increment.frame.num_rows();
        let frame = increment.frame.tail(max_rows);
        if read > frame.num_rows() {
            emit!(RowsDropped {
                count: (read - frame.num_rows()) as u64
            });
        }

        let start = entry.rows();
        let added = frame.num_rows();
        for (column, values) in frame.iter() {
            let points: Vec<Point> = values
                .iter()
                .enumerate()
                .map(|(i, value)| Point::new(start + i as u64, *value))
                .collect();
            let key = SeriesKey::new(path, column);

            match entry.buffer_mut(column) {
                Some(buffer) => {
                    buffer.append(points.iter().copied(), max_rows);
                    if !points.is_empty() {
                        sink.series_updated(&key, buffer, &points);
                    }
                }
                None => {
                    let buffer =
                        entry.insert_buffer(column.to_string(), ColumnBuffer::create(points, max_rows));
                    sink.series_created(&key, buffer);
                }
            }
        }

        entry.advance_rows(added as u64);
        if added > 0 {
            emit!(RowsRead {
                count: added as u64
            });
        }

        Ok(PollOutcome::Updated {
            rows: entry.rows(),
            added,
        })
    }

    /// Poll every selected file. Failures are logged per path and never
    /// abort the cycle.
    pub fn poll_selection(
        &mut self,
        selection: &Selection,
        sink: &mut dyn RenderSink,
    ) -> CycleSummary {
        let started = Instant::now();
        let mut summary = CycleSummary::default();

        for path in &selection.files {
            match self.poll(path, &selection.columns, sink) {
                Ok(PollOutcome::Updated { rows, added }) => {
                    self.record_success(path);
                    summary.polled += 1;
                    summary.rows_added += added;
                    if added > 0 {
                        debug!(path = %path.display(), rows, added, "Polled file");
                    }
                }
                Ok(PollOutcome::Skipped) => {
                    self.record_success(path);
                    summary.skipped += 1;
                }
                Err(e) => {
                    self.record_failure(path, &e);
                    summary.failed += 1;
                }
            }
        }

        emit!(PollCycleCompleted {
            duration: started.elapsed()
        });
        summary
    }

    /// Release every entry whose path is not in `selected`.
    ///
    /// Each buffer's series is detached from `sink` before its entry (and the
    /// entry's open file) is dropped. Returns the number of entries released.
    pub fn evict(&mut self, selected: &[PathBuf], sink: &mut dyn RenderSink) -> usize {
        let keep: HashSet<&Path> = selected.iter().map(PathBuf::as_path).collect();
        let stale: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|path| !keep.contains(path.as_path()))
            .cloned()
            .collect();

        for path in &stale {
            if let Some(entry) = self.entries.remove(path) {
                for column in entry.buffers().keys() {
                    sink.series_detached(&SeriesKey::new(path, column));
                }
                info!(path = %path.display(), rows = entry.rows(), "Evicted file");
            }
        }
        self.failures.retain(|path, _| keep.contains(path.as_path()));

        if !stale.is_empty() {
            emit!(FilesEvicted {
                count: stale.len() as u64
            });
            emit!(FilesTracked {
                count: self.entries.len()
            });
        }
        stale.len()
    }

    fn record_success(&mut self, path: &Path) {
        if self.failures.remove(path).is_some() {
            info!(path = %path.display(), "File readable again");
        }
    }

    fn record_failure(&mut self, path: &Path, error: &PollError) {
        emit!(PollFailed {
            stage: error.stage()
        });
        let count = self.failures.entry(path.to_path_buf()).or_default();
        *count += 1;
        if *count == 1 {
            warn!(path = %path.display(), stage = error.stage(), error = %snafu::Report::from_error(error), "Failed to poll file, will retry");
        } else {
            debug!(path = %path.display(), stage = error.stage(), failures = *count, "Still failing to poll file");
        }
    }
}
