//! Explicit poll context: the data store, the render sink and the current selection.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::info;

use crate::render::RenderSink;
use crate::store::{CycleSummary, DataStore, Selection, StoreConfig};

/// Owns everything one poll cycle needs.
///
/// Changing the selected file set evicts entries that fell out of it before
/// the next cycle. Changing only the columns keeps every entry; files whose
/// requested columns no longer intersect their schema are skipped.
pub struct Session<S: RenderSink> {
    store: DataStore,
    sink: S,
    selection: Selection,
}

impl<S: RenderSink> Session<S> {
    pub fn new(config: StoreConfig, sink: S) -> Self {
        Self {
            store: DataStore::new(config),
            sink,
            selection: Selection::default(),
        }
    }

    /// Replace the selection. Returns the number of entries evicted.
    pub fn select(&mut self, selection: Selection) -> usize {
        let before: BTreeSet<&PathBuf> = self.selection.files.iter().collect();
        let after: BTreeSet<&PathBuf> = selection.files.iter().collect();
        let files_changed = before != after;

        let evicted = if files_changed {
            self.store.evict(&selection.files, &mut self.sink)
        } else {
            0
        };
        if files_changed || self.selection.columns != selection.columns {
            info!(
                files = selection.files.len(),
                columns = ?selection.columns,
                evicted,
                "Selection changed"
            );
        }
        self.selection = selection;
        evicted
    }

    /// Poll every selected file once.
    pub fn poll_cycle(&mut self) -> CycleSummary {
        self.store.poll_selection(&self.selection, &mut self.sink)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
