//! Binding between column buffers and whatever draws them.
//!
//! The data store never draws anything. It tells a [`RenderSink`] when a
//! series appears, grows, or goes away, and the sink owns every visual
//! concern, including colour assignment via a [`ColorCycle`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::store::{ColumnBuffer, Point};

/// Identifies one plotted series: a column of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub path: PathBuf,
    pub column: String,
}

impl SeriesKey {
    pub fn new(path: &Path, column: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            column: column.to_string(),
        }
    }

    /// Legend label: `<file name>:<column>`.
    pub fn label(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| self.path.to_string_lossy());
        format!("{}:{}", name, self.column)
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Receives series lifecycle notifications from the data store.
pub trait RenderSink {
    /// A column was observed for the first time; `buffer` holds its first points.
    fn series_created(&mut self, key: &SeriesKey, buffer: &ColumnBuffer);

    /// `new_points` were appended to an existing series.
    fn series_updated(&mut self, key: &SeriesKey, buffer: &ColumnBuffer, new_points: &[Point]);

    /// The series' file was evicted; release anything bound to it.
    fn series_detached(&mut self, key: &SeriesKey);
}

/// A sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn series_created(&mut self, _key: &SeriesKey, _buffer: &ColumnBuffer) {}

    fn series_updated(&mut self, _key: &SeriesKey, _buffer: &ColumnBuffer, _new_points: &[Point]) {}

    fn series_detached(&mut self, _key: &SeriesKey) {}
}

/// Category10 palette.
pub const CATEGORY10: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Infinite, restartable sequence of colours.
#[derive(Debug, Clone)]
pub struct ColorCycle {
    palette: &'static [&'static str],
    next: usize,
}

impl ColorCycle {
    pub fn new(palette: &'static [&'static str]) -> Self {
        Self { palette, next: 0 }
    }

    /// Start again from the first colour.
    pub fn restart(&mut self) {
        self.next = 0;
    }
}

impl Default for ColorCycle {
    fn default() -> Self {
        Self::new(CATEGORY10)
    }
}

impl Iterator for ColorCycle {
    type Item = &'static str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.palette.is_empty() {
            return None;
        }
        let color = self.palette[self.next % self.palette.len()];
        self.next = (self.next + 1) % self.palette.len();
        Some(color)
    }
}

/// Headless sink that logs series lifecycle and keeps a colour per series.
#[derive(Debug, Default)]
pub struct TracingSink {
    colors: ColorCycle,
    assigned: HashMap<SeriesKey, &'static str>,
}

impl TracingSink {
    pub fn new(colors: ColorCycle) -> Self {
        Self {
            colors,
            assigned: HashMap::new(),
        }
    }

    pub fn color_of(&self, key: &SeriesKey) -> Option<&'static str> {
        self.assigned.get(key).copied()
    }

    pub fn series_count(&self) -> usize {
        self.assigned.len()
    }
}

impl RenderSink for TracingSink {
    fn series_created(&mut self, key: &SeriesKey, buffer: &ColumnBuffer) {
        let color = self.colors.next().unwrap_or("black");
        self.assigned.insert(key.clone(), color);
        info!(
            series = %key,
            color,
            points = buffer.len(),
            last = buffer.last().map(|p| p.value),
            "New series"
        );
    }

    fn series_updated(&mut self, key: &SeriesKey, buffer: &ColumnBuffer, new_points: &[Point]) {
        debug!(
            series = %key,
            new_points = new_points.len(),
            points = buffer.len(),
            last = buffer.last().map(|p| p.value),
            "Series updated"
        );
    }

    fn series_detached(&mut self, key: &SeriesKey) {
        self.assigned.remove(key);
        info!(series = %key, "Series detached");
    }
}
