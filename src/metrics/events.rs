//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence while tailing files.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! Prometheus metric. Without an installed recorder they are no-ops.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when rows are appended to column buffers.
pub struct RowsRead {
    pub count: u64,
}

impl InternalEvent for RowsRead {
    fn emit(self) {
        trace!(count = self.count, "Rows read");
        counter!("fileplotter_rows_read_total").increment(self.count);
    }
}

/// Event emitted when an increment was larger than the column capacity and
/// its oldest rows were dropped before buffering.
pub struct RowsDropped {
    pub count: u64,
}

impl InternalEvent for RowsDropped {
    fn emit(self) {
        trace!(count = self.count, "Rows dropped before buffering");
        counter!("fileplotter_rows_dropped_total").increment(self.count);
    }
}

/// Event emitted when a size probe could not reach the end of a decoded stream.
pub struct SizeProbeDegraded {
    pub codec: &'static str,
}

impl InternalEvent for SizeProbeDegraded {
    fn emit(self) {
        trace!(codec = self.codec, "Size probe degraded to best effort");
        counter!("fileplotter_size_probe_degraded_total", "codec" => self.codec).increment(1);
    }
}

/// Event emitted when polling one path fails.
pub struct PollFailed {
    /// Stage label (`header` or `increment`).
    pub stage: &'static str,
}

impl InternalEvent for PollFailed {
    fn emit(self) {
        trace!(stage = self.stage, "Poll failed");
        counter!("fileplotter_poll_failures_total", "stage" => self.stage).increment(1);
    }
}

/// Event emitted when tracked entries are released.
pub struct FilesEvicted {
    pub count: u64,
}

impl InternalEvent for FilesEvicted {
    fn emit(self) {
        trace!(count = self.count, "Files evicted");
        counter!("fileplotter_files_evicted_total").increment(self.count);
    }
}

/// Gauge of the number of tracked files.
pub struct FilesTracked {
    pub count: usize,
}

impl InternalEvent for FilesTracked {
    fn emit(self) {
        trace!(count = self.count, "Files tracked");
        gauge!("fileplotter_files_tracked").set(self.count as f64);
    }
}

/// Event emitted when a poll cycle over the selection completes.
pub struct PollCycleCompleted {
    pub duration: Duration,
}

impl InternalEvent for PollCycleCompleted {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Poll cycle completed");
        histogram!("fileplotter_poll_cycle_duration_seconds").record(self.duration.as_secs_f64());
    }
}
