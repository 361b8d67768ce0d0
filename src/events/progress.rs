//! # Progress calculation.
//!
//! [`ProgressTracker`] turns hook arguments into [`ProgressEvent`]s. Cells run
//! one at a time, so a single start timestamp is enough.
//!
//! ```text
//! cell_started(t0)                 → remember t0
//! cell_completed(i, n, t1)         → progress = round(100·(i+1)/n), duration = t1 - t0
//! cell_raised(i, t)                → error event, sentinels, start = end = t
//! ```

use chrono::{DateTime, Utc};

use crate::events::event::ProgressEvent;

/// Percentage complete after cell `index` of `total` finished.
///
/// `round(100 · (index + 1) / total)`, half away from zero. A notebook with no
/// cells is reported as complete.
pub fn percent_complete(index: usize, total: usize) -> i64 {
    if total == 0 {
        return 100;
    }
    (100.0 * (index as f64 + 1.0) / total as f64).round() as i64
}

/// Derives progress events for one notebook run.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    notebook_id: String,
    cell_started: Option<DateTime<Utc>>,
}

impl ProgressTracker {
    /// Creates a tracker stamping events with `notebook_id`.
    pub fn new(notebook_id: impl Into<String>) -> Self {
        Self {
            notebook_id: notebook_id.into(),
            cell_started: None,
        }
    }

    /// Notebook id stamped on events.
    pub fn notebook_id(&self) -> &str {
        &self.notebook_id
    }

    /// Records when the current cell started.
    pub fn cell_started(&mut self, at: DateTime<Utc>) {
        self.cell_started = Some(at);
    }

    /// Builds the `progress` event for a cell that completed at `at`.
    ///
    /// Without a recorded start the cell is treated as instantaneous.
    pub fn cell_completed(
        &mut self,
        index: usize,
        cell_count: usize,
        at: DateTime<Utc>,
    ) -> ProgressEvent {
        let start = self.cell_started.take().unwrap_or(at);
        ProgressEvent::progress(
            self.notebook_id.as_str(),
            index,
            cell_count,
            percent_complete(index, cell_count),
            start,
            at,
        )
    }

    /// Builds the `error` event for a cell that raised at `at`.
    pub fn cell_raised(&mut self, index: usize, at: DateTime<Utc>) -> ProgressEvent {
        self.cell_started = None;
        ProgressEvent::error(self.notebook_id.as_str(), index, at)
    }
}
