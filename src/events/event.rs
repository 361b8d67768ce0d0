//! # Progress events published to the bus.
//!
//! A [`ProgressEvent`] reports completion and timing for one cell. It is built
//! on the caller thread, moved to the worker, serialized once and dropped.
//!
//! ## Wire format
//! ```text
//! {
//!   "notebook_id": "nb-42",
//!   "timestamp":   "2024-05-01T10:00:03.250Z",
//!   "type":        "progress" | "error",
//!   "cell_index":  2,
//!   "cell_count":  4,                     (-1 for errors)
//!   "start":       "2024-05-01T10:00:01Z",
//!   "end":         "2024-05-01T10:00:03.250Z",
//!   "duration":    "0:00:02.250000",       (-1 for errors)
//!   "progress":    75                      (-1 for errors)
//! }
//! ```
//!
//! ## Example
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use nbprogress::{EventKind, ProgressEvent};
//!
//! let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
//! let ev = ProgressEvent::error("nb-42", 3, at);
//!
//! assert_eq!(ev.kind, EventKind::Error);
//! assert_eq!(ev.progress, -1);
//! assert_eq!(ev.cell_count, -1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::PublishError;

/// Sentinel used on the wire for "not applicable" numeric fields.
pub const NOT_APPLICABLE: i64 = -1;

/// Classification of progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A cell completed successfully.
    ///
    /// Sets `cell_count`, `duration` and a `progress` in `0..=100`.
    Progress,

    /// A cell raised.
    ///
    /// `cell_count`, `duration` and `progress` carry the `-1` sentinel;
    /// `start` and `end` are both the time the exception was observed.
    Error,
}

/// Time a cell took, or the sentinel when unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellDuration {
    /// Measured wall-clock span.
    Elapsed(chrono::Duration),
    /// Not measured (error events).
    Unknown,
}

impl Serialize for CellDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellDuration::Elapsed(d) => serializer.serialize_str(&format_elapsed(*d)),
            CellDuration::Unknown => serializer.serialize_i64(NOT_APPLICABLE),
        }
    }
}

/// One progress record.
///
/// Immutable once built; numeric sentinels follow [`NOT_APPLICABLE`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Notebook the cell belongs to.
    pub notebook_id: String,
    /// When the event was built.
    pub timestamp: DateTime<Utc>,
    /// Event classification.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Zero-based index of the cell.
    pub cell_index: usize,
    /// Total number of cells, or `-1` for errors.
    pub cell_count: i64,
    /// When the cell started.
    pub start: DateTime<Utc>,
    /// When the cell finished (or raised).
    pub end: DateTime<Utc>,
    /// How long the cell ran.
    pub duration: CellDuration,
    /// Percentage complete in `0..=100`, or `-1` for errors.
    pub progress: i64,
}

impl ProgressEvent {
    /// Builds a `progress` event for a completed cell.
    pub fn progress(
        notebook_id: impl Into<String>,
        cell_index: usize,
        cell_count: usize,
        progress: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            notebook_id: notebook_id.into(),
            timestamp: end,
            kind: EventKind::Progress,
            cell_index,
            cell_count: i64::try_from(cell_count).unwrap_or(i64::MAX),
            start,
            end,
            duration: CellDuration::Elapsed(end - start),
            progress,
        }
    }

    /// Builds an `error` event for a cell that raised at `at`.
    pub fn error(notebook_id: impl Into<String>, cell_index: usize, at: DateTime<Utc>) -> Self {
        Self {
            notebook_id: notebook_id.into(),
            timestamp: at,
            kind: EventKind::Error,
            cell_index,
            cell_count: NOT_APPLICABLE,
            start: at,
            end: at,
            duration: CellDuration::Unknown,
            progress: NOT_APPLICABLE,
        }
    }

    /// Serializes the event as UTF-8 JSON bytes.
    pub fn to_payload(&self) -> Result<Vec<u8>, PublishError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Formats a span as `H:MM:SS[.ffffff]`, prefixed with `N day(s), ` past a day.
///
/// Negative spans (clock steps backwards) are reported as zero.
pub fn format_elapsed(d: chrono::Duration) -> String {
    let total_us = d.num_microseconds().unwrap_or(i64::MAX).max(0);
    let micros = total_us % 1_000_000;
    let total_secs = total_us / 1_000_000;
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if days > 0 {
        let unit = if days == 1 { "day" } else { "days" };
        out.push_str(&format!("{days} {unit}, "));
    }
    out.push_str(&format!("{hours}:{minutes:02}:{seconds:02}"));
    if micros != 0 {
        out.push_str(&format!(".{micros:06}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::{json, Value};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::zero()), "0:00:00");
        assert_eq!(format_elapsed(Duration::milliseconds(2_250)), "0:00:02.250000");
        assert_eq!(format_elapsed(Duration::seconds(3_723)), "1:02:03");
        assert_eq!(format_elapsed(Duration::hours(25)), "1 day, 1:00:00");
        assert_eq!(format_elapsed(Duration::days(3)), "3 days, 0:00:00");
        assert_eq!(format_elapsed(Duration::seconds(-5)), "0:00:00");
    }

    #[test]
    fn progress_event_wire_shape() {
        let ev = ProgressEvent::progress("nb-1", 1, 4, 50, at(0), at(2));
        let wire: Value = serde_json::from_slice(&ev.to_payload().unwrap()).unwrap();

        assert_eq!(wire["notebook_id"], "nb-1");
        assert_eq!(wire["type"], "progress");
        assert_eq!(wire["cell_index"], 1);
        assert_eq!(wire["cell_count"], 4);
        assert_eq!(wire["duration"], "0:00:02");
        assert_eq!(wire["progress"], 50);
        assert_eq!(wire["start"], json!("2024-05-01T10:00:00Z"));
        assert_eq!(wire["end"], wire["timestamp"]);
        assert_eq!(wire.as_object().unwrap().len(), 9);
    }

    #[test]
    fn error_event_uses_sentinels() {
        let ev = ProgressEvent::error("nb-1", 7, at(9));
        let wire: Value = serde_json::from_slice(&ev.to_payload().unwrap()).unwrap();

        assert_eq!(wire["type"], "error");
        assert_eq!(wire["cell_index"], 7);
        assert_eq!(wire["cell_count"], -1);
        assert_eq!(wire["duration"], -1);
        assert_eq!(wire["progress"], -1);
        assert_eq!(wire["start"], wire["end"]);
    }
}
