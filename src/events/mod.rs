//! Progress events: data model and calculation.
//!
//! ## Contents
//! - [`ProgressEvent`], [`EventKind`], [`CellDuration`] the wire record
//! - [`ProgressTracker`] builds records from lifecycle hook arguments
//!
//! ## Quick reference
//! - **Producer**: `Instrumented` hooks on the caller thread.
//! - **Consumer**: the publisher worker, which serializes and sends each record once.

mod event;
mod progress;

pub use event::{format_elapsed, CellDuration, EventKind, ProgressEvent, NOT_APPLICABLE};
pub use progress::{percent_complete, ProgressTracker};
