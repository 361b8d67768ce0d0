//! # Lifecycle interception.
//!
//! The host execution engine drives an [`ExecutionManager`] through four hooks,
//! strictly in execution order on one thread. [`instrument`] wraps a manager
//! so that every hook first runs the original, then reports progress through a
//! [`Publisher`].
//!
//! ```text
//! host engine ──► Instrumented<M>::cell_start(cell, i)
//!                   ├─► M::cell_start(cell, i)?
//!                   └─► tracker.cell_started(now)
//!
//!             ──► Instrumented<M>::cell_complete(cell, i)
//!                   ├─► M::cell_complete(cell, i)?
//!                   ├─► M::cell_failed(cell)  ── true ──► nothing published
//!                   └─► publisher.publish(progress event)
//!
//!             ──► Instrumented<M>::cell_exception(cell, i)
//!                   ├─► M::cell_exception(cell, i)?
//!                   └─► publisher.publish(error event)
//!
//!             ──► Instrumented<M>::notebook_complete()
//!                   ├─► M::notebook_complete()        (result kept)
//!                   └─► publisher.shutdown()           (bounded; overruns logged)
//! ```
//!
//! ## Rules
//! - Errors from the original hooks are returned unchanged; the progress side
//!   effect of that hook is skipped.
//! - Progress reporting never produces an error or blocks on the bus.
//! - `notebook_complete` always stops the publisher, even when the original fails.
//!
//! ## Example
//! ```rust
//! use nbprogress::{instrument, Config, Endpoint, ExecutionManager, MemoryBus, Publisher};
//!
//! struct Cells(usize);
//!
//! impl ExecutionManager for Cells {
//!     type Cell = ();
//!     type Error = std::convert::Infallible;
//!
//!     fn cell_count(&self) -> usize { self.0 }
//!     fn cell_failed(&self, _cell: &()) -> bool { false }
//!     fn cell_start(&mut self, _cell: &(), _index: usize) -> Result<(), Self::Error> { Ok(()) }
//!     fn cell_complete(&mut self, _cell: &(), _index: usize) -> Result<(), Self::Error> { Ok(()) }
//!     fn cell_exception(&mut self, _cell: &(), _index: usize) -> Result<(), Self::Error> { Ok(()) }
//!     fn notebook_complete(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! }
//!
//! let bus = MemoryBus::new();
//! let cfg = Config::new("nb-1", Endpoint::new("mem://local", "runner", "secret"));
//! let mut manager = instrument(Cells(2), Publisher::spawn(&cfg, bus.clone())?);
//!
//! for i in 0..2 {
//!     manager.cell_start(&(), i).unwrap();
//!     manager.cell_complete(&(), i).unwrap();
//! }
//! manager.notebook_complete().unwrap();
//!
//! assert_eq!(bus.messages().len(), 2);
//! # Ok::<(), nbprogress::RuntimeError>(())
//! ```

mod instrumented;

pub use instrumented::Instrumented;

use crate::core::Publisher;

/// Hook surface of a host execution manager.
///
/// The host calls the hooks synchronously, one cell at a time.
pub trait ExecutionManager {
    /// Host representation of a notebook cell.
    type Cell;
    /// Error a hook may return to the host.
    type Error;

    /// Total number of cells in the notebook being run.
    fn cell_count(&self) -> usize;

    /// Whether the host marked `cell` as failed.
    fn cell_failed(&self, cell: &Self::Cell) -> bool;

    /// Called before cell `index` runs.
    fn cell_start(&mut self, cell: &Self::Cell, index: usize) -> Result<(), Self::Error>;

    /// Called after cell `index` ran, whether or not it failed.
    fn cell_complete(&mut self, cell: &Self::Cell, index: usize) -> Result<(), Self::Error>;

    /// Called when cell `index` raised.
    fn cell_exception(&mut self, cell: &Self::Cell, index: usize) -> Result<(), Self::Error>;

    /// Called once after the last cell.
    fn notebook_complete(&mut self) -> Result<(), Self::Error>;
}

/// Wraps `manager` so its lifecycle hooks publish progress through `publisher`.
///
/// Events are stamped with [`Publisher::notebook_id`].
pub fn instrument<M: ExecutionManager>(manager: M, publisher: Publisher) -> Instrumented<M> {
    Instrumented::new(manager, publisher)
}
