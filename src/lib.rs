//! # nbprogress
//!
//! **nbprogress** reports notebook execution progress to a message bus without
//! slowing the execution down.
//!
//! A host engine runs cells one by one and calls lifecycle hooks on its
//! execution manager. Wrapping that manager with [`instrument`] turns those
//! hooks into [`ProgressEvent`]s, which a background [`Publisher`] serializes
//! and writes to the bus while the next cell is already running. When the
//! notebook completes, the publisher is drained and stopped within a bounded
//! grace period.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  caller thread (host engine, synchronous)
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  Instrumented<M>                                                   │
//! │   cell_start   cell_complete   cell_exception   notebook_complete  │
//! │        │              │                │                 │         │
//! │        ▼              ▼                ▼                 │         │
//! │   ProgressTracker (start time, percent, sentinels)       │         │
//! │                       │                │                 │         │
//! │                       ▼                ▼                 ▼         │
//! │            Publisher::publish (non-blocking)   Publisher::shutdown │
//! └───────────────────────┬──────────────────────────────────┬─────────┘
//!                         │ Command::Publish (FIFO)          │ Command::Drain
//!                         ▼                                  ▼ stop token
//!  worker thread ("progress-publisher", current-thread tokio runtime)
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  Worker loop                                                       │
//! │   ├─ serialize ProgressEvent → JSON bytes                          │
//! │   └─ ConnectionSupervisor                                          │
//! │        Disconnected ⇄ Connecting ⇄ Connected, Errored (terminal)   │
//! │        └─► Connector::connect ─► Session { Link, LinkEvent rx }    │
//! │                                  └─► Link::publish(subject, bytes) │
//! └────────────────────────────────────────────────────────────────────┘
//!                         │ stopped signal (bounded wait by caller)
//!                         ▼
//!                  ShutdownReport | RuntimeError::GraceExceeded
//! ```
//!
//! ### Lifecycle
//! ```text
//! Publisher::spawn ──► Running ──► notebook_complete / shutdown() ──► Draining ──► Stopped
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------|-------------------------------------------|
//! | **Interception**  | Wrap a host execution manager's lifecycle hooks.             | [`ExecutionManager`], [`Instrumented`]    |
//! | **Progress**      | Percent complete, cell timing, error sentinels.              | [`ProgressTracker`], [`ProgressEvent`]    |
//! | **Publishing**    | Non-blocking, ordered, drained on shutdown.                  | [`Publisher`], [`ShutdownReport`]         |
//! | **Connection**    | Bounded reconnects with backoff, terminal error state.       | [`ConnectionSupervisor`], [`ReconnectPolicy`] |
//! | **Transport**     | Plug in a bus client; in-process bus for tests and dry runs. | [`Connector`], [`Link`], [`MemoryBus`]    |
//! | **Errors**        | Typed errors with stable labels.                             | [`RuntimeError`], [`PublishError`]        |
//! | **Configuration** | Environment-driven settings.                                 | [`Config`]                                |
//!
//! ## Optional features
//! - `logging` (default): [`logging::init`] installs a stderr `tracing` subscriber.
//!
//! ## Example
//! ```rust
//! use nbprogress::{instrument, Config, Endpoint, ExecutionManager, MemoryBus, Publisher};
//!
//! struct Host {
//!     cells: Vec<bool>, // failed flags
//! }
//!
//! impl ExecutionManager for Host {
//!     type Cell = bool;
//!     type Error = String;
//!
//!     fn cell_count(&self) -> usize { self.cells.len() }
//!     fn cell_failed(&self, failed: &bool) -> bool { *failed }
//!     fn cell_start(&mut self, _: &bool, _: usize) -> Result<(), String> { Ok(()) }
//!     fn cell_complete(&mut self, _: &bool, _: usize) -> Result<(), String> { Ok(()) }
//!     fn cell_exception(&mut self, _: &bool, _: usize) -> Result<(), String> { Ok(()) }
//!     fn notebook_complete(&mut self) -> Result<(), String> { Ok(()) }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = MemoryBus::new();
//!     let cfg = Config::new("nb-1", Endpoint::new("mem://local", "runner", "secret"));
//!     let publisher = Publisher::spawn(&cfg, bus.clone())?;
//!
//!     let mut manager = instrument(Host { cells: vec![false; 4] }, publisher);
//!     for i in 0..manager.cell_count() {
//!         manager.cell_start(&false, i)?;
//!         manager.cell_complete(&false, i)?;
//!     }
//!     manager.notebook_complete()?;
//!
//!     let progress: Vec<_> = bus
//!         .messages()
//!         .iter()
//!         .map(|m| m.json().map(|v| v["progress"].clone()))
//!         .collect::<Result<_, _>>()?;
//!     assert_eq!(progress, [25, 50, 75, 100]);
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod interceptor;
mod policies;
mod transport;

// Optional: stderr log output for hosts without their own subscriber.
// Enabled by default; disable with `--no-default-features`.
#[cfg(feature = "logging")]
pub mod logging;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{
    ConnectionState, ConnectionSupervisor, Delivery, Publisher, ShutdownReport, ShutdownState,
};
pub use error::{ConfigError, ConnectError, PublishError, RuntimeError};
pub use events::{
    format_elapsed, percent_complete, CellDuration, EventKind, ProgressEvent, ProgressTracker,
    NOT_APPLICABLE,
};
pub use interceptor::{instrument, ExecutionManager, Instrumented};
pub use policies::{BackoffPolicy, JitterPolicy, ReconnectPolicy};
pub use transport::{Connector, Endpoint, Link, LinkEvent, MemoryBus, Message, Session};
