//! # Publisher: fire-and-forget progress publishing from synchronous code.
//!
//! A [`Publisher`] belongs to exactly one execution run. Spawning it starts the
//! background worker and dials the bus once; every [`Publisher::publish`] call
//! queues a task and returns immediately, whatever the state of the bus.
//!
//! ```text
//! Publisher::spawn(cfg, connector)
//!   └─► worker thread: ConnectionSupervisor::connect()
//!
//! publish(ev) ──► Running?  ── yes ──► queue task, keep its handle,
//!                            │         release handles already resolved
//!                            └─ no ──► dropped (debug log)
//!
//! shutdown() ──► ShutdownCoordinator::shutdown(worker, handles)
//!                  └─► Ok(ShutdownReport) | Err(GraceExceeded)
//! ```
//!
//! Dropping a publisher that was never shut down runs the shutdown sequence,
//! logging instead of returning a grace overrun.
//!
//! ## Example
//! ```rust
//! use chrono::Utc;
//! use nbprogress::{Config, Endpoint, MemoryBus, ProgressTracker, Publisher};
//!
//! let bus = MemoryBus::new();
//! let cfg = Config::new("nb-42", Endpoint::new("mem://local", "runner", "secret"));
//! let mut publisher = Publisher::spawn(&cfg, bus.clone())?;
//!
//! let mut tracker = ProgressTracker::new(cfg.notebook_id.as_str());
//! tracker.cell_started(Utc::now());
//! publisher.publish(tracker.cell_completed(0, 1, Utc::now()));
//!
//! let report = publisher.shutdown()?;
//! assert_eq!(report.sent, 1);
//! assert_eq!(bus.messages()[0].subject, "notebook.progress");
//! # Ok::<(), nbprogress::RuntimeError>(())
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;
use crate::core::shutdown::{ShutdownCoordinator, ShutdownReport, ShutdownState};
use crate::core::worker::{self, PublishHandle, WorkerHandle};
use crate::error::RuntimeError;
use crate::events::ProgressEvent;
use crate::transport::Connector;

/// Non-blocking progress publisher for one execution run.
pub struct Publisher {
    notebook_id: String,
    worker: WorkerHandle,
    /// Handles not yet resolved by the worker.
    pending: Vec<PublishHandle>,
    /// Outcomes of handles already released from `pending`.
    settled: ShutdownReport,
    scheduled: usize,
    coordinator: ShutdownCoordinator,
}

impl Publisher {
    /// Starts the worker and begins connecting to the bus.
    ///
    /// Returns without waiting for the connection; connection failures are
    /// logged by the worker and never surface here.
    pub fn spawn<C: Connector>(cfg: &Config, connector: C) -> Result<Self, RuntimeError> {
        let worker = worker::spawn(cfg, Arc::new(connector))?;
        debug!(
            notebook_id = %cfg.notebook_id,
            subject = %cfg.subject,
            "progress publisher started"
        );
        Ok(Self {
            notebook_id: cfg.notebook_id.clone(),
            worker,
            pending: Vec::new(),
            settled: ShutdownReport::default(),
            scheduled: 0,
            coordinator: ShutdownCoordinator::new(cfg.shutdown_grace()),
        })
    }

    /// Schedules `event` for publishing and returns immediately.
    ///
    /// Events are written in the order they were scheduled. After shutdown has
    /// begun the event is dropped.
    pub fn publish(&mut self, event: ProgressEvent) {
        if self.coordinator.state() != ShutdownState::Running {
            debug!(cell_index = event.cell_index, "publisher stopped; dropping progress event");
            return;
        }
        let Some(handle) = self.worker.schedule(event) else {
            warn!("progress publisher worker is gone; dropping event");
            return;
        };
        self.scheduled += 1;

        let settled = &mut self.settled;
        self.pending.retain_mut(|h| match h.settle() {
            Some(outcome) => {
                settled.scheduled += 1;
                settled.record(Some(outcome));
                false
            }
            None => true,
        });
        self.pending.push(handle);
    }

    /// Drains scheduled publishes and stops the worker within the grace period.
    ///
    /// Idempotent: later calls return the first report.
    pub fn shutdown(&mut self) -> Result<ShutdownReport, RuntimeError> {
        self.coordinator
            .shutdown(&mut self.worker, &mut self.pending, self.settled)
    }

    /// Notebook id of the run this publisher belongs to.
    #[inline]
    pub fn notebook_id(&self) -> &str {
        &self.notebook_id
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> ShutdownState {
        self.coordinator.state()
    }

    /// Number of publish tasks scheduled during this run.
    #[inline]
    pub fn scheduled(&self) -> usize {
        self.scheduled
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        if self.coordinator.state() != ShutdownState::Running {
            return;
        }
        if let Err(err) = self.shutdown() {
            warn!(error = %err, label = err.as_label(), "progress publisher dropped without clean shutdown");
        }
    }
}
