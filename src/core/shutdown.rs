//! # Shutdown coordination.
//!
//! [`ShutdownCoordinator`] drives the publisher through
//! `Running → Draining → Stopped` from the caller thread.
//!
//! ## Draining sequence
//! ```text
//! shutdown()
//!   ├─► (1) queue Command::Drain      graceful disconnect, behind every scheduled publish
//!   ├─► (2) count outstanding handles for diagnostics
//!   ├─► (3) state = Draining          Publisher::publish becomes a no-op
//!   ├─► (4) stopped.recv_timeout(grace)
//!   │        ├─ signal  → join the worker thread
//!   │        └─ timeout → settle handles, then stop.cancel()
//!   │                     (aborts the dial / backoff / write in progress;
//!   │                      the worker skips the rest and exits on its own)
//!   └─► (5) settle every handle into a ShutdownReport; state = Stopped
//! ```
//!
//! Until the grace runs out the worker is left alone: reconnect backoff and
//! queued publishes proceed normally, so work scheduled before shutdown is run
//! to completion whenever the bus allows it within the grace.

use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::worker::{Command, Delivery, PublishHandle, WorkerHandle};
use crate::error::RuntimeError;

/// Lifecycle of a publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Accepting and processing publish tasks.
    Running,
    /// No longer accepting; waiting for the worker to finish.
    Draining,
    /// Terminal; the worker has exited or was abandoned.
    Stopped,
}

/// Outcome tally of every publish task scheduled during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks handed to the worker.
    pub scheduled: usize,
    /// Tasks written to the bus.
    pub sent: usize,
    /// Tasks skipped because the connection was Errored.
    pub skipped: usize,
    /// Tasks that failed to serialize or write.
    pub failed: usize,
    /// Tasks whose outcome is unknown (worker did not stop in time).
    pub abandoned: usize,
}

impl ShutdownReport {
    pub(crate) fn record(&mut self, outcome: Option<Delivery>) {
        match outcome {
            Some(Delivery::Sent) => self.sent += 1,
            Some(Delivery::Skipped) => self.skipped += 1,
            Some(Delivery::Failed(_)) => self.failed += 1,
            None => self.abandoned += 1,
        }
    }
}

/// Caller-side state machine stopping the publisher worker.
pub(crate) struct ShutdownCoordinator {
    state: ShutdownState,
    grace: Option<Duration>,
    report: Option<ShutdownReport>,
}

impl ShutdownCoordinator {
    pub(crate) fn new(grace: Option<Duration>) -> Self {
        Self {
            state: ShutdownState::Running,
            grace,
            report: None,
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> ShutdownState {
        self.state
    }

    /// Drains and stops the worker, waiting at most the grace period.
    ///
    /// `settled` tallies tasks already resolved and released by the caller.
    /// Idempotent: once stopped, returns the first report.
    pub(crate) fn shutdown(
        &mut self,
        worker: &mut WorkerHandle,
        pending: &mut Vec<PublishHandle>,
        settled: ShutdownReport,
    ) -> Result<ShutdownReport, RuntimeError> {
        if let Some(report) = self.report {
            return Ok(report);
        }

        let _ = worker.commands.send(Command::Drain);
        let outstanding = pending
            .iter_mut()
            .map(|h| h.settle())
            .filter(Option::is_none)
            .count();
        self.state = ShutdownState::Draining;
        info!(
            scheduled = settled.scheduled + pending.len(),
            outstanding, "draining progress publisher"
        );

        let grace = self.grace.unwrap_or(Duration::ZERO);
        let stopped = match worker.stopped.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        };

        let mut report = ShutdownReport {
            scheduled: settled.scheduled + pending.len(),
            ..settled
        };
        for mut handle in pending.drain(..) {
            report.record(handle.settle());
        }

        match worker.thread.take() {
            Some(thread) if stopped => {
                if thread.join().is_err() {
                    warn!("progress publisher thread panicked");
                }
            }
            Some(_detached) => {
                worker.stop.cancel();
                debug!("cancelled in-flight bus work; progress publisher thread exits on its own");
            }
            None => {}
        }
        self.state = ShutdownState::Stopped;
        self.report = Some(report);

        if stopped {
            info!(
                sent = report.sent,
                skipped = report.skipped,
                failed = report.failed,
                "progress publisher drained"
            );
            Ok(report)
        } else {
            warn!(
                grace = ?grace,
                abandoned = report.abandoned,
                "progress publisher did not stop within grace"
            );
            Err(RuntimeError::GraceExceeded {
                grace,
                abandoned: report.abandoned,
            })
        }
    }
}
