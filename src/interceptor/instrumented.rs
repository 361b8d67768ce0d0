use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::{Publisher, ShutdownReport};
use crate::events::ProgressTracker;
use crate::interceptor::ExecutionManager;

/// An [`ExecutionManager`] whose hooks also report progress.
///
/// Built by [`instrument`](crate::instrument). Owns the publisher for the run;
/// the wrapped manager is handed back by [`Instrumented::into_inner`].
pub struct Instrumented<M> {
    inner: M,
    publisher: Publisher,
    tracker: ProgressTracker,
    report: Option<ShutdownReport>,
}

impl<M: ExecutionManager> Instrumented<M> {
    pub(crate) fn new(inner: M, publisher: Publisher) -> Self {
        let tracker = ProgressTracker::new(publisher.notebook_id());
        Self {
            inner,
            publisher,
            tracker,
            report: None,
        }
    }

    /// The wrapped manager.
    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// Publisher state, for diagnostics.
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Report of the shutdown run by `notebook_complete`, if it finished within grace.
    pub fn report(&self) -> Option<ShutdownReport> {
        self.report
    }

    /// Stops the publisher if still running and returns the wrapped manager.
    pub fn into_inner(self) -> M {
        let Self { inner, publisher, .. } = self;
        drop(publisher);
        inner
    }
}

impl<M: ExecutionManager> ExecutionManager for Instrumented<M> {
    type Cell = M::Cell;
    type Error = M::Error;

    fn cell_count(&self) -> usize {
        self.inner.cell_count()
    }

    fn cell_failed(&self, cell: &Self::Cell) -> bool {
        self.inner.cell_failed(cell)
    }

    fn cell_start(&mut self, cell: &Self::Cell, index: usize) -> Result<(), Self::Error> {
        self.inner.cell_start(cell, index)?;
        self.tracker.cell_started(Utc::now());
        Ok(())
    }

    fn cell_complete(&mut self, cell: &Self::Cell, index: usize) -> Result<(), Self::Error> {
        self.inner.cell_complete(cell, index)?;
        if self.inner.cell_failed(cell) {
            debug!(cell_index = index, "cell failed; no progress event");
            return Ok(());
        }
        let event = self
            .tracker
            .cell_completed(index, self.inner.cell_count(), Utc::now());
        self.publisher.publish(event);
        Ok(())
    }

    fn cell_exception(&mut self, cell: &Self::Cell, index: usize) -> Result<(), Self::Error> {
        self.inner.cell_exception(cell, index)?;
        let event = self.tracker.cell_raised(index, Utc::now());
        self.publisher.publish(event);
        Ok(())
    }

    fn notebook_complete(&mut self) -> Result<(), Self::Error> {
        let result = self.inner.notebook_complete();
        match self.publisher.shutdown() {
            Ok(report) => {
                info!(
                    notebook_id = self.publisher.notebook_id(),
                    sent = report.sent,
                    skipped = report.skipped,
                    failed = report.failed,
                    "progress reporting finished"
                );
                self.report = Some(report);
            }
            Err(err) => {
                warn!(error = %err, label = err.as_label(), "progress reporting cut short");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::ShutdownState;
    use crate::instrument;
    use crate::policies::{BackoffPolicy, ReconnectPolicy};
    use crate::transport::{Endpoint, MemoryBus};
    use serde_json::Value;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Hook {
        Start,
        Complete,
        Exception,
        NotebookComplete,
    }

    struct Cell {
        failed: bool,
    }

    #[derive(Default)]
    struct FakeManager {
        cells: usize,
        calls: Vec<(Hook, Option<usize>)>,
        refuse: Option<Hook>,
    }

    impl FakeManager {
        fn with_cells(cells: usize) -> Self {
            Self {
                cells,
                ..Self::default()
            }
        }

        fn record(&mut self, hook: Hook, index: Option<usize>) -> Result<(), String> {
            self.calls.push((hook, index));
            if self.refuse == Some(hook) {
                return Err(format!("{hook:?} refused"));
            }
            Ok(())
        }
    }

    impl ExecutionManager for FakeManager {
        type Cell = Cell;
        type Error = String;

        fn cell_count(&self) -> usize {
            self.cells
        }

        fn cell_failed(&self, cell: &Cell) -> bool {
            cell.failed
        }

        fn cell_start(&mut self, _cell: &Cell, index: usize) -> Result<(), String> {
            self.record(Hook::Start, Some(index))
        }

        fn cell_complete(&mut self, _cell: &Cell, index: usize) -> Result<(), String> {
            self.record(Hook::Complete, Some(index))
        }

        fn cell_exception(&mut self, _cell: &Cell, index: usize) -> Result<(), String> {
            self.record(Hook::Exception, Some(index))
        }

        fn notebook_complete(&mut self) -> Result<(), String> {
            self.record(Hook::NotebookComplete, None)
        }
    }

    fn publisher(bus: &MemoryBus) -> Publisher {
        let mut cfg = Config::new("nb-9", Endpoint::new("mem://local", "runner", "pw"));
        cfg.grace = Duration::from_secs(5);
        cfg.reconnect = ReconnectPolicy {
            max_attempts: 2,
            backoff: BackoffPolicy::immediate(),
        };
        Publisher::spawn(&cfg, bus.clone()).unwrap()
    }

    /// Drives the hooks the way the host does: a raising cell gets its
    /// exception hook, then completes as failed, and execution stops.
    fn run<M>(manager: &mut M, raises_at: Option<usize>) -> Result<(), M::Error>
    where
        M: ExecutionManager<Cell = Cell>,
    {
        for index in 0..manager.cell_count() {
            let raises = raises_at == Some(index);
            let cell = Cell { failed: raises };
            manager.cell_start(&cell, index)?;
            if raises {
                manager.cell_exception(&cell, index)?;
                manager.cell_complete(&cell, index)?;
                break;
            }
            manager.cell_complete(&cell, index)?;
        }
        manager.notebook_complete()
    }

    fn wire(bus: &MemoryBus) -> Vec<Value> {
        bus.messages().iter().map(|m| m.json().unwrap()).collect()
    }

    #[test]
    fn clean_run_reports_each_quarter() {
        let bus = MemoryBus::new();
        let mut manager = instrument(FakeManager::with_cells(4), publisher(&bus));

        run(&mut manager, None).unwrap();

        let progress: Vec<_> = wire(&bus).iter().map(|v| v["progress"].as_i64().unwrap()).collect();
        assert_eq!(progress, [25, 50, 75, 100]);
        assert!(wire(&bus).iter().all(|v| v["type"] == "progress" && v["cell_count"] == 4));
        assert_eq!(manager.publisher().state(), ShutdownState::Stopped);
        assert_eq!(manager.report().map(|r| r.sent), Some(4));
    }

    #[test]
    fn raising_cell_reports_error_and_nothing_after() {
        let bus = MemoryBus::new();
        let mut manager = instrument(FakeManager::with_cells(4), publisher(&bus));

        run(&mut manager, Some(2)).unwrap();

        let messages = wire(&bus);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["progress"], 25);
        assert_eq!(messages[1]["progress"], 50);

        let error = &messages[2];
        assert_eq!(error["type"], "error");
        assert_eq!(error["cell_index"], 2);
        assert_eq!(error["cell_count"], -1);
        assert_eq!(error["duration"], -1);
        assert_eq!(error["progress"], -1);
        assert_eq!(error["start"], error["end"]);
        assert!(messages.iter().all(|v| v["progress"] != 75));
    }

    #[test]
    fn original_hooks_run_first_and_in_order() {
        let bus = MemoryBus::new();
        let mut manager = instrument(FakeManager::with_cells(2), publisher(&bus));
        run(&mut manager, None).unwrap();

        let inner = manager.into_inner();
        assert_eq!(
            inner.calls,
            [
                (Hook::Start, Some(0)),
                (Hook::Complete, Some(0)),
                (Hook::Start, Some(1)),
                (Hook::Complete, Some(1)),
                (Hook::NotebookComplete, None),
            ]
        );
    }

    #[test]
    fn failed_cell_completion_is_silent() {
        let bus = MemoryBus::new();
        let mut manager = instrument(FakeManager::with_cells(3), publisher(&bus));

        let cell = Cell { failed: true };
        manager.cell_start(&cell, 0).unwrap();
        manager.cell_complete(&cell, 0).unwrap();
        manager.notebook_complete().unwrap();

        assert!(bus.messages().is_empty());
    }

    #[test]
    fn host_errors_propagate_and_skip_the_event() {
        let bus = MemoryBus::new();
        let inner = FakeManager {
            cells: 2,
            refuse: Some(Hook::Complete),
            ..FakeManager::default()
        };
        let mut manager = instrument(inner, publisher(&bus));

        let cell = Cell { failed: false };
        manager.cell_start(&cell, 0).unwrap();
        assert_eq!(manager.cell_complete(&cell, 0), Err("Complete refused".to_string()));
        manager.notebook_complete().unwrap();

        assert!(bus.messages().is_empty());
    }

    #[test]
    fn notebook_complete_error_still_stops_publisher() {
        let bus = MemoryBus::new();
        let inner = FakeManager {
            cells: 1,
            refuse: Some(Hook::NotebookComplete),
            ..FakeManager::default()
        };
        let mut manager = instrument(inner, publisher(&bus));

        let cell = Cell { failed: false };
        manager.cell_start(&cell, 0).unwrap();
        manager.cell_complete(&cell, 0).unwrap();
        assert!(manager.notebook_complete().is_err());

        assert_eq!(manager.publisher().state(), ShutdownState::Stopped);
        assert_eq!(wire(&bus)[0]["progress"], 100);
    }

    #[test]
    fn unreachable_bus_does_not_disturb_execution() {
        let bus = MemoryBus::unreachable();
        let mut manager = instrument(FakeManager::with_cells(3), publisher(&bus));

        run(&mut manager, Some(1)).unwrap();

        assert!(bus.messages().is_empty());
        assert_eq!(manager.report().map(|r| r.sent), Some(0));
        assert_eq!(manager.inner().calls.len(), 6);
    }

    #[test]
    fn into_inner_without_completion_still_drains() {
        let bus = MemoryBus::new();
        let mut manager = instrument(FakeManager::with_cells(2), publisher(&bus));

        let cell = Cell { failed: false };
        manager.cell_start(&cell, 0).unwrap();
        manager.cell_complete(&cell, 0).unwrap();
        let _inner = manager.into_inner();

        assert_eq!(wire(&bus)[0]["progress"], 50);
    }
}
