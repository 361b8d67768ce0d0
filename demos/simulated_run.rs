//! # Example: simulated_run
//!
//! Runs a fake six-cell notebook through an instrumented execution manager
//! against the in-process [`MemoryBus`], then prints what reached the bus.
//!
//! The bus refuses the first connection attempt, so the reconnect backoff is
//! visible in the logs, and cell 4 raises, so the run ends with an error event.
//!
//! ## Flow
//! ```text
//! Publisher::spawn(cfg, MemoryBus::failing_first(1))
//!   └─► worker: connect → refused → backoff → connect → Connected
//!
//! for each cell:
//!   cell_start ─► (work) ─► cell_complete ─► progress event queued
//! cell 4:
//!   cell_start ─► cell_exception ─► error event queued
//!              └► cell_complete (failed) ─► nothing
//! notebook_complete ─► drain ─► disconnect ─► ShutdownReport
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example simulated_run
//! RUST_LOG=nbprogress=trace cargo run --example simulated_run
//! ```

use std::time::Duration;

use nbprogress::{
    instrument, BackoffPolicy, Config, Endpoint, ExecutionManager, JitterPolicy, MemoryBus,
    Publisher, ReconnectPolicy,
};

/// A notebook cell as the fake engine sees it.
struct Cell {
    source: &'static str,
    raises: bool,
}

/// Stand-in for a host execution manager: prints every hook.
struct ConsoleManager {
    cells: usize,
    failed: Vec<usize>,
}

impl ExecutionManager for ConsoleManager {
    type Cell = Cell;
    type Error = String;

    fn cell_count(&self) -> usize {
        self.cells
    }

    fn cell_failed(&self, cell: &Cell) -> bool {
        cell.raises
    }

    fn cell_start(&mut self, cell: &Cell, index: usize) -> Result<(), String> {
        println!("[engine] cell {index} start: {}", cell.source);
        Ok(())
    }

    fn cell_complete(&mut self, _cell: &Cell, index: usize) -> Result<(), String> {
        println!("[engine] cell {index} complete");
        Ok(())
    }

    fn cell_exception(&mut self, _cell: &Cell, index: usize) -> Result<(), String> {
        println!("[engine] cell {index} raised");
        self.failed.push(index);
        Ok(())
    }

    fn notebook_complete(&mut self) -> Result<(), String> {
        println!("[engine] notebook complete; failed cells: {:?}", self.failed);
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    nbprogress::logging::init(true);

    // 1. Configure the run (normally Config::from_env()).
    let mut cfg = Config::new("demo-notebook", Endpoint::new("mem://demo", "runner", "secret"));
    cfg.grace = Duration::from_secs(2);
    cfg.reconnect = ReconnectPolicy {
        max_attempts: 3,
        backoff: BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_millis(400),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        },
    };

    // 2. A bus that refuses the first dial.
    let bus = MemoryBus::failing_first(1);
    let publisher = Publisher::spawn(&cfg, bus.clone())?;

    // 3. Wrap the engine's manager.
    let cells = [
        Cell {
            source: "import pandas as pd",
            raises: false,
        },
        Cell {
            source: "df = pd.read_csv(path)",
            raises: false,
        },
        Cell {
            source: "df.describe()",
            raises: false,
        },
        Cell {
            source: "model.fit(df)",
            raises: false,
        },
        Cell {
            source: "1 / 0",
            raises: true,
        },
        Cell {
            source: "report(df)",
            raises: false,
        },
    ];
    let mut manager = instrument(
        ConsoleManager {
            cells: cells.len(),
            failed: Vec::new(),
        },
        publisher,
    );

    // 4. Drive the hooks the way an engine does; stop at the first raising cell.
    for (index, cell) in cells.iter().enumerate() {
        manager.cell_start(cell, index)?;
        std::thread::sleep(Duration::from_millis(50));
        if cell.raises {
            manager.cell_exception(cell, index)?;
            manager.cell_complete(cell, index)?;
            break;
        }
        manager.cell_complete(cell, index)?;
    }
    manager.notebook_complete()?;

    // 5. Show what reached the bus.
    if let Some(report) = manager.report() {
        println!(
            "[report] scheduled={} sent={} skipped={} failed={} abandoned={}",
            report.scheduled, report.sent, report.skipped, report.failed, report.abandoned
        );
    }
    for message in bus.messages() {
        println!("[bus] {} {}", message.subject, message.json()?);
    }
    Ok(())
}
