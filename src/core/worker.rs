//! # Publisher worker: the asynchronous side of the publisher.
//!
//! One dedicated OS thread runs a current-thread tokio runtime. It owns the
//! [`ConnectionSupervisor`] and processes commands sent from the caller thread.
//!
//! ## Architecture
//! ```text
//! caller thread                         worker thread (current-thread runtime)
//! ─────────────                         ─────────────────────────────────────
//! Publisher::publish ──► [Command::Publish] ──┐
//! Publisher::publish ──► [Command::Publish] ──┤   unbounded mpsc (FIFO)
//! ShutdownCoordinator ─► [Command::Drain] ────┘
//!                                             ▼
//!                                    loop select! {
//!                                      link event ─► ConnectionSupervisor::on_link_event
//!                                      Publish    ─► serialize ─► ConnectionSupervisor::publish
//!                                                    └─► oneshot Delivery back to the handle
//!                                      Drain/None ─► break
//!                                    }
//!                                    flush commands still queued
//!                                    ConnectionSupervisor::disconnect
//!                                    stopped signal (also sent on panic)
//! ```
//!
//! ## Rules
//! - Commands are handled strictly in the order they were sent.
//! - Nothing that goes wrong here reaches the caller: outcomes travel back as
//!   [`Delivery`] values, panics inside a link are caught.
//! - Publishes queued while connecting wait in the channel; they are only
//!   skipped once the connection is Errored.
//! - Cancelling the stop token (grace overrun) aborts the dial or write in
//!   progress; everything still queued is then skipped and the thread exits.

use std::panic::AssertUnwindSafe;
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::core::connection::{ConnectionState, ConnectionSupervisor};
use crate::error::RuntimeError;
use crate::events::ProgressEvent;
use crate::transport::Connector;

/// Outcome of one scheduled publish task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the bus.
    Sent,
    /// Not attempted: the connection is Errored.
    Skipped,
    /// Attempted and failed (serialization, i/o, panic in the link).
    Failed(String),
}

/// Commands sent from the caller thread to the worker.
pub(crate) enum Command {
    Publish {
        event: ProgressEvent,
        done: oneshot::Sender<Delivery>,
    },
    /// Finish queued work, disconnect and exit.
    Drain,
}

/// Caller-side view of one scheduled publish task.
///
/// Resolved by the worker; read only while shutting down.
pub(crate) struct PublishHandle {
    rx: oneshot::Receiver<Delivery>,
    outcome: Option<Delivery>,
}

impl PublishHandle {
    /// Returns the outcome if the worker already produced one.
    pub(crate) fn settle(&mut self) -> Option<Delivery> {
        if self.outcome.is_none() {
            self.outcome = self.rx.try_recv().ok();
        }
        self.outcome.clone()
    }
}

/// Everything the caller keeps to talk to and stop the worker.
pub(crate) struct WorkerHandle {
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) stop: CancellationToken,
    pub(crate) stopped: std_mpsc::Receiver<()>,
    pub(crate) thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Queues a publish task; `None` when the worker is gone.
    pub(crate) fn schedule(&self, event: ProgressEvent) -> Option<PublishHandle> {
        let (done, rx) = oneshot::channel();
        self.commands
            .send(Command::Publish { event, done })
            .ok()
            .map(|()| PublishHandle { rx, outcome: None })
    }
}

/// Sends the stopped signal when the worker thread unwinds or returns.
struct StoppedSignal(std_mpsc::SyncSender<()>);

impl Drop for StoppedSignal {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

/// Starts the worker thread for one execution run.
pub(crate) fn spawn(cfg: &Config, connector: Arc<dyn Connector>) -> Result<WorkerHandle, RuntimeError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| RuntimeError::WorkerSpawn {
            reason: e.to_string(),
        })?;

    let (commands, rx) = mpsc::unbounded_channel();
    let (stopped_tx, stopped) = std_mpsc::sync_channel(1);
    let stop = CancellationToken::new();

    let worker = Worker {
        subject: cfg.subject.clone(),
        debug: cfg.debug,
        conn: ConnectionSupervisor::new(
            connector,
            cfg.endpoint.clone(),
            cfg.reconnect,
            stop.clone(),
        ),
        rx,
    };

    let thread = std::thread::Builder::new()
        .name("progress-publisher".to_string())
        .spawn(move || {
            let _signal = StoppedSignal(stopped_tx);
            runtime.block_on(worker.run());
        })
        .map_err(|e| RuntimeError::WorkerSpawn {
            reason: e.to_string(),
        })?;

    Ok(WorkerHandle {
        commands,
        stop,
        stopped,
        thread: Some(thread),
    })
}

struct Worker {
    subject: String,
    debug: bool,
    conn: ConnectionSupervisor,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl Worker {
    async fn run(mut self) {
        self.conn.connect().await;

        loop {
            tokio::select! {
                biased;
                ev = self.conn.next_link_event() => self.conn.on_link_event(ev),
                cmd = self.rx.recv() => match cmd {
                    Some(Command::Publish { event, done }) => {
                        let outcome = self.deliver(event).await;
                        let _ = done.send(outcome);
                    }
                    Some(Command::Drain) | None => break,
                },
            }
        }

        self.rx.close();
        let mut flushed = 0usize;
        while let Ok(cmd) = self.rx.try_recv() {
            if let Command::Publish { event, done } = cmd {
                let outcome = self.deliver(event).await;
                let _ = done.send(outcome);
                flushed += 1;
            }
        }
        if flushed > 0 {
            debug!(flushed, "flushed publishes queued behind drain");
        }

        self.conn.disconnect().await;
        info!(
            state = self.conn.state().as_label(),
            "progress publisher stopped"
        );
    }

    async fn deliver(&mut self, event: ProgressEvent) -> Delivery {
        if self.conn.state() == ConnectionState::Errored {
            trace!(cell_index = event.cell_index, "bus errored; skipping publish");
            return Delivery::Skipped;
        }

        let payload = match event.to_payload() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, label = err.as_label(), "failed to encode progress event");
                return Delivery::Failed(err.to_string());
            }
        };
        if self.debug {
            info!(
                subject = %self.subject,
                payload = %String::from_utf8_lossy(&payload),
                "publishing progress event"
            );
        } else {
            trace!(subject = %self.subject, cell_index = event.cell_index, "publishing progress event");
        }

        let sending = self.conn.publish(&self.subject, payload);
        match AssertUnwindSafe(sending).catch_unwind().await {
            Ok(Ok(true)) => Delivery::Sent,
            Ok(Ok(false)) => Delivery::Skipped,
            Ok(Err(err)) => {
                warn!(
                    error = %err,
                    label = err.as_label(),
                    cell_index = event.cell_index,
                    "failed to publish progress event"
                );
                Delivery::Failed(err.to_string())
            }
            Err(panic_err) => {
                let info = if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
                    (*msg).to_string()
                } else if let Some(msg) = panic_err.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                };
                warn!(%info, cell_index = event.cell_index, "bus link panicked while publishing");
                Delivery::Failed(info)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConnectError, PublishError};
    use crate::policies::{BackoffPolicy, ReconnectPolicy};
    use crate::transport::{Endpoint, Link, MemoryBus, Session};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;

    fn config() -> Config {
        let mut cfg = Config::new("nb", Endpoint::new("mem://local", "u", "p"));
        cfg.reconnect = ReconnectPolicy {
            max_attempts: 2,
            backoff: BackoffPolicy::immediate(),
        };
        cfg
    }

    fn wait_stopped(handle: &mut WorkerHandle) {
        handle
            .stopped
            .recv_timeout(Duration::from_secs(5))
            .expect("worker did not stop");
        handle.thread.take().unwrap().join().unwrap();
    }

    #[test]
    fn delivers_in_order_then_disconnects() {
        let bus = MemoryBus::new();
        let mut handle = spawn(&config(), Arc::new(bus.clone())).unwrap();

        let mut handles: Vec<_> = (0..3)
            .map(|i| handle.schedule(ProgressEvent::error("nb", i, Utc::now())).unwrap())
            .collect();
        assert!(handle.commands.send(Command::Drain).is_ok());
        wait_stopped(&mut handle);

        for h in &mut handles {
            assert_eq!(h.settle(), Some(Delivery::Sent));
        }
        let indexes: Vec<_> = bus
            .messages()
            .iter()
            .map(|m| m.json().unwrap()["cell_index"].as_u64().unwrap())
            .collect();
        assert_eq!(indexes, [0, 1, 2]);
        assert_eq!(bus.close_calls(), 1);
    }

    #[test]
    fn errored_connection_skips_everything() {
        let bus = MemoryBus::unreachable();
        let mut handle = spawn(&config(), Arc::new(bus.clone())).unwrap();

        let mut h = handle.schedule(ProgressEvent::error("nb", 0, Utc::now())).unwrap();
        assert!(handle.commands.send(Command::Drain).is_ok());
        wait_stopped(&mut handle);

        assert_eq!(h.settle(), Some(Delivery::Skipped));
        assert!(bus.messages().is_empty());
        assert_eq!(bus.close_calls(), 0);
    }

    #[test]
    fn closing_the_channel_also_drains() {
        let bus = MemoryBus::new();
        let mut handle = spawn(&config(), Arc::new(bus.clone())).unwrap();
        let mut h = handle.schedule(ProgressEvent::error("nb", 4, Utc::now())).unwrap();

        let (dead_tx, _) = mpsc::unbounded_channel();
        drop(std::mem::replace(&mut handle.commands, dead_tx));
        wait_stopped(&mut handle);

        assert_eq!(h.settle(), Some(Delivery::Sent));
        assert_eq!(bus.messages().len(), 1);
    }

    struct PanickingLink;

    #[async_trait]
    impl Link for PanickingLink {
        async fn publish(&self, _subject: &str, _payload: Vec<u8>) -> Result<(), PublishError> {
            panic!("link exploded");
        }

        async fn close(&self) -> Result<(), PublishError> {
            Ok(())
        }
    }

    struct PanickingConnector;

    #[async_trait]
    impl Connector for PanickingConnector {
        async fn connect(&self, _endpoint: &Endpoint) -> Result<Session, ConnectError> {
            Ok(Session::detached(Box::new(PanickingLink)))
        }
    }

    #[test]
    fn link_panic_becomes_failed_delivery() {
        let mut handle = spawn(&config(), Arc::new(PanickingConnector)).unwrap();

        let mut first = handle.schedule(ProgressEvent::error("nb", 0, Utc::now())).unwrap();
        let mut second = handle.schedule(ProgressEvent::error("nb", 1, Utc::now())).unwrap();
        assert!(handle.commands.send(Command::Drain).is_ok());
        wait_stopped(&mut handle);

        assert_eq!(first.settle(), Some(Delivery::Failed("link exploded".into())));
        assert!(matches!(second.settle(), Some(Delivery::Failed(_))));
    }

    #[test]
    fn failed_write_triggers_redial_on_next_publish() {
        let bus = MemoryBus::new();
        let mut handle = spawn(&config(), Arc::new(bus.clone())).unwrap();

        bus.set_offline(true);
        let mut failed = handle.schedule(ProgressEvent::error("nb", 0, Utc::now())).unwrap();
        // Let the first write fail before the bus comes back.
        let outcome = loop {
            if let Some(d) = failed.settle() {
                break d;
            }
            std::thread::sleep(Duration::from_millis(5));
        };
        assert!(matches!(outcome, Delivery::Failed(_)));
        bus.set_offline(false);

        let mut sent = handle.schedule(ProgressEvent::error("nb", 1, Utc::now())).unwrap();
        assert!(handle.commands.send(Command::Drain).is_ok());
        wait_stopped(&mut handle);

        assert_eq!(sent.settle(), Some(Delivery::Sent));
        assert_eq!(bus.connect_calls(), 2);
    }
}
