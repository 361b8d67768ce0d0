//! # ConnectionSupervisor: bus connection state machine.
//!
//! Owns the single bus session of an execution run. Lives on the publisher
//! worker; nothing else touches it.
//!
//! ## States
//! ```text
//!                connect()                 session ok
//! Disconnected ─────────────► Connecting ─────────────► Connected
//!      ▲                          │                         │
//!      │       budget spent       │      LinkEvent::Error   │
//!      │        ┌─────────────────┘  ┌──────────────────────┤
//!      │        ▼                    ▼                      │
//!      │     Errored ◄───────────────┘                      │
//!      │    (terminal)                                      │
//!      └──────────────── LinkEvent::Disconnected ───────────┘
//!                        LinkEvent::Reconnected ──► Connected
//! ```
//!
//! ## Rules
//! - `connect()` is a no-op when Connected or Errored.
//! - One failure budget (`ReconnectPolicy::attempts()`) covers the whole run.
//!   Failed dials and failed writes both spend it; a successful write refills it.
//!   Dials are paced by the backoff.
//! - Errored is permanent for the run: publishes are skipped, nothing is redialed.
//! - Cancelling `stop` aborts a dial, a backoff wait or a write in progress.
//! - A link is closed before it is replaced or abandoned after a failed write.
//! - `disconnect()` closes the link only when Connected; repeated calls are no-ops.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PublishError;
use crate::policies::ReconnectPolicy;
use crate::transport::{Connector, Endpoint, Link, LinkEvent};

/// Connection status of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live session.
    Disconnected,
    /// A dial loop is in progress.
    Connecting,
    /// A live session is available.
    Connected,
    /// Connecting failed for good or the link reported an error.
    Errored,
}

impl ConnectionState {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Errored => "errored",
        }
    }
}

/// Connect/reconnect/error state machine over one bus session.
pub struct ConnectionSupervisor {
    connector: Arc<dyn Connector>,
    endpoint: Endpoint,
    policy: ReconnectPolicy,
    stop: CancellationToken,
    state: ConnectionState,
    /// Consecutive failed dials and writes.
    failures: u32,
    link: Option<Box<dyn Link>>,
    events: Option<mpsc::UnboundedReceiver<LinkEvent>>,
}

impl ConnectionSupervisor {
    /// Creates a supervisor in the `Disconnected` state. Nothing is dialed yet.
    pub fn new(
        connector: Arc<dyn Connector>,
        endpoint: Endpoint,
        policy: ReconnectPolicy,
        stop: CancellationToken,
    ) -> Self {
        Self {
            connector,
            endpoint,
            policy,
            stop,
            state: ConnectionState::Disconnected,
            failures: 0,
            link: None,
            events: None,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Establishes the session unless already Connected or Errored.
    ///
    /// Dials until the run's failure budget is spent. Running out of budget,
    /// or `stop` being cancelled, leaves the supervisor Errored.
    pub async fn connect(&mut self) -> ConnectionState {
        if matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Errored
        ) {
            return self.state;
        }
        self.transition(ConnectionState::Connecting);

        let attempts = self.policy.attempts();
        while self.failures < attempts {
            let dialed = tokio::select! {
                biased;
                res = self.connector.connect(&self.endpoint) => res,
                _ = self.stop.cancelled() => {
                    debug!("bus dial interrupted by shutdown");
                    break;
                }
            };
            match dialed {
                Ok(session) => {
                    self.link = Some(session.link);
                    self.events = session.events;
                    info!(
                        connector = self.connector.name(),
                        url = %self.endpoint.url,
                        failures = self.failures,
                        "connected to message bus"
                    );
                    self.transition(ConnectionState::Connected);
                    return self.state;
                }
                Err(err) => {
                    self.failures += 1;
                    warn!(
                        connector = self.connector.name(),
                        url = %self.endpoint.url,
                        failures = self.failures,
                        attempts,
                        error = %err,
                        label = err.as_label(),
                        "bus connection attempt failed"
                    );
                }
            }

            let Some(delay) = self.policy.delay_after(self.failures) else {
                break;
            };
            if delay.is_zero() {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.stop.cancelled() => {
                    debug!("reconnect wait interrupted by shutdown");
                    break;
                }
            }
        }

        warn!(attempts, "giving up on message bus; progress reporting disabled for this run");
        self.transition(ConnectionState::Errored);
        self.state
    }

    /// Applies a status notification from the link.
    pub fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Error(reason) => {
                warn!(%reason, "message bus link reported an error");
                self.link = None;
                self.events = None;
                self.transition(ConnectionState::Errored);
            }
            LinkEvent::Disconnected => {
                if self.state == ConnectionState::Connected {
                    self.transition(ConnectionState::Disconnected);
                }
            }
            LinkEvent::Reconnected => {
                if self.state == ConnectionState::Disconnected && self.link.is_some() {
                    self.transition(ConnectionState::Connected);
                }
            }
        }
    }

    /// Waits for the next link notification.
    ///
    /// Pends forever when the session has no notification channel, so it can
    /// sit in a `select!` arm unconditionally.
    pub async fn next_link_event(&mut self) -> LinkEvent {
        loop {
            let next = match self.events.as_mut() {
                Some(rx) => rx.recv().await,
                None => std::future::pending::<Option<LinkEvent>>().await,
            };
            match next {
                Some(ev) => return ev,
                // Sender side gone: the client will not report anything else.
                None => self.events = None,
            }
        }
    }

    /// Writes one payload, redialing first if the link dropped.
    ///
    /// Returns `Ok(false)` when the supervisor is Errored and the write was skipped.
    /// A transient write error closes the link and spends one unit of the
    /// failure budget; the next publish redials while budget remains.
    pub async fn publish(&mut self, subject: &str, payload: Vec<u8>) -> Result<bool, PublishError> {
        if self.state == ConnectionState::Disconnected {
            self.release_link().await;
            self.connect().await;
        }
        if self.state == ConnectionState::Errored {
            return Ok(false);
        }
        let link = self.link.as_ref().ok_or(PublishError::NotConnected)?;
        let written = tokio::select! {
            biased;
            res = link.publish(subject, payload) => res,
            _ = self.stop.cancelled() => Err(PublishError::Cancelled),
        };
        match written {
            Ok(()) => {
                self.failures = 0;
                Ok(true)
            }
            Err(err) => {
                if err.is_transient() {
                    self.on_write_failure().await;
                }
                Err(err)
            }
        }
    }

    async fn on_write_failure(&mut self) {
        self.failures += 1;
        self.release_link().await;
        if self.failures >= self.policy.attempts() {
            warn!(
                failures = self.failures,
                "bus writes keep failing; progress reporting disabled for this run"
            );
            self.transition(ConnectionState::Errored);
        } else {
            self.transition(ConnectionState::Disconnected);
        }
    }

    /// Closes and forgets the current link, if any.
    async fn release_link(&mut self) {
        self.events = None;
        if let Some(link) = self.link.take() {
            if let Err(err) = link.close().await {
                debug!(error = %err, label = err.as_label(), "closing stale bus link failed");
            }
        }
    }

    /// Closes the session if Connected; otherwise does nothing.
    pub async fn disconnect(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if let Some(link) = self.link.take() {
            if let Err(err) = link.close().await {
                warn!(error = %err, label = err.as_label(), "closing bus link failed");
            }
        }
        self.events = None;
        self.transition(ConnectionState::Disconnected);
        info!("disconnected from message bus");
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!(
                from = self.state.as_label(),
                to = next.as_label(),
                "connection state changed"
            );
            self.state = next;
        }
    }
}
