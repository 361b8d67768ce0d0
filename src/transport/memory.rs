//! # In-process bus.
//!
//! [`MemoryBus`] implements [`Connector`] without any network. It records every
//! published message and can be told to misbehave: refuse connections, hang
//! forever, reject credentials, fail writes, slow writes down, or push status
//! notifications into live sessions. Useful for dry runs, demos and tests.
//!
//! ## Example
//! ```rust
//! use nbprogress::{LinkEvent, MemoryBus};
//!
//! let bus = MemoryBus::failing_first(2);
//! // ... run a notebook against it ...
//! bus.notify(LinkEvent::Disconnected);
//! assert!(bus.messages().is_empty());
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::sync::mpsc;

use crate::error::{ConnectError, PublishError};
use crate::transport::link::{Connector, Endpoint, Link, LinkEvent, Session};

/// A message captured by [`MemoryBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Subject it was published to.
    pub subject: String,
    /// Raw payload.
    pub payload: Vec<u8>,
}

impl Message {
    /// Decodes the payload as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

#[derive(Debug, Clone, Default)]
struct Behavior {
    /// Connection attempts still to refuse (`usize::MAX` = refuse forever).
    refusals_left: usize,
    hang: bool,
    credentials: Option<(String, String)>,
    offline: bool,
    publish_delay: Duration,
}

#[derive(Default)]
struct MemoryState {
    behavior: Mutex<Behavior>,
    messages: Mutex<Vec<Message>>,
    notifiers: Mutex<Vec<mpsc::UnboundedSender<LinkEvent>>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

/// Recording, scriptable in-process bus.
///
/// Cheap to clone; clones share the same recorded state.
#[derive(Clone, Default)]
pub struct MemoryBus {
    state: Arc<MemoryState>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryBus {
    /// A healthy bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus that refuses every connection attempt.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::failing_first(usize::MAX)
    }

    /// A bus that refuses the first `n` connection attempts.
    #[must_use]
    pub fn failing_first(n: usize) -> Self {
        let bus = Self::default();
        lock(&bus.state.behavior).refusals_left = n;
        bus
    }

    /// A bus whose connection attempts never complete.
    #[must_use]
    pub fn hanging() -> Self {
        let bus = Self::default();
        lock(&bus.state.behavior).hang = true;
        bus
    }

    /// Only accepts sessions authenticating as `user` / `password`.
    #[must_use]
    pub fn with_credentials(self, user: impl Into<String>, password: impl Into<String>) -> Self {
        lock(&self.state.behavior).credentials = Some((user.into(), password.into()));
        self
    }

    /// Makes every write take at least `delay`.
    #[must_use]
    pub fn with_publish_delay(self, delay: Duration) -> Self {
        lock(&self.state.behavior).publish_delay = delay;
        self
    }

    /// While offline, writes on live links fail with an i/o error.
    pub fn set_offline(&self, offline: bool) {
        lock(&self.state.behavior).offline = offline;
    }

    /// Pushes a status notification into every live session.
    pub fn notify(&self, event: LinkEvent) {
        lock(&self.state.notifiers).retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Messages published so far, in write order.
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.state.messages).clone()
    }

    /// Number of times `connect` was called.
    pub fn connect_calls(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Number of times a link was closed.
    pub fn close_calls(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryBus {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Session, ConnectError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);

        let behavior = {
            let mut b = lock(&self.state.behavior);
            let snapshot = b.clone();
            if b.refusals_left > 0 && b.refusals_left != usize::MAX {
                b.refusals_left -= 1;
            }
            snapshot
        };

        if behavior.hang {
            std::future::pending::<()>().await;
        }
        if behavior.refusals_left > 0 {
            return Err(ConnectError::Unreachable {
                url: endpoint.url.clone(),
                reason: "connection refused".to_string(),
            });
        }
        if let Some((user, password)) = &behavior.credentials {
            if *user != endpoint.user || password.as_str() != endpoint.password.expose_secret() {
                return Err(ConnectError::Rejected {
                    reason: "authorization violation".to_string(),
                });
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.state.notifiers).push(tx);
        Ok(Session::new(
            Box::new(MemoryLink {
                state: Arc::clone(&self.state),
            }),
            rx,
        ))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryLink {
    state: Arc<MemoryState>,
}

#[async_trait]
impl Link for MemoryLink {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let (delay, offline) = {
            let b = lock(&self.state.behavior);
            (b.publish_delay, b.offline)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if offline {
            return Err(PublishError::Io {
                reason: "broken pipe".to_string(),
            });
        }
        lock(&self.state.messages).push(Message {
            subject: subject.to_string(),
            payload,
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
