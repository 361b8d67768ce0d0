//! # Bus transport traits.
//!
//! Provides [`Connector`] and [`Link`], the extension points a concrete bus
//! client plugs into.
//!
//! ## Architecture
//! ```text
//! ConnectionSupervisor ──► Connector::connect(&Endpoint) ──► Session
//!                                                            ├─► link:   Box<dyn Link>      (publish / close)
//!                                                            └─► events: LinkEvent receiver (error / disconnect / reconnect)
//! ```
//!
//! ## Rules
//! - All calls happen on the publisher worker; implementations may assume a
//!   single caller at a time.
//! - A client that reconnects on its own reports it with [`LinkEvent::Reconnected`].
//! - [`LinkEvent::Error`] is terminal for the run: the supervisor stops publishing.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use nbprogress::{Connector, ConnectError, Endpoint, Link, PublishError, Session};
//!
//! struct Stdout;
//!
//! #[async_trait]
//! impl Link for Stdout {
//!     async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), PublishError> {
//!         println!("{subject}: {}", String::from_utf8_lossy(&payload));
//!         Ok(())
//!     }
//!
//!     async fn close(&self) -> Result<(), PublishError> {
//!         Ok(())
//!     }
//! }
//!
//! struct StdoutConnector;
//!
//! #[async_trait]
//! impl Connector for StdoutConnector {
//!     async fn connect(&self, _endpoint: &Endpoint) -> Result<Session, ConnectError> {
//!         Ok(Session::detached(Box::new(Stdout)))
//!     }
//! }
//! ```

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::mpsc;

use crate::error::{ConnectError, PublishError};

/// Where and as whom to connect.
#[derive(Clone, Debug)]
pub struct Endpoint {
    /// Bus URL.
    pub url: String,
    /// User name.
    pub user: String,
    /// Password; redacted in `Debug` output.
    pub password: SecretString,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Connection status notification raised by a live link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link failed irrecoverably.
    Error(String),
    /// The link lost its connection.
    Disconnected,
    /// The link re-established its connection on its own.
    Reconnected,
}

/// A live bus session: the link and its status notifications.
pub struct Session {
    /// Outbound side.
    pub link: Box<dyn Link>,
    /// Status notifications; `None` when the client never reports any.
    pub events: Option<mpsc::UnboundedReceiver<LinkEvent>>,
}

impl Session {
    /// A session that reports status through `events`.
    pub fn new(link: Box<dyn Link>, events: mpsc::UnboundedReceiver<LinkEvent>) -> Self {
        Self {
            link,
            events: Some(events),
        }
    }

    /// A session without status notifications.
    pub fn detached(link: Box<dyn Link>) -> Self {
        Self { link, events: None }
    }
}

/// Outbound half of a bus session.
#[async_trait]
pub trait Link: Send + Sync + 'static {
    /// Publishes one payload to `subject`.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), PublishError>;

    /// Flushes and closes the session.
    async fn close(&self) -> Result<(), PublishError>;
}

/// Dials the bus.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a new session to `endpoint`.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Session, ConnectError>;

    /// Returns the connector name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
