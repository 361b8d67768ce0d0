//! Error types used by the publisher runtime, the bus transport and configuration.
//!
//! This module defines four enums:
//!
//! - [`RuntimeError`]: failures of the publisher runtime itself (worker start, shutdown grace).
//! - [`ConnectError`]: the bus could not be reached or refused the session.
//! - [`PublishError`]: one message could not be serialized or written.
//! - [`ConfigError`]: configuration could not be loaded.
//!
//! All of them provide `as_label` for logs. None of them ever reaches the
//! notebook caller from inside a hook: connect and publish errors are caught on
//! the worker and only show up in diagnostics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the publisher runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The worker did not report stopped within the shutdown grace period.
    ///
    /// Publish tasks that had not resolved are abandoned.
    #[error("shutdown grace {grace:?} exceeded; abandoned {abandoned} publish task(s)")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Number of publish tasks whose outcome is unknown.
        abandoned: usize,
    },

    /// The background worker (thread or runtime) could not be started.
    #[error("failed to start publisher worker: {reason}")]
    WorkerSpawn {
        /// The underlying error message.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use nbprogress::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), abandoned: 2 };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::WorkerSpawn { .. } => "runtime_worker_spawn",
        }
    }
}

/// # Errors produced while establishing a bus session.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The bus endpoint could not be reached.
    #[error("bus unreachable at {url}: {reason}")]
    Unreachable {
        /// Endpoint URL that was dialed.
        url: String,
        /// The underlying error message.
        reason: String,
    },

    /// The bus refused the session (bad credentials, permissions).
    #[error("bus rejected session: {reason}")]
    Rejected {
        /// The underlying error message.
        reason: String,
    },
}

impl ConnectError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectError::Unreachable { .. } => "connect_unreachable",
            ConnectError::Rejected { .. } => "connect_rejected",
        }
    }
}

/// # Errors produced while publishing one message.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PublishError {
    /// The event could not be encoded as JSON.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The link failed to write the message.
    #[error("i/o failed: {reason}")]
    Io {
        /// The underlying error message.
        reason: String,
    },

    /// No live link is available.
    #[error("not connected")]
    NotConnected,

    /// The write was abandoned because the publisher is stopping.
    #[error("publish abandoned at shutdown")]
    Cancelled,
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use nbprogress::PublishError;
    ///
    /// let err = PublishError::Io { reason: "broken pipe".into() };
    /// assert_eq!(err.as_label(), "publish_io");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::Serialize(_) => "publish_serialize",
            PublishError::Io { .. } => "publish_io",
            PublishError::NotConnected => "publish_not_connected",
            PublishError::Cancelled => "publish_cancelled",
        }
    }

    /// Indicates whether a reconnect could make a retry succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Io { .. } | PublishError::NotConnected)
    }
}

/// # Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set (or is empty).
    #[error("missing required setting {key}")]
    Missing {
        /// Variable name.
        key: String,
    },

    /// A variable is set but cannot be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name.
        key: String,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Missing { .. } => "config_missing",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}
