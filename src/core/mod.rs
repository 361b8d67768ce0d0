//! Publisher core: connection handling, background worker and shutdown.
//!
//! The only entry point most callers need is [`Publisher`].
//!
//! Internal modules:
//! - [`connection`]: connect / reconnect / error state machine over one bus session;
//! - [`worker`]: dedicated thread running the async side, commands in FIFO order;
//! - [`shutdown`]: bounded `Running → Draining → Stopped` sequence;
//! - [`publisher`]: caller-facing handle tying the three together.

mod connection;
mod publisher;
mod shutdown;
mod worker;

pub use connection::{ConnectionState, ConnectionSupervisor};
pub use publisher::Publisher;
pub use shutdown::{ShutdownReport, ShutdownState};
pub use worker::Delivery;
