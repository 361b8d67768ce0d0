//! Reconnect policies.
//!
//! This module groups the knobs that control **how often** the publisher
//! redials a lost bus and **how long** it waits between dials.
//!
//! ## Contents
//! - [`ReconnectPolicy`] bounded run-wide failure budget
//! - [`BackoffPolicy`] how delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization to avoid synchronized redials
//!
//! ## Quick wiring
//! ```text
//! Config { reconnect: ReconnectPolicy }
//!      └─► core::connection::ConnectionSupervisor uses:
//!           - reconnect.attempts() to bound consecutive failures
//!           - reconnect.delay_after(n) to pace the next dial
//! ```

mod backoff;
mod jitter;
mod reconnect;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use reconnect::ReconnectPolicy;
