//! # Message bus transport.
//!
//! The publisher never talks to a concrete bus client directly. It dials
//! through a [`Connector`] and writes through the returned [`Link`]; status
//! changes come back as [`LinkEvent`]s.
//!
//! ## Contents
//! - [`Connector`], [`Link`], [`Session`], [`LinkEvent`], [`Endpoint`] the seam
//! - [`MemoryBus`] in-process implementation (dry runs, demos, tests)

mod link;
mod memory;

pub use link::{Connector, Endpoint, Link, LinkEvent, Session};
pub use memory::{MemoryBus, Message};
