//! Writer Module
//!
//! Serializes asynchronous mutations.
//!
//! ## Flow
//! ```text
//!  worker 1 ──┐
//!  worker 2 ──┼──► write channel (FIFO) ──► writer thread ──► Storage
//!  worker N ──┘
//! ```
//!
//! Clients are acknowledged before their message is applied. Messages are
//! applied strictly in the order they entered the channel, across all
//! connections; a failed message is logged and dropped.

mod message;
mod actor;

pub use message::{WriteAction, WriteMessage};
pub use actor::{Writer, WriterHandle, WriterStats};
