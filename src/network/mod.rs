//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread pushing sockets onto the admission queue
//! - Fixed pool of worker threads, one connection per worker at a time
//! - Synchronous commands run on the worker, asynchronous writes go to the
//!   writer thread

mod server;
mod worker;
mod connection;
mod handlers;

pub use server::{Server, ServerContext, ShutdownHandle};
pub use connection::{Connection, Session};
