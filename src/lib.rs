//! # FineDB
//!
//! A networked key-value store over LMDB with:
//! - A compact binary protocol (one control byte per request)
//! - Named sub-databases selected per connection
//! - Fire-and-forget writes applied in order by a single writer thread
//! - Per-connection transactions
//! - Snappy-compressed values
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Listener                            │
//! │                   (accept loop thread)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ admission queue
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Connection Workers                          │
//! │          (fixed pool, one connection at a time)              │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ sync / in transaction            │ async writes
//!            │                                  ▼
//!            │                          ┌─────────────┐
//!            │                          │   Writer    │
//!            │                          │ (1 thread)  │
//!            │                          └──────┬──────┘
//!            ▼                                 ▼
//!   ┌───────────────────────────────────────────────────┐
//!   │                 Storage (LMDB)                    │
//!   │        default database + named sub-databases     │
//!   └───────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod compression;
pub mod storage;
pub mod writer;
pub mod network;
pub mod protocol;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FineError, Result};
pub use config::Config;
pub use network::Server;
pub use client::Client;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of FineDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
