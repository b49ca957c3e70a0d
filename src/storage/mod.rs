//! Storage Module
//!
//! Thin façade over the LMDB engine.
//!
//! ## Responsibilities
//! - Open/close the environment (map size, readers, sub-database limit)
//! - Begin/commit/roll back read-write transactions
//! - get/put/del/list/drop within a named sub-database
//! - Serialize sub-database handle resolution across threads
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Environment ({data_dir}/data.mdb)       │
//! │ ┌─────────────────────────────────────┐ │
//! │ │ default database                    │ │
//! │ ├─────────────────────────────────────┤ │
//! │ │ sub-database "x"                    │ │
//! │ ├─────────────────────────────────────┤ │
//! │ │ sub-database "y" ...                │ │
//! │ └─────────────────────────────────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Values are stored compressed; the storage layer treats them as opaque.

mod database;
mod transaction;

pub use database::Storage;
pub use transaction::Transaction;
