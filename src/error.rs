//! Error types for FineDB
//!
//! Provides a unified error type for all operations, and the mapping from
//! errors to the status codes reported to clients.

use std::io;

use thiserror::Error;

use crate::protocol::Status;

/// Result type alias using FineError
pub type Result<T> = std::result::Result<T, FineError>;

/// Unified error type for FineDB operations
#[derive(Debug, Error)]
pub enum FineError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A response carrying a non-OK status (client side)
    #[error("Request rejected with status {0:?}")]
    Rejected(Status),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database map is full")]
    MapFull,

    #[error("Too many sub-databases")]
    TooManyDatabases,

    #[error("Key not found")]
    KeyNotFound,

    #[error("Sub-database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Key already exists")]
    KeyExists,

    #[error("Bad sub-database name: {0}")]
    BadName(String),

    // -------------------------------------------------------------------------
    // Compression Errors
    // -------------------------------------------------------------------------
    #[error("Compression error: {0}")]
    Compression(String),

    // -------------------------------------------------------------------------
    // Transaction Errors
    // -------------------------------------------------------------------------
    #[error("Transaction error: {0}")]
    Transaction(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Writer thread is not running")]
    WriterUnavailable,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FineError {
    /// Status code reported to the client for this error
    pub fn status(&self) -> Status {
        match self {
            FineError::KeyNotFound
            | FineError::DatabaseNotFound(_)
            | FineError::KeyExists
            | FineError::BadName(_) => Status::BadName,
            FineError::MapFull => Status::FullDb,
            FineError::TooManyDatabases => Status::TooManyDb,
            FineError::Protocol(_) => Status::Protocol,
            FineError::Transaction(_) => Status::Transaction,
            FineError::Rejected(status) => *status,
            _ => Status::Server,
        }
    }

    /// True when the error means the peer is gone (or never answered)
    pub fn is_disconnect(&self) -> bool {
        match self {
            FineError::ConnectionReset(_) => true,
            FineError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

impl From<lmdb::Error> for FineError {
    fn from(err: lmdb::Error) -> Self {
        match err {
            lmdb::Error::MapFull => FineError::MapFull,
            lmdb::Error::DbsFull => FineError::TooManyDatabases,
            lmdb::Error::KeyExist => FineError::KeyExists,
            lmdb::Error::NotFound => FineError::KeyNotFound,
            // The handle was closed by a concurrent DROP
            lmdb::Error::BadDbi => FineError::DatabaseNotFound("dropped".to_string()),
            other => FineError::Storage(other.to_string()),
        }
    }
}
