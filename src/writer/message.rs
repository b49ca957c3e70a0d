//! Write messages
//!
//! One message per asynchronous mutation, created by a command handler and
//! consumed by the writer thread.

use bytes::Bytes;

/// Kind of asynchronous mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Put,
    Del,
    Drop,
}

/// A queued mutation
#[derive(Debug, Clone)]
pub enum WriteMessage {
    /// Add or update a key (value already compressed)
    Put {
        dbname: Option<String>,
        key: Bytes,
        value: Bytes,
        create_only: bool,
    },

    /// Remove a key
    Del { dbname: Option<String>, key: Bytes },

    /// Delete a named sub-database with all its keys
    Drop { dbname: String },
}

impl WriteMessage {
    pub fn action(&self) -> WriteAction {
        match self {
            WriteMessage::Put { .. } => WriteAction::Put,
            WriteMessage::Del { .. } => WriteAction::Del,
            WriteMessage::Drop { .. } => WriteAction::Drop,
        }
    }

    /// Target sub-database (`None` = default database)
    pub fn dbname(&self) -> Option<&str> {
        match self {
            WriteMessage::Put { dbname, .. } | WriteMessage::Del { dbname, .. } => dbname.as_deref(),
            WriteMessage::Drop { dbname } => Some(dbname),
        }
    }
}
