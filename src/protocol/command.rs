//! Command definitions
//!
//! The request control byte packs a 4-bit command id with 4 option bits.

use crate::error::{FineError, Result};

/// Mask extracting the command id from a control byte
pub const COMMAND_MASK: u8 = 0x0f;

/// Synchronous request: answer only once the mutation is applied
pub const OPT_SYNC: u8 = 0x10;

/// Payload is serialized data (opaque to the server)
pub const OPT_SERIALIZED: u8 = 0x20;

/// Payload is (or should be returned) compressed
pub const OPT_COMPRESSED: u8 = 0x40;

/// Request issued by another server
pub const OPT_SERVER_TO_SERVER: u8 = 0x80;

/// Command ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    Ping = 0x0,
    Get = 0x1,
    Del = 0x2,
    Put = 0x3,
    SetDb = 0x4,
    Start = 0x5,
    Stop = 0x6,
    List = 0x7,
    Drop = 0x8,
    Commit = 0x9,
    /// PUT that fails if the key already exists
    Add = 0xa,
    /// PUT that fails if the key does not exist
    Update = 0xb,
    Admin = 0xe,
    Extra = 0xf,
}

impl CommandId {
    /// Map a 4-bit command id to a command, `None` for reserved ids
    pub fn from_id(id: u8) -> Option<Self> {
        let command = match id & COMMAND_MASK {
            0x0 => CommandId::Ping,
            0x1 => CommandId::Get,
            0x2 => CommandId::Del,
            0x3 => CommandId::Put,
            0x4 => CommandId::SetDb,
            0x5 => CommandId::Start,
            0x6 => CommandId::Stop,
            0x7 => CommandId::List,
            0x8 => CommandId::Drop,
            0x9 => CommandId::Commit,
            0xa => CommandId::Add,
            0xb => CommandId::Update,
            0xe => CommandId::Admin,
            0xf => CommandId::Extra,
            _ => return None,
        };
        Some(command)
    }
}

/// Option bits carried by a request's control byte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub sync: bool,
    pub serialized: bool,
    pub compressed: bool,
    pub server_to_server: bool,
}

impl RequestOptions {
    /// Extract the option bits of a control byte
    pub fn from_byte(byte: u8) -> Self {
        Self {
            sync: byte & OPT_SYNC != 0,
            serialized: byte & OPT_SERIALIZED != 0,
            compressed: byte & OPT_COMPRESSED != 0,
            server_to_server: byte & OPT_SERVER_TO_SERVER != 0,
        }
    }

    /// Option bits, ready to be OR-ed with a command id
    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.sync {
            bits |= OPT_SYNC;
        }
        if self.serialized {
            bits |= OPT_SERIALIZED;
        }
        if self.compressed {
            bits |= OPT_COMPRESSED;
        }
        if self.server_to_server {
            bits |= OPT_SERVER_TO_SERVER;
        }
        bits
    }
}

/// Split a control byte into its command and options
///
/// Reserved command ids are a protocol error.
pub fn decode_control_byte(byte: u8) -> Result<(CommandId, RequestOptions)> {
    let command = CommandId::from_id(byte).ok_or_else(|| {
        FineError::Protocol(format!("Unknown command id: 0x{:x}", byte & COMMAND_MASK))
    })?;
    Ok((command, RequestOptions::from_byte(byte)))
}

/// A request, as built by clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Liveness check
    Ping,

    /// Get a value by key
    Get { key: Vec<u8> },

    /// Delete a key
    Del { key: Vec<u8> },

    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Put a key-value pair, only if the key is absent
    Add { key: Vec<u8>, value: Vec<u8> },

    /// Put a key-value pair, only if the key is present
    Update { key: Vec<u8>, value: Vec<u8> },

    /// Select a sub-database (`None` = default database)
    SetDb { name: Option<String> },

    /// Open a transaction
    Start,

    /// Roll back the open transaction
    Stop,

    /// Commit the open transaction
    Commit,

    /// Stream the keys of the selected sub-database
    List,

    /// Drop the selected sub-database
    Drop,
}

impl Request {
    /// Get the command id
    pub fn command_id(&self) -> CommandId {
        match self {
            Request::Ping => CommandId::Ping,
            Request::Get { .. } => CommandId::Get,
            Request::Del { .. } => CommandId::Del,
            Request::Put { .. } => CommandId::Put,
            Request::Add { .. } => CommandId::Add,
            Request::Update { .. } => CommandId::Update,
            Request::SetDb { .. } => CommandId::SetDb,
            Request::Start => CommandId::Start,
            Request::Stop => CommandId::Stop,
            Request::Commit => CommandId::Commit,
            Request::List => CommandId::List,
            Request::Drop => CommandId::Drop,
        }
    }
}
