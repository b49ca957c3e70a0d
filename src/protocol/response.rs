//! Response definitions
//!
//! A response starts with a status byte: the status code in the low bits,
//! plus the SERIALIZED and COMPRESSED option bits.

use crate::error::{FineError, Result};

use super::command::{OPT_COMPRESSED, OPT_SERIALIZED};

/// Mask extracting the status code from a status byte
pub const STATUS_MASK: u8 = 0x1f;

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Undefined = 0,
    Ok = 1,
    Protocol = 2,
    Server = 3,
    FullDb = 4,
    TooManyDb = 5,
    BadName = 6,
    Transaction = 7,
}

impl Status {
    pub fn from_code(code: u8) -> Option<Self> {
        let status = match code {
            0 => Status::Undefined,
            1 => Status::Ok,
            2 => Status::Protocol,
            3 => Status::Server,
            4 => Status::FullDb,
            5 => Status::TooManyDb,
            6 => Status::BadName,
            7 => Status::Transaction,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_ok(&self) -> bool {
        *self == Status::Ok
    }
}

/// Decoded status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub status: Status,
    pub serialized: bool,
    pub compressed: bool,
}

impl ResponseHeader {
    pub fn new(status: Status, serialized: bool, compressed: bool) -> Self {
        Self {
            status,
            serialized,
            compressed,
        }
    }

    /// Build the status byte
    pub fn encode(&self) -> u8 {
        let mut byte = self.status as u8;
        if self.serialized {
            byte |= OPT_SERIALIZED;
        }
        if self.compressed {
            byte |= OPT_COMPRESSED;
        }
        byte
    }

    /// Parse a status byte
    pub fn decode(byte: u8) -> Result<Self> {
        let status = Status::from_code(byte & STATUS_MASK).ok_or_else(|| {
            FineError::Protocol(format!("Unknown response status: 0x{:02x}", byte))
        })?;
        Ok(Self {
            status,
            serialized: byte & OPT_SERIALIZED != 0,
            compressed: byte & OPT_COMPRESSED != 0,
        })
    }
}
