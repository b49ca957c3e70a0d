//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request Format
//! ```text
//! ┌──────────┬───────────────────────────────────────────┐
//! │ Ctrl (1) │ Body (depends on command)                 │
//! └──────────┴───────────────────────────────────────────┘
//! ```
//!
//! ### Body by Command
//! - GET, DEL:           key_len (2) + key
//! - PUT, ADD, UPDATE:   key_len (2) + key + value_len (4) + value
//! - SETDB:              name_len (1) + name
//! - others:             empty
//!
//! ### Response Format
//! ```text
//! ┌───────────┬──────────┬──────────────────────┐
//! │Status (1) │ Len (4)  │ Payload (GET only)   │
//! └───────────┴──────────┴──────────────────────┘
//! ```
//!
//! All integers are big-endian.

use std::io::{self, IoSlice, Read, Write};

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{FineError, Result};
use super::{Request, RequestOptions, ResponseHeader, Status};

/// Size of one socket read
const READ_CHUNK_SIZE: usize = 8192;

/// Byte closing a LIST stream
pub const LIST_END: u8 = 0;

// =============================================================================
// Frame Reader
// =============================================================================

/// Reads protocol fields from a byte stream
///
/// Bytes are accumulated in a growable buffer until a field is complete;
/// a field is consumed only once all of its bytes are available, so short
/// TCP reads are harmless. Bytes read past the current field stay buffered
/// for the next one.
pub struct FrameReader<R> {
    inner: R,
    buffer: BytesMut,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Number of bytes received but not consumed yet
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Ensure at least `size` bytes are buffered
    ///
    /// A zero-byte read or a read timeout before `size` bytes are available
    /// is reported as a connection reset.
    pub fn fill(&mut self, size: usize) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        while self.buffer.len() < size {
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    return Err(FineError::ConnectionReset(format!(
                        "peer closed the connection ({} of {} bytes received)",
                        self.buffer.len(),
                        size
                    )))
                }
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    return Err(FineError::ConnectionReset("read timed out".to_string()))
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.fill(1)?;
        Ok(self.buffer.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.fill(2)?;
        Ok(self.buffer.get_u16())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.fill(4)?;
        Ok(self.buffer.get_u32())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.fill(len)?;
        Ok(self.buffer.split_to(len).freeze())
    }

    /// Read a 2-byte length-prefixed key
    pub fn read_key(&mut self) -> Result<Bytes> {
        let len = self.read_u16()? as usize;
        self.read_bytes(len)
    }

    /// Read a 4-byte length-prefixed value
    pub fn read_value(&mut self) -> Result<Bytes> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    /// Read a 1-byte length-prefixed sub-database name (empty = default)
    pub fn read_dbname(&mut self) -> Result<Bytes> {
        let len = self.read_u8()? as usize;
        self.read_bytes(len)
    }
}

// =============================================================================
// Response Writing
// =============================================================================

/// Write a response in a single scatter write
///
/// Format: status (1) [+ payload_len (4) + payload]. A short write is an
/// error; it is not retried.
pub fn write_response<W: Write>(
    writer: &mut W,
    status: Status,
    serialized: bool,
    compressed: bool,
    payload: Option<&[u8]>,
) -> Result<()> {
    let code = [ResponseHeader::new(status, serialized, compressed).encode()];

    match payload {
        None => write_all_once(writer, &[IoSlice::new(&code)]),
        Some(payload) => {
            let len = u32::try_from(payload.len()).map_err(|_| {
                FineError::Protocol(format!("Payload too large: {} bytes", payload.len()))
            })?;
            let len = len.to_be_bytes();
            write_all_once(
                writer,
                &[IoSlice::new(&code), IoSlice::new(&len), IoSlice::new(payload)],
            )
        }
    }
}

/// Write one LIST entry: key_len (2) + key
pub fn write_list_entry<W: Write>(writer: &mut W, key: &[u8]) -> Result<()> {
    let len = u16::try_from(key.len())
        .map_err(|_| FineError::Protocol(format!("Key too large: {} bytes", key.len())))?;
    let len = len.to_be_bytes();
    write_all_once(writer, &[IoSlice::new(&len), IoSlice::new(key)])
}

/// Close a LIST stream
pub fn write_list_end<W: Write>(writer: &mut W) -> Result<()> {
    write_all_once(writer, &[IoSlice::new(&[LIST_END])])
}

fn write_all_once<W: Write>(writer: &mut W, parts: &[IoSlice<'_>]) -> Result<()> {
    let expected: usize = parts.iter().map(|part| part.len()).sum();
    let written = writer.write_vectored(parts)?;
    if written < expected {
        return Err(FineError::Io(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("incomplete write ({} / {} bytes)", written, expected),
        )));
    }
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Request Encoding
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &Request, options: RequestOptions) -> Result<Vec<u8>> {
    let control = request.command_id() as u8 | options.bits();
    let mut message = vec![control];

    match request {
        Request::Get { key } | Request::Del { key } => {
            push_key(&mut message, key)?;
        }
        Request::Put { key, value }
        | Request::Add { key, value }
        | Request::Update { key, value } => {
            push_key(&mut message, key)?;
            let len = u32::try_from(value.len()).map_err(|_| {
                FineError::Protocol(format!("Value too large: {} bytes", value.len()))
            })?;
            message.extend_from_slice(&len.to_be_bytes());
            message.extend_from_slice(value);
        }
        Request::SetDb { name } => {
            let name = name.as_deref().unwrap_or("");
            let len = u8::try_from(name.len()).map_err(|_| {
                FineError::Protocol(format!("Database name too long: {} bytes", name.len()))
            })?;
            message.push(len);
            message.extend_from_slice(name.as_bytes());
        }
        Request::Ping
        | Request::Start
        | Request::Stop
        | Request::Commit
        | Request::List
        | Request::Drop => {}
    }

    Ok(message)
}

fn push_key(message: &mut Vec<u8>, key: &[u8]) -> Result<()> {
    let len = u16::try_from(key.len())
        .map_err(|_| FineError::Protocol(format!("Key too large: {} bytes", key.len())))?;
    message.extend_from_slice(&len.to_be_bytes());
    message.extend_from_slice(key);
    Ok(())
}
