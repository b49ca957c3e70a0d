//! Block compression
//!
//! Values are stored in Snappy's raw block format. The codec is used as a
//! pair of pure functions; the uncompressed length travels inside the
//! compressed block header.

use snap::raw::{Decoder, Encoder};

use crate::error::{FineError, Result};

/// Compress a value
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    Encoder::new()
        .compress_vec(data)
        .map_err(|e| FineError::Compression(e.to_string()))
}

/// Uncompress a value
///
/// An empty block is an empty value: clients in compressed mode may store
/// one as is.
pub fn uncompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    Decoder::new()
        .decompress_vec(data)
        .map_err(|e| FineError::Compression(e.to_string()))
}

