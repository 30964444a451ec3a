//! # sluice LZMA
//!
//! Streaming LZMA compression and decompression in the classic `.lzma`
//! ("LZMA-alone") container.
//!
//! ## Features
//!
//! - **Pure Rust** range coder, probability model, encoder and decoder
//! - **Incremental** encoder and decoder: any input and output slice sizes,
//!   all state kept between calls
//! - **Explicit finish modes** on the decoder, so a payload that runs past
//!   its declared size is detected instead of silently truncated
//! - Stream drivers with bounded memory: output is written after every call
//!
//! ## Usage
//!
//! ```rust
//! use sluice_lzma::{LzmaParams, compress_bytes, decompress_bytes};
//!
//! let data = b"Hello, World! Hello, World! Hello, World!";
//! let compressed = compress_bytes(data, &LzmaParams::default()).unwrap();
//! assert_eq!(&compressed[5..13], &(data.len() as u64).to_le_bytes());
//! assert_eq!(decompress_bytes(&compressed).unwrap(), data);
//! ```
//!
//! ## Stream format
//!
//! A `.lzma` stream consists of:
//! 1. Properties byte (lc, lp, pb encoded)
//! 2. Dictionary size (4 bytes, little-endian)
//! 3. Uncompressed size (8 bytes, little-endian, 0xFFFFFFFFFFFFFFFF = unknown)
//! 4. Compressed payload
//!
//! When the size is unknown the payload ends with an end marker.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
pub mod driver;
pub mod encoder;
pub mod file;
pub mod header;
pub mod model;
pub mod params;
pub mod range_coder;
pub mod status;

// Re-exports
pub use decoder::{DecodeProgress, DecodeStatus, FinishMode, LzmaDecoder};
pub use driver::{IO_BUFFER_SIZE, decode_stream, encode_stream};
pub use encoder::{EncodeProgress, LzmaEncoder};
pub use file::{SUFFIX, compress_file, decompress_file};
pub use header::{HEADER_SIZE, Header, UNKNOWN_SIZE, decode_header, encode_header};
pub use model::{LzmaModel, LzmaProperties, State};
pub use params::LzmaParams;
pub use range_coder::{RangeDecoder, RangeEncoder};

use sluice_core::alloc::SystemAllocator;
use sluice_core::error::Result;
use std::io::Cursor;

/// Compress a byte slice into a complete `.lzma` stream.
///
/// This is a convenience wrapper around [`encode_stream`].
pub fn compress_bytes(data: &[u8], params: &LzmaParams) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_stream(
        &mut Cursor::new(data),
        &mut out,
        data.len() as u64,
        params,
        &SystemAllocator,
    )?;
    Ok(out)
}

/// Decompress a complete `.lzma` stream held in memory.
///
/// This is a convenience wrapper around [`decode_stream`].
pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decode_stream(&mut Cursor::new(data), &mut out, &SystemAllocator)?;
    Ok(out)
}
