//! # sluice Zstandard
//!
//! Streaming Zstandard compression and decompression on top of the
//! reference library.
//!
//! Zstandard frames are self-describing, so the drivers add no header of
//! their own. Output is written after every library call, and transfer
//! buffers come from the caller's allocator, sized by the library's
//! recommendations.
//!
//! ## Example
//!
//! ```rust
//! use sluice_zstd::{compress_bytes, decompress_bytes};
//!
//! let data = b"Hello, Zstandard! Hello, Zstandard!";
//! let compressed = compress_bytes(data, 3).unwrap();
//! assert_eq!(decompress_bytes(&compressed).unwrap(), data);
//! ```
//!
//! Decompression is strict about the end of the source: it must fall on a
//! frame boundary, otherwise the result is
//! [`SluiceError::IncompleteFrame`](sluice_core::SluiceError::IncompleteFrame).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod driver;
pub mod file;

pub use context::{Compressor, DEFAULT_LEVEL, Decompressor, StepResult, check_level, level_range};
pub use driver::{StreamPhase, compress_stream, decompress_stream};
pub use file::{SUFFIX, compress_file, decompress_file};
pub use zstd::zstd_safe::CompressionLevel;

use sluice_core::alloc::SystemAllocator;
use sluice_core::error::Result;
use std::io::Cursor;

/// Zstandard magic number (0xFD2FB528 little-endian).
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Content size recorded in a frame header.
///
/// `Some(None)` when the frame does not record it (streamed frames never
/// do), `None` when `header` does not start with a valid frame header.
pub fn frame_content_size(header: &[u8]) -> Option<Option<u64>> {
    zstd::zstd_safe::get_frame_content_size(header).ok()
}

/// Compress a byte slice into one Zstandard frame.
pub fn compress_bytes(data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    compress_stream(&mut Cursor::new(data), &mut out, level, &SystemAllocator)?;
    Ok(out)
}

/// Decompress one or more Zstandard frames held in memory.
pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decompress_stream(&mut Cursor::new(data), &mut out, &SystemAllocator)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_content_size() {
        let streamed = compress_bytes(b"streamed", DEFAULT_LEVEL).unwrap();
        assert_eq!(frame_content_size(&streamed), Some(None));
        assert_eq!(frame_content_size(b"nope"), None);
    }

    #[test]
    fn test_frame_magic() {
        let compressed = compress_bytes(b"magic", DEFAULT_LEVEL).unwrap();
        assert_eq!(&compressed[..4], &ZSTD_MAGIC);
    }
}
