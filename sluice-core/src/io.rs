//! Buffer I/O adapter.
//!
//! Moves raw bytes between a reader/writer and a caller-supplied region.
//! Nothing is buffered here; the region passed in is the only staging area.

use crate::error::Result;
use std::io::{ErrorKind, Read, Write};

/// Fill `buf` from `reader` until it is full or the reader is exhausted.
///
/// Returns the number of bytes read. A count shorter than `buf.len()` only
/// happens at end of input, and `0` signals exhaustion.
pub fn read_chunk<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(filled)
}

/// Write all of `buf` to `writer`.
///
/// Returns the number of bytes written, which is always `buf.len()`. A writer
/// that stops accepting bytes surfaces as an I/O error.
pub fn write_chunk<W: Write + ?Sized>(writer: &mut W, buf: &[u8]) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    writer.write_all(buf)?;
    Ok(buf.len())
}
