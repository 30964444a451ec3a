//! Stream drivers for the `.lzma` container.
//!
//! Both drivers move bytes between a reader, an [`LzmaEncoder`] /
//! [`LzmaDecoder`] and a writer through one pair of transfer buffers drawn
//! from the caller's [`BufferAllocator`]. Compressed output is written as
//! soon as it is produced, so memory use is bounded by the buffers plus the
//! codec's history window regardless of the stream length.

use crate::decoder::{DecodeStatus, FinishMode, LzmaDecoder};
use crate::encoder::LzmaEncoder;
use crate::header::{HEADER_SIZE, Header, UNKNOWN_SIZE, encode_header};
use crate::params::LzmaParams;
use crate::status;
use sluice_core::Summary;
use sluice_core::alloc::BufferAllocator;
use sluice_core::error::{Result, SluiceError};
use sluice_core::io::{read_chunk, write_chunk};
use sluice_core::resources::{BufferSizes, Direction, Parts, StreamResources};
use sluice_core::transfer::Transfer;
use std::io::{Read, Write};
use tracing::{debug, trace, warn};

/// Size of each transfer buffer (64 KiB).
pub const IO_BUFFER_SIZE: usize = 1 << 16;

/// Compress `source` into `sink` as a `.lzma` stream.
///
/// `declared_size` is written to the header and must equal the number of
/// bytes `source` yields, otherwise the call fails with
/// [`SluiceError::SizeMismatch`] after the payload has been written. Pass
/// [`UNKNOWN_SIZE`] when the length is not known up front; the payload is
/// then terminated with an end marker instead.
///
/// Nothing is written when the parameters are rejected.
pub fn encode_stream<R, W>(
    source: &mut R,
    sink: &mut W,
    declared_size: u64,
    params: &LzmaParams,
    alloc: &dyn BufferAllocator,
) -> Result<Summary>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let params = if declared_size == UNKNOWN_SIZE {
        params.with_end_marker(true)
    } else {
        *params
    };
    params.validate()?;

    let mut res = StreamResources::acquire(
        alloc,
        Direction::Compress,
        BufferSizes::symmetric(IO_BUFFER_SIZE),
        |a| LzmaEncoder::with_allocator(&params, a),
    )?;
    let Parts {
        input,
        output,
        state: encoder,
    } = res.parts();

    debug!(
        declared_size,
        dict_size = params.dict_size,
        level = params.level,
        "starting LZMA encode"
    );

    let mut summary = Summary::default();
    let header = encode_header(&encoder.properties(), declared_size);
    summary.bytes_out += write_chunk(sink, &header)? as u64;

    loop {
        let n = read_chunk(source, input)?;
        if n == 0 {
            break;
        }
        summary.bytes_in += n as u64;

        let mut progress = encoder.encode(&input[..n], output)?;
        summary.bytes_out += write_chunk(sink, &output[..progress.written])? as u64;
        while progress.pending > 0 {
            let written = encoder.drain(output);
            summary.bytes_out += write_chunk(sink, &output[..written])? as u64;
            progress.pending = encoder.pending();
        }

        trace!(read = n, total_in = summary.bytes_in, "encoded chunk");
    }

    loop {
        let progress = encoder.finish(output)?;
        summary.bytes_out += write_chunk(sink, &output[..progress.written])? as u64;
        if progress.pending == 0 {
            break;
        }
    }
    sink.flush()?;

    if declared_size != UNKNOWN_SIZE && summary.bytes_in != declared_size {
        warn!(
            declared = declared_size,
            actual = summary.bytes_in,
            "source length changed while compressing"
        );
        return Err(SluiceError::size_mismatch(declared_size, summary.bytes_in));
    }

    debug!(
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        "finished LZMA encode"
    );
    Ok(summary)
}

/// Decompress a `.lzma` stream from `source` into `sink`.
///
/// The header's original size decides when decoding stops; the payload must
/// end exactly there. A header size of [`UNKNOWN_SIZE`] means the payload
/// runs until its end marker. Bytes after the payload are ignored.
///
/// Nothing is written to `sink` when the header is truncated.
pub fn decode_stream<R, W>(
    source: &mut R,
    sink: &mut W,
    alloc: &dyn BufferAllocator,
) -> Result<Summary>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let header = Header::read_from(source)?;
    let known = header.size_known();
    let mut remaining = header.original_size;
    let mut summary = Summary {
        bytes_in: HEADER_SIZE as u64,
        bytes_out: 0,
    };

    debug!(
        original_size = header.original_size,
        dict_size = header.dict_size(),
        "starting LZMA decode"
    );

    if remaining == 0 {
        debug!("empty payload");
        return Ok(summary);
    }

    let mut res = StreamResources::acquire(
        alloc,
        Direction::Decompress,
        BufferSizes::symmetric(IO_BUFFER_SIZE),
        |a| LzmaDecoder::new(&header.props, a),
    )?;
    let Parts {
        input,
        output,
        state: decoder,
    } = res.parts();

    let mut cursor = Transfer::empty();
    let mut source_done = false;

    loop {
        if cursor.is_exhausted() && !source_done {
            let n = read_chunk(source, input)?;
            cursor = cursor.refill(n);
            source_done = n == 0;
            summary.bytes_in += n as u64;
        }

        let (want, finish) = if known && remaining <= output.len() as u64 {
            (remaining as usize, FinishMode::End)
        } else {
            (output.len(), FinishMode::Any)
        };

        let progress = decoder.decode(&mut output[..want], &input[cursor.pending()], finish)?;
        cursor = cursor.advance(progress.consumed);

        summary.bytes_out += write_chunk(sink, &output[..progress.produced])? as u64;
        if known {
            remaining -= progress.produced as u64;
        }

        trace!(
            consumed = progress.consumed,
            produced = progress.produced,
            remaining,
            status = ?progress.status,
            "decoded chunk"
        );

        match progress.status {
            DecodeStatus::FinishedWithMark if known && remaining != 0 => {
                warn!(remaining, "end marker before the declared size");
                return Err(SluiceError::decode_failed(
                    status::DATA,
                    format!("end marker with {remaining} bytes still expected"),
                ));
            }
            DecodeStatus::FinishedWithMark => break,
            DecodeStatus::MaybeFinishedWithoutMark if known && remaining == 0 => break,
            _ => {}
        }

        if progress.consumed == 0 && progress.produced == 0 {
            if source_done {
                warn!(remaining, "compressed payload ended early");
                return Err(SluiceError::truncated(remaining));
            }
            // The decoder consumes or produces on every call with input and
            // output room, so this only fires if that contract breaks.
            if !cursor.is_exhausted() {
                warn!(remaining, "decoder made no progress");
                return Err(SluiceError::stuck(remaining));
            }
        }
    }

    sink.flush()?;
    res.release();

    debug!(
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        "finished LZMA decode"
    );
    Ok(summary)
}
