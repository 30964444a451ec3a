//! Stream drivers for Zstandard.
//!
//! Zstandard frames carry their own framing, so these drivers add no header:
//! they pump the source through a [`Compressor`] or [`Decompressor`] and
//! write whatever comes out after every call.
//!
//! Each run moves through the phases of [`StreamPhase`]:
//!
//! ```text
//! Idle -> Initialized -> Streaming -> Finalizing -> Done
//!                 \____________\____________\______> Failed
//! ```

use crate::context::{Compressor, Decompressor};
use sluice_core::Summary;
use sluice_core::alloc::BufferAllocator;
use sluice_core::error::{Result, SluiceError};
use sluice_core::io::{read_chunk, write_chunk};
use sluice_core::resources::{Direction, StreamResources};
use std::io::{Read, Write};
use tracing::{debug, trace, warn};
use zstd::zstd_safe::CompressionLevel;

/// Phase of a driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Nothing acquired yet.
    Idle,
    /// Buffers and context acquired.
    Initialized,
    /// Source chunks are being fed.
    Streaming,
    /// Source exhausted; flushing (compress) or checking the last frame
    /// (decompress).
    Finalizing,
    /// Finished successfully.
    Done,
    /// Stopped on an error. Terminal.
    Failed,
}

/// Phase tracker that traces every transition.
#[derive(Debug)]
struct Phase {
    direction: Direction,
    current: StreamPhase,
}

impl Phase {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            current: StreamPhase::Idle,
        }
    }

    fn enter(&mut self, next: StreamPhase) {
        trace!(direction = %self.direction, from = ?self.current, to = ?next, "stream phase");
        self.current = next;
    }

    /// Record a failure and pass the error through.
    fn fail(&mut self, err: SluiceError) -> SluiceError {
        if err.is_corrupt_input() {
            warn!(direction = %self.direction, phase = ?self.current, "{err}");
        }
        self.enter(StreamPhase::Failed);
        err
    }
}

/// Clamp a library size hint to a usable read length.
fn read_len(hint: usize, capacity: usize) -> usize {
    if hint == 0 { capacity } else { hint.min(capacity) }
}

/// Compress `source` into `sink` as a single Zstandard frame.
///
/// A level outside [`level_range`](crate::context::level_range) fails with
/// [`SluiceError::InvalidParameters`] before anything is written.
pub fn compress_stream<R, W>(
    source: &mut R,
    sink: &mut W,
    level: CompressionLevel,
    alloc: &dyn BufferAllocator,
) -> Result<Summary>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut phase = Phase::new(Direction::Compress);
    run_compress(source, sink, level, alloc, &mut phase).map_err(|e| phase.fail(e))
}

fn run_compress<R, W>(
    source: &mut R,
    sink: &mut W,
    level: CompressionLevel,
    alloc: &dyn BufferAllocator,
    phase: &mut Phase,
) -> Result<Summary>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut res = StreamResources::acquire(
        alloc,
        Direction::Compress,
        Compressor::buffer_sizes(),
        |_| Compressor::new(level),
    )?;
    let parts = res.parts();
    let (input, output, compressor) = (parts.input, parts.output, parts.state);
    phase.enter(StreamPhase::Initialized);

    debug!(level, "starting zstd compression");

    let mut summary = Summary::default();
    let mut to_read = input.len();

    phase.enter(StreamPhase::Streaming);
    loop {
        let n = read_chunk(source, &mut input[..to_read])?;
        if n == 0 {
            break;
        }
        summary.bytes_in += n as u64;

        let mut fed = 0;
        while fed < n {
            let step = compressor.compress(&input[fed..n], output)?;
            fed += step.consumed;
            summary.bytes_out += write_chunk(sink, &output[..step.produced])? as u64;
            to_read = read_len(step.hint, input.len());
        }

        trace!(read = n, next = to_read, "compressed chunk");
    }

    phase.enter(StreamPhase::Finalizing);
    loop {
        let step = compressor.end(output)?;
        summary.bytes_out += write_chunk(sink, &output[..step.produced])? as u64;
        if step.hint == 0 {
            break;
        }
    }
    sink.flush()?;

    phase.enter(StreamPhase::Done);
    debug!(
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        "finished zstd compression"
    );
    Ok(summary)
}

/// Decompress every Zstandard frame in `source` into `sink`.
///
/// Concatenated frames decode to the concatenation of their contents. The
/// source must end exactly at a frame boundary: a source that stops inside
/// a frame, or holds no frame at all, fails with
/// [`SluiceError::IncompleteFrame`].
pub fn decompress_stream<R, W>(
    source: &mut R,
    sink: &mut W,
    alloc: &dyn BufferAllocator,
) -> Result<Summary>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut phase = Phase::new(Direction::Decompress);
    run_decompress(source, sink, alloc, &mut phase).map_err(|e| phase.fail(e))
}

fn run_decompress<R, W>(
    source: &mut R,
    sink: &mut W,
    alloc: &dyn BufferAllocator,
    phase: &mut Phase,
) -> Result<Summary>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut res = StreamResources::acquire(
        alloc,
        Direction::Decompress,
        Decompressor::buffer_sizes(),
        |_| Decompressor::new(),
    )?;
    let parts = res.parts();
    let (input, output, decompressor) = (parts.input, parts.output, parts.state);
    phase.enter(StreamPhase::Initialized);

    debug!("starting zstd decompression");

    let mut summary = Summary::default();
    let mut to_read = input.len();
    let mut hint = to_read;

    phase.enter(StreamPhase::Streaming);
    loop {
        let n = read_chunk(source, &mut input[..to_read])?;
        if n == 0 {
            break;
        }
        summary.bytes_in += n as u64;

        let mut fed = 0;
        loop {
            let step = decompressor.decompress(&input[fed..n], output)?;
            fed += step.consumed;
            summary.bytes_out += write_chunk(sink, &output[..step.produced])? as u64;
            hint = step.hint;

            if fed == n && step.produced < output.len() {
                break;
            }
        }

        to_read = read_len(hint, input.len());
        trace!(read = n, hint, "decompressed chunk");
    }

    phase.enter(StreamPhase::Finalizing);
    if hint != 0 {
        return Err(SluiceError::incomplete_frame(hint));
    }
    sink.flush()?;

    phase.enter(StreamPhase::Done);
    debug!(
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        "finished zstd decompression"
    );
    Ok(summary)
}
