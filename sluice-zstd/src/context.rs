//! Owned Zstandard stream contexts.
//!
//! [`Compressor`] and [`Decompressor`] wrap the library's streaming
//! contexts so they can live inside a
//! [`StreamResources`](sluice_core::StreamResources). The contexts allocate
//! through libzstd and free themselves on drop.

use sluice_core::error::{Result, SluiceError};
use sluice_core::resources::{BufferSizes, CodecState};
use tracing::trace;
use zstd::zstd_safe::{self, CCtx, CompressionLevel, DCtx, InBuffer, OutBuffer};

/// Compression level used when the caller does not pick one.
pub const DEFAULT_LEVEL: CompressionLevel = 1;

/// Accepted compression levels.
pub fn level_range() -> std::ops::RangeInclusive<CompressionLevel> {
    zstd_safe::min_c_level()..=zstd_safe::max_c_level()
}

/// Reject a level the library does not support.
pub fn check_level(level: CompressionLevel) -> Result<()> {
    let range = level_range();
    if !range.contains(&level) {
        return Err(SluiceError::invalid_parameters(format!(
            "compression level {level} is outside {}..={}",
            range.start(),
            range.end()
        )));
    }
    Ok(())
}

/// Human-readable name of a library error code.
fn error_name(code: usize) -> &'static str {
    zstd_safe::get_error_name(code)
}

/// Result of one streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    /// Input bytes consumed.
    pub consumed: usize,
    /// Output bytes produced.
    pub produced: usize,
    /// The library's return hint.
    pub hint: usize,
}

/// Streaming compression context.
pub struct Compressor {
    cctx: CCtx<'static>,
}

impl Compressor {
    /// Recommended transfer buffer sizes.
    pub fn buffer_sizes() -> BufferSizes {
        BufferSizes::new(CCtx::in_size(), CCtx::out_size())
    }

    /// Create a context set up for `level`.
    pub fn new(level: CompressionLevel) -> Result<Self> {
        check_level(level)?;

        let mut cctx = CCtx::try_create().ok_or_else(|| SluiceError::resource_exhausted(0))?;
        cctx.init(level).map_err(|code| {
            SluiceError::encode_failed(code as i64, error_name(code))
        })?;

        trace!(level, "created zstd compression context");
        Ok(Self { cctx })
    }

    /// Compress from `input` into `output`. The hint is the preferred size
    /// of the next input chunk.
    pub fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<StepResult> {
        let mut in_buf = InBuffer::around(input);
        let mut out_buf = OutBuffer::around(output);
        let hint = self
            .cctx
            .compress_stream(&mut out_buf, &mut in_buf)
            .map_err(|code| SluiceError::encode_failed(code as i64, error_name(code)))?;

        Ok(StepResult {
            consumed: in_buf.pos(),
            produced: out_buf.pos(),
            hint,
        })
    }

    /// Close the frame. The hint is the number of bytes still to flush;
    /// call again until it is 0.
    pub fn end(&mut self, output: &mut [u8]) -> Result<StepResult> {
        let mut out_buf = OutBuffer::around(output);
        let hint = self
            .cctx
            .end_stream(&mut out_buf)
            .map_err(|code| SluiceError::encode_failed(code as i64, error_name(code)))?;

        Ok(StepResult {
            consumed: 0,
            produced: out_buf.pos(),
            hint,
        })
    }
}

impl CodecState for Compressor {}

impl std::fmt::Debug for Compressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compressor").finish_non_exhaustive()
    }
}

/// Streaming decompression context.
pub struct Decompressor {
    dctx: DCtx<'static>,
}

impl Decompressor {
    /// Recommended transfer buffer sizes.
    pub fn buffer_sizes() -> BufferSizes {
        BufferSizes::new(DCtx::in_size(), DCtx::out_size())
    }

    /// Create a context ready for the first frame.
    pub fn new() -> Result<Self> {
        let mut dctx = DCtx::try_create().ok_or_else(|| SluiceError::resource_exhausted(0))?;
        dctx.init().map_err(|code| {
            SluiceError::decode_failed(code as i64, error_name(code))
        })?;

        trace!("created zstd decompression context");
        Ok(Self { dctx })
    }

    /// Decompress from `input` into `output`.
    ///
    /// The hint is 0 once a frame is completely decoded and flushed;
    /// otherwise it suggests the size of the next input chunk.
    pub fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<StepResult> {
        let mut in_buf = InBuffer::around(input);
        let mut out_buf = OutBuffer::around(output);
        let hint = self
            .dctx
            .decompress_stream(&mut out_buf, &mut in_buf)
            .map_err(|code| SluiceError::decode_failed(code as i64, error_name(code)))?;

        Ok(StepResult {
            consumed: in_buf.pos(),
            produced: out_buf.pos(),
            hint,
        })
    }
}

impl CodecState for Decompressor {}

impl std::fmt::Debug for Decompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decompressor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_checks() {
        assert!(check_level(DEFAULT_LEVEL).is_ok());
        assert!(check_level(*level_range().end()).is_ok());
        assert!(check_level(*level_range().start()).is_ok());

        let err = check_level(*level_range().end() + 1).unwrap_err();
        assert!(matches!(err, SluiceError::InvalidParameters { .. }));
        assert!(Compressor::new(*level_range().start() - 1).is_err());
    }

    #[test]
    fn test_buffer_sizes_nonzero() {
        let c = Compressor::buffer_sizes();
        let d = Decompressor::buffer_sizes();
        assert!(c.input > 0 && c.output > 0);
        assert!(d.input > 0 && d.output > 0);
    }

    #[test]
    fn test_single_frame_by_hand() {
        let mut compressor = Compressor::new(DEFAULT_LEVEL).unwrap();
        let mut frame = vec![0u8; 256];

        let step = compressor.compress(b"hello hello hello", &mut frame).unwrap();
        assert_eq!(step.consumed, 17);
        let mut len = step.produced;
        loop {
            let step = compressor.end(&mut frame[len..]).unwrap();
            len += step.produced;
            if step.hint == 0 {
                break;
            }
        }

        let mut decompressor = Decompressor::new().unwrap();
        let mut out = [0u8; 64];
        let step = decompressor.decompress(&frame[..len], &mut out).unwrap();
        assert_eq!(step.consumed, len);
        assert_eq!(step.hint, 0);
        assert_eq!(&out[..step.produced], b"hello hello hello");
    }

    #[test]
    fn test_garbage_is_decode_failure() {
        let mut decompressor = Decompressor::new().unwrap();
        let mut out = [0u8; 64];
        let err = decompressor
            .decompress(b"definitely not zstd", &mut out)
            .unwrap_err();
        assert!(matches!(err, SluiceError::DecodeFailed { .. }));
    }
}
