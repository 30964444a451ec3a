//! Error types for sluice operations.
//!
//! Every failure of a single stream operation is reported through
//! [`SluiceError`]. Codec-reported failures keep the codec's numeric status so
//! callers can log it next to the human-readable message.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for sluice operations.
#[derive(Debug, Error)]
pub enum SluiceError {
    /// Open, read or write failure on the source or the sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The codec rejected its configuration.
    #[error("Invalid parameters: {message}")]
    InvalidParameters {
        /// Description of the rejected parameter.
        message: String,
    },

    /// A buffer or codec state could not be allocated.
    #[error("Resource exhausted: failed to allocate {requested} bytes")]
    ResourceExhausted {
        /// Number of bytes that were requested, or 0 when the codec
        /// allocates internally and does not report a size.
        requested: usize,
    },

    /// The stream ended before a complete header could be read.
    #[error("Header truncated: expected {expected} bytes, found {found}")]
    HeaderTruncated {
        /// Fixed header length.
        expected: usize,
        /// Number of bytes actually available.
        found: usize,
    },

    /// The encoder reported an internal error.
    #[error("Encode failed (codec status {code}): {message}")]
    EncodeFailed {
        /// Codec status code.
        code: i64,
        /// Description of the failure.
        message: String,
    },

    /// The decoder reported an internal error.
    #[error("Decode failed (codec status {code}): {message}")]
    DecodeFailed {
        /// Codec status code.
        code: i64,
        /// Description of the failure.
        message: String,
    },

    /// A decode iteration made no progress while output was still owed.
    #[error("Decoder stuck with {remaining} bytes still expected")]
    StuckState {
        /// Bytes still expected when the stall was detected.
        remaining: u64,
    },

    /// The compressed payload ended before the declared output was produced.
    #[error("Truncated stream: {remaining} bytes still expected")]
    TruncatedStream {
        /// Bytes still expected when the source ran dry.
        remaining: u64,
    },

    /// A self-framing stream ended without a complete frame epilogue.
    #[error("Incomplete frame: decoder still expects input (hint {hint})")]
    IncompleteFrame {
        /// Last input hint reported by the decoder.
        hint: usize,
    },

    /// The source length changed between the size query and the read loop.
    #[error("Size mismatch: header declares {declared} bytes, source produced {actual}")]
    SizeMismatch {
        /// Size written to the header.
        declared: u64,
        /// Bytes actually read.
        actual: u64,
    },

    /// A default output name could not be derived from the input path.
    #[error("Cannot derive output name: {path} does not end with {suffix}")]
    MissingSuffix {
        /// The input path.
        path: PathBuf,
        /// The suffix that was expected.
        suffix: String,
    },
}

/// Result type alias for sluice operations.
pub type Result<T> = std::result::Result<T, SluiceError>;

impl SluiceError {
    /// Create an invalid parameters error.
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    /// Create a resource exhausted error.
    pub fn resource_exhausted(requested: usize) -> Self {
        Self::ResourceExhausted { requested }
    }

    /// Create a header truncated error.
    pub fn header_truncated(expected: usize, found: usize) -> Self {
        Self::HeaderTruncated { expected, found }
    }

    /// Create an encode failure carrying the codec status.
    pub fn encode_failed(code: i64, message: impl Into<String>) -> Self {
        Self::EncodeFailed {
            code,
            message: message.into(),
        }
    }

    /// Create a decode failure carrying the codec status.
    pub fn decode_failed(code: i64, message: impl Into<String>) -> Self {
        Self::DecodeFailed {
            code,
            message: message.into(),
        }
    }

    /// Create a stuck state error.
    pub fn stuck(remaining: u64) -> Self {
        Self::StuckState { remaining }
    }

    /// Create a truncated stream error.
    pub fn truncated(remaining: u64) -> Self {
        Self::TruncatedStream { remaining }
    }

    /// Create an incomplete frame error.
    pub fn incomplete_frame(hint: usize) -> Self {
        Self::IncompleteFrame { hint }
    }

    /// Create a size mismatch error.
    pub fn size_mismatch(declared: u64, actual: u64) -> Self {
        Self::SizeMismatch { declared, actual }
    }

    /// Create a missing suffix error.
    pub fn missing_suffix(path: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self::MissingSuffix {
            path: path.into(),
            suffix: suffix.into(),
        }
    }

    /// Whether the error means the compressed input is damaged or incomplete.
    pub fn is_corrupt_input(&self) -> bool {
        matches!(
            self,
            Self::HeaderTruncated { .. }
                | Self::DecodeFailed { .. }
                | Self::StuckState { .. }
                | Self::TruncatedStream { .. }
                | Self::IncompleteFrame { .. }
        )
    }
}
