//! Numeric codec status codes carried by
//! [`EncodeFailed`](sluice_core::SluiceError::EncodeFailed) and
//! [`DecodeFailed`](sluice_core::SluiceError::DecodeFailed).
//!
//! The values match the classic LZMA SDK result codes so that logs line up
//! with other `.lzma` tools.

/// Corrupt payload.
pub const DATA: i64 = 1;

/// Misuse of the codec API.
pub const FAIL: i64 = 11;
