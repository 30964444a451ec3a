//! Integration tests for the `.lzma` stream drivers.
//!
//! These tests drive whole streams through `encode_stream` / `decode_stream`
//! and the file entry points, including damaged and truncated input.

use proptest::prelude::*;
use sluice_core::{LimitedAllocator, SluiceError, SystemAllocator};
use sluice_lzma::{
    HEADER_SIZE, Header, IO_BUFFER_SIZE, LzmaParams, UNKNOWN_SIZE, compress_bytes,
    compress_file, decode_stream, decompress_bytes, decompress_file, encode_stream,
};
use std::io::{self, Cursor, Read, Write};

/// Repeating byte pattern of the given length.
fn pattern(len: usize) -> Vec<u8> {
    b"sluice pattern 0123456789 "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

/// Pseudo-random bytes; barely compressible.
fn noise(len: usize) -> Vec<u8> {
    let mut seed: u64 = 0x0123_4567_89AB_CDEF;
    (0..len)
        .map(|_| {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (seed >> 33) as u8
        })
        .collect()
}

/// Reader that hands out at most `step` bytes per call.
struct Trickle<'a> {
    data: &'a [u8],
    step: usize,
}

impl Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.step.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

/// Writer that records the size of every write.
#[derive(Default)]
struct RecordingSink {
    data: Vec<u8>,
    writes: Vec<usize>,
}

impl Write for RecordingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        self.writes.push(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_pattern_200000_header_and_round_trip() {
    let data = pattern(200_000);
    let compressed = compress_bytes(&data, &LzmaParams::default()).unwrap();

    let header = Header::read_from(&mut Cursor::new(&compressed)).unwrap();
    assert_eq!(header.original_size, 200_000);
    assert_eq!(&compressed[5..HEADER_SIZE], &200_000u64.to_le_bytes());
    assert_eq!(header.props, LzmaParams::default().properties());
    assert!(compressed.len() < data.len() / 20);

    assert_eq!(decompress_bytes(&compressed).unwrap(), data);
}

#[test]
fn test_empty_round_trip() {
    let compressed = compress_bytes(b"", &LzmaParams::default()).unwrap();
    assert_eq!(&compressed[5..HEADER_SIZE], &[0u8; 8]);
    assert!(decompress_bytes(&compressed).unwrap().is_empty());
}

#[test]
fn test_single_byte_round_trip() {
    let compressed = compress_bytes(b"z", &LzmaParams::default()).unwrap();
    assert_eq!(decompress_bytes(&compressed).unwrap(), b"z");
}

#[test]
fn test_incompressible_round_trip() {
    let data = noise(150_000);
    let compressed = compress_bytes(&data, &LzmaParams::default()).unwrap();
    assert_eq!(decompress_bytes(&compressed).unwrap(), data);
}

#[test]
fn test_longer_than_search_window() {
    // Repeats at a distance the 4 KiB dictionary cannot reach.
    let block = noise(6000);
    let mut data = block.clone();
    data.extend_from_slice(&pattern(3000));
    data.extend_from_slice(&block);

    let params = LzmaParams::default().with_dict_size(4096);
    let compressed = compress_bytes(&data, &params).unwrap();
    assert_eq!(decompress_bytes(&compressed).unwrap(), data);
}

#[test]
fn test_non_default_literal_bits() {
    let data = pattern(40_000);
    for (lc, lp, pb) in [(0, 0, 0), (8, 4, 4), (1, 2, 3)] {
        let params = LzmaParams::default().with_lc_lp_pb(lc, lp, pb);
        let compressed = compress_bytes(&data, &params).unwrap();
        assert_eq!(compressed[0], params.properties()[0]);
        assert_eq!(decompress_bytes(&compressed).unwrap(), data, "{lc}/{lp}/{pb}");
    }
}

#[test]
fn test_trickling_source() {
    let data = pattern(3 * IO_BUFFER_SIZE + 17);
    let compressed = compress_bytes(&data, &LzmaParams::default()).unwrap();

    let mut out = Vec::new();
    decode_stream(
        &mut Trickle {
            data: &compressed,
            step: 3,
        },
        &mut out,
        &SystemAllocator,
    )
    .unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_decode_writes_after_every_call() {
    let data = pattern(5 * IO_BUFFER_SIZE);
    let compressed = compress_bytes(&data, &LzmaParams::default()).unwrap();

    let mut sink = RecordingSink::default();
    decode_stream(&mut Cursor::new(&compressed), &mut sink, &SystemAllocator).unwrap();

    assert_eq!(sink.data, data);
    assert!(sink.writes.iter().all(|&n| n <= IO_BUFFER_SIZE));
    assert!(sink.writes.len() >= 5);
}

// ============================================================================
// Damaged input
// ============================================================================

#[test]
fn test_short_header_writes_nothing() {
    let compressed = compress_bytes(&pattern(1000), &LzmaParams::default()).unwrap();

    for len in [0, 1, 5, 12] {
        let mut out = Vec::new();
        let err = decode_stream(
            &mut Cursor::new(&compressed[..len]),
            &mut out,
            &SystemAllocator,
        )
        .unwrap_err();
        assert!(
            matches!(err, SluiceError::HeaderTruncated { expected: 13, found } if found == len)
        );
        assert!(out.is_empty());
    }
}

#[test]
fn test_truncated_payload() {
    let data = noise(20_000);
    let compressed = compress_bytes(&data, &LzmaParams::default()).unwrap();

    for cut in [HEADER_SIZE, HEADER_SIZE + 3, compressed.len() / 2, compressed.len() - 1] {
        let err = decompress_bytes(&compressed[..cut]).unwrap_err();
        assert!(
            matches!(err, SluiceError::TruncatedStream { .. }),
            "cut at {cut}: {err}"
        );
        assert!(err.is_corrupt_input());
    }
}

#[test]
fn test_corrupt_payload_never_panics() {
    let data = pattern(30_000);
    let compressed = compress_bytes(&data, &LzmaParams::default()).unwrap();

    for offset in [HEADER_SIZE + 1, HEADER_SIZE + 7, compressed.len() / 2] {
        let mut damaged = compressed.clone();
        damaged[offset] ^= 0x5A;
        if let Ok(out) = decompress_bytes(&damaged) {
            // A flip can still decode to something of the declared length.
            assert_eq!(out.len(), data.len());
        }
    }
}

#[test]
fn test_nonzero_first_payload_byte() {
    let mut compressed = compress_bytes(&pattern(100), &LzmaParams::default()).unwrap();
    compressed[HEADER_SIZE] = 1;
    let err = decompress_bytes(&compressed).unwrap_err();
    assert!(matches!(err, SluiceError::DecodeFailed { .. }));
}

#[test]
fn test_invalid_properties_byte() {
    let mut compressed = compress_bytes(&pattern(100), &LzmaParams::default()).unwrap();
    compressed[0] = 0xE1;
    let err = decompress_bytes(&compressed).unwrap_err();
    assert!(matches!(err, SluiceError::InvalidParameters { .. }));
}

#[test]
fn test_declared_size_larger_than_payload() {
    let data = pattern(5000);
    let mut compressed = compress_bytes(&data, &LzmaParams::default()).unwrap();
    compressed[5..HEADER_SIZE].copy_from_slice(&6000u64.to_le_bytes());
    let err = decompress_bytes(&compressed).unwrap_err();
    assert!(err.is_corrupt_input(), "{err}");
}

#[test]
fn test_end_marker_before_declared_size() {
    let data = pattern(5000);
    let mut compressed = Vec::new();
    encode_stream(
        &mut Cursor::new(&data),
        &mut compressed,
        UNKNOWN_SIZE,
        &LzmaParams::default(),
        &SystemAllocator,
    )
    .unwrap();

    compressed[5..HEADER_SIZE].copy_from_slice(&6000u64.to_le_bytes());
    let err = decompress_bytes(&compressed).unwrap_err();
    assert!(matches!(err, SluiceError::DecodeFailed { .. }));
}

// ============================================================================
// Allocator accounting
// ============================================================================

#[test]
fn test_allocator_balanced_on_success() {
    let alloc = LimitedAllocator::unbounded();
    let data = pattern(100_000);

    let mut compressed = Vec::new();
    encode_stream(
        &mut Cursor::new(&data),
        &mut compressed,
        data.len() as u64,
        &LzmaParams::default(),
        &alloc,
    )
    .unwrap();
    assert_eq!(alloc.live_buffers(), 0);

    let mut out = Vec::new();
    decode_stream(&mut Cursor::new(&compressed), &mut out, &alloc).unwrap();
    assert_eq!(alloc.live_buffers(), 0);
    assert_eq!(alloc.in_use(), 0);
    assert_eq!(out, data);
}

#[test]
fn test_allocator_balanced_on_error() {
    let alloc = LimitedAllocator::unbounded();
    let compressed = compress_bytes(&noise(10_000), &LzmaParams::default()).unwrap();

    let mut out = Vec::new();
    let err = decode_stream(
        &mut Cursor::new(&compressed[..compressed.len() / 2]),
        &mut out,
        &alloc,
    )
    .unwrap_err();
    assert!(matches!(err, SluiceError::TruncatedStream { .. }));
    assert_eq!(alloc.live_buffers(), 0);
    assert_eq!(alloc.in_use(), 0);
}

#[test]
fn test_dictionary_over_limit() {
    // 2 transfer buffers fit, a 64 MiB dictionary does not.
    let alloc = LimitedAllocator::new(4 * IO_BUFFER_SIZE);
    let params = LzmaParams::preset(9).unwrap();
    let compressed = compress_bytes(b"tiny", &params).unwrap();

    let mut out = Vec::new();
    let err = decode_stream(&mut Cursor::new(&compressed), &mut out, &alloc).unwrap_err();
    assert!(matches!(err, SluiceError::ResourceExhausted { .. }));
    assert_eq!(alloc.live_buffers(), 0);
    assert!(out.is_empty());
}

// ============================================================================
// File entry points
// ============================================================================

#[test]
fn test_file_round_trip_default_names() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.txt");
    let data = pattern(70_000);
    std::fs::write(&input, &data).unwrap();

    let compressed = compress_file(&input, None, None).unwrap();
    assert_eq!(compressed, dir.path().join("notes.txt.lzma"));

    std::fs::remove_file(&input).unwrap();
    let restored = decompress_file(&compressed, None).unwrap();
    assert_eq!(restored, input);
    assert_eq!(std::fs::read(&restored).unwrap(), data);
}

#[test]
fn test_file_explicit_output_and_params() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("data.bin");
    let packed = dir.path().join("packed");
    let unpacked = dir.path().join("unpacked");
    std::fs::write(&input, noise(5000)).unwrap();

    let params = LzmaParams::preset(1).unwrap();
    assert_eq!(compress_file(&input, Some(&packed), Some(&params)).unwrap(), packed);
    assert_eq!(decompress_file(&packed, Some(&unpacked)).unwrap(), unpacked);
    assert_eq!(std::fs::read(&unpacked).unwrap(), noise(5000));
}

#[test]
fn test_file_missing_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("plain.bin");
    std::fs::write(&input, b"x").unwrap();

    let err = decompress_file(&input, None).unwrap_err();
    assert!(matches!(err, SluiceError::MissingSuffix { .. }));
}

#[test]
fn test_file_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let err = compress_file(&dir.path().join("absent"), None, None).unwrap_err();
    assert!(matches!(err, SluiceError::Io(_)));
}

#[test]
fn test_file_bad_header_keeps_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    let existing = dir.path().join("keep.txt");
    std::fs::write(&existing, b"previous contents survive").unwrap();

    let short = dir.path().join("short.lzma");
    std::fs::write(&short, [0x5D, 0, 0]).unwrap();
    let err = decompress_file(&short, Some(&existing)).unwrap_err();
    assert!(matches!(err, SluiceError::HeaderTruncated { found: 3, .. }));
    assert_eq!(std::fs::read(&existing).unwrap(), b"previous contents survive");

    let bad_props = dir.path().join("props.lzma");
    let mut stream = compress_bytes(b"abc", &LzmaParams::default()).unwrap();
    stream[0] = 0xE1;
    std::fs::write(&bad_props, stream).unwrap();
    let err = decompress_file(&bad_props, Some(&existing)).unwrap_err();
    assert!(matches!(err, SluiceError::InvalidParameters { .. }));
    assert_eq!(std::fs::read(&existing).unwrap(), b"previous contents survive");
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_round_trip(data in prop::collection::vec(0u8..4, 0..4000), level in 0u32..=5) {
        let params = LzmaParams::preset(level).unwrap();
        let compressed = compress_bytes(&data, &params).unwrap();
        prop_assert_eq!(decompress_bytes(&compressed).unwrap(), data);
    }

    #[test]
    fn prop_header_records_length(len in 0usize..3000) {
        let compressed = compress_bytes(&pattern(len), &LzmaParams::default()).unwrap();
        let header = Header::read_from(&mut Cursor::new(&compressed)).unwrap();
        prop_assert_eq!(header.original_size, len as u64);
    }
}
