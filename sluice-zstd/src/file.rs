//! File-to-file entry points.

use crate::driver::{compress_stream, decompress_stream};
use sluice_core::alloc::SystemAllocator;
use sluice_core::error::Result;
use sluice_core::naming::{compressed_path, decompressed_path};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use zstd::zstd_safe::CompressionLevel;

/// Suffix appended to compressed file names.
pub const SUFFIX: &str = ".zst";

/// Compress `input` into a `.zst` file at `level`.
///
/// The output goes to `output`, or to `input` with [`SUFFIX`] appended.
/// Returns the output path. On failure the output file may be left partial.
pub fn compress_file(
    input: &Path,
    output: Option<&Path>,
    level: CompressionLevel,
) -> Result<PathBuf> {
    let out_path = compressed_path(input, output, SUFFIX);

    info!("compressing {} -> {}", input.display(), out_path.display());

    let mut source = File::open(input)?;
    let mut sink = File::create(&out_path)?;
    let summary = compress_stream(&mut source, &mut sink, level, &SystemAllocator)?;
    sink.sync_all()?;

    info!(
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        "compressed {}",
        input.display()
    );
    Ok(out_path)
}

/// Decompress a `.zst` file.
///
/// The output goes to `output`, or to `input` with a trailing [`SUFFIX`]
/// removed. Returns the output path.
pub fn decompress_file(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let out_path = decompressed_path(input, output, SUFFIX)?;

    info!("decompressing {} -> {}", input.display(), out_path.display());

    let mut source = File::open(input)?;
    let mut sink = File::create(&out_path)?;
    let summary = decompress_stream(&mut source, &mut sink, &SystemAllocator)?;
    sink.sync_all()?;

    info!(
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        "decompressed {}",
        input.display()
    );
    Ok(out_path)
}
