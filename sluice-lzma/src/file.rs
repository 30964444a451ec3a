//! File-to-file entry points.

use crate::driver::{decode_stream, encode_stream};
use crate::header::Header;
use crate::params::LzmaParams;
use sluice_core::alloc::SystemAllocator;
use sluice_core::error::Result;
use sluice_core::naming::{compressed_path, decompressed_path};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::info;

/// Suffix appended to compressed file names.
pub const SUFFIX: &str = ".lzma";

/// Compress `input` into a `.lzma` file.
///
/// The output goes to `output`, or to `input` with [`SUFFIX`] appended. The
/// input's current length is recorded in the header. Without `params` the
/// defaults of [`LzmaParams::default`] are used. Returns the output path.
///
/// The output file is written in place; on failure it may be left partial.
pub fn compress_file(
    input: &Path,
    output: Option<&Path>,
    params: Option<&LzmaParams>,
) -> Result<PathBuf> {
    let out_path = compressed_path(input, output, SUFFIX);
    let params = params.copied().unwrap_or_default();

    info!("compressing {} -> {}", input.display(), out_path.display());

    let mut source = File::open(input)?;
    let size = source.metadata()?.len();
    let mut sink = File::create(&out_path)?;

    let summary = encode_stream(&mut source, &mut sink, size, &params, &SystemAllocator)?;
    sink.sync_all()?;

    info!(
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        "compressed {}",
        input.display()
    );
    Ok(out_path)
}

/// Decompress a `.lzma` file.
///
/// The output goes to `output`, or to `input` with a trailing [`SUFFIX`]
/// removed; a name without the suffix is an error when no explicit output
/// is given. Returns the output path.
///
/// The header is checked before the output is created, so a file that is
/// not a `.lzma` stream leaves an existing output untouched.
pub fn decompress_file(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let out_path = decompressed_path(input, output, SUFFIX)?;

    info!("decompressing {} -> {}", input.display(), out_path.display());

    let mut source = File::open(input)?;
    let header = Header::read_from(&mut source)?;
    header.properties()?;

    let mut sink = File::create(&out_path)?;
    let mut stream = Cursor::new(header.to_bytes()).chain(&mut source);
    let summary = decode_stream(&mut stream, &mut sink, &SystemAllocator)?;
    sink.sync_all()?;

    info!(
        bytes_in = summary.bytes_in,
        bytes_out = summary.bytes_out,
        "decompressed {}",
        input.display()
    );
    Ok(out_path)
}
