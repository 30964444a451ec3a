//! Decompress command implementation.

use crate::utils::{Format, check_distinct, create_progress_bar, detect_format};
use sluice_core::error::Result;
use sluice_core::{SystemAllocator, decompressed_path};
use sluice_lzma::Header;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn cmd_decompress(
    input: &Path,
    output: Option<&Path>,
    format: Option<Format>,
    progress: bool,
) -> Result<PathBuf> {
    let format = detect_format(input, format)?;
    let out_path = decompressed_path(input, output, format.suffix())?;
    check_distinct(input, &out_path)?;

    info!(
        %format,
        "decompressing {} -> {}",
        input.display(),
        out_path.display()
    );

    let source = File::open(input)?;
    let pb = create_progress_bar(source.metadata()?.len(), progress);
    let mut reader = pb.wrap_read(source);

    // Check the .lzma header before the output is created or truncated.
    let prefix = match format {
        Format::Lzma => {
            let header = Header::read_from(&mut reader)?;
            header.properties()?;
            header.to_bytes().to_vec()
        }
        Format::Zstd => Vec::new(),
    };
    let mut reader = Cursor::new(prefix).chain(reader);
    let mut sink = File::create(&out_path)?;

    let summary = match format {
        Format::Lzma => sluice_lzma::decode_stream(&mut reader, &mut sink, &SystemAllocator)?,
        Format::Zstd => sluice_zstd::decompress_stream(&mut reader, &mut sink, &SystemAllocator)?,
    };
    sink.sync_all()?;
    pb.finish_and_clear();

    println!(
        "{} -> {} ({} bytes)",
        input.display(),
        out_path.display(),
        summary.bytes_out
    );
    Ok(out_path)
}
