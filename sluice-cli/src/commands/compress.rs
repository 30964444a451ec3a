//! Compress command implementation.

use crate::utils::{Format, check_distinct, create_progress_bar, savings_percent};
use sluice_core::error::{Result, SluiceError};
use sluice_core::{Summary, SystemAllocator, compressed_path};
use sluice_lzma::LzmaParams;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// Settings for one compress run.
#[derive(Debug, Clone, Copy)]
pub struct CompressOptions<'a> {
    /// Explicit output path.
    pub output: Option<&'a Path>,
    /// Output format.
    pub format: Format,
    /// Compression level; each format has its own default and range.
    pub level: Option<i32>,
    /// LZMA dictionary size.
    pub dict_size: Option<u32>,
    /// Show a progress bar.
    pub progress: bool,
}

/// Build LZMA parameters from the command line.
fn lzma_params(level: Option<i32>, dict_size: Option<u32>) -> Result<LzmaParams> {
    let mut params = match level {
        Some(level) => {
            let level = u32::try_from(level).map_err(|_| {
                SluiceError::invalid_parameters(format!("lzma level {level} is negative"))
            })?;
            LzmaParams::preset(level)?
        }
        None => LzmaParams::default(),
    };
    if let Some(dict_size) = dict_size {
        params = params.with_dict_size(dict_size);
    }
    params.validate()?;
    Ok(params)
}

pub fn cmd_compress(input: &Path, opts: CompressOptions<'_>) -> Result<PathBuf> {
    let out_path = compressed_path(input, opts.output, opts.format.suffix());
    check_distinct(input, &out_path)?;

    if opts.format == Format::Zstd && opts.dict_size.is_some() {
        return Err(SluiceError::invalid_parameters(
            "--dict-size only applies to the lzma format",
        ));
    }
    let params = match opts.format {
        Format::Lzma => Some(lzma_params(opts.level, opts.dict_size)?),
        Format::Zstd => None,
    };
    let zstd_level = opts.level.unwrap_or(sluice_zstd::DEFAULT_LEVEL);
    if opts.format == Format::Zstd {
        sluice_zstd::check_level(zstd_level)?;
    }

    info!("compressing {} -> {}", input.display(), out_path.display());

    let source = File::open(input)?;
    let size = source.metadata()?.len();
    let pb = create_progress_bar(size, opts.progress);
    let mut reader = pb.wrap_read(source);
    let mut sink = File::create(&out_path)?;

    let summary: Summary = match params {
        Some(params) => {
            sluice_lzma::encode_stream(&mut reader, &mut sink, size, &params, &SystemAllocator)?
        }
        None => sluice_zstd::compress_stream(&mut reader, &mut sink, zstd_level, &SystemAllocator)?,
    };
    sink.sync_all()?;
    pb.finish_and_clear();

    println!(
        "{} -> {} ({} -> {} bytes, {:.1}% saved)",
        input.display(),
        out_path.display(),
        summary.bytes_in,
        summary.bytes_out,
        savings_percent(summary.bytes_in, summary.bytes_out)
    );
    Ok(out_path)
}
