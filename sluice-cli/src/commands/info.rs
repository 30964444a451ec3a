//! Info command implementation.

use crate::utils::{Format, detect_format, savings_percent};
use serde::Serialize;
use sluice_core::error::{Result, SluiceError};
use sluice_core::read_chunk;
use sluice_lzma::Header;
use std::fs::File;
use std::path::Path;

/// Parameter block of a `.lzma` stream.
#[derive(Debug, Serialize)]
pub struct LzmaInfo {
    pub lc: u32,
    pub lp: u32,
    pub pb: u32,
    pub dict_size: u32,
}

/// Everything `info` reports about one file.
#[derive(Debug, Serialize)]
pub struct InfoReport {
    pub file: String,
    pub format: Format,
    pub compressed_size: u64,
    /// `None` when the stream does not record it.
    pub original_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lzma: Option<LzmaInfo>,
}

/// Largest Zstandard frame header.
const ZSTD_FRAME_HEADER_MAX: usize = 18;

fn inspect(path: &Path, format: Format) -> Result<InfoReport> {
    let mut file = File::open(path)?;
    let compressed_size = file.metadata()?.len();

    let (original_size, lzma) = match format {
        Format::Lzma => {
            let header = Header::read_from(&mut file)?;
            let props = header.properties()?;
            let original_size = header.size_known().then_some(header.original_size);
            let info = LzmaInfo {
                lc: props.lc,
                lp: props.lp,
                pb: props.pb,
                dict_size: header.dict_size(),
            };
            (original_size, Some(info))
        }
        Format::Zstd => {
            let mut buf = [0u8; ZSTD_FRAME_HEADER_MAX];
            let n = read_chunk(&mut file, &mut buf)?;
            let size = sluice_zstd::frame_content_size(&buf[..n]).ok_or_else(|| {
                SluiceError::decode_failed(0, "not a Zstandard frame header")
            })?;
            (size, None)
        }
    };

    Ok(InfoReport {
        file: path.display().to_string(),
        format,
        compressed_size,
        original_size,
        lzma,
    })
}

pub fn cmd_info(path: &Path, format: Option<Format>, json: bool) -> Result<()> {
    let report = inspect(path, detect_format(path, format)?)?;

    if json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| SluiceError::invalid_parameters(e.to_string()))?;
        println!("{text}");
        return Ok(());
    }

    println!("Stream Information");
    println!("==================");
    println!("File: {}", report.file);
    println!("Format: {}", report.format);
    println!("Compressed size: {} bytes", report.compressed_size);
    match report.original_size {
        Some(size) => {
            println!("Original size: {} bytes", size);
            if size > 0 {
                println!(
                    "Space saved: {:.1}%",
                    savings_percent(size, report.compressed_size)
                );
            }
        }
        None => println!("Original size: unknown"),
    }

    if let Some(lzma) = &report.lzma {
        println!();
        println!("LZMA Parameters:");
        println!("  lc/lp/pb: {}/{}/{}", lzma.lc, lzma.lp, lzma.pb);
        println!("  Dictionary size: {} bytes", lzma.dict_size);
    }

    Ok(())
}
