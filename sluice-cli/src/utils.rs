//! Utility functions for the CLI.

use indicatif::{ProgressBar, ProgressStyle};
use sluice_core::error::{Result, SluiceError};
use std::fs::File;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Compressed stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// `.lzma` (LZMA-alone) stream with size header
    Lzma,
    /// Zstandard frames
    Zstd,
}

impl Format {
    /// File name suffix for this format.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Lzma => sluice_lzma::SUFFIX,
            Self::Zstd => sluice_zstd::SUFFIX,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lzma => f.write_str("lzma"),
            Self::Zstd => f.write_str("zstd"),
        }
    }
}

/// Pick the format of a compressed file: the explicit choice, else the
/// name suffix, else the Zstandard magic number, else LZMA.
pub fn detect_format(path: &Path, explicit: Option<Format>) -> Result<Format> {
    if let Some(format) = explicit {
        return Ok(format);
    }

    let name = path.to_string_lossy();
    if name.ends_with(sluice_zstd::SUFFIX) {
        return Ok(Format::Zstd);
    }
    if name.ends_with(sluice_lzma::SUFFIX) {
        return Ok(Format::Lzma);
    }

    let mut magic = [0u8; 4];
    let n = sluice_core::read_chunk(&mut File::open(path)?, &mut magic)?;
    if n == magic.len() && magic == sluice_zstd::ZSTD_MAGIC {
        Ok(Format::Zstd)
    } else {
        Ok(Format::Lzma)
    }
}

/// Reject an output path that is the input itself, however it is spelled.
pub fn check_distinct(input: &Path, output: &Path) -> Result<()> {
    let same = input == output
        || (output.exists()
            && std::fs::canonicalize(input)? == std::fs::canonicalize(output)?);
    if same {
        return Err(SluiceError::invalid_parameters(format!(
            "output {} would overwrite the input",
            output.display()
        )));
    }
    Ok(())
}

/// Create a byte progress bar with standard styling.
pub fn create_progress_bar(len: u64, enable: bool) -> ProgressBar {
    if !enable {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
    {
        pb.set_style(style.progress_chars("█▓▒░ "));
    }
    pb
}

/// Install the log subscriber. `RUST_LOG` wins over the `-v` count.
pub fn init_logging(verbose: u8) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Space saved as a percentage of the original size.
pub fn savings_percent(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        0.0
    } else {
        (1.0 - compressed as f64 / original as f64) * 100.0
    }
}
