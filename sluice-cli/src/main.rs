//! sluice CLI - streaming file compression
//!
//! Compresses and decompresses single files as `.lzma` (LZMA-alone) or
//! `.zst` (Zstandard) streams.

mod commands;
mod utils;

use clap::{ArgAction, Parser, Subcommand};
use commands::{CompressOptions, cmd_compress, cmd_decompress, cmd_info};
use std::error::Error;
use std::path::PathBuf;
use utils::{Format, init_logging};

#[derive(Parser)]
#[command(name = "sluice")]
#[command(author, version, about = "Streaming LZMA and Zstandard file compression")]
#[command(long_about = "
sluice compresses single files into .lzma (LZMA-alone, with the original
size in the header) or .zst (Zstandard) streams, using bounded memory.

Examples:
  sluice compress data.tar
  sluice compress --format zstd --level 19 data.tar
  sluice compress --level 9 --dict-size 16777216 data.tar -o data.lzma
  sluice decompress data.tar.lzma
  sluice info data.tar.zst --json
")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file
    #[command(alias = "c")]
    Compress {
        /// File to compress
        input: PathBuf,

        /// Output file (default: input name plus .lzma / .zst)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Lzma)]
        format: Format,

        /// Compression level (lzma: 0-9, zstd: library range; default: lzma fast settings, zstd 1)
        #[arg(short, long, allow_negative_numbers = true)]
        level: Option<i32>,

        /// LZMA dictionary size in bytes
        #[arg(long)]
        dict_size: Option<u32>,

        /// Show progress bar
        #[arg(short = 'P', long)]
        progress: bool,
    },

    /// Decompress a file
    #[command(alias = "d")]
    Decompress {
        /// File to decompress
        input: PathBuf,

        /// Output file (default: input name without .lzma / .zst)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Input format (default: from the file name, then the file contents)
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Show progress bar
        #[arg(short = 'P', long)]
        progress: bool,
    },

    /// Show the header of a compressed file
    #[command(alias = "i")]
    Info {
        /// File to inspect
        input: PathBuf,

        /// Input format (default: from the file name, then the file contents)
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Compress {
            input,
            output,
            format,
            level,
            dict_size,
            progress,
        } => cmd_compress(
            &input,
            CompressOptions {
                output: output.as_deref(),
                format,
                level,
                dict_size,
                progress,
            },
        )
        .map(drop),
        Commands::Decompress {
            input,
            output,
            format,
            progress,
        } => cmd_decompress(&input, output.as_deref(), format, progress).map(drop),
        Commands::Info {
            input,
            format,
            json,
        } => cmd_info(&input, format, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compress_flags() {
        let cli = Cli::parse_from([
            "sluice", "-vv", "compress", "a.txt", "--format", "zstd", "--level", "-3", "-P",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Compress {
                format,
                level,
                progress,
                output,
                ..
            } => {
                assert_eq!(format, Format::Zstd);
                assert_eq!(level, Some(-3));
                assert!(progress);
                assert!(output.is_none());
            }
            _ => panic!("expected compress"),
        }
    }
}
