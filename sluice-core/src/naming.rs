//! Default output path derivation.
//!
//! Compression appends a format suffix to the input path; decompression
//! strips it. An explicit output path always wins.

use crate::error::{Result, SluiceError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Output path for compressing `input`: `explicit` if given, else `input` + `suffix`.
pub fn compressed_path(input: &Path, explicit: Option<&Path>, suffix: &str) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let mut name = OsString::from(input.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Output path for decompressing `input`: `explicit` if given, else `input`
/// with a trailing `suffix` removed.
///
/// Fails with [`SluiceError::MissingSuffix`] when no explicit path is given
/// and the input name does not end with `suffix` (or is nothing but it).
pub fn decompressed_path(input: &Path, explicit: Option<&Path>, suffix: &str) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let file_name = input
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| SluiceError::missing_suffix(input, suffix))?;

    match file_name.strip_suffix(suffix) {
        Some(stem) if !stem.is_empty() => Ok(input.with_file_name(stem)),
        _ => Err(SluiceError::missing_suffix(input, suffix)),
    }
}
