//! # sluice core
//!
//! Core components shared by the sluice codec families.
//!
//! This crate provides the building blocks every stream driver uses:
//!
//! - [`io`]: Buffer I/O adapter between readers/writers and staging buffers
//! - [`transfer`]: `{len, pos}` descriptors for staging buffers
//! - [`alloc`]: Injectable allocator capability
//! - [`resources`]: Transfer buffers + codec state acquired and released as a unit
//! - [`naming`]: Default output path derivation
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ CLI           sluice-cli (argument handling, progress)    │
//! ├───────────────────────────────────────────────────────────┤
//! │ Drivers       sluice-lzma: header + incremental encode/   │
//! │               decode; sluice-zstd: streaming compress/    │
//! │               decompress                                  │
//! ├───────────────────────────────────────────────────────────┤
//! │ Core (this)   buffer I/O, transfer descriptors,           │
//! │               allocator, resources, errors                │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use sluice_core::alloc::LimitedAllocator;
//! use sluice_core::resources::{BufferSizes, CodecState, Direction, StreamResources};
//!
//! struct NoState;
//! impl CodecState for NoState {}
//!
//! let alloc = LimitedAllocator::new(1 << 20);
//! let res = StreamResources::acquire(&alloc, Direction::Compress, BufferSizes::symmetric(4096), |_| {
//!     Ok(NoState)
//! })
//! .unwrap();
//! assert_eq!(alloc.live_buffers(), 2);
//! drop(res);
//! assert_eq!(alloc.live_buffers(), 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod alloc;
pub mod error;
pub mod io;
pub mod naming;
pub mod resources;
pub mod transfer;

// Re-exports for convenience
pub use alloc::{BufferAllocator, LimitedAllocator, SystemAllocator};
pub use error::{Result, SluiceError};
pub use io::{read_chunk, write_chunk};
pub use naming::{compressed_path, decompressed_path};
pub use resources::{BufferSizes, CodecState, Direction, Parts, StreamResources, TransferBuffers};
pub use transfer::Transfer;

/// Byte counts reported by every driver on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    /// Bytes read from the source.
    pub bytes_in: u64,
    /// Bytes written to the sink.
    pub bytes_out: u64,
}

impl Summary {
    /// Output size as a fraction of input size (0.0 for empty input).
    pub fn ratio(&self) -> f64 {
        if self.bytes_in == 0 {
            0.0
        } else {
            self.bytes_out as f64 / self.bytes_in as f64
        }
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::Summary;
    pub use crate::alloc::{BufferAllocator, LimitedAllocator, SystemAllocator};
    pub use crate::error::{Result, SluiceError};
    pub use crate::io::{read_chunk, write_chunk};
    pub use crate::resources::{BufferSizes, CodecState, Direction, StreamResources};
    pub use crate::transfer::Transfer;
}
