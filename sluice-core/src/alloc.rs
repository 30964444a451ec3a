//! Allocator capability for transfer buffers and codec history windows.
//!
//! Drivers never allocate their large buffers directly; they ask a
//! [`BufferAllocator`] passed in by the caller. Buffers are handed back with
//! [`BufferAllocator::release`] with the same length they were allocated with.

use crate::error::{Result, SluiceError};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of zero-initialized byte buffers.
///
/// Implementations must be reentrant: one allocator may serve several
/// concurrent stream operations on different threads.
pub trait BufferAllocator: Send + Sync {
    /// Allocate a zeroed buffer of exactly `len` bytes.
    fn allocate(&self, len: usize) -> Result<Vec<u8>>;

    /// Take back a buffer previously returned by [`allocate`](Self::allocate).
    fn release(&self, buf: Vec<u8>) {
        drop(buf);
    }
}

/// Allocate through the global allocator, reporting failure instead of aborting.
fn try_zeroed(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| SluiceError::resource_exhausted(len))?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Allocator backed by the global heap.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl BufferAllocator for SystemAllocator {
    fn allocate(&self, len: usize) -> Result<Vec<u8>> {
        try_zeroed(len)
    }
}

/// Allocator with a hard cap on the bytes outstanding at any time.
///
/// Useful when decompressing untrusted input, where the header chooses the
/// dictionary size. Also tracks live buffers so tests can check that every
/// buffer came back.
#[derive(Debug)]
pub struct LimitedAllocator {
    limit: usize,
    in_use: AtomicUsize,
    live: AtomicUsize,
}

impl LimitedAllocator {
    /// Create an allocator that refuses to exceed `limit` outstanding bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            in_use: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
        }
    }

    /// Create an allocator without a byte cap, for accounting only.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Bytes currently handed out.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Buffers currently handed out.
    pub fn live_buffers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Configured byte cap.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl BufferAllocator for LimitedAllocator {
    fn allocate(&self, len: usize) -> Result<Vec<u8>> {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(len).filter(|&total| total <= self.limit)
            })
            .map_err(|_| SluiceError::resource_exhausted(len))?;

        match try_zeroed(len) {
            Ok(buf) => {
                self.live.fetch_add(1, Ordering::AcqRel);
                Ok(buf)
            }
            Err(e) => {
                self.in_use.fetch_sub(len, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    fn release(&self, buf: Vec<u8>) {
        self.in_use.fetch_sub(buf.len(), Ordering::AcqRel);
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}
