//! Resource lifecycle management for one stream operation.
//!
//! A stream operation owns a pair of transfer buffers and one codec state.
//! [`StreamResources::acquire`] builds all three as a unit; dropping the
//! value releases them, so every exit path of a driver (success, codec
//! error, I/O error, early return) hands the memory back exactly once.

use crate::alloc::BufferAllocator;
use crate::error::Result;
use std::fmt;
use tracing::trace;

/// Direction of a stream operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Source bytes in, compressed bytes out.
    Compress,
    /// Compressed bytes in, original bytes out.
    Decompress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compress => f.write_str("compress"),
            Self::Decompress => f.write_str("decompress"),
        }
    }
}

/// Recommended sizes for the input and output transfer buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSizes {
    /// Input buffer length.
    pub input: usize,
    /// Output buffer length.
    pub output: usize,
}

impl BufferSizes {
    /// Sizes for an input/output pair.
    pub const fn new(input: usize, output: usize) -> Self {
        Self { input, output }
    }

    /// Same size for both buffers.
    pub const fn symmetric(len: usize) -> Self {
        Self::new(len, len)
    }
}

/// Codec state owned by a [`StreamResources`].
pub trait CodecState {
    /// Hand back every allocator-owned buffer held by the state.
    ///
    /// Called once, when the owning resources are released.
    fn reclaim(&mut self) -> Vec<Vec<u8>> {
        Vec::new()
    }
}

/// Input/output staging buffers drawn from a [`BufferAllocator`].
pub struct TransferBuffers<'a> {
    alloc: &'a dyn BufferAllocator,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl<'a> TransferBuffers<'a> {
    /// Allocate both buffers. If the second allocation fails the first is
    /// returned to the allocator before the error propagates.
    pub fn acquire(alloc: &'a dyn BufferAllocator, sizes: BufferSizes) -> Result<Self> {
        let input = alloc.allocate(sizes.input)?;
        let output = match alloc.allocate(sizes.output) {
            Ok(buf) => buf,
            Err(e) => {
                alloc.release(input);
                return Err(e);
            }
        };

        Ok(Self {
            alloc,
            input,
            output,
        })
    }

    /// Input buffer length.
    pub fn input_capacity(&self) -> usize {
        self.input.len()
    }

    /// Output buffer length.
    pub fn output_capacity(&self) -> usize {
        self.output.len()
    }
}

impl Drop for TransferBuffers<'_> {
    fn drop(&mut self) {
        self.alloc.release(std::mem::take(&mut self.input));
        self.alloc.release(std::mem::take(&mut self.output));
    }
}

impl fmt::Debug for TransferBuffers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferBuffers")
            .field("input", &self.input.len())
            .field("output", &self.output.len())
            .finish()
    }
}

/// Mutable views of the buffers and state, borrowed together.
pub struct Parts<'r, S> {
    /// Input staging buffer.
    pub input: &'r mut [u8],
    /// Output staging buffer.
    pub output: &'r mut [u8],
    /// Codec state.
    pub state: &'r mut S,
}

/// Transfer buffers plus codec state for one stream operation.
pub struct StreamResources<'a, S: CodecState> {
    direction: Direction,
    buffers: TransferBuffers<'a>,
    state: S,
}

impl<'a, S: CodecState> StreamResources<'a, S> {
    /// Allocate the transfer buffers, then build the codec state.
    ///
    /// `create` receives the same allocator so the state can draw its own
    /// buffers from it. If `create` fails the transfer buffers are released
    /// before the error propagates; nothing partially built escapes.
    pub fn acquire<F>(
        alloc: &'a dyn BufferAllocator,
        direction: Direction,
        sizes: BufferSizes,
        create: F,
    ) -> Result<Self>
    where
        F: FnOnce(&'a dyn BufferAllocator) -> Result<S>,
    {
        let buffers = TransferBuffers::acquire(alloc, sizes)?;
        let state = create(alloc)?;

        trace!(
            %direction,
            input = sizes.input,
            output = sizes.output,
            "acquired stream resources"
        );

        Ok(Self {
            direction,
            buffers,
            state,
        })
    }

    /// Direction these resources were acquired for.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Input buffer length.
    pub fn input_capacity(&self) -> usize {
        self.buffers.input_capacity()
    }

    /// Output buffer length.
    pub fn output_capacity(&self) -> usize {
        self.buffers.output_capacity()
    }

    /// Codec state.
    pub fn state(&mut self) -> &mut S {
        &mut self.state
    }

    /// Borrow both buffers and the state at once.
    pub fn parts(&mut self) -> Parts<'_, S> {
        Parts {
            input: &mut self.buffers.input,
            output: &mut self.buffers.output,
            state: &mut self.state,
        }
    }

    /// Release everything now. Equivalent to dropping the value.
    pub fn release(self) {
        drop(self);
    }
}

impl<S: CodecState> Drop for StreamResources<'_, S> {
    fn drop(&mut self) {
        for buf in self.state.reclaim() {
            self.buffers.alloc.release(buf);
        }
        trace!(direction = %self.direction, "released stream resources");
    }
}

impl<S: CodecState> fmt::Debug for StreamResources<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResources")
            .field("direction", &self.direction)
            .field("buffers", &self.buffers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::LimitedAllocator;
    use crate::error::SluiceError;

    struct Window {
        buf: Vec<u8>,
    }

    impl CodecState for Window {
        fn reclaim(&mut self) -> Vec<Vec<u8>> {
            vec![std::mem::take(&mut self.buf)]
        }
    }

    struct Stateless;

    impl CodecState for Stateless {}

    #[test]
    fn test_acquire_and_release() {
        let alloc = LimitedAllocator::unbounded();
        let mut res = StreamResources::acquire(
            &alloc,
            Direction::Decompress,
            BufferSizes::new(16, 32),
            |a| Ok(Window { buf: a.allocate(8)? }),
        )
        .unwrap();

        assert_eq!(res.direction(), Direction::Decompress);
        assert_eq!(res.input_capacity(), 16);
        assert_eq!(res.output_capacity(), 32);
        assert_eq!(alloc.in_use(), 56);
        assert_eq!(alloc.live_buffers(), 3);

        let parts = res.parts();
        parts.input[0] = 1;
        parts.output[0] = 2;
        parts.state.buf[0] = 3;

        res.release();
        assert_eq!(alloc.in_use(), 0);
        assert_eq!(alloc.live_buffers(), 0);
    }

    #[test]
    fn test_second_buffer_failure_releases_first() {
        let alloc = LimitedAllocator::new(20);
        let err =
            TransferBuffers::acquire(&alloc, BufferSizes::new(16, 16)).unwrap_err();
        assert!(matches!(err, SluiceError::ResourceExhausted { requested: 16 }));
        assert_eq!(alloc.in_use(), 0);
        assert_eq!(alloc.live_buffers(), 0);
    }

    #[test]
    fn test_state_failure_releases_buffers() {
        let alloc = LimitedAllocator::new(40);
        let err = StreamResources::acquire(
            &alloc,
            Direction::Compress,
            BufferSizes::symmetric(16),
            |a| Ok(Window { buf: a.allocate(16)? }),
        )
        .unwrap_err();

        assert!(matches!(err, SluiceError::ResourceExhausted { requested: 16 }));
        assert_eq!(alloc.in_use(), 0);
        assert_eq!(alloc.live_buffers(), 0);
    }

    #[test]
    fn test_release_on_early_return() {
        fn failing_driver(alloc: &LimitedAllocator) -> crate::error::Result<()> {
            let _res = StreamResources::acquire(
                alloc,
                Direction::Compress,
                BufferSizes::symmetric(8),
                |_| Ok(Stateless),
            )?;
            Err(SluiceError::encode_failed(1, "boom"))
        }

        let alloc = LimitedAllocator::unbounded();
        assert!(failing_driver(&alloc).is_err());
        assert_eq!(alloc.live_buffers(), 0);
    }
}
