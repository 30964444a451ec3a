//! Buffer transfer descriptors.
//!
//! A [`Transfer`] records how much of a staging buffer holds valid bytes and
//! how far a consumer has progressed through them. Descriptors are plain
//! values: every update returns a new descriptor instead of mutating a shared
//! length through a pointer.

/// Length/position pair describing one staging buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transfer {
    len: usize,
    pos: usize,
}

impl Transfer {
    /// Descriptor for a buffer holding `len` valid bytes, none consumed.
    pub const fn new(len: usize) -> Self {
        Self { len, pos: 0 }
    }

    /// Descriptor for an empty buffer.
    pub const fn empty() -> Self {
        Self { len: 0, pos: 0 }
    }

    /// Number of valid bytes.
    pub const fn len(self) -> usize {
        self.len
    }

    /// Whether the buffer holds no valid bytes.
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    /// Number of bytes already consumed (or produced).
    pub const fn pos(self) -> usize {
        self.pos
    }

    /// Bytes between the position and the end of the valid region.
    pub const fn remaining(self) -> usize {
        self.len - self.pos
    }

    /// Whether every valid byte has been consumed.
    pub const fn is_exhausted(self) -> bool {
        self.pos == self.len
    }

    /// Move the position forward by `n` bytes, clamped to the valid region.
    #[must_use]
    pub fn advance(self, n: usize) -> Self {
        Self {
            len: self.len,
            pos: self.pos.saturating_add(n).min(self.len),
        }
    }

    /// Descriptor after refilling the buffer with `len` fresh bytes.
    #[must_use]
    pub const fn refill(self, len: usize) -> Self {
        Self::new(len)
    }

    /// Range of the unconsumed bytes, for slicing the backing buffer.
    pub fn pending(self) -> std::ops::Range<usize> {
        self.pos..self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_advance_and_exhaust() {
        let t = Transfer::new(10);
        assert_eq!(t.remaining(), 10);
        assert!(!t.is_exhausted());

        let t = t.advance(4);
        assert_eq!(t.pos(), 4);
        assert_eq!(t.remaining(), 6);
        assert_eq!(t.pending(), 4..10);

        let t = t.advance(100);
        assert!(t.is_exhausted());
        assert_eq!(t.pos(), 10);
    }

    #[test]
    fn test_refill_resets_position() {
        let t = Transfer::new(8).advance(8).refill(3);
        assert_eq!(t, Transfer::new(3));
        assert_eq!(t.pos(), 0);
    }

    #[test]
    fn test_empty_is_exhausted() {
        let t = Transfer::empty();
        assert!(t.is_empty());
        assert!(t.is_exhausted());
        assert_eq!(t.remaining(), 0);
    }

    proptest! {
        #[test]
        fn prop_position_stays_in_bounds(len in 0usize..4096, steps in prop::collection::vec(0usize..1024, 0..16)) {
            let mut t = Transfer::new(len);
            let mut consumed = 0usize;
            for step in steps {
                t = t.advance(step);
                consumed = (consumed + step).min(len);
                prop_assert_eq!(t.pos(), consumed);
                prop_assert_eq!(t.pos() + t.remaining(), len);
            }
        }
    }
}
