//! Range coder for LZMA compression.
//!
//! The range coder is an entropy coding method similar to arithmetic coding.
//! LZMA uses a specific variant with:
//! - 32-bit range tracking
//! - Normalization when range drops below 2^24
//! - 11-bit probability model (2048 = 100%)
//!
//! Neither half owns an I/O handle. The encoder collects output in a pending
//! buffer that callers drain into their own transfer buffers; the decoder
//! works on a borrowed slice and reports running out of bytes, so a symbol
//! can be retried once more input arrives.

/// Number of bits in probability model.
pub const PROB_BITS: u32 = 11;

/// Initial probability (50%).
pub const PROB_INIT: u16 = 1 << (PROB_BITS - 1);

/// Probability scale.
pub const PROB_MAX: u16 = 1 << PROB_BITS;

/// Number of bits to shift for probability update.
pub const MOVE_BITS: u32 = 5;

/// Bytes consumed by decoder initialization.
pub const INIT_SIZE: usize = 5;

/// Top value for range normalization.
const TOP_VALUE: u32 = 1 << 24;

/// Range encoder for LZMA compression.
#[derive(Debug)]
pub struct RangeEncoder {
    /// Encoded bytes not yet handed to the caller.
    pending: Vec<u8>,
    /// Prefix of `pending` already drained.
    drained: usize,
    /// Current range.
    range: u32,
    /// Low value.
    low: u64,
    /// Cache byte.
    cache: u8,
    /// Cache size.
    cache_size: u64,
}

impl RangeEncoder {
    /// Create a new range encoder.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            drained: 0,
            range: 0xFFFF_FFFF,
            low: 0,
            cache: 0,
            cache_size: 1,
        }
    }

    /// Shift low and emit settled bytes.
    ///
    /// `low` is a 33-bit accumulator; bit 32 is a carry that still has to be
    /// propagated into the cached byte and the run of 0xFF bytes after it.
    fn shift_low(&mut self) {
        if self.low < 0xFF00_0000 || self.low > 0xFFFF_FFFF {
            let carry = (self.low >> 32) as u8;
            let mut tmp = self.cache;

            loop {
                self.pending.push(tmp.wrapping_add(carry));
                tmp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }

            self.cache = (self.low >> 24) as u8;
        }

        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
    }

    /// Normalize the range.
    fn normalize(&mut self) {
        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.shift_low();
        }
    }

    /// Encode a single bit with the given probability.
    pub fn encode_bit(&mut self, prob: &mut u16, bit: u32) {
        let bound = (self.range >> PROB_BITS) * (*prob as u32);

        if bit == 0 {
            self.range = bound;
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
        } else {
            self.low += bound as u64;
            self.range -= bound;
            *prob -= *prob >> MOVE_BITS;
        }

        self.normalize();
    }

    /// Encode a bit with fixed 50% probability.
    pub fn encode_direct_bit(&mut self, bit: u32) {
        self.range >>= 1;
        if bit != 0 {
            self.low += self.range as u64;
        }
        self.normalize();
    }

    /// Encode the low `count` bits of `value`, most significant first.
    pub fn encode_direct_bits(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            self.encode_direct_bit((value >> i) & 1);
        }
    }

    /// Encode a bit tree (normal order). `probs` is indexed from node 1.
    pub fn encode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut m = 1usize;

        for i in (0..num_bits).rev() {
            let bit = (value >> i) & 1;
            self.encode_bit(&mut probs[m], bit);
            m = (m << 1) | bit as usize;
        }
    }

    /// Encode a bit tree (reverse order). `probs` is indexed from node 1.
    pub fn encode_bit_tree_reverse(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut m = 1usize;

        for i in 0..num_bits {
            let bit = (value >> i) & 1;
            self.encode_bit(&mut probs[m], bit);
            m = (m << 1) | bit as usize;
        }
    }

    /// Push out every byte still held in `low` and the cache.
    pub fn flush(&mut self) {
        for _ in 0..5 {
            self.shift_low();
        }
    }

    /// Encoded bytes waiting to be drained.
    pub fn pending(&self) -> usize {
        self.pending.len() - self.drained
    }

    /// Copy as many pending bytes as fit into `out`.
    pub fn drain(&mut self, out: &mut [u8]) -> usize {
        let n = self.pending().min(out.len());
        out[..n].copy_from_slice(&self.pending[self.drained..self.drained + n]);
        self.drained += n;

        if self.drained == self.pending.len() {
            self.pending.clear();
            self.drained = 0;
        }
        n
    }
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Range decoder registers, kept between decode calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeDecoder {
    range: u32,
    code: u32,
}

impl RangeDecoder {
    /// Registers before any payload byte has been read.
    pub const fn new() -> Self {
        Self {
            range: 0xFFFF_FFFF,
            code: 0,
        }
    }

    /// Initialize from the first five payload bytes.
    ///
    /// Returns `None` when the first byte is not zero.
    pub fn from_init_bytes(bytes: &[u8; INIT_SIZE]) -> Option<Self> {
        if bytes[0] != 0 {
            return None;
        }

        Some(Self {
            code: u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
            ..Self::new()
        })
    }

    /// Whether the coder sits exactly at the end of a flushed payload.
    pub fn is_finished_ok(&self) -> bool {
        self.code == 0
    }

    /// Start reading symbols from `input`.
    ///
    /// With `adapt` off, probabilities are left untouched, which lets the
    /// caller test whether `input` holds a complete symbol without side
    /// effects.
    pub fn cursor(self, input: &[u8], adapt: bool) -> RangeCursor<'_> {
        RangeCursor {
            range: self.range,
            code: self.code,
            input,
            pos: 0,
            adapt,
        }
    }
}

impl Default for RangeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Range decoder positioned in a borrowed input slice.
///
/// Every operation returns `None` once the slice runs out.
#[derive(Debug)]
pub struct RangeCursor<'a> {
    range: u32,
    code: u32,
    input: &'a [u8],
    pos: usize,
    adapt: bool,
}

impl RangeCursor<'_> {
    fn normalize(&mut self) -> Option<()> {
        if self.range < TOP_VALUE {
            let byte = *self.input.get(self.pos)?;
            self.pos += 1;
            self.range <<= 8;
            self.code = (self.code << 8) | byte as u32;
        }
        Some(())
    }

    /// Decode a single bit with the given probability.
    pub fn decode_bit(&mut self, prob: &mut u16) -> Option<u32> {
        let p = *prob;
        let bound = (self.range >> PROB_BITS) * (p as u32);

        let bit = if self.code < bound {
            self.range = bound;
            if self.adapt {
                *prob = p + ((PROB_MAX - p) >> MOVE_BITS);
            }
            0
        } else {
            self.range -= bound;
            self.code -= bound;
            if self.adapt {
                *prob = p - (p >> MOVE_BITS);
            }
            1
        };

        self.normalize()?;
        Some(bit)
    }

    /// Decode `count` bits with fixed probability, most significant first.
    pub fn decode_direct_bits(&mut self, count: u32) -> Option<u32> {
        let mut result = 0u32;

        for _ in 0..count {
            self.range >>= 1;
            let bit = if self.code >= self.range {
                self.code -= self.range;
                1
            } else {
                0
            };
            result = (result << 1) | bit;
            self.normalize()?;
        }

        Some(result)
    }

    /// Decode a bit tree (normal order). `probs` is indexed from node 1.
    pub fn decode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32) -> Option<u32> {
        let mut m = 1usize;

        for _ in 0..num_bits {
            let bit = self.decode_bit(&mut probs[m])?;
            m = (m << 1) | bit as usize;
        }

        Some((m as u32) - (1 << num_bits))
    }

    /// Decode a bit tree (reverse order). `probs` is indexed from node 1.
    pub fn decode_bit_tree_reverse(&mut self, probs: &mut [u16], num_bits: u32) -> Option<u32> {
        let mut result = 0u32;
        let mut m = 1usize;

        for i in 0..num_bits {
            let bit = self.decode_bit(&mut probs[m])?;
            m = (m << 1) | bit as usize;
            result |= bit << i;
        }

        Some(result)
    }

    /// Bytes read from the slice so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Registers to carry into the next cursor.
    pub fn registers(&self) -> RangeDecoder {
        RangeDecoder {
            range: self.range,
            code: self.code,
        }
    }
}
