//! Incremental LZMA compression.
//!
//! The encoder keeps a sliding window of recent input and a hash-chain match
//! finder over it. [`LzmaEncoder::encode`] accepts any amount of input and
//! holds back the last [`MATCH_LEN_MAX`] bytes so matches are not cut short at
//! chunk boundaries; [`LzmaEncoder::finish`] encodes the rest and flushes the
//! range coder. Compressed bytes accumulate in the range coder until drained
//! into the caller's output buffer.
//!
//! Match selection is greedy with per-level chain depths.

use crate::model::{
    DIST_ALIGN_BITS, DIST_SLOT_BITS, END_MARKER_DIST, END_POS_MODEL_INDEX, LEN_HIGH_BITS,
    LEN_LOW_BITS, LEN_LOW_SYMBOLS, LEN_MID_BITS, LEN_MID_SYMBOLS, LengthModel, LiteralModel,
    LzmaModel, MATCH_LEN_MAX, MATCH_LEN_MIN, State, dist_slot, len_state,
};
use crate::params::LzmaParams;
use crate::range_coder::RangeEncoder;
use crate::status;
use sluice_core::alloc::{BufferAllocator, SystemAllocator};
use sluice_core::error::{Result, SluiceError};
use sluice_core::resources::CodecState;
use tracing::debug;

/// Hash table size (64K entries).
const HASH_SIZE: usize = 1 << 16;

/// Largest distance the match finder searches, whatever the dictionary size.
const SEARCH_WINDOW_MAX: usize = 1 << 22;

/// Maximum chain depth per compression level.
const CHAIN_DEPTH: [usize; 10] = [
    1,    // Level 0: Fastest
    4,    // Level 1: Very fast
    8,    // Level 2: Fast
    16,   // Level 3: Fast
    32,   // Level 4: Normal
    64,   // Level 5: Normal
    128,  // Level 6: Normal
    256,  // Level 7: Maximum
    512,  // Level 8: High
    1024, // Level 9: Best
];

/// Progress of one [`LzmaEncoder::encode`] or [`LzmaEncoder::finish`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeProgress {
    /// Input bytes accepted.
    pub consumed: usize,
    /// Compressed bytes written to the output buffer.
    pub written: usize,
    /// Compressed bytes still held by the encoder.
    pub pending: usize,
}

/// Packet chosen for the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Literal,
    ShortRep,
    Rep { index: usize, len: usize },
    Match { dist: u32, len: usize },
}

/// Encode a length.
fn encode_length(rc: &mut RangeEncoder, len_model: &mut LengthModel, len: usize, pos_state: usize) {
    let len = (len - MATCH_LEN_MIN) as u32;

    if len < LEN_LOW_SYMBOLS as u32 {
        rc.encode_bit(&mut len_model.choice, 0);
        rc.encode_bit_tree(&mut len_model.low[pos_state], LEN_LOW_BITS, len);
    } else if len < (LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS) as u32 {
        rc.encode_bit(&mut len_model.choice, 1);
        rc.encode_bit(&mut len_model.choice2, 0);
        rc.encode_bit_tree(
            &mut len_model.mid[pos_state],
            LEN_MID_BITS,
            len - LEN_LOW_SYMBOLS as u32,
        );
    } else {
        rc.encode_bit(&mut len_model.choice, 1);
        rc.encode_bit(&mut len_model.choice2, 1);
        rc.encode_bit_tree(
            &mut len_model.high,
            LEN_HIGH_BITS,
            len - (LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS) as u32,
        );
    }
}

/// LZMA encoder.
pub struct LzmaEncoder {
    /// Range encoder.
    rc: RangeEncoder,
    /// LZMA model.
    model: LzmaModel,
    /// Current state.
    state: State,
    /// Rep distances.
    rep: [u32; 4],
    /// History plus look-ahead; drawn from the allocator.
    window: Vec<u8>,
    /// Bytes of `window` holding input.
    fill: usize,
    /// Next window index to encode.
    pos: usize,
    /// Stream position of `window[0]`.
    base: u64,
    /// Largest distance searched.
    search_window: usize,
    /// Hash heads, stored as window index + 1 (0 = empty).
    hash_head: Vec<u32>,
    /// Previous position with the same hash, per window index, same encoding.
    chain: Vec<u32>,
    /// Maximum chain depth (based on compression level).
    chain_depth: usize,
    /// Stop searching once a match this long is found.
    nice_len: usize,
    /// Write an end marker on finish.
    end_marker: bool,
    /// `finish` has flushed the range coder.
    finished: bool,
    /// Parameter block for the header.
    props: [u8; 5],
}

impl LzmaEncoder {
    /// Create an encoder whose window comes from the global heap.
    pub fn new(params: &LzmaParams) -> Result<Self> {
        Self::with_allocator(params, &SystemAllocator)
    }

    /// Create an encoder whose window is drawn from `alloc`.
    ///
    /// The window is handed back through [`CodecState::reclaim`].
    pub fn with_allocator(params: &LzmaParams, alloc: &dyn BufferAllocator) -> Result<Self> {
        params.validate()?;

        let search_window = (params.dict_size as usize).min(SEARCH_WINDOW_MAX);
        let window_len = 2 * (search_window + MATCH_LEN_MAX);
        let window = alloc.allocate(window_len)?;

        debug!(
            level = params.level,
            dict_size = params.dict_size,
            window = window_len,
            "created LZMA encoder"
        );

        Ok(Self {
            rc: RangeEncoder::new(),
            model: LzmaModel::new(params.lzma_properties()),
            state: State::new(),
            rep: [0; 4],
            window,
            fill: 0,
            pos: 0,
            base: 0,
            search_window,
            hash_head: vec![0; HASH_SIZE],
            chain: vec![0; window_len],
            chain_depth: CHAIN_DEPTH[params.level as usize],
            nice_len: params.nice_len as usize,
            end_marker: params.end_marker,
            finished: false,
            props: params.properties(),
        })
    }

    /// The 5-byte parameter block describing this encoder's stream.
    pub fn properties(&self) -> [u8; 5] {
        self.props
    }

    /// Compressed bytes waiting to be drained.
    pub fn pending(&self) -> usize {
        self.rc.pending()
    }

    /// Copy pending compressed bytes into `output`.
    pub fn drain(&mut self, output: &mut [u8]) -> usize {
        self.rc.drain(output)
    }

    /// Accept all of `input`, then drain what fits into `output`.
    pub fn encode(&mut self, input: &[u8], output: &mut [u8]) -> Result<EncodeProgress> {
        if self.finished {
            return Err(SluiceError::encode_failed(
                status::FAIL,
                "encode called after finish",
            ));
        }

        let mut rest = input;
        while !rest.is_empty() {
            if self.fill == self.window.len() {
                self.slide();
            }

            let n = rest.len().min(self.window.len() - self.fill);
            self.window[self.fill..self.fill + n].copy_from_slice(&rest[..n]);
            self.fill += n;
            rest = &rest[n..];

            self.encode_available(false);
        }

        let written = self.rc.drain(output);
        Ok(EncodeProgress {
            consumed: input.len(),
            written,
            pending: self.rc.pending(),
        })
    }

    /// Encode the held-back input, flush the range coder, then drain.
    ///
    /// Call repeatedly until `pending` reaches zero; later calls only drain.
    pub fn finish(&mut self, output: &mut [u8]) -> Result<EncodeProgress> {
        if !self.finished {
            self.encode_available(true);
            if self.end_marker {
                self.encode_end_marker();
            }
            self.rc.flush();
            self.finished = true;

            debug!(
                encoded = self.position(),
                compressed_pending = self.rc.pending(),
                "flushed LZMA encoder"
            );
        }

        let written = self.rc.drain(output);
        Ok(EncodeProgress {
            consumed: 0,
            written,
            pending: self.rc.pending(),
        })
    }

    /// Stream position of the next byte to encode.
    fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Drop history older than the search window to make room for input.
    fn slide(&mut self) {
        let shift = self.pos.saturating_sub(self.search_window);
        if shift == 0 {
            return;
        }

        self.window.copy_within(shift..self.fill, 0);
        self.chain.copy_within(shift..self.fill, 0);
        self.fill -= shift;
        self.pos -= shift;
        self.base += shift as u64;

        let shift = shift as u32;
        for entry in self.hash_head.iter_mut().chain(&mut self.chain[..self.fill]) {
            *entry = entry.saturating_sub(shift);
        }
    }

    /// Encode positions up to the look-ahead margin, or all of them on flush.
    fn encode_available(&mut self, flush: bool) {
        let limit = if flush {
            self.fill
        } else {
            self.fill.saturating_sub(MATCH_LEN_MAX)
        };

        while self.pos < limit {
            let choice = self.choose();
            let len = self.encode_choice(choice);

            for i in 0..len {
                self.update_hash(self.pos + i);
            }
            self.pos += len;
        }
    }

    /// Calculate hash for 3 bytes.
    fn hash3(data: &[u8]) -> usize {
        let mut h = 2166136261u32;
        for &byte in &data[..3] {
            h ^= byte as u32;
            h = h.wrapping_mul(16777619);
        }
        (h as usize) & (HASH_SIZE - 1)
    }

    /// Insert a window position into the hash chains.
    fn update_hash(&mut self, pos: usize) {
        if pos + 3 > self.fill {
            return;
        }

        let hash = Self::hash3(&self.window[pos..]);
        self.chain[pos] = self.hash_head[hash];
        self.hash_head[hash] = pos as u32 + 1;
    }

    /// Longest earlier occurrence of the bytes at `pos`, as (zero-based distance, length).
    fn find_match(&self, pos: usize, max_len: usize) -> Option<(u32, usize)> {
        if max_len < 3 {
            return None;
        }

        let data = &self.window[..self.fill];
        let mut candidate = self.hash_head[Self::hash3(&data[pos..])] as usize;
        let mut best_len = 0usize;
        let mut best_dist = 0usize;
        let mut depth = 0;

        while candidate != 0 && depth < self.chain_depth {
            let match_pos = candidate - 1;
            if match_pos >= pos {
                break;
            }

            let dist = pos - match_pos;
            if dist > self.search_window {
                break;
            }

            if data[pos] == data[match_pos]
                && data[pos + 1] == data[match_pos + 1]
                && data[pos + 2] == data[match_pos + 2]
            {
                let mut len = 3usize;
                while len < max_len && data[pos + len] == data[match_pos + len] {
                    len += 1;
                }

                if len > best_len {
                    best_len = len;
                    best_dist = dist;

                    if best_len >= self.nice_len || best_len >= max_len {
                        break;
                    }
                }
            }

            candidate = self.chain[match_pos] as usize;
            depth += 1;
        }

        if best_len < MATCH_LEN_MIN {
            return None;
        }

        Some(((best_dist - 1) as u32, best_len))
    }

    /// Length of the match at rep distance `index`.
    fn rep_match_len(&self, pos: usize, index: usize, max_len: usize) -> usize {
        let dist = self.rep[index] as usize;
        if dist >= pos {
            return 0;
        }

        let match_pos = pos - dist - 1;
        let data = &self.window;
        let mut len = 0usize;
        while len < max_len && data[pos + len] == data[match_pos + len] {
            len += 1;
        }
        len
    }

    /// Pick the packet for the current position.
    fn choose(&self) -> Choice {
        let pos = self.pos;
        let max_len = (self.fill - pos).min(MATCH_LEN_MAX);

        let mut best_rep: Option<(usize, usize)> = None;
        for index in 0..4 {
            let len = self.rep_match_len(pos, index, max_len);
            if len >= MATCH_LEN_MIN && best_rep.is_none_or(|(_, l)| len > l) {
                best_rep = Some((index, len));
            }
        }

        match (best_rep, self.find_match(pos, max_len)) {
            (Some((index, rep_len)), Some((_, len)))
                if rep_len >= len || (rep_len >= 3 && index == 0) =>
            {
                Choice::Rep {
                    index,
                    len: rep_len,
                }
            }
            (_, Some((dist, len))) => Choice::Match { dist, len },
            (Some((index, len)), None) => Choice::Rep { index, len },
            (None, None) => {
                let rep0 = self.rep[0] as usize;
                if rep0 < pos && self.window[pos] == self.window[pos - rep0 - 1] {
                    Choice::ShortRep
                } else {
                    Choice::Literal
                }
            }
        }
    }

    /// Emit one packet and return how many input bytes it covers.
    fn encode_choice(&mut self, choice: Choice) -> usize {
        let pos_state = (self.position() as usize) & self.model.props.pos_mask();
        let state_idx = self.state.value();

        match choice {
            Choice::Literal => {
                self.rc
                    .encode_bit(&mut self.model.is_match[state_idx][pos_state], 0);
                self.encode_literal();
                self.state.update_literal();
                1
            }
            Choice::ShortRep => {
                self.rc
                    .encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
                self.rc.encode_bit(&mut self.model.is_rep[state_idx], 1);
                self.rc.encode_bit(&mut self.model.is_rep0[state_idx], 0);
                self.rc
                    .encode_bit(&mut self.model.is_rep0_long[state_idx][pos_state], 0);
                self.state.update_short_rep();
                1
            }
            Choice::Rep { index, len } => {
                self.rc
                    .encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
                self.rc.encode_bit(&mut self.model.is_rep[state_idx], 1);

                if index == 0 {
                    self.rc.encode_bit(&mut self.model.is_rep0[state_idx], 0);
                    self.rc
                        .encode_bit(&mut self.model.is_rep0_long[state_idx][pos_state], 1);
                } else {
                    self.rc.encode_bit(&mut self.model.is_rep0[state_idx], 1);
                    if index == 1 {
                        self.rc.encode_bit(&mut self.model.is_rep1[state_idx], 0);
                    } else {
                        self.rc.encode_bit(&mut self.model.is_rep1[state_idx], 1);
                        self.rc
                            .encode_bit(&mut self.model.is_rep2[state_idx], (index - 2) as u32);
                    }

                    let dist = self.rep[index];
                    self.rep.copy_within(0..index, 1);
                    self.rep[0] = dist;
                }

                encode_length(&mut self.rc, &mut self.model.rep_len, len, pos_state);
                self.state.update_long_rep();
                len
            }
            Choice::Match { dist, len } => {
                self.rc
                    .encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
                self.rc.encode_bit(&mut self.model.is_rep[state_idx], 0);
                encode_length(&mut self.rc, &mut self.model.match_len, len, pos_state);
                self.encode_distance(dist, len);

                self.rep.copy_within(0..3, 1);
                self.rep[0] = dist;
                self.state.update_match();
                len
            }
        }
    }

    /// Encode the literal at the current position.
    fn encode_literal(&mut self) {
        let pos = self.pos;
        let byte = self.window[pos];
        let prev_byte = if pos > 0 { self.window[pos - 1] } else { 0 };
        let lit_state = LiteralModel::state_index(self.position(), prev_byte, &self.model.props);
        let probs = &mut self.model.literal.probs[lit_state];

        let mut symbol = (byte as usize) | 0x100;

        if self.state.is_literal() {
            while symbol < 0x10000 {
                let context = symbol >> 8;
                let bit = (symbol >> 7) & 1;
                self.rc.encode_bit(&mut probs[context], bit as u32);
                symbol <<= 1;
            }
            return;
        }

        let match_byte = self.window[pos - self.rep[0] as usize - 1];
        let mut match_symbol = match_byte as usize;
        let mut context = 1usize;
        let mut matched = true;

        for _ in 0..8 {
            let bit = (symbol >> 7) & 1;
            symbol <<= 1;

            if matched {
                let match_bit = (match_symbol >> 7) & 1;
                match_symbol <<= 1;
                self.rc
                    .encode_bit(&mut probs[0x100 + (match_bit << 8) + context], bit as u32);
                matched = bit == match_bit;
            } else {
                self.rc.encode_bit(&mut probs[context], bit as u32);
            }

            context = (context << 1) | bit;
        }
    }

    /// Encode a distance.
    fn encode_distance(&mut self, dist: u32, len: usize) {
        let slot = dist_slot(dist);
        self.rc.encode_bit_tree(
            &mut self.model.distance.slot[len_state(len)],
            DIST_SLOT_BITS,
            slot,
        );

        if slot < 4 {
            return;
        }

        let num_direct_bits = (slot >> 1) - 1;
        let base = (2 | (slot & 1)) << num_direct_bits;
        let reduced = dist - base;

        if slot < END_POS_MODEL_INDEX as u32 {
            self.rc.encode_bit_tree_reverse(
                self.model.distance.special_tree(slot),
                num_direct_bits,
                reduced,
            );
        } else {
            self.rc
                .encode_direct_bits(reduced >> DIST_ALIGN_BITS, num_direct_bits - DIST_ALIGN_BITS);
            self.rc.encode_bit_tree_reverse(
                &mut self.model.distance.align,
                DIST_ALIGN_BITS,
                reduced & ((1 << DIST_ALIGN_BITS) - 1),
            );
        }
    }

    /// Encode the end-of-payload marker.
    fn encode_end_marker(&mut self) {
        let pos_state = (self.position() as usize) & self.model.props.pos_mask();
        let state_idx = self.state.value();

        self.rc
            .encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
        self.rc.encode_bit(&mut self.model.is_rep[state_idx], 0);
        encode_length(&mut self.rc, &mut self.model.match_len, MATCH_LEN_MIN, pos_state);
        self.encode_distance(END_MARKER_DIST, MATCH_LEN_MIN);
    }
}

impl CodecState for LzmaEncoder {
    fn reclaim(&mut self) -> Vec<Vec<u8>> {
        vec![std::mem::take(&mut self.window)]
    }
}

impl std::fmt::Debug for LzmaEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzmaEncoder")
            .field("position", &self.position())
            .field("window", &self.window.len())
            .field("chain_depth", &self.chain_depth)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
