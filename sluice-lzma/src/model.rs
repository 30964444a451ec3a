//! LZMA probability models.
//!
//! LZMA uses context-dependent probability models for:
//! - Literal encoding (context = previous byte + position)
//! - Match length encoding
//! - Distance encoding
//! - State machine transitions
//!
//! The table layout follows the classic `.lzma` format so streams produced
//! here decode with any conforming decoder and vice versa.

use crate::range_coder::PROB_INIT;

/// Default literal context bits.
pub const LC_DEFAULT: u32 = 3;

/// Default literal position bits.
pub const LP_DEFAULT: u32 = 0;

/// Default position bits.
pub const PB_DEFAULT: u32 = 2;

/// Largest accepted literal context bits.
pub const LC_MAX: u32 = 8;

/// Largest accepted literal position bits.
pub const LP_MAX: u32 = 4;

/// Largest accepted position bits.
pub const PB_MAX: u32 = 4;

/// Maximum number of position states.
pub const POS_STATES_MAX: usize = 1 << PB_MAX;

/// Number of states in the LZMA state machine.
pub const NUM_STATES: usize = 12;

/// Number of bits for low length coding.
pub const LEN_LOW_BITS: u32 = 3;
/// Number of bits for mid length coding.
pub const LEN_MID_BITS: u32 = 3;
/// Number of bits for high length coding.
pub const LEN_HIGH_BITS: u32 = 8;

/// Number of low length symbols.
pub const LEN_LOW_SYMBOLS: usize = 1 << LEN_LOW_BITS;
/// Number of mid length symbols.
pub const LEN_MID_SYMBOLS: usize = 1 << LEN_MID_BITS;
/// Number of high length symbols.
pub const LEN_HIGH_SYMBOLS: usize = 1 << LEN_HIGH_BITS;

/// Minimum match length.
pub const MATCH_LEN_MIN: usize = 2;

/// Maximum match length.
pub const MATCH_LEN_MAX: usize =
    MATCH_LEN_MIN + LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS + LEN_HIGH_SYMBOLS - 1;

/// Number of length states used to pick a distance slot tree.
pub const LEN_TO_POS_STATES: usize = 4;

/// Number of bits in a distance slot.
pub const DIST_SLOT_BITS: u32 = 6;

/// Number of distance slots.
pub const DIST_SLOTS: usize = 1 << DIST_SLOT_BITS;

/// Number of alignment bits for distance encoding.
pub const DIST_ALIGN_BITS: u32 = 4;
/// Size of alignment table.
pub const DIST_ALIGN_SIZE: usize = 1 << DIST_ALIGN_BITS;

/// First slot whose extra bits are coded directly plus alignment.
pub const END_POS_MODEL_INDEX: usize = 14;

/// Number of distances fully covered by the slot + special trees.
pub const FULL_DISTANCES: usize = 1 << (END_POS_MODEL_INDEX / 2);

/// Size of the flat probability array for slots 4..14.
pub const SPECIAL_SIZE: usize = FULL_DISTANCES - END_POS_MODEL_INDEX;

/// Distance value reserved for the end-of-payload marker.
pub const END_MARKER_DIST: u32 = 0xFFFF_FFFF;

/// Distance slot for a zero-based distance.
pub fn dist_slot(dist: u32) -> u32 {
    if dist < 4 {
        return dist;
    }

    let bits = 32 - dist.leading_zeros();
    ((bits - 1) << 1) | ((dist >> (bits - 2)) & 1)
}

/// Length state for distance coding.
pub fn len_state(len: usize) -> usize {
    (len - MATCH_LEN_MIN).min(LEN_TO_POS_STATES - 1)
}

/// LZMA state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State(u8);

impl State {
    /// Initial state.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Get state value.
    pub fn value(self) -> usize {
        self.0 as usize
    }

    /// Whether the previous packet was a literal.
    pub fn is_literal(self) -> bool {
        self.0 < 7
    }

    /// Update state after literal.
    pub fn update_literal(&mut self) {
        self.0 = match self.0 {
            0..=3 => 0,
            4..=9 => self.0 - 3,
            _ => self.0 - 6,
        };
    }

    /// Update state after match.
    pub fn update_match(&mut self) {
        self.0 = if self.0 < 7 { 7 } else { 10 };
    }

    /// Update state after short rep.
    pub fn update_short_rep(&mut self) {
        self.0 = if self.0 < 7 { 9 } else { 11 };
    }

    /// Update state after long rep.
    pub fn update_long_rep(&mut self) {
        self.0 = if self.0 < 7 { 8 } else { 11 };
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// LZMA properties (lc, lp, pb).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaProperties {
    /// Literal context bits.
    pub lc: u32,
    /// Literal position bits.
    pub lp: u32,
    /// Position bits.
    pub pb: u32,
}

impl LzmaProperties {
    /// Create new properties.
    pub fn new(lc: u32, lp: u32, pb: u32) -> Self {
        Self { lc, lp, pb }
    }

    /// Parse from property byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let byte = byte as u32;
        let pb = byte / 45;
        let remaining = byte - pb * 45;
        let lp = remaining / 9;
        let lc = remaining - lp * 9;

        if lc > LC_MAX || lp > LP_MAX || pb > PB_MAX {
            return None;
        }

        Some(Self { lc, lp, pb })
    }

    /// Encode to property byte.
    pub fn to_byte(&self) -> u8 {
        ((self.pb * 5 + self.lp) * 9 + self.lc) as u8
    }

    /// Get number of literal states.
    pub fn num_lit_states(&self) -> usize {
        1 << (self.lc + self.lp)
    }

    /// Get number of position states.
    pub fn num_pos_states(&self) -> usize {
        1 << self.pb
    }

    /// Mask selecting the position state from the stream position.
    pub fn pos_mask(&self) -> usize {
        self.num_pos_states() - 1
    }
}

impl Default for LzmaProperties {
    fn default() -> Self {
        Self {
            lc: LC_DEFAULT,
            lp: LP_DEFAULT,
            pb: PB_DEFAULT,
        }
    }
}

/// Length decoder/encoder model.
#[derive(Debug, Clone)]
pub struct LengthModel {
    /// Choice bit (low vs mid+high).
    pub choice: u16,
    /// Choice2 bit (mid vs high).
    pub choice2: u16,
    /// Low length probabilities (per position state).
    pub low: Vec<[u16; LEN_LOW_SYMBOLS]>,
    /// Mid length probabilities (per position state).
    pub mid: Vec<[u16; LEN_MID_SYMBOLS]>,
    /// High length probabilities (shared).
    pub high: [u16; LEN_HIGH_SYMBOLS],
}

impl LengthModel {
    /// Create a new length model.
    pub fn new(num_pos_states: usize) -> Self {
        Self {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: vec![[PROB_INIT; LEN_LOW_SYMBOLS]; num_pos_states],
            mid: vec![[PROB_INIT; LEN_MID_SYMBOLS]; num_pos_states],
            high: [PROB_INIT; LEN_HIGH_SYMBOLS],
        }
    }
}

/// Literal decoder/encoder model.
#[derive(Debug, Clone)]
pub struct LiteralModel {
    /// 0x300 probabilities per literal state: 0x100 for plain literals,
    /// 0x200 for literals coded against a match byte.
    pub probs: Vec<[u16; 0x300]>,
}

impl LiteralModel {
    /// Create a new literal model.
    pub fn new(num_lit_states: usize) -> Self {
        Self {
            probs: vec![[PROB_INIT; 0x300]; num_lit_states],
        }
    }

    /// Literal state for a stream position and the byte before it.
    pub fn state_index(pos: u64, prev_byte: u8, props: &LzmaProperties) -> usize {
        let lit_pos = (pos as usize) & ((1 << props.lp) - 1);
        let prev_bits = (prev_byte as usize) >> (8 - props.lc);
        (lit_pos << props.lc) + prev_bits
    }
}

/// Distance model.
#[derive(Debug, Clone)]
pub struct DistanceModel {
    /// Distance slot probabilities (per length state).
    pub slot: [[u16; DIST_SLOTS]; LEN_TO_POS_STATES],
    /// Reverse-tree probabilities for slots 4..14, laid out back to back.
    /// Entry 0 is never read; it lets every tree be indexed from node 1.
    pub special: [u16; SPECIAL_SIZE + 1],
    /// Alignment probabilities.
    pub align: [u16; DIST_ALIGN_SIZE],
}

impl DistanceModel {
    /// Create a new distance model.
    pub fn new() -> Self {
        Self {
            slot: [[PROB_INIT; DIST_SLOTS]; LEN_TO_POS_STATES],
            special: [PROB_INIT; SPECIAL_SIZE + 1],
            align: [PROB_INIT; DIST_ALIGN_SIZE],
        }
    }

    /// Probabilities of the reverse tree for `slot` (4..14).
    ///
    /// The returned slice is indexed with the tree node number (from 1).
    pub fn special_tree(&mut self, slot: u32) -> &mut [u16] {
        let num_direct_bits = (slot >> 1) - 1;
        let base = ((2 | (slot & 1)) << num_direct_bits) as usize;
        let start = base - slot as usize;
        &mut self.special[start..start + (1usize << num_direct_bits)]
    }
}

impl Default for DistanceModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete LZMA model containing all probability tables.
#[derive(Debug, Clone)]
pub struct LzmaModel {
    /// LZMA properties.
    pub props: LzmaProperties,

    /// Is-match probabilities.
    pub is_match: [[u16; POS_STATES_MAX]; NUM_STATES],
    /// Is-rep probabilities.
    pub is_rep: [u16; NUM_STATES],
    /// Is-rep0 probabilities.
    pub is_rep0: [u16; NUM_STATES],
    /// Is-rep1 probabilities.
    pub is_rep1: [u16; NUM_STATES],
    /// Is-rep2 probabilities.
    pub is_rep2: [u16; NUM_STATES],
    /// Is-rep0-long probabilities.
    pub is_rep0_long: [[u16; POS_STATES_MAX]; NUM_STATES],

    /// Match length model.
    pub match_len: LengthModel,
    /// Rep match length model.
    pub rep_len: LengthModel,

    /// Literal model.
    pub literal: LiteralModel,

    /// Distance model.
    pub distance: DistanceModel,
}

impl LzmaModel {
    /// Create a new LZMA model with the given properties.
    pub fn new(props: LzmaProperties) -> Self {
        let num_pos_states = props.num_pos_states();
        let num_lit_states = props.num_lit_states();

        Self {
            props,
            is_match: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            is_rep: [PROB_INIT; NUM_STATES],
            is_rep0: [PROB_INIT; NUM_STATES],
            is_rep1: [PROB_INIT; NUM_STATES],
            is_rep2: [PROB_INIT; NUM_STATES],
            is_rep0_long: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            match_len: LengthModel::new(num_pos_states),
            rep_len: LengthModel::new(num_pos_states),
            literal: LiteralModel::new(num_lit_states),
            distance: DistanceModel::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut state = State::new();
        assert!(state.is_literal());

        state.update_match();
        assert!(!state.is_literal());
        assert_eq!(state.value(), 7);

        state.update_literal();
        assert!(state.is_literal());
        assert_eq!(state.value(), 4);

        let mut state = State::new();
        state.update_match();
        state.update_match();
        assert_eq!(state.value(), 10);
        state.update_literal();
        assert_eq!(state.value(), 4);

        let mut state = State::new();
        state.update_short_rep();
        state.update_long_rep();
        assert_eq!(state.value(), 11);
        state.update_literal();
        assert_eq!(state.value(), 5);
    }

    #[test]
    fn test_properties_encoding() {
        let props = LzmaProperties::new(3, 0, 2);
        assert_eq!(props.to_byte(), 0x5D);

        let decoded = LzmaProperties::from_byte(0x5D).unwrap();
        assert_eq!(decoded, props);
    }

    #[test]
    fn test_properties_rejects_out_of_range() {
        // pb = 5
        assert!(LzmaProperties::from_byte(225).is_none());
        assert!(LzmaProperties::from_byte(0xFF).is_none());
    }

    #[test]
    fn test_dist_slot() {
        assert_eq!(dist_slot(0), 0);
        assert_eq!(dist_slot(3), 3);
        assert_eq!(dist_slot(4), 4);
        assert_eq!(dist_slot(5), 4);
        assert_eq!(dist_slot(6), 5);
        assert_eq!(dist_slot(127), 13);
        assert_eq!(dist_slot(128), 14);
        assert_eq!(dist_slot(END_MARKER_DIST), 63);
    }

    #[test]
    fn test_special_trees_tile_the_table() {
        let mut model = DistanceModel::new();
        let mut covered = 0;
        for slot in 4..END_POS_MODEL_INDEX as u32 {
            let num_direct_bits = (slot >> 1) - 1;
            assert_eq!(model.special_tree(slot).len(), 1usize << num_direct_bits);
            covered += (1usize << num_direct_bits) - 1;
        }
        assert_eq!(covered, SPECIAL_SIZE);

        // Last node of the last tree is the last table entry.
        model.special_tree(13)[31] = 7;
        assert_eq!(model.special[SPECIAL_SIZE], 7);
    }

    #[test]
    fn test_match_len_max() {
        assert_eq!(MATCH_LEN_MAX, 273);
    }
}
