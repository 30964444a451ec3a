//! Incremental LZMA decompression.
//!
//! [`LzmaDecoder::decode`] takes whatever input is available and fills at
//! most the given output slice, keeping every piece of state (range coder
//! registers, history window, an unfinished match) between calls.
//!
//! A symbol needs at most [`REQUIRED_INPUT_MAX`] input bytes. When fewer are
//! left, the decoder first decodes the symbol without adapting any
//! probability; if the bytes run out it parks them in a small tail buffer and
//! asks for more input instead of failing mid-symbol.

use crate::model::{
    DIST_ALIGN_BITS, DIST_SLOT_BITS, END_MARKER_DIST, END_POS_MODEL_INDEX, LEN_HIGH_BITS,
    LEN_LOW_BITS, LEN_LOW_SYMBOLS, LEN_MID_BITS, LEN_MID_SYMBOLS, LengthModel, LiteralModel,
    LzmaModel, LzmaProperties, MATCH_LEN_MIN, State, len_state,
};
use crate::params::DICT_SIZE_MIN;
use crate::range_coder::{INIT_SIZE, RangeCursor, RangeDecoder};
use crate::status;
use sluice_core::alloc::BufferAllocator;
use sluice_core::error::{Result, SluiceError};
use sluice_core::resources::CodecState;
use tracing::{trace, warn};

/// Most input bytes a single symbol can consume.
pub const REQUIRED_INPUT_MAX: usize = 20;

/// How the caller wants a call to end once the output slice is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishMode {
    /// More output may follow; stop when the slice is full.
    Any,
    /// The slice ends the payload; verify the stream ends there too.
    End,
}

/// Decoder status after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The output slice is full and the payload continues.
    NotFinished,
    /// All input was used and the current symbol needs more.
    NeedsMoreInput,
    /// The output slice is full and the range coder is at a clean payload end.
    MaybeFinishedWithoutMark,
    /// The end marker was decoded.
    FinishedWithMark,
}

impl DecodeStatus {
    /// Whether the payload can be considered complete.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            Self::MaybeFinishedWithoutMark | Self::FinishedWithMark
        )
    }
}

/// Progress of one [`LzmaDecoder::decode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeProgress {
    /// Input bytes used (including bytes parked in the tail buffer).
    pub consumed: usize,
    /// Output bytes written.
    pub produced: usize,
    /// Status after the call.
    pub status: DecodeStatus,
}

/// One decoded packet, not yet applied to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Packet {
    Literal(u8),
    ShortRep,
    Rep { index: usize, len: usize },
    Match { dist: u32, len: usize },
    EndMarker,
}

/// Everything a packet's coding depends on, captured before decoding it.
#[derive(Debug, Clone, Copy)]
struct Context {
    state: State,
    pos_state: usize,
    lit_state: usize,
    match_byte: u8,
}

/// Outcome of trying to read one packet.
enum Step {
    /// Packet decoded; the count is input bytes taken from the caller.
    Packet(Packet, usize),
    /// The input ran out; the count is bytes moved into the tail buffer.
    NeedInput(usize),
}

/// Decode a length.
fn read_length(
    rc: &mut RangeCursor<'_>,
    len_model: &mut LengthModel,
    pos_state: usize,
) -> Option<usize> {
    let len = if rc.decode_bit(&mut len_model.choice)? == 0 {
        rc.decode_bit_tree(&mut len_model.low[pos_state], LEN_LOW_BITS)? as usize
    } else if rc.decode_bit(&mut len_model.choice2)? == 0 {
        LEN_LOW_SYMBOLS + rc.decode_bit_tree(&mut len_model.mid[pos_state], LEN_MID_BITS)? as usize
    } else {
        LEN_LOW_SYMBOLS
            + LEN_MID_SYMBOLS
            + rc.decode_bit_tree(&mut len_model.high, LEN_HIGH_BITS)? as usize
    };
    Some(len + MATCH_LEN_MIN)
}

/// Decode a literal byte.
fn read_literal(rc: &mut RangeCursor<'_>, probs: &mut [u16; 0x300], ctx: &Context) -> Option<u8> {
    let mut symbol = 1usize;

    if !ctx.state.is_literal() {
        let mut match_byte = ctx.match_byte as usize;

        while symbol < 0x100 {
            let match_bit = (match_byte >> 7) & 1;
            match_byte <<= 1;

            let bit = rc.decode_bit(&mut probs[0x100 + (match_bit << 8) + symbol])? as usize;
            symbol = (symbol << 1) | bit;

            if bit != match_bit {
                break;
            }
        }
    }

    while symbol < 0x100 {
        let bit = rc.decode_bit(&mut probs[symbol])?;
        symbol = (symbol << 1) | bit as usize;
    }

    Some((symbol - 0x100) as u8)
}

/// Decode a distance.
fn read_distance(rc: &mut RangeCursor<'_>, model: &mut LzmaModel, len: usize) -> Option<u32> {
    let slot = rc.decode_bit_tree(&mut model.distance.slot[len_state(len)], DIST_SLOT_BITS)?;

    if slot < 4 {
        return Some(slot);
    }

    let num_direct_bits = (slot >> 1) - 1;
    let base = (2 | (slot & 1)) << num_direct_bits;

    if slot < END_POS_MODEL_INDEX as u32 {
        let reduced =
            rc.decode_bit_tree_reverse(model.distance.special_tree(slot), num_direct_bits)?;
        return Some(base + reduced);
    }

    let direct = rc.decode_direct_bits(num_direct_bits - DIST_ALIGN_BITS)?;
    let align = rc.decode_bit_tree_reverse(&mut model.distance.align, DIST_ALIGN_BITS)?;
    Some(base + (direct << DIST_ALIGN_BITS) + align)
}

/// Decode one packet. Returns `None` if `rc` runs out of input.
fn read_packet(rc: &mut RangeCursor<'_>, model: &mut LzmaModel, ctx: &Context) -> Option<Packet> {
    let state_idx = ctx.state.value();
    let pos_state = ctx.pos_state;

    if rc.decode_bit(&mut model.is_match[state_idx][pos_state])? == 0 {
        let byte = read_literal(rc, &mut model.literal.probs[ctx.lit_state], ctx)?;
        return Some(Packet::Literal(byte));
    }

    if rc.decode_bit(&mut model.is_rep[state_idx])? == 0 {
        let len = read_length(rc, &mut model.match_len, pos_state)?;
        let dist = read_distance(rc, model, len)?;
        if dist == END_MARKER_DIST {
            return Some(Packet::EndMarker);
        }
        return Some(Packet::Match { dist, len });
    }

    let index = if rc.decode_bit(&mut model.is_rep0[state_idx])? == 0 {
        if rc.decode_bit(&mut model.is_rep0_long[state_idx][pos_state])? == 0 {
            return Some(Packet::ShortRep);
        }
        0
    } else if rc.decode_bit(&mut model.is_rep1[state_idx])? == 0 {
        1
    } else {
        2 + rc.decode_bit(&mut model.is_rep2[state_idx])? as usize
    };

    let len = read_length(rc, &mut model.rep_len, pos_state)?;
    Some(Packet::Rep { index, len })
}

/// LZMA decoder.
pub struct LzmaDecoder {
    /// LZMA model.
    model: LzmaModel,
    /// Range decoder registers.
    rc: RangeDecoder,
    /// The range decoder has read its initial bytes.
    rc_ready: bool,
    /// Input held over from the previous call.
    tail: [u8; REQUIRED_INPUT_MAX],
    /// Valid bytes in `tail`.
    tail_len: usize,
    /// Circular history window; drawn from the allocator.
    dict: Vec<u8>,
    /// Next write index in `dict`.
    dict_pos: usize,
    /// Bytes decoded so far.
    processed: u64,
    /// Current state.
    state: State,
    /// Rep distances.
    rep: [u32; 4],
    /// Bytes of the current match not yet written.
    pending_len: usize,
    /// The end marker has been decoded.
    finished: bool,
}

impl LzmaDecoder {
    /// Create a decoder for a 5-byte parameter block.
    ///
    /// The history window (the dictionary size, at least 4 KiB) is drawn
    /// from `alloc` and handed back through [`CodecState::reclaim`].
    pub fn new(props: &[u8; 5], alloc: &dyn BufferAllocator) -> Result<Self> {
        let lzma_props = LzmaProperties::from_byte(props[0]).ok_or_else(|| {
            SluiceError::invalid_parameters(format!("invalid lc/lp/pb byte 0x{:02X}", props[0]))
        })?;

        let dict_size = u32::from_le_bytes([props[1], props[2], props[3], props[4]]);
        let dict_len = usize::try_from(dict_size.max(DICT_SIZE_MIN))
            .map_err(|_| SluiceError::resource_exhausted(usize::MAX))?;
        let dict = alloc.allocate(dict_len)?;

        trace!(
            lc = lzma_props.lc,
            lp = lzma_props.lp,
            pb = lzma_props.pb,
            dict_size,
            "created LZMA decoder"
        );

        Ok(Self {
            model: LzmaModel::new(lzma_props),
            rc: RangeDecoder::new(),
            rc_ready: false,
            tail: [0; REQUIRED_INPUT_MAX],
            tail_len: 0,
            dict,
            dict_pos: 0,
            processed: 0,
            state: State::new(),
            rep: [0; 4],
            pending_len: 0,
            finished: false,
        })
    }

    /// Bytes decoded so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Decode from `input` into `output`.
    ///
    /// Stops when the output slice is full, when the input runs out, or at
    /// the end marker. With [`FinishMode::End`] a full output slice must
    /// coincide with the end of the payload: either the range coder is at a
    /// clean end, or the next symbol is the end marker. Anything else means
    /// the payload is longer than the caller expects and is reported as a
    /// decode failure.
    pub fn decode(
        &mut self,
        output: &mut [u8],
        input: &[u8],
        finish: FinishMode,
    ) -> Result<DecodeProgress> {
        let mut progress = DecodeProgress {
            consumed: 0,
            produced: 0,
            status: DecodeStatus::NotFinished,
        };

        if self.finished {
            progress.status = DecodeStatus::FinishedWithMark;
            return Ok(progress);
        }

        if !self.rc_ready {
            let take = (INIT_SIZE - self.tail_len).min(input.len());
            self.tail[self.tail_len..self.tail_len + take].copy_from_slice(&input[..take]);
            self.tail_len += take;
            progress.consumed += take;

            if self.tail_len < INIT_SIZE {
                progress.status = DecodeStatus::NeedsMoreInput;
                return Ok(progress);
            }

            let mut init = [0u8; INIT_SIZE];
            init.copy_from_slice(&self.tail[..INIT_SIZE]);
            self.rc = RangeDecoder::from_init_bytes(&init).ok_or_else(|| {
                SluiceError::decode_failed(status::DATA, "payload does not start with a zero byte")
            })?;
            self.rc_ready = true;
            self.tail_len = 0;
        }

        loop {
            progress.produced += self.copy_match(&mut output[progress.produced..]);

            let at_end = progress.produced == output.len();
            if at_end {
                if self.pending_len == 0 && self.rc.is_finished_ok() {
                    progress.status = DecodeStatus::MaybeFinishedWithoutMark;
                    return Ok(progress);
                }
                if finish == FinishMode::Any {
                    progress.status = DecodeStatus::NotFinished;
                    return Ok(progress);
                }
                if self.pending_len != 0 {
                    return Err(self.corrupt("payload continues past the requested end"));
                }
            }

            let ctx = self.context();
            let packet = match self.next_packet(&input[progress.consumed..], &ctx)? {
                Step::Packet(packet, used) => {
                    progress.consumed += used;
                    packet
                }
                Step::NeedInput(parked) => {
                    progress.consumed += parked;
                    progress.status = DecodeStatus::NeedsMoreInput;
                    return Ok(progress);
                }
            };

            match packet {
                Packet::EndMarker => {
                    self.finished = true;
                    if !self.rc.is_finished_ok() {
                        return Err(self.corrupt("data after the end marker"));
                    }
                    progress.status = DecodeStatus::FinishedWithMark;
                    return Ok(progress);
                }
                _ if at_end => {
                    return Err(self.corrupt("payload continues past the requested end"));
                }
                Packet::Literal(byte) => {
                    self.put(byte);
                    output[progress.produced] = byte;
                    progress.produced += 1;
                    self.state.update_literal();
                }
                Packet::ShortRep => {
                    self.check_distance()?;
                    let byte = self.byte_at(self.rep[0] as usize);
                    self.put(byte);
                    output[progress.produced] = byte;
                    progress.produced += 1;
                    self.state.update_short_rep();
                }
                Packet::Rep { index, len } => {
                    let dist = self.rep[index];
                    self.rep.copy_within(0..index, 1);
                    self.rep[0] = dist;
                    self.state.update_long_rep();
                    self.check_distance()?;
                    self.pending_len = len;
                }
                Packet::Match { dist, len } => {
                    self.rep.copy_within(0..3, 1);
                    self.rep[0] = dist;
                    self.state.update_match();
                    self.check_distance()?;
                    self.pending_len = len;
                }
            }
        }
    }

    /// Log and build a corrupt-data error.
    fn corrupt(&self, message: &str) -> SluiceError {
        warn!(position = self.processed, "{message}");
        SluiceError::decode_failed(
            status::DATA,
            format!("{message} (at byte {})", self.processed),
        )
    }

    /// Reject a rep0 that points before the start of the output or past the window.
    fn check_distance(&self) -> Result<()> {
        let dist = self.rep[0];
        if dist as u64 >= self.processed || dist as usize >= self.dict.len() {
            return Err(self.corrupt("match distance exceeds decoded data"));
        }
        Ok(())
    }

    /// Coding context for the next packet.
    fn context(&self) -> Context {
        let prev_byte = if self.processed > 0 {
            self.byte_at(0)
        } else {
            0
        };
        let match_byte = if self.state.is_literal() {
            0
        } else {
            self.byte_at(self.rep[0] as usize)
        };

        Context {
            state: self.state,
            pos_state: (self.processed as usize) & self.model.props.pos_mask(),
            lit_state: LiteralModel::state_index(self.processed, prev_byte, &self.model.props),
            match_byte,
        }
    }

    /// Read one packet from the tail buffer and/or `input`.
    fn next_packet(&mut self, input: &[u8], ctx: &Context) -> Result<Step> {
        if self.tail_len > 0 {
            let held = self.tail_len;
            let take = (REQUIRED_INPUT_MAX - held).min(input.len());
            self.tail[held..held + take].copy_from_slice(&input[..take]);
            let tail = self.tail;
            let available = &tail[..held + take];

            if available.len() < REQUIRED_INPUT_MAX && !self.probe(available, ctx) {
                self.tail_len = available.len();
                return Ok(Step::NeedInput(take));
            }

            let (packet, used) = self.read(available, ctx)?;
            if used >= held {
                self.tail_len = 0;
                return Ok(Step::Packet(packet, used - held));
            }

            self.tail.copy_within(used..held, 0);
            self.tail_len = held - used;
            return Ok(Step::Packet(packet, 0));
        }

        if input.len() < REQUIRED_INPUT_MAX && !self.probe(input, ctx) {
            self.tail[..input.len()].copy_from_slice(input);
            self.tail_len = input.len();
            return Ok(Step::NeedInput(input.len()));
        }

        let (packet, used) = self.read(input, ctx)?;
        Ok(Step::Packet(packet, used))
    }

    /// Whether `input` holds a whole packet. Leaves all state untouched.
    fn probe(&mut self, input: &[u8], ctx: &Context) -> bool {
        let mut rc = self.rc.cursor(input, false);
        read_packet(&mut rc, &mut self.model, ctx).is_some()
    }

    /// Decode one packet for real, returning it and the bytes it used.
    fn read(&mut self, input: &[u8], ctx: &Context) -> Result<(Packet, usize)> {
        let mut rc = self.rc.cursor(input, true);
        let packet = read_packet(&mut rc, &mut self.model, ctx).ok_or_else(|| {
            SluiceError::decode_failed(status::FAIL, "input ended inside a symbol")
        })?;
        self.rc = rc.registers();
        Ok((packet, rc.consumed()))
    }

    /// Write out as much of the current match as fits.
    fn copy_match(&mut self, output: &mut [u8]) -> usize {
        let n = self.pending_len.min(output.len());
        let dist = self.rep[0] as usize;

        for slot in &mut output[..n] {
            let byte = self.byte_at(dist);
            self.put(byte);
            *slot = byte;
        }

        self.pending_len -= n;
        n
    }

    /// Byte `dist + 1` positions back in the history.
    fn byte_at(&self, dist: usize) -> u8 {
        let len = self.dict.len();
        let idx = if self.dict_pos > dist {
            self.dict_pos - dist - 1
        } else {
            len + self.dict_pos - dist - 1
        };
        self.dict[idx]
    }

    /// Append a byte to the history.
    fn put(&mut self, byte: u8) {
        self.dict[self.dict_pos] = byte;
        self.dict_pos += 1;
        if self.dict_pos == self.dict.len() {
            self.dict_pos = 0;
        }
        self.processed += 1;
    }
}

impl CodecState for LzmaDecoder {
    fn reclaim(&mut self) -> Vec<Vec<u8>> {
        vec![std::mem::take(&mut self.dict)]
    }
}

impl std::fmt::Debug for LzmaDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzmaDecoder")
            .field("props", &self.model.props)
            .field("dict", &self.dict.len())
            .field("processed", &self.processed)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
