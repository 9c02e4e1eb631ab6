//! LZMA2 chunk encoding: the fast (greedy/lazy) and optimal (DP) parsers,
//! and the chunk framer that wraps their range-coded output in LZMA2
//! headers.
//!
//! # Reference
//!
//! Based on the Fast LZMA2 library by Conor McCarthy.
#![allow(dead_code)]

use std::io::{self, Write};

use super::lzma_context::LzmaEncoderState;
use super::lzma_rc::LzmaRangeEncoder;
use super::radix_mf::{self, RadixMatchFinder, MATCH_LEN_MAX, MATCH_LEN_MIN};

/// Maximum size for LZMA2 uncompressed chunks (64KiB - 1).
const MAX_UNCOMPRESSED_CHUNK_SIZE: usize = 65535;

/// Maximum uncompressed payload of one compressed chunk (64KiB).
const MAX_COMPRESSED_CHUNK_UNPACK_SIZE: usize = 1 << 16;

/// Compressed-size ceiling enforced per chunk so the ENC-phase overtake
/// invariant (the range-coder output index trailing the RMF read cursor)
/// always has slack, even after two `MATCH_LEN_MAX`-sized matches' worth of
/// uncommitted lookahead.
pub const CHUNK_COMPRESSED_MAX: usize = 65_536 - 2 * MATCH_LEN_MAX as usize;

/// How often (in emitted normal matches / rep lengths) the optimal parser
/// recomputes its price caches from the live probability model.
const MATCH_REPRICE_FREQ: u32 = 64;

const REPS: u32 = 4;

/// LZMA2 control byte flags for compressed chunks.
mod ctrl {
    pub const UNCOMPRESSED_RESET: u8 = 0x01;
    pub const UNCOMPRESSED_NO_RESET: u8 = 0x02;
}

/// Reset mode for LZMA2 compressed chunks: which encoder state is
/// reinitialized at the chunk boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkResetMode {
    /// Continue with the previous encoder state (no reset at all).
    None = 0xA0,
    /// Reset LZMA state (literal/match/rep probabilities) only.
    StateReset = 0x80,
    /// Reset state and write a fresh properties byte.
    StatePropsReset = 0xC0,
    /// Reset state, properties, and the dictionary. Mandatory for the very
    /// first chunk of a stream.
    AllReset = 0xE0,
}

impl ChunkResetMode {
    pub fn includes_props(self) -> bool {
        matches!(self, ChunkResetMode::StatePropsReset | ChunkResetMode::AllReset)
    }
    pub fn resets_dict(self) -> bool {
        matches!(self, ChunkResetMode::AllReset)
    }
}

pub fn write_uncompressed_chunk(output: &mut impl Write, data: &[u8], reset_dict: bool) -> io::Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let chunk_size = data.len().min(MAX_UNCOMPRESSED_CHUNK_SIZE);
    let ctrl = if reset_dict {
        ctrl::UNCOMPRESSED_RESET
    } else {
        ctrl::UNCOMPRESSED_NO_RESET
    };
    let size_minus_one = (chunk_size - 1) as u16;
    output.write_all(&[ctrl])?;
    output.write_all(&size_minus_one.to_be_bytes())?;
    output.write_all(&data[..chunk_size])
}

pub fn write_end_marker(output: &mut impl Write) -> io::Result<()> {
    output.write_all(&[0x00])
}

/// Writes one LZMA2 compressed-chunk header followed by the range-coded
/// payload. `props` is required when `reset_mode` includes properties.
pub fn write_compressed_chunk(
    output: &mut impl Write,
    compressed: &[u8],
    uncompressed_size: usize,
    reset_mode: ChunkResetMode,
    props: Option<u8>,
) -> io::Result<()> {
    if compressed.is_empty() || uncompressed_size == 0 {
        return Ok(());
    }
    debug_assert!(uncompressed_size <= MAX_COMPRESSED_CHUNK_UNPACK_SIZE);
    debug_assert!(compressed.len() <= CHUNK_COMPRESSED_MAX);

    let unpack_size_minus1 = (uncompressed_size - 1) as u32;
    let unpack_high_bits = ((unpack_size_minus1 >> 16) & 0x1F) as u8;
    let ctrl = (reset_mode as u8) | unpack_high_bits;
    let pack_size_minus1 = (compressed.len() - 1) as u16;
    let unpack_size_low = (unpack_size_minus1 & 0xFFFF) as u16;

    output.write_all(&[ctrl])?;
    output.write_all(&unpack_size_low.to_be_bytes())?;
    output.write_all(&pack_size_minus1.to_be_bytes())?;
    if reset_mode.includes_props() {
        output.write_all(&[props.unwrap_or(0x5D)])?;
    }
    output.write_all(compressed)
}

/// Packs `lc`, `lp`, `pb` into the single LZMA properties byte:
/// `(pb * 5 + lp) * 9 + lc`.
pub fn pack_props(lc: u32, lp: u32, pb: u32) -> u8 {
    ((pb * 5 + lp) * 9 + lc) as u8
}

/// Candidate item the parsers choose between at a position: a plain
/// literal, a rep match against `reps[rep_index]`, or a normal match.
#[derive(Debug, Clone, Copy)]
enum Item {
    Literal,
    ShortRep,
    Rep { rep_index: usize, length: u32 },
    Match { dist0: u32, length: u32 },
}

/// Drives one chunk's worth of token emission against a shared
/// [`LzmaEncoderState`] + [`LzmaRangeEncoder`] pair.
struct ChunkEmitter<'a> {
    data: &'a [u8],
    state: &'a mut LzmaEncoderState,
    rc: &'a mut LzmaRangeEncoder,
}

impl<'a> ChunkEmitter<'a> {
    fn emit(&mut self, pos: usize, item: Item) {
        let prev_byte = if pos == 0 { 0 } else { self.data[pos - 1] };
        match item {
            Item::Literal => {
                let match_byte = if self.state.state() >= 7 {
                    let rep0 = self.state.reps()[0] as usize;
                    pos.checked_sub(rep0 + 1).map(|i| self.data[i])
                } else {
                    None
                };
                self.state
                    .encode_literal(self.rc, self.data[pos], pos, prev_byte, match_byte);
            }
            Item::ShortRep => {
                self.state.encode_rep(self.rc, 0, 1, pos);
            }
            Item::Rep { rep_index, length } => {
                self.state.encode_rep(self.rc, rep_index, length, pos);
            }
            Item::Match { dist0, length } => {
                self.state.encode_match(self.rc, dist0 + 1, length, pos);
            }
        }
    }
}

/// Length of a short-rep0 match starting at `pos`: at least 1 byte equal to
/// the byte `reps[0]+1` back, extended while bytes keep matching.
fn rep0_len(data: &[u8], pos: usize, end: usize, rep0: u32) -> u32 {
    let src = match pos.checked_sub(rep0 as usize + 1) {
        Some(s) => s,
        None => return 0,
    };
    let max_len = (end - pos).min(MATCH_LEN_MAX as usize);
    let mut len = 0;
    while len < max_len && data[src + len] == data[pos + len] {
        len += 1;
    }
    len as u32
}

fn rep_len(data: &[u8], pos: usize, end: usize, rep_dist0: u32) -> u32 {
    rep0_len(data, pos, end, rep_dist0)
}

/// §4.4 fast strategy: greedy matching with one- and two-position lazy
/// lookahead, reps probed ahead of the RMF's single best match.
pub fn encode_fast(
    data: &[u8],
    start: usize,
    end: usize,
    rmf: &RadixMatchFinder,
    state: &mut LzmaEncoderState,
    rc: &mut LzmaRangeEncoder,
    nice_len: u32,
) {
    let mut emitter = ChunkEmitter { data, state, rc };
    let mut pos = start;

    while pos < end {
        let rmf_match = rmf.get(pos).map(|(link, len)| {
            let dist0 = (pos - link as usize - 1) as u32;
            let extended = radix_mf::extend_match(data, pos, end, link as usize, len, rmf.depth_cap());
            (dist0, extended)
        });

        let best_rep = (0..REPS as usize)
            .map(|i| {
                let d0 = emitter.state.reps()[i];
                (i, rep_len(data, pos, end, d0))
            })
            .max_by_key(|&(_, l)| l);

        let chosen = match (rmf_match, best_rep) {
            (Some((_, mlen)), Some((rep_idx, rlen))) if rlen >= MATCH_LEN_MIN && rlen + 1 >= mlen => {
                Some(Item::Rep { rep_index: rep_idx, length: rlen })
            }
            (Some((dist0, mlen)), _) if mlen >= MATCH_LEN_MIN => {
                Some(Item::Match { dist0, length: mlen.min(nice_len.max(MATCH_LEN_MIN)) })
            }
            (_, Some((rep_idx, rlen))) if rlen >= MATCH_LEN_MIN => {
                Some(Item::Rep { rep_index: rep_idx, length: rlen })
            }
            _ => None,
        };

        match chosen {
            Some(item @ (Item::Match { length, .. } | Item::Rep { length, .. })) => {
                // Lazy lookahead: if the very next position yields a
                // strictly longer match, prefer a literal here and let the
                // next iteration pick up the better one.
                if pos + 1 < end && length < nice_len {
                    let next_best = rmf
                        .get(pos + 1)
                        .map(|(link, len)| radix_mf::extend_match(data, pos + 1, end, link as usize, len, rmf.depth_cap()))
                        .unwrap_or(0);
                    if next_best > length + 1 {
                        emitter.emit(pos, Item::Literal);
                        pos += 1;
                        continue;
                    }
                }
                emitter.emit(pos, item);
                pos += length as usize;
            }
            _ => {
                let rep0 = emitter.state.reps()[0];
                if rep0_len(data, pos, end, rep0) >= 1 && emitter.state.state() != 0 {
                    emitter.emit(pos, Item::ShortRep);
                } else {
                    emitter.emit(pos, Item::Literal);
                }
                pos += 1;
            }
        }
    }
}

/// §4.5 optimal strategy: a bounded dynamic-programming parser. Prices a
/// window of candidate emission sequences and commits to the cheapest path
/// found, using [`LzmaEncoderState`]'s non-mutating price methods so
/// candidates can be compared without touching the live probability model.
///
/// This is a deliberately scoped-down optimal parser: it evaluates
/// literal, short-rep, full-rep, the RMF's single reported match, and the
/// literal-then-rep0 composite at each step. The full reference parser
/// additionally tries match-then-literal-then-rep0 composites and an
/// auxiliary near-match hash chain in ultra mode; those are not implemented
/// here (see DESIGN.md).
pub fn encode_optimal(
    data: &[u8],
    start: usize,
    end: usize,
    rmf: &RadixMatchFinder,
    state: &mut LzmaEncoderState,
    rc: &mut LzmaRangeEncoder,
    nice_len: u32,
) {
    const OPT_BUF_SIZE: usize = 4096;
    const OPT_END_SIZE: usize = 32;

    #[derive(Clone, Copy)]
    struct Node {
        price: u32,
        len: u32,
        item: Option<Item>,
    }
    const UNSET: u32 = u32::MAX;

    let mut pos = start;
    let mut priced_since_reprice = 0u32;

    while pos < end {
        let window = (end - pos).min(OPT_BUF_SIZE);
        let mut nodes = vec![
            Node { price: UNSET, len: 0, item: None };
            window + 1
        ];
        nodes[0] = Node { price: 0, len: 0, item: None };

        let cur_state = state.state();
        let reps = *state.reps();

        let rmf_len = rmf
            .get(pos)
            .map(|(link, len)| (pos - link as usize - 1, radix_mf::extend_match(data, pos, end, link as usize, len, rmf.depth_cap())))
            .filter(|&(_, len)| len >= MATCH_LEN_MIN);

        let mut len_end = 1usize;
        let relax = |nodes: &mut Vec<Node>, at: usize, price: u32, len: u32, item: Item| {
            if at < nodes.len() && price < nodes[at].price {
                nodes[at] = Node { price, len, item: Some(item) };
            }
        };

        // literal at +1
        if pos < end {
            let byte = data[pos];
            let prev = if pos == 0 { 0 } else { data[pos - 1] };
            let match_byte = if cur_state >= 7 {
                (pos).checked_sub(reps[0] as usize + 1).map(|i| data[i])
            } else {
                None
            };
            let p = state.literal_price(cur_state, pos, prev, byte, match_byte);
            relax(&mut nodes, 1, p, 1, Item::Literal);
            len_end = len_end.max(1);
        }

        // short rep (length 1) at +1
        {
            let r0 = reps[0];
            if rep0_len(data, pos, end, r0) >= 1 {
                let p = state.rep_price(cur_state, pos, 0, 1);
                relax(&mut nodes, 1, p, 1, Item::ShortRep);
            }
        }

        // full reps
        for rep_index in 0..REPS as usize {
            let rl = rep_len(data, pos, end, reps[rep_index]);
            if rl < MATCH_LEN_MIN {
                continue;
            }
            let max_l = rl.min(window as u32);
            let mut l = MATCH_LEN_MIN;
            while l <= max_l {
                let p = state.rep_price(cur_state, pos, rep_index, l);
                relax(&mut nodes, l as usize, p, l, Item::Rep { rep_index, length: l });
                len_end = len_end.max(l as usize);
                l += 1;
            }
        }

        // the RMF-reported normal match
        if let Some((dist0, mlen)) = rmf_len {
            let max_l = mlen.min(window as u32).min(nice_len.max(MATCH_LEN_MIN));
            let mut l = MATCH_LEN_MIN;
            while l <= max_l {
                let p = state.match_price(cur_state, pos, dist0 as u32, l);
                relax(&mut nodes, l as usize, p, l, Item::Match { dist0: dist0 as u32, length: l });
                len_end = len_end.max(l as usize);
                l += 1;
            }

            // composite: literal then rep0 at the position right after a
            // 1-byte literal, cheap-prefiltered by only trying it when it
            // beats the plain 1-length literal path already recorded.
            if pos + 1 < end && max_l >= MATCH_LEN_MIN {
                let lit_price = nodes[1].price;
                if lit_price != UNSET {
                    let rep0_after = rep0_len(data, pos + 1, end, reps[0]);
                    if rep0_after >= MATCH_LEN_MIN {
                        let l = rep0_after.min((window as u32).saturating_sub(1));
                        let p = lit_price + state.rep_price(cur_state, pos + 1, 0, l);
                        relax(&mut nodes, 1 + l as usize, p, l + 1, Item::Literal);
                        len_end = len_end.max(1 + l as usize);
                    }
                }
            }
        }

        // Pick the terminus: cheapest reachable node, biased toward the
        // more distant endpoint on a price tie so the chain doesn't thrash
        // near OPT_END_SIZE.
        let scan_end = len_end.min(window);
        let mut best = 1usize;
        for cand in 2..=scan_end {
            if nodes[cand].price == UNSET {
                continue;
            }
            if nodes[best].price == UNSET
                || nodes[cand].price <= nodes[best].price
            {
                best = cand;
            }
        }
        if nodes[best].price == UNSET {
            best = 1;
            nodes[1] = Node { price: 0, len: 1, item: Some(Item::Literal) };
        }

        // Single-step commit: since composites here resolve in one relax
        // pass (no multi-hop prev-chain needed for the item set we model),
        // emit the winning node directly.
        let mut emitter = ChunkEmitter { data, state, rc };
        let node = nodes[best];
        match node.item.unwrap_or(Item::Literal) {
            Item::Literal if node.len > 1 => {
                // literal + rep0 composite
                emitter.emit(pos, Item::Literal);
                let l = node.len - 1;
                emitter.emit(pos + 1, Item::Rep { rep_index: 0, length: l });
            }
            item => emitter.emit(pos, item),
        }

        pos += node.len.max(1) as usize;
        priced_since_reprice += 1;
        if priced_since_reprice >= MATCH_REPRICE_FREQ {
            // Reference implementation recomputes cached slot/align/length
            // price tables here; this implementation prices directly from
            // live probabilities every iteration, so there is no separate
            // cache to refresh. Kept as a counter so the cadence constant
            // stays meaningful if a cache is added later.
            priced_since_reprice = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_rmf(data: &[u8]) -> RadixMatchFinder {
        let mut rmf = RadixMatchFinder::new(1 << 20, 254);
        rmf.build_init(data, data.len());
        while let (Some(r), _) = rmf.claim_next_list() {
            rmf.process_claimed_list(r, data, data.len());
        }
        rmf.limit_lengths(data.len());
        rmf
    }

    fn roundtrip_with(
        encode: impl FnOnce(&[u8], usize, usize, &RadixMatchFinder, &mut LzmaEncoderState, &mut LzmaRangeEncoder, u32),
        data: &[u8],
    ) -> Vec<u8> {
        let rmf = build_rmf(data);
        let mut state = LzmaEncoderState::new(3, 0, 2);
        let mut rc = LzmaRangeEncoder::new();
        encode(data, 0, data.len(), &rmf, &mut state, &mut rc, 32);
        rc.finish()
    }

    #[test]
    fn fast_strategy_produces_nonempty_output_for_repeated_input() {
        let data = b"abcabcabcabcabcabc";
        let out = roundtrip_with(encode_fast, data);
        assert!(!out.is_empty());
    }

    #[test]
    fn optimal_strategy_produces_nonempty_output_for_repeated_input() {
        let data = b"abcabcabcabcabcabc";
        let out = roundtrip_with(encode_optimal, data);
        assert!(!out.is_empty());
    }

    #[test]
    fn pack_props_matches_default_0x5d() {
        assert_eq!(pack_props(3, 0, 2), 0x5D);
    }

    #[test]
    fn write_uncompressed_chunk_header_fields() {
        let mut out = Vec::new();
        write_uncompressed_chunk(&mut out, b"Hello, World!", true).unwrap();
        assert_eq!(out[0], 0x01);
        let size = u16::from_be_bytes([out[1], out[2]]);
        assert_eq!(size, 12);
        assert_eq!(&out[3..], b"Hello, World!");
    }

    #[test]
    fn write_compressed_chunk_header_fields() {
        let mut out = Vec::new();
        let compressed = vec![0xAA, 0xBB, 0xCC, 0xDD, 0xEE];
        write_compressed_chunk(&mut out, &compressed, 100, ChunkResetMode::AllReset, Some(0x5D)).unwrap();
        assert_eq!(out[0], 0xE0);
        let unpack = u16::from_be_bytes([out[1], out[2]]);
        assert_eq!(unpack, 99);
        let pack = u16::from_be_bytes([out[3], out[4]]);
        assert_eq!(pack, 4);
        assert_eq!(out[5], 0x5D);
        assert_eq!(&out[6..], &compressed[..]);
    }

    #[test]
    fn write_compressed_chunk_without_props_is_shorter() {
        let mut out = Vec::new();
        write_compressed_chunk(&mut out, &[0xAA, 0xBB, 0xCC], 50, ChunkResetMode::StateReset, None).unwrap();
        assert_eq!(out[0], 0x80);
        assert_eq!(out.len(), 5 + 3);
    }

    #[test]
    fn end_marker_is_a_single_zero_byte() {
        let mut out = Vec::new();
        write_end_marker(&mut out).unwrap();
        assert_eq!(out, vec![0x00]);
    }
}
