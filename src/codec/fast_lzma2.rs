//! Per-block LZMA2 encoder: chunks one [`DataBlock`] into a sequence of
//! LZMA2 chunks, choosing fast or optimal parsing per [`Strategy`], folding
//! in the incompressibility heuristic so near-random spans fall back to
//! stored (uncompressed) chunks instead of wasting range-coder output.
//!
//! # Reference
//!
//! Based on the Fast LZMA2 library by Conor McCarthy.
#![allow(dead_code)]

use crate::data_block::DataBlock;
use crate::error::{Error, Result};
use crate::options::{FastLzma2Options, Strategy};

use super::fast_lzma2_encode::{
    self, ChunkResetMode, CHUNK_COMPRESSED_MAX, pack_props, write_compressed_chunk, write_end_marker,
    write_uncompressed_chunk,
};
use super::lzma_context::LzmaEncoderState;
use super::lzma_rc::LzmaRangeEncoder;
use super::radix_mf::{self, RadixMatchFinder, MATCH_LEN_MIN};

pub use super::radix_mf::RadixMatchFinder as MatchFinder;

/// Uncompressed payload ceiling per LZMA2 chunk.
pub(crate) const CHUNK_SIZE: usize = 1 << 16;

/// Shift applied to `compressed >> RANDOM_FILTER_MARGIN_BITS` in the
/// incompressibility test's margin term.
const RANDOM_FILTER_MARGIN_BITS: u32 = 4;

/// Encodes one data block into a caller-supplied output buffer, returning
/// the number of bytes written. `first_block` controls whether the first
/// chunk resets the dictionary (`AllReset`) or only state+props
/// (`StatePropsReset`); subsequent blocks within the same stream carry
/// dictionary history forward via the overlap region in `block.data()`.
pub fn encode_block(
    block: &DataBlock<'_>,
    rmf: &RadixMatchFinder,
    opts: &FastLzma2Options,
    state: &mut LzmaEncoderState,
    first_block: bool,
) -> Result<Vec<u8>> {
    opts.validate()?;
    let data = block.data();
    let end = block.end();
    let mut pos = block.start();
    let mut out = Vec::with_capacity(block.len() / 2 + 64);
    let mut first_chunk = true;
    let props = pack_props(opts.lc, opts.lp, opts.pb);

    while pos < end {
        let chunk_end = (pos + CHUNK_SIZE).min(end);
        let uncompressed_len = chunk_end - pos;

        // The probability model must be rolled back if this chunk turns
        // out not worth keeping, so the range coder always starts a chunk
        // with a saved snapshot of the live state.
        let saved_state = clone_state(state, opts);

        let mut rc = LzmaRangeEncoder::new();
        match opts.mode {
            Strategy::Fast => {
                fast_lzma2_encode::encode_fast(data, pos, chunk_end, rmf, state, &mut rc, opts.nice_len)
            }
            Strategy::Normal | Strategy::Ultra => {
                fast_lzma2_encode::encode_optimal(data, pos, chunk_end, rmf, state, &mut rc, opts.nice_len)
            }
        }
        rc.flush();
        let compressed = rc.into_output();

        if compressed.len() > CHUNK_COMPRESSED_MAX {
            return Err(Error::program(format!(
                "chunk at {pos} compressed to {} bytes, exceeding {CHUNK_COMPRESSED_MAX}",
                compressed.len()
            )));
        }

        let header_size = if first_chunk { 6 } else { 5 };
        let incompressible = uncompressed_len + 3
            <= compressed.len() + header_size + (compressed.len() >> RANDOM_FILTER_MARGIN_BITS)
            && looks_random(data, pos, uncompressed_len, rmf);

        if incompressible {
            // Roll back: this chunk's matches didn't pay for themselves, so
            // store it raw and restore the probability model the next
            // chunk should have started from.
            *state = saved_state;
            let reset_dict = first_chunk && first_block;
            write_uncompressed_chunk(&mut out, &data[pos..chunk_end], reset_dict)?;
        } else {
            let reset_mode = if first_chunk {
                if first_block {
                    ChunkResetMode::AllReset
                } else {
                    ChunkResetMode::StatePropsReset
                }
            } else {
                ChunkResetMode::StateReset
            };
            write_compressed_chunk(&mut out, &compressed, uncompressed_len, reset_mode, Some(props))?;
        }

        pos = chunk_end;
        first_chunk = false;
    }

    Ok(out)
}

/// Writes the single-byte LZMA2 stream terminator. Called once after the
/// last block of a stream has been encoded.
pub fn finish_stream(out: &mut Vec<u8>) -> Result<()> {
    write_end_marker(out)?;
    Ok(())
}

fn clone_state(state: &LzmaEncoderState, _opts: &FastLzma2Options) -> LzmaEncoderState {
    state.clone()
}

/// §4.6 incompressibility probe: combines a match-density estimate from the
/// RMF table with a chi-square test for a uniform byte distribution. Used
/// only once the cheap cost-ratio check above has already flagged the
/// chunk as a loss; this is the confirmatory test before falling back to a
/// stored chunk.
fn looks_random(data: &[u8], start: usize, len: usize, rmf: &RadixMatchFinder) -> bool {
    if len == 0 {
        return false;
    }
    let window = &data[start..start + len];

    let mut matched = 0usize;
    for p in start..start + len {
        if let Some((_, l)) = rmf.get(p) {
            if l >= MATCH_LEN_MIN {
                matched += 1;
            }
        }
    }
    let density_permille = (matched * 1000) / len;
    if density_permille > 40 {
        return false;
    }

    chi_square_is_uniform(window)
}

/// Fast integer square root (Newton's method), used to keep the chi-square
/// threshold computation free of floating point.
fn isqrt(x: u64) -> u64 {
    if x == 0 {
        return 0;
    }
    let mut guess = x;
    let mut next = (guess + 1) / 2;
    while next < guess {
        guess = next;
        next = (guess + x / guess) / 2;
    }
    guess
}

/// Chi-square goodness-of-fit against a uniform byte distribution, compared
/// against a threshold a few standard deviations above the 255-degrees-of-
/// freedom expectation. True random data overwhelmingly passes; structured
/// data (even without long matches) overwhelmingly fails.
fn chi_square_is_uniform(data: &[u8]) -> bool {
    let n = data.len() as u64;
    if n < 256 {
        return false;
    }
    let mut counts = [0u32; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let expected = n / 256;
    if expected == 0 {
        return false;
    }
    let mut sum = 0u64;
    for &c in &counts {
        let diff = (c as i64 - expected as i64).unsigned_abs();
        sum += diff * diff;
    }
    let chi_square = sum / expected;
    let threshold = 255 + 3 * isqrt(2 * 255);
    chi_square <= threshold
}
