//! Encoder options and presets.
//!
//! [`FastLzma2Options`] gathers every knob the radix-match-finder pipeline
//! recognizes (dictionary size, overlap, RMF depth, parser mode, LZMA literal
//! context bits, thread count). [`FastLzma2Options::validate`] checks the
//! constraints the design calls out before a [`crate::FastLzma2Encoder`] or
//! [`crate::Coordinator`] is built from them.

use crate::error::{Error, Result};

/// Minimum dictionary size: `2^12`.
pub const DICTIONARY_SIZE_MIN: u32 = 1 << 12;
/// Maximum dictionary size: `3 * 2^29`.
pub const DICTIONARY_SIZE_MAX: u32 = 3 * (1 << 29);
/// Maximum RMF match length the depth option may request.
pub const DEPTH_MAX: u32 = 254;
/// Minimum RMF match length the depth option may request.
pub const DEPTH_MIN: u32 = 6;
/// Maximum overlap fraction (16ths of the dictionary window).
pub const OVERLAP_MAX: u32 = 14;
/// `lc + lp` may not exceed this.
pub const LZMA_LCLP_MAX: u32 = 4;
/// Largest `threads` value accepted.
pub const LZMA_THREADS_MAX: u32 = 200;
/// Smallest/largest `nice_len`.
pub const MATCH_LEN_MIN: u32 = 2;
pub const MATCH_LEN_MAX: u32 = 273;
/// Bound for the ultra-mode hash-chain size log.
pub const NEAR_DICT_SIZE_LOG_MIN: u32 = 4;
pub const NEAR_DICT_SIZE_LOG_MAX: u32 = 14;
/// Bound for the ultra-mode hash cycle count.
pub const NEAR_DEPTH_MIN: u32 = 1;
pub const NEAR_DEPTH_MAX: u32 = 64;

/// Parser strategy: how much effort the LZMA2 encoder spends per byte.
///
/// `Fast` uses the greedy/lazy parser of §4.4; `Normal` and `Ultra` both use
/// the optimal (dynamic-programming) parser of §4.5, with `Ultra` additionally
/// consulting a short hash chain for near matches the RMF itself would not
/// return as cheaply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Greedy/lazy parser; fastest, lowest ratio.
    Fast,
    /// Optimal parser without the auxiliary hash chain.
    #[default]
    Normal,
    /// Optimal parser with the ultra-mode near-match hash chain.
    Ultra,
}

/// Action requested of the encoder for one call into the pipeline.
///
/// Mirrors the upstream contract in the design: every call advances input and
/// output positions and returns a [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Consume as much input as fits and return; more input may follow.
    Run,
    /// Flush pending output without resetting encoder state; dictionary reset.
    SyncFlush,
    /// Flush and reset the LZMA state and dictionary.
    FullFlush,
    /// Flush, reset state and dictionary, and insert a barrier chunk boundary.
    FullBarrier,
    /// No more input will be supplied; flush and terminate the stream.
    Finish,
}

/// Outcome of one encoder call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Call completed normally; more calls may follow.
    Ok,
    /// The stream terminator was written; no further input is accepted.
    StreamEnd,
    /// Worker coordination exceeded the configured timeout.
    TimedOut,
    /// Allocation failure.
    MemError,
    /// An option constraint was violated.
    OptionsError,
    /// Reserved for decoder use.
    DataError,
    /// Caller's output buffer could not absorb a mandatory emission.
    BufError,
    /// Internal invariant breach.
    ProgError,
}

/// Complete set of tunables for the radix-match-finder LZMA2 pipeline.
///
/// Every field has the range given in the design's options table. Call
/// [`validate`][Self::validate] before constructing a [`crate::Coordinator`]
/// (the coordinator's constructors do this for you).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastLzma2Options {
    /// Sliding-window size in bytes, `[2^12, 3*2^29]`.
    pub dict_size: u32,
    /// How many 16ths of `dict_size` carry over between blocks, `[0, 14]`.
    pub overlap_fraction: u32,
    /// Max RMF-reported match length, `[6, 254]`, always forced even. `0` means auto.
    pub depth: u32,
    /// Ultra-mode hash-chain table size log, `[4, 14]`.
    pub near_dict_size_log: u32,
    /// Ultra-mode hash cycle count, `[1, 64]`.
    pub near_depth: u32,
    /// Parser strategy.
    pub mode: Strategy,
    /// Fast-length threshold at which the parser stops searching and commits.
    pub nice_len: u32,
    /// LZMA literal context bits.
    pub lc: u32,
    /// LZMA literal position bits.
    pub lp: u32,
    /// LZMA position bits.
    pub pb: u32,
    /// Worker thread count, `[1, 200]`.
    pub threads: u32,
}

impl Default for FastLzma2Options {
    fn default() -> Self {
        // Level-5-equivalent defaults: balanced dictionary and Normal mode.
        FastLzma2Options {
            dict_size: 1 << 24,
            overlap_fraction: 2,
            depth: 0,
            near_dict_size_log: 8,
            near_depth: 8,
            mode: Strategy::Normal,
            nice_len: 64,
            lc: 3,
            lp: 0,
            pb: 2,
            threads: 1,
        }
    }
}

impl FastLzma2Options {
    /// Builds options from a classic `level` (1-9) and an `extreme` flag,
    /// following the preset table in the design (§6 Presets).
    pub fn from_preset(level: u32, extreme: bool) -> Result<Self> {
        let level = level.clamp(1, 9);
        const DICT_POW2: [u32; 10] = [0, 20, 21, 22, 23, 24, 25, 26, 27, 27];
        const DEPTH_TABLE: [u32; 10] = [0, 6, 8, 12, 20, 32, 48, 64, 96, 128];
        let dict_size = 1u32 << DICT_POW2[level as usize];
        let mode = match level {
            1..=2 => Strategy::Fast,
            3..=5 => Strategy::Normal,
            _ => Strategy::Ultra,
        };
        let mut opts = FastLzma2Options {
            dict_size,
            overlap_fraction: if level <= 5 { 2 } else { 4 },
            depth: DEPTH_TABLE[level as usize],
            near_dict_size_log: 6 + level.min(8),
            near_depth: 4 + level * 2,
            mode,
            nice_len: 32 + level * 8,
            lc: 3,
            lp: 0,
            pb: 2,
            threads: 1,
        };
        if extreme {
            opts.mode = Strategy::Ultra;
            opts.nice_len = MATCH_LEN_MAX;
            opts.depth = DEPTH_MAX;
            opts.near_dict_size_log = NEAR_DICT_SIZE_LOG_MAX;
            opts.near_depth = 16;
            opts.overlap_fraction = 4;
        }
        opts.validate()?;
        Ok(opts)
    }

    /// Resolves `depth == 0` ("auto") into the concrete, even RMF depth the
    /// design specifies: `42 + (dict_size >> 25) * 4`, clamped to
    /// `[DEPTH_MIN, DEPTH_MAX]` and forced even.
    pub fn resolved_depth(&self) -> u32 {
        let raw = if self.depth == 0 {
            42 + (self.dict_size >> 25) * 4
        } else {
            self.depth
        };
        let clamped = raw.clamp(DEPTH_MIN, DEPTH_MAX);
        clamped & !1
    }

    /// Checks every field against its documented range, returning a
    /// descriptive [`Error::Options`] on the first violation found.
    pub fn validate(&self) -> Result<()> {
        if !(DICTIONARY_SIZE_MIN..=DICTIONARY_SIZE_MAX).contains(&self.dict_size) {
            return Err(Error::options(format!(
                "dict_size {} outside [{DICTIONARY_SIZE_MIN}, {DICTIONARY_SIZE_MAX}]",
                self.dict_size
            )));
        }
        if self.overlap_fraction > OVERLAP_MAX {
            return Err(Error::options(format!(
                "overlap_fraction {} exceeds {OVERLAP_MAX}",
                self.overlap_fraction
            )));
        }
        if self.depth != 0 && !(DEPTH_MIN..=DEPTH_MAX).contains(&self.depth) {
            return Err(Error::options(format!(
                "depth {} outside [{DEPTH_MIN}, {DEPTH_MAX}] (use 0 for auto)",
                self.depth
            )));
        }
        if !(NEAR_DICT_SIZE_LOG_MIN..=NEAR_DICT_SIZE_LOG_MAX).contains(&self.near_dict_size_log) {
            return Err(Error::options(format!(
                "near_dict_size_log {} outside [{NEAR_DICT_SIZE_LOG_MIN}, {NEAR_DICT_SIZE_LOG_MAX}]",
                self.near_dict_size_log
            )));
        }
        if !(NEAR_DEPTH_MIN..=NEAR_DEPTH_MAX).contains(&self.near_depth) {
            return Err(Error::options(format!(
                "near_depth {} outside [{NEAR_DEPTH_MIN}, {NEAR_DEPTH_MAX}]",
                self.near_depth
            )));
        }
        if !(MATCH_LEN_MIN..=MATCH_LEN_MAX).contains(&self.nice_len) {
            return Err(Error::options(format!(
                "nice_len {} outside [{MATCH_LEN_MIN}, {MATCH_LEN_MAX}]",
                self.nice_len
            )));
        }
        if self.lc + self.lp > LZMA_LCLP_MAX {
            return Err(Error::options(format!(
                "lc + lp = {} exceeds {LZMA_LCLP_MAX}",
                self.lc + self.lp
            )));
        }
        if self.pb > 4 {
            return Err(Error::options(format!("pb {} exceeds 4", self.pb)));
        }
        if !(1..=LZMA_THREADS_MAX).contains(&self.threads) {
            return Err(Error::options(format!(
                "threads {} outside [1, {LZMA_THREADS_MAX}]",
                self.threads
            )));
        }
        Ok(())
    }

    /// `true` when `dict_size` requires the structured (4-position unit)
    /// match-table layout rather than the bitpack layout.
    pub fn needs_structured_table(&self) -> bool {
        self.dict_size > (1 << 26)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_validate() {
        assert!(FastLzma2Options::default().validate().is_ok());
    }

    #[test]
    fn rejects_dict_size_out_of_range() {
        let mut opts = FastLzma2Options::default();
        opts.dict_size = 1024;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn rejects_lc_lp_over_max() {
        let mut opts = FastLzma2Options::default();
        opts.lc = 4;
        opts.lp = 2;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn auto_depth_is_even_and_in_range() {
        let mut opts = FastLzma2Options::default();
        opts.depth = 0;
        opts.dict_size = 1 << 27;
        let d = opts.resolved_depth();
        assert_eq!(d % 2, 0);
        assert!(d >= DEPTH_MIN && d <= DEPTH_MAX);
    }

    #[test]
    fn presets_cover_all_levels() {
        for level in 1..=9u32 {
            let opts = FastLzma2Options::from_preset(level, false).unwrap();
            assert!(opts.validate().is_ok());
            let opts = FastLzma2Options::from_preset(level, true).unwrap();
            assert_eq!(opts.mode, Strategy::Ultra);
        }
    }

    #[test]
    fn structured_table_selection_boundary() {
        let mut opts = FastLzma2Options::default();
        opts.dict_size = 1 << 26;
        assert!(!opts.needs_structured_table());
        opts.dict_size = (1 << 26) + 1;
        assert!(opts.needs_structured_table());
    }
}
