//! Radix match finder.
//!
//! Builds, for every position in `[0, end)` of a dictionary buffer, either
//! `NULL` or a `(link, length)` pair pointing at the nearest earlier
//! occurrence of the string starting there. The table is built in two
//! phases: a single-threaded radix-by-two-bytes initialization (Phase A)
//! that chains every position into one of 65,536 lists, followed by a
//! worker pool that claims lists atomically and resolves each one by
//! recursive byte-at-a-time partitioning (Phase D), with repeat
//! suppression for long constant-stride runs so pathological inputs (long
//! zero runs, `ababab...`) stay linear instead of quadratic.
//!
//! # Reference
//!
//! Based on the Fast LZMA2 library by Conor McCarthy.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

/// Lists with at most this many members are resolved by all-pairs compare
/// rather than further radix partitioning.
pub const MAX_BRUTE_FORCE_LIST_SIZE: usize = 5;

/// Threshold above which a run of constant-stride positions (distance 1 or
/// 2 apart) is resolved directly instead of through radix partitioning.
pub const MAX_REPEAT: usize = 24;

pub const MATCH_LEN_MIN: u32 = 2;
pub const MATCH_LEN_MAX: u32 = 273;

/// Dictionary sizes at or below this select the bitpack table (26-bit link,
/// 6-bit length); larger dictionaries select the structured table (32-bit
/// link, 8-bit length) so lengths up to `MATCH_LEN_MAX` are representable.
pub const BITPACK_DICT_SIZE_MAX: u32 = 1 << 26;

const NULL_LINK: u32 = u32::MAX;
const BITPACK_MAX_LENGTH: u32 = 63;
const STRUCTURED_MAX_LENGTH: u32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Bitpack,
    Structured,
}

/// Owns the per-position link/length arrays.
///
/// Writes during BUILD touch disjoint positions only (every position
/// belongs to exactly one radix list, and lists are claimed exclusively),
/// so plain atomic stores are enough to let workers share `&RadixMatchFinder`
/// without a mutex; the `thread::scope` join that follows BUILD supplies the
/// happens-before edge the ENC phase needs to observe the writes.
struct MatchTableStorage {
    variant: Variant,
    links: Vec<AtomicU32>,
    lengths: Vec<AtomicU8>,
}

impl MatchTableStorage {
    fn new(len: usize, variant: Variant) -> Self {
        let mut links = Vec::with_capacity(len);
        links.resize_with(len, || AtomicU32::new(NULL_LINK));
        let mut lengths = Vec::with_capacity(len);
        lengths.resize_with(len, || AtomicU8::new(0));
        MatchTableStorage { variant, links, lengths }
    }

    fn max_length(&self) -> u32 {
        match self.variant {
            Variant::Bitpack => BITPACK_MAX_LENGTH,
            Variant::Structured => STRUCTURED_MAX_LENGTH,
        }
    }

    fn len(&self) -> usize {
        self.links.len()
    }

    fn get(&self, pos: usize) -> Option<(u32, u32)> {
        let link = self.links[pos].load(Ordering::Relaxed);
        if link == NULL_LINK {
            return None;
        }
        Some((link, self.lengths[pos].load(Ordering::Relaxed) as u32))
    }

    fn set(&self, pos: usize, link: u32, length: u32) {
        let length = length.min(self.max_length());
        self.links[pos].store(link, Ordering::Relaxed);
        self.lengths[pos].store(length as u8, Ordering::Relaxed);
    }

    fn clear(&self, pos: usize) {
        self.links[pos].store(NULL_LINK, Ordering::Relaxed);
    }

    fn reset(&self) {
        for l in &self.links {
            l.store(NULL_LINK, Ordering::Relaxed);
        }
    }
}

fn radix16(data: &[u8], i: usize) -> u16 {
    ((data[i] as u16) << 8) | data[i + 1] as u16
}

fn common_prefix_len(data: &[u8], a: usize, b: usize, end: usize, cap: u32) -> u32 {
    let max_len = (end - b).min(cap as usize);
    let mut len = 0;
    while len < max_len && data[a + len] == data[b + len] {
        len += 1;
    }
    len as u32
}

/// The shared build table plus the atomic work-claiming cursor over its
/// 65,536 radix lists.
pub struct RadixMatchFinder {
    table: MatchTableStorage,
    heads: Vec<u32>,
    counts: Vec<u32>,
    used_radixes: Vec<u16>,
    cursor: AtomicUsize,
    depth_cap: u32,
}

impl RadixMatchFinder {
    /// Creates a finder sized for dictionary windows up to `dict_size`
    /// bytes, selecting the bitpack or structured table layout accordingly.
    /// `depth` is the caller-resolved match-length cap (the options' `depth`
    /// knob, already resolved via [`crate::FastLzma2Options::resolved_depth`]):
    /// no match this finder reports, either from the build tables or from
    /// [`extend_match`]'s read-time extension, will exceed it.
    pub fn new(dict_size: u32, depth: u32) -> Self {
        let variant = if dict_size > BITPACK_DICT_SIZE_MAX {
            Variant::Structured
        } else {
            Variant::Bitpack
        };
        let table = MatchTableStorage::new(dict_size as usize, variant);
        let depth_cap = depth.min(table.max_length());
        RadixMatchFinder {
            table,
            heads: vec![NULL_LINK; 65_536],
            counts: vec![0; 65_536],
            used_radixes: Vec::new(),
            cursor: AtomicUsize::new(0),
            depth_cap,
        }
    }

    pub fn max_length(&self) -> u32 {
        self.table.max_length()
    }

    /// The smaller of the table's storage width and the caller's `depth`
    /// option: the cap every reported match length respects.
    pub fn depth_cap(&self) -> u32 {
        self.depth_cap
    }

    /// Looks up the stored `(link, length)` at `pos`.
    pub fn get(&self, pos: usize) -> Option<(u32, u32)> {
        self.table.get(pos)
    }

    /// Phase A: single-threaded initialization. Walks `0..end-1`, chaining
    /// every position into the list for its leading 16-bit radix.
    pub fn build_init(&mut self, data: &[u8], end: usize) {
        debug_assert!(end <= self.table.len());
        self.heads.fill(NULL_LINK);
        self.counts.fill(0);
        self.used_radixes.clear();
        self.table.reset();
        self.cursor.store(0, Ordering::SeqCst);

        if end < 2 {
            return;
        }
        for i in 0..end - 1 {
            let r = radix16(data, i) as usize;
            let prev = self.heads[r];
            if prev == NULL_LINK {
                self.used_radixes.push(r as u16);
            } else {
                self.table.set(i, prev, 2);
            }
            self.heads[r] = i as u32;
            self.counts[r] += 1;
        }
    }

    /// Re-initializes list heads after a cancelled build so the next
    /// `build_init` starts clean. Cheap: `build_init` already clears
    /// everything it touches, so this exists to make the post-cancel
    /// contract explicit at call sites.
    pub fn reset_incomplete_build(&mut self) {
        self.heads.fill(NULL_LINK);
        self.counts.fill(0);
        self.used_radixes.clear();
        self.cursor.store(0, Ordering::SeqCst);
    }

    /// Phase B: atomically claims the next unclaimed radix list. Returns
    /// `None` once every list has been claimed or the build was cancelled.
    pub fn claim_next_list(&self) -> (Option<u16>, u32) {
        let idx = self.cursor.fetch_add(1, Ordering::AcqRel);
        if idx >= self.used_radixes.len() {
            return (None, 0);
        }
        let r = self.used_radixes[idx];
        (Some(r), self.counts[r as usize])
    }

    /// Cancels an in-progress build: every worker's next `claim_next_list`
    /// call observes the cursor past `used_radixes.len()` and returns.
    pub fn cancel(&self) {
        self.cursor.fetch_add(1_000_000_000, Ordering::SeqCst);
    }

    /// Resolves one claimed list (Phase D). Safe to call from any worker
    /// concurrently with other workers resolving other lists: every
    /// position belongs to exactly one list, so writes never collide.
    pub fn process_claimed_list(&self, radix: u16, data: &[u8], end: usize) {
        let head = self.heads[radix as usize];
        if head == NULL_LINK {
            return;
        }
        let mut positions = Vec::new();
        let mut p = head;
        loop {
            positions.push(p);
            match self.table.get(p as usize) {
                Some((link, 2)) => p = link,
                _ => break,
            }
        }
        // Phase A only ever set length=2 links for same-radix chaining;
        // clear them so Phase D's own resolution (which may find a longer
        // or different nearest predecessor once full byte comparison runs)
        // is authoritative.
        for &pos in &positions {
            self.table.clear(pos as usize);
        }

        let positions = self.suppress_repeats(positions, data, end, 2);
        self.build_list(&positions, 2, data, end);
    }

    /// Detects runs of positions spaced 1 or 2 bytes apart (the signature
    /// of long literal runs like all-zero or `abab...` data) longer than
    /// `MAX_REPEAT`, and resolves everything but the run's first element
    /// directly rather than letting radix partitioning degrade toward
    /// quadratic behavior on them.
    fn suppress_repeats(&self, mut positions: Vec<u32>, _data: &[u8], end: usize, depth: u32) -> Vec<u32> {
        positions.sort_unstable();
        let mut out = Vec::with_capacity(positions.len());
        let mut i = 0;
        while i < positions.len() {
            let mut j = i + 1;
            let mut stride = None;
            while j < positions.len() {
                let d = positions[j] - positions[j - 1];
                if d == 1 || d == 2 {
                    match stride {
                        None => stride = Some(d),
                        Some(s) if s == d => {}
                        _ => break,
                    }
                    j += 1;
                } else {
                    break;
                }
            }
            let run_len = j - i;
            if run_len > MAX_REPEAT {
                let stride = stride.unwrap();
                out.push(positions[i]);
                for (k, &pos) in positions.iter().enumerate().take(j).skip(i + 1) {
                    let link = pos - stride;
                    let room = (end - pos as usize) as u32;
                    if room < MATCH_LEN_MIN {
                        continue;
                    }
                    let length = (depth + (k - i) as u32 - 1).min(room).min(self.depth_cap);
                    self.table.set(pos as usize, link, length);
                }
                i = j;
            } else {
                out.push(positions[i]);
                i += 1;
            }
        }
        out
    }

    /// Resolves `positions` (all sharing a `depth`-byte common prefix) by
    /// brute force once the group is small enough, otherwise partitions by
    /// the next byte and recurses. Stops partitioning once `depth` reaches
    /// `depth_cap`: every position in the group already shares that many
    /// bytes, so no further split can change the capped length brute force
    /// reports for it.
    fn build_list(&self, positions: &[u32], depth: u32, data: &[u8], end: usize) {
        if positions.len() <= 1 {
            return;
        }
        if positions.len() <= MAX_BRUTE_FORCE_LIST_SIZE || depth >= self.depth_cap {
            self.brute_force(positions, data, end);
            return;
        }

        let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); 256];
        let mut overflow = Vec::new();
        for &pos in positions {
            let idx = pos as usize + depth as usize;
            if idx >= end {
                overflow.push(pos);
            } else {
                buckets[data[idx] as usize].push(pos);
            }
        }
        if overflow.len() > 1 {
            self.brute_force(&overflow, data, end);
        }
        for bucket in buckets {
            if bucket.len() > 1 {
                self.build_list(&bucket, depth + 1, data, end);
            }
        }
    }

    /// All-pairs resolution: for each position, finds the nearest earlier
    /// member of the same group and links to it.
    fn brute_force(&self, positions: &[u32], data: &[u8], end: usize) {
        for &pos in positions {
            let mut best_link = None;
            let mut best_len = 0u32;
            for &other in positions {
                if other >= pos {
                    continue;
                }
                let len = common_prefix_len(data, other as usize, pos as usize, end, self.depth_cap);
                if len > best_len {
                    best_len = len;
                    best_link = Some(other);
                }
            }
            if let (Some(link), true) = (best_link, best_len >= MATCH_LEN_MIN) {
                self.table.set(pos as usize, link, best_len);
            }
        }
    }

    /// Phase E: clamps every stored length so no match extends past `end`,
    /// nulling out cells that would otherwise fall below `MATCH_LEN_MIN`.
    pub fn limit_lengths(&self, end: usize) {
        for pos in 0..end.min(self.table.len()) {
            if let Some((link, length)) = self.table.get(pos) {
                let room = (end - pos) as u32;
                if room < MATCH_LEN_MIN {
                    self.table.clear(pos);
                } else if length > room {
                    self.table.set(pos, link, room);
                }
            }
        }
    }
}

/// Phase E read-time extension: walks forward past the stored length using
/// same-distance continuation, then falls back to direct byte comparison up
/// to `depth_cap` (see [`RadixMatchFinder::depth_cap`]).
pub fn extend_match(data: &[u8], pos: usize, limit: usize, link: usize, stored_length: u32, depth_cap: u32) -> u32 {
    let dist = pos - link;
    let max_len = (limit - pos).min(depth_cap as usize) as u32;
    let mut len = stored_length.min(max_len);
    while len < max_len && data[pos + len as usize] == data[pos + len as usize - dist] {
        len += 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(data: &[u8]) -> RadixMatchFinder {
        build_with_depth(data, 254)
    }

    fn build_with_depth(data: &[u8], depth: u32) -> RadixMatchFinder {
        let mut rmf = RadixMatchFinder::new(1 << 20, depth);
        rmf.build_init(data, data.len());
        loop {
            let (radix, _count) = rmf.claim_next_list();
            match radix {
                Some(r) => rmf.process_claimed_list(r, data, data.len()),
                None => break,
            }
        }
        rmf.limit_lengths(data.len());
        rmf
    }

    #[test]
    fn match_validity_holds_across_a_repeated_pattern() {
        let data = b"abcabcabcabc";
        let rmf = build(data);
        for pos in 0..data.len() {
            if let Some((link, length)) = rmf.get(pos) {
                assert!((link as usize) < pos);
                for k in 0..length as usize {
                    assert_eq!(data[link as usize + k], data[pos + k]);
                }
            }
        }
    }

    #[test]
    fn length_never_exceeds_remaining_bytes() {
        let data = b"hello world hello world hello";
        let rmf = build(data);
        for pos in 0..data.len() {
            if let Some((_, length)) = rmf.get(pos) {
                assert!(pos + length as usize <= data.len());
            }
        }
    }

    #[test]
    fn monotone_precedence() {
        let data = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let rmf = build(data);
        for pos in 0..data.len() {
            if let Some((link, _)) = rmf.get(pos) {
                assert!((link as usize) < pos);
            }
        }
    }

    #[test]
    fn long_zero_run_triggers_repeat_suppression_and_stays_correct() {
        let data = vec![0u8; 10_000];
        let rmf = build(&data);
        // A long constant run should still satisfy the match invariant
        // everywhere, even though most of it bypassed radix partitioning.
        for pos in 2..data.len() {
            if let Some((link, length)) = rmf.get(pos) {
                assert!((link as usize) < pos);
                assert!(pos + length as usize <= data.len());
            }
        }
        assert!(rmf.get(9000).is_some());
    }

    #[test]
    fn limit_lengths_never_reaches_past_a_truncated_end() {
        let data = b"abcabcabcabcXYZ";
        let mut rmf = RadixMatchFinder::new(1 << 20, 254);
        rmf.build_init(data, data.len());
        loop {
            let (radix, _) = rmf.claim_next_list();
            match radix {
                Some(r) => rmf.process_claimed_list(r, data, data.len()),
                None => break,
            }
        }
        let truncated_end = 10;
        rmf.limit_lengths(truncated_end);
        for pos in 0..truncated_end {
            if let Some((_, length)) = rmf.get(pos) {
                assert!(pos + length as usize <= truncated_end);
            }
        }
    }

    #[test]
    fn no_match_before_any_prior_occurrence() {
        let data = b"abcdefgh";
        let rmf = build(data);
        assert!(rmf.get(0).is_none());
    }

    #[test]
    fn extend_match_walks_past_the_stored_hint() {
        let data = b"abcdefabcdefgh";
        let extended = extend_match(data, 6, data.len(), 0, 2, 254);
        assert_eq!(extended, 6);
    }

    #[test]
    fn extend_match_stops_at_the_depth_cap() {
        let data = b"abcdefabcdefgh";
        let extended = extend_match(data, 6, data.len(), 0, 2, 4);
        assert_eq!(extended, 4);
    }

    #[test]
    fn structured_variant_selected_above_64mib_dict() {
        let rmf = RadixMatchFinder::new(BITPACK_DICT_SIZE_MAX + 1, 254);
        assert_eq!(rmf.max_length(), STRUCTURED_MAX_LENGTH);
        let rmf = RadixMatchFinder::new(BITPACK_DICT_SIZE_MAX, 254);
        assert_eq!(rmf.max_length(), BITPACK_MAX_LENGTH);
    }

    #[test]
    fn depth_cap_is_the_lesser_of_the_option_and_the_table_width() {
        let rmf = RadixMatchFinder::new(BITPACK_DICT_SIZE_MAX, 254);
        assert_eq!(rmf.depth_cap(), BITPACK_MAX_LENGTH);
        let rmf = RadixMatchFinder::new(BITPACK_DICT_SIZE_MAX, 20);
        assert_eq!(rmf.depth_cap(), 20);
    }

    #[test]
    fn no_reported_match_exceeds_the_configured_depth() {
        let data = b"abcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabc".repeat(4);
        let rmf = build_with_depth(&data, 6);
        for pos in 0..data.len() {
            if let Some((_, length)) = rmf.get(pos) {
                assert!(length <= 6, "length {length} exceeds depth cap 6 at {pos}");
            }
        }
    }

    #[test]
    fn cancel_makes_subsequent_claims_return_none() {
        let mut rmf = RadixMatchFinder::new(1024, 254);
        let data = b"abcabcabc";
        rmf.build_init(data, data.len());
        rmf.cancel();
        assert!(rmf.claim_next_list().0.is_none());
    }

    use proptest::prelude::*;

    proptest! {
        /// Match validity and monotone precedence over arbitrary byte
        /// strings on a small alphabet (kept small so positions actually
        /// repeat and the table is non-trivially populated).
        #[test]
        fn match_validity_and_precedence_hold_on_random_inputs(
            data in proptest::collection::vec(0u8..4, 0..512)
        ) {
            let rmf = build(&data);
            for pos in 0..data.len() {
                if let Some((link, length)) = rmf.get(pos) {
                    prop_assert!((link as usize) < pos);
                    prop_assert!(pos + length as usize <= data.len());
                    for k in 0..length as usize {
                        prop_assert_eq!(data[link as usize + k], data[pos + k]);
                    }
                }
            }
        }

        /// `limit_lengths(end)` never leaves a stored length reaching past
        /// an arbitrary truncation point.
        #[test]
        fn limit_lengths_respects_any_truncation(
            data in proptest::collection::vec(0u8..4, 1..512),
            cut in 0usize..512,
        ) {
            let truncated_end = cut.min(data.len());
            let mut rmf = RadixMatchFinder::new(1 << 20, 254);
            rmf.build_init(&data, data.len());
            loop {
                match rmf.claim_next_list() {
                    (Some(r), _) => rmf.process_claimed_list(r, &data, data.len()),
                    (None, _) => break,
                }
            }
            rmf.limit_lengths(truncated_end);
            for pos in 0..truncated_end {
                if let Some((_, length)) = rmf.get(pos) {
                    prop_assert!(pos + length as usize <= truncated_end);
                }
            }
        }
    }
}
