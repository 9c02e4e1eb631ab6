//! LZMA2 encoder internals: range coder, probability model, radix match
//! finder, and per-block chunk framer.
//!
//! [`lzma`] is kept only as a thin decode oracle (`Lzma2Decoder`, wrapping
//! `lzma_rust2`) used by tests to check this crate's encoder output; this
//! crate does not ship a decompressor.

/// LZMA2 decode oracle, used by tests.
pub mod lzma;

/// The multi-threaded BUILD/ENC/WRITE pipeline coordinator.
pub mod lzma2_parallel;

/// Per-block chunk framer: parser dispatch, chunking, and the
/// incompressibility fallback.
pub mod fast_lzma2;

/// LZMA2 range-coded fast and optimal parsers, and the chunk header codec.
pub mod fast_lzma2_encode;

pub(crate) mod lzma_rc;

pub(crate) mod lzma_context;

pub(crate) mod price_table;

/// The radix-sort match finder.
pub(crate) mod radix_mf;
