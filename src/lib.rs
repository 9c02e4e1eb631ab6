//! A multi-threaded LZMA2 encoder core built around a radix match finder.
//!
//! This crate implements the compression side of the Fast LZMA2 design: a
//! radix-sort-based match finder ([`codec::radix_mf`]), an LZMA2 range coder
//! and optimal parser ([`codec::fast_lzma2`], [`codec::fast_lzma2_encode`]),
//! and a [`Coordinator`] that fans a compression job out across a fixed
//! worker pool using a three-phase BUILD/ENC/WRITE protocol.
//!
//! It does not implement decompression, archive formats, encryption, or any
//! other codec; [`codec::lzma`] carries a thin LZMA2 decoder used only as a
//! test oracle, wrapping the `lzma_rust2` crate.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use flzma2::{FastLzma2Encoder, FastLzma2Options, Result};
//! use std::io::Cursor;
//!
//! fn compress(data: &[u8]) -> Result<Vec<u8>> {
//!     let mut out = Vec::new();
//!     let mut encoder = FastLzma2Encoder::new(Cursor::new(&mut out), FastLzma2Options::default())?;
//!     encoder.compress_block(data)?;
//!     encoder.finish()?;
//!     Ok(out)
//! }
//! ```
//!
//! For direct control over the worker pool, build a [`Coordinator`] and call
//! [`Coordinator::compress`] on a single in-memory buffer.
#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod codec;
mod data_block;
mod encoder;
mod error;
mod options;

pub use codec::lzma2_parallel::{Coordinator, LZMA2_TIMEOUT};
pub use data_block::DataBlock;
pub use encoder::FastLzma2Encoder;
pub use error::{Error, Result};
pub use options::{
    Action, FastLzma2Options, Status, Strategy, DEPTH_MAX, DEPTH_MIN, DICTIONARY_SIZE_MAX,
    DICTIONARY_SIZE_MIN, LZMA_LCLP_MAX, LZMA_THREADS_MAX, MATCH_LEN_MAX, MATCH_LEN_MIN,
    NEAR_DEPTH_MAX, NEAR_DEPTH_MIN, NEAR_DICT_SIZE_LOG_MAX, NEAR_DICT_SIZE_LOG_MIN, OVERLAP_MAX,
};
