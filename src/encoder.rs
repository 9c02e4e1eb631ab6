//! `Write`-based front end over the [`Coordinator`] pipeline.
//!
//! The radix match finder needs the whole window available before it can
//! build its lists, so this encoder buffers everything passed to
//! [`compress_block`][FastLzma2Encoder::compress_block] and only runs the
//! pipeline once, in [`finish`][FastLzma2Encoder::finish]. It exists so
//! callers get the same `Write`-sink-based shape as the rest of this crate's
//! API (and the teacher library's own codec wrappers) rather than having to
//! call [`Coordinator::compress`] directly.

use std::io::Write;

use crate::codec::lzma2_parallel::Coordinator;
use crate::error::Result;
use crate::options::FastLzma2Options;

/// Buffers input and drives a [`Coordinator`] over it on [`finish`][Self::finish].
pub struct FastLzma2Encoder<W: Write> {
    output: W,
    opts: FastLzma2Options,
    pending: Vec<u8>,
}

impl<W: Write> std::fmt::Debug for FastLzma2Encoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastLzma2Encoder")
            .field("opts", &self.opts)
            .field("pending_len", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<W: Write> FastLzma2Encoder<W> {
    /// Creates a new encoder writing to `output` once [`finish`][Self::finish]
    /// is called.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Options`] if `opts` fails validation.
    pub fn new(output: W, opts: FastLzma2Options) -> Result<Self> {
        opts.validate()?;
        Ok(Self {
            output,
            opts,
            pending: Vec::new(),
        })
    }

    /// Appends `data` to the pending input. No compression happens until
    /// [`finish`][Self::finish] is called.
    pub fn compress_block(&mut self, data: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(data);
        Ok(())
    }

    /// Runs the pipeline over all buffered input and writes the complete
    /// compressed stream (including the LZMA2 terminator) to the output sink.
    pub fn finish(mut self) -> Result<W> {
        let coordinator = Coordinator::new(self.opts.clone())?;
        let compressed = coordinator.compress(&self.pending)?;
        self.output.write_all(&compressed)?;
        Ok(self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::lzma::{encode_lzma2_dict_size, Lzma2Decoder};
    use std::io::{Cursor, Read};

    #[test]
    fn compress_block_then_finish_round_trips() {
        let data = b"Hello, World! This is a test of LZMA2 compression.".repeat(4);
        let opts = FastLzma2Options::default();
        let props = vec![encode_lzma2_dict_size(opts.dict_size)];

        let mut out = Vec::new();
        let encoder = FastLzma2Encoder::new(Cursor::new(&mut out), opts).unwrap();
        let mut encoder = encoder;
        encoder.compress_block(&data[..data.len() / 2]).unwrap();
        encoder.compress_block(&data[data.len() / 2..]).unwrap();
        encoder.finish().unwrap();

        let mut decoder = Lzma2Decoder::new(Cursor::new(&out), &props).unwrap();
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn finish_with_no_input_yields_just_the_terminator() {
        let opts = FastLzma2Options::default();
        let out = Vec::new();
        let encoder = FastLzma2Encoder::new(Cursor::new(out), opts).unwrap();
        let out = encoder.finish().unwrap();
        assert_eq!(out.into_inner(), vec![0u8]);
    }

    #[test]
    fn rejects_invalid_options() {
        let mut opts = FastLzma2Options::default();
        opts.pb = 9;
        let out = Vec::new();
        assert!(FastLzma2Encoder::new(Cursor::new(out), opts).is_err());
    }
}
