//! Error types for the LZMA2 radix-match-finder encoder core.
//!
//! This module provides the [`Error`] enum used across the range coder,
//! match finder, and pipeline coordinator, along with a convenient
//! [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. You can
//! handle errors using pattern matching or the `?` operator:
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
use std::io;

/// The main error type for the LZMA2 radix match-finder core.
///
/// Each variant corresponds to one of the error kinds the design calls out:
/// memory, options, program (internal invariant), timed-out, buffer, and the
/// I/O boundary used by the `Write`-based encoder API. `Data` is reserved for
/// decoder use and is not constructed by this crate, which implements only
/// the encoder.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while writing to the caller-supplied output sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Allocation failure (dictionary buffer, match table, or worker state).
    #[error("memory allocation failed: {0}")]
    Memory(String),

    /// An options constraint was violated.
    ///
    /// Returned by [`crate::options::FastLzma2Options::validate`] and by
    /// constructors that build a table directly from caller-supplied sizes.
    #[error("invalid option: {0}")]
    Options(String),

    /// An internal invariant was breached.
    ///
    /// This covers a compressed chunk overrunning `CHUNK_COMPRESSED_MAX`, a
    /// worker reporting an unrecoverable failure, or the overtake invariant
    /// (see the concurrency design notes) failing its assertion.
    #[error("internal invariant violated: {0}")]
    Program(String),

    /// Worker coordination exceeded the configured timeout.
    ///
    /// The pipeline's workers are left in their current state; the caller
    /// may retry by calling into the coordinator again.
    #[error("worker coordination timed out after {0:?}")]
    TimedOut(std::time::Duration),

    /// The caller's output buffer could not absorb a mandatory emission.
    #[error("output buffer exhausted: {0}")]
    Buffer(String),

    /// Reserved for decoder use; the encoder in this crate never produces it.
    #[error("data error: {0}")]
    Data(String),
}

impl Error {
    /// Returns `true` if retrying the same operation might succeed.
    ///
    /// Timeouts leave the worker pool in a well-defined state and are safe to
    /// retry; every other kind indicates either a programmer error (`Options`,
    /// `Program`) or a resource condition (`Memory`, `Buffer`) unlikely to
    /// resolve without caller action.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TimedOut(_))
    }

    /// Convenience constructor for an options error with a formatted reason.
    pub fn options(reason: impl Into<String>) -> Self {
        Error::Options(reason.into())
    }

    /// Convenience constructor for an internal invariant breach.
    pub fn program(reason: impl Into<String>) -> Self {
        Error::Program(reason.into())
    }
}

/// A specialized `Result` type for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no space");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn options_error_message() {
        let err = Error::options("dict_size must be >= 4096");
        assert!(err.to_string().contains("dict_size"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn timed_out_is_recoverable() {
        let err = Error::TimedOut(std::time::Duration::from_secs(300));
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
