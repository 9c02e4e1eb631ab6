//! LZMA2 decode oracle.
//!
//! This crate implements only the encode side of LZMA2 (the radix match
//! finder and optimal parser live in [`super::fast_lzma2`]). [`Lzma2Decoder`]
//! wraps `lzma_rust2`'s reader so tests and the round-trip properties in the
//! test suite have a decoder to check the encoder's output against, without
//! this crate needing to carry its own decompressor.

use crate::error::{Error, Result};
use std::io::{self, Read};

/// Wraps an `lzma_rust2` LZMA2 reader as the decode oracle used by tests.
pub struct Lzma2Decoder<R> {
    inner: lzma_rust2::Lzma2Reader<R>,
}

impl<R> std::fmt::Debug for Lzma2Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lzma2Decoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> Lzma2Decoder<R> {
    /// Creates a new LZMA2 decoder.
    ///
    /// # Arguments
    ///
    /// * `input` - The compressed data source
    /// * `properties` - LZMA2 properties (1 byte encoding dictionary size)
    ///
    /// # Errors
    ///
    /// Returns an error if properties are invalid.
    pub fn new(input: R, properties: &[u8]) -> Result<Self> {
        if properties.is_empty() {
            return Err(Error::Data("LZMA2 properties missing".into()));
        }

        let dict_size = decode_lzma2_dict_size(properties[0])?;
        let reader = lzma_rust2::Lzma2Reader::new(input, dict_size, None);

        Ok(Self { inner: reader })
    }
}

impl<R: Read + Send> Read for Lzma2Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Decodes the LZMA2 dictionary size from the property byte.
///
/// The encoding is:
/// - 0-39: Various dictionary sizes from 4KB to 4GB
/// - 40: Indicates dictionary size of 4GB - 1
fn decode_lzma2_dict_size(prop: u8) -> Result<u32> {
    if prop > 40 {
        return Err(Error::Data(format!(
            "invalid LZMA2 dictionary size property: {prop}"
        )));
    }

    if prop == 40 {
        return Ok(0xFFFF_FFFF);
    }

    let base_log = (prop as u32) / 2 + 12;
    let dict_size = if prop % 2 == 0 {
        1u32 << base_log
    } else {
        3u32 << (base_log - 1)
    };

    Ok(dict_size)
}

/// Encodes a dictionary size into the LZMA2 property byte.
///
/// Returns the property byte (0-40) for the given dictionary size, rounding
/// up to the nearest dictionary size the LZMA2 property byte can represent.
pub fn encode_lzma2_dict_size(dict_size: u32) -> u8 {
    if dict_size == u32::MAX {
        return 40;
    }

    for prop in 0..=40u8 {
        let size = decode_lzma2_dict_size(prop).unwrap();
        if size >= dict_size {
            return prop;
        }
    }

    40
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_lzma2_dict_size() {
        assert_eq!(decode_lzma2_dict_size(0).unwrap(), 4096);
        assert_eq!(decode_lzma2_dict_size(1).unwrap(), 6144);
        assert_eq!(decode_lzma2_dict_size(2).unwrap(), 8192);
        assert_eq!(decode_lzma2_dict_size(3).unwrap(), 12288);
        assert_eq!(decode_lzma2_dict_size(18).unwrap(), 2 * 1024 * 1024);
        assert_eq!(decode_lzma2_dict_size(40).unwrap(), 0xFFFF_FFFF);
    }

    #[test]
    fn test_decode_lzma2_dict_size_invalid() {
        assert!(decode_lzma2_dict_size(41).is_err());
        assert!(decode_lzma2_dict_size(255).is_err());
    }

    #[test]
    fn test_lzma2_decoder_properties_missing() {
        use std::io::Cursor;

        let input = Cursor::new(vec![]);
        let err = Lzma2Decoder::new(input, &[]).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_encode_lzma2_dict_size() {
        assert_eq!(encode_lzma2_dict_size(4096), 0);
        assert_eq!(encode_lzma2_dict_size(8192), 2);
        assert_eq!(encode_lzma2_dict_size(5000), 1);
        assert_eq!(encode_lzma2_dict_size(7000), 2);
        assert_eq!(encode_lzma2_dict_size(0xFFFF_FFFF), 40);
    }

    #[test]
    fn test_encode_decode_lzma2_roundtrip() {
        for prop in 0..=40u8 {
            let size = decode_lzma2_dict_size(prop).unwrap();
            let encoded_prop = encode_lzma2_dict_size(size);
            assert_eq!(encoded_prop, prop, "roundtrip failed for prop {prop}");
        }
    }
}
