//! End-to-end compression scenarios exercising the concrete cases called out
//! in the design: empty input, tiny inputs, degenerate repeats, sawtooth
//! data, incompressible data, and highly repetitive data.

use flzma2::codec::lzma::{encode_lzma2_dict_size, Lzma2Decoder};
use flzma2::{Coordinator, FastLzma2Options, Strategy};
use std::io::{Cursor, Read};

fn decode(compressed: &[u8], dict_size: u32) -> Vec<u8> {
    let props = vec![encode_lzma2_dict_size(dict_size)];
    let mut decoder = Lzma2Decoder::new(Cursor::new(compressed), &props).unwrap();
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).unwrap();
    out
}

/// Walks an LZMA2 chunk stream and counts stored-uncompressed vs.
/// range-coded chunks, per the control-byte layout in
/// `codec::fast_lzma2_encode`.
fn count_chunk_kinds(stream: &[u8]) -> (usize, usize) {
    let (mut stored, mut compressed) = (0, 0);
    let mut pos = 0;
    while pos < stream.len() {
        let ctrl = stream[pos];
        if ctrl == 0x00 {
            break;
        }
        if ctrl < 0x80 {
            let size = (u16::from_be_bytes([stream[pos + 1], stream[pos + 2]]) as usize) + 1;
            pos += 3 + size;
            stored += 1;
        } else {
            let includes_props = matches!(ctrl & 0xE0, 0xC0 | 0xE0);
            let pack_size =
                (u16::from_be_bytes([stream[pos + 3], stream[pos + 4]]) as usize) + 1;
            let header_len = if includes_props { 6 } else { 5 };
            pos += header_len + pack_size;
            compressed += 1;
        }
    }
    (stored, compressed)
}

#[test]
fn empty_input_is_just_the_terminator() {
    let coordinator = Coordinator::new(FastLzma2Options::default()).unwrap();
    let out = coordinator.compress(&[]).unwrap();
    assert_eq!(out, vec![0x00]);
}

#[test]
fn single_byte_round_trips() {
    let opts = FastLzma2Options::from_preset(1, false).unwrap();
    let coordinator = Coordinator::new(opts.clone()).unwrap();
    let out = coordinator.compress(&[0x41]).unwrap();
    assert_eq!(decode(&out, opts.dict_size), vec![0x41]);
}

#[test]
fn two_hundred_fifty_six_zero_bytes_round_trip_and_compress_well() {
    let opts = FastLzma2Options::default();
    let data = vec![0u8; 256];
    let coordinator = Coordinator::new(opts.clone()).unwrap();
    let out = coordinator.compress(&data).unwrap();
    assert_eq!(decode(&out, opts.dict_size), data);
    assert!(out.len() < 30, "expected rep-heavy encoding, got {} bytes", out.len());
}

#[test]
fn sixty_four_kib_sawtooth_round_trips() {
    let opts = FastLzma2Options::from_preset(5, false).unwrap();
    let data: Vec<u8> = (0..65536usize).map(|i| (i & 0xFF) as u8).collect();
    let coordinator = Coordinator::new(opts.clone()).unwrap();
    let out = coordinator.compress(&data).unwrap();
    assert_eq!(decode(&out, opts.dict_size), data);
}

#[test]
fn four_mib_random_bytes_round_trip_and_mostly_fall_back_to_stored_chunks() {
    let opts = FastLzma2Options::from_preset(6, false).unwrap();
    let mut seed = 0x2545F491u32;
    let data: Vec<u8> = (0..4 * 1024 * 1024)
        .map(|_| {
            seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
            (seed >> 24) as u8
        })
        .collect();
    let coordinator = Coordinator::new(opts.clone()).unwrap();
    let out = coordinator.compress(&data).unwrap();
    assert_eq!(decode(&out, opts.dict_size), data);

    let (stored, compressed) = count_chunk_kinds(&out);
    let total = stored + compressed;
    assert!(
        stored * 10 >= total * 9,
        "expected at least 90% stored chunks, saw {stored} of {total}"
    );
}

#[test]
fn two_mib_of_ababab_compresses_to_under_one_percent() {
    let opts = FastLzma2Options::default();
    let data = b"ab".repeat(1024 * 1024);
    let coordinator = Coordinator::new(opts.clone()).unwrap();
    let out = coordinator.compress(&data).unwrap();
    assert_eq!(decode(&out, opts.dict_size), data);
    assert!(out.len() * 100 < data.len(), "compressed to {} of {} bytes", out.len(), data.len());
}

#[test]
fn fast_and_ultra_strategies_both_round_trip_and_differ() {
    let data = b"the quick brown fox jumps over the lazy dog, repeatedly, ".repeat(500);

    let mut fast_opts = FastLzma2Options::default();
    fast_opts.mode = Strategy::Fast;
    let fast_out = Coordinator::new(fast_opts.clone()).unwrap().compress(&data).unwrap();

    let mut ultra_opts = FastLzma2Options::default();
    ultra_opts.mode = Strategy::Ultra;
    let ultra_out = Coordinator::new(ultra_opts.clone()).unwrap().compress(&data).unwrap();

    assert_eq!(decode(&fast_out, fast_opts.dict_size), data);
    assert_eq!(decode(&ultra_out, ultra_opts.dict_size), data);
    assert_ne!(fast_out, ultra_out, "fast and ultra parsers should not produce byte-identical streams");
}
