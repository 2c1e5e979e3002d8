//! End-to-end coverage for scenarios that only show up once whole streams
//! are driven through the public `ParallelReader`/`GzipIndex` surface:
//! multi-member concatenation, seeking, and index export/import.

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;

use rapidgzip::format;
use rapidgzip::index::GzipIndex;
use rapidgzip::reader::ParallelReader;
use rapidgzip::{ChunkConfiguration, FileType};

fn gzip_member(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Two gzip members concatenated back to back (RFC 1952 §2.2) must read
/// back as the plain concatenation of their payloads, with CRC32/ISIZE
/// verified and reset at the member boundary rather than accumulated
/// across it. `open_bytes` only ever recovers a single member's trailer
/// from the file's last 8 bytes, so this builds the reader directly
/// instead of going through it, to exercise member-boundary handling
/// without that unrelated limitation getting in the way.
#[test]
fn concatenated_members_reset_crc_and_isize() {
    let first = b"first member payload, repeated text. ".repeat(200);
    let second = b"second member, a different repeated payload! ".repeat(300);

    let first_compressed = gzip_member(&first);
    let header_bits = format::gzip_header_size(&first_compressed).unwrap() as u64 * 8;

    let mut compressed = first_compressed.clone();
    compressed.extend(gzip_member(&second));
    let data: Arc<[u8]> = Arc::from(compressed.into_boxed_slice());

    let mut reader = ParallelReader::new(data, ChunkConfiguration::default());
    reader.fetcher().set_file_type(FileType::Gzip);
    reader.set_initial_bit_offset(header_bits);
    reader.set_total_decoded_size((first.len() + second.len()) as u64);

    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();

    let mut expected = first.clone();
    expected.extend(second.iter());
    assert_eq!(out, expected);
}

/// A gzip stream with a deliberately corrupted second member's CRC32
/// must fail verification exactly at the member boundary, proving the
/// check isn't silently skipped or folded into the first member's sum.
#[test]
fn corrupted_second_member_crc_is_detected() {
    let first = b"clean member".repeat(50);
    let second = b"corrupted member".repeat(50);

    let first_compressed = gzip_member(&first);
    let header_bits = format::gzip_header_size(&first_compressed).unwrap() as u64 * 8;

    let mut second_compressed = gzip_member(&second);
    // The trailer is the last 8 bytes (CRC32 then ISIZE); flip a bit in
    // the CRC32 field.
    let crc_byte = second_compressed.len() - 8;
    second_compressed[crc_byte] ^= 0xFF;

    let mut compressed = first_compressed;
    compressed.extend(second_compressed);
    let data: Arc<[u8]> = Arc::from(compressed.into_boxed_slice());

    let mut reader = ParallelReader::new(data, ChunkConfiguration::default());
    reader.fetcher().set_file_type(FileType::Gzip);
    reader.set_initial_bit_offset(header_bits);
    reader.set_total_decoded_size((first.len() + second.len()) as u64);

    let mut out = Vec::new();
    let result = reader.read_to_end(&mut out);
    assert!(result.is_err());
}

/// Seeking to an arbitrary offset mid-stream and reading from there must
/// produce the same bytes a sequential read would have at that position,
/// without requiring the chunk(s) before it to already be in the cache.
#[test]
fn seek_then_read_matches_sequential_output() {
    let input: Vec<u8> = (0..500_000u32).map(|i| (i % 251) as u8).collect();
    let compressed = deflate(&input);
    let data: Arc<[u8]> = Arc::from(compressed.as_slice());

    let mut config = ChunkConfiguration::default();
    config.chunk_size = 64 * 1024;
    let mut reader = ParallelReader::new(data, config);
    reader.set_total_decoded_size(input.len() as u64);

    let seek_to = 321_777u64;
    reader.seek(SeekFrom::Start(seek_to)).unwrap();

    let mut tail = Vec::new();
    reader.read_to_end(&mut tail).unwrap();

    assert_eq!(tail, input[seek_to as usize..]);
}

/// Exporting a `GzipIndex` from a fully-decoded stream, round-tripping it
/// through Format A, and seeding a fresh fetcher's `BlockMap`/`WindowMap`
/// from the parsed index must let that fresh reader seek straight into
/// the middle of the stream without ever independently searching for a
/// block start there.
#[test]
fn exported_index_round_trips_and_seeds_a_seek() {
    let input: Vec<u8> = (0..300_000u32).map(|i| ((i * 7) % 241) as u8).collect();
    let compressed = deflate(&input);
    let data: Arc<[u8]> = Arc::from(compressed.as_slice());

    let mut config = ChunkConfiguration::default();
    config.chunk_size = 32 * 1024;
    let mut producer = ParallelReader::new(data.clone(), config.clone());
    producer.set_total_decoded_size(input.len() as u64);
    let mut drained = Vec::new();
    producer.read_to_end(&mut drained).unwrap();
    assert_eq!(drained, input);

    let entries = producer.fetcher().block_map().iter_snapshot();
    assert!(entries.len() > 1, "expected more than one chunk for this input/chunk_size");

    // Checkpoint at every decoded chunk start (spacing of 1 byte never
    // merges two into one checkpoint), so the reconstructed block map's
    // entries line up exactly with the chunk sizes the consumer's own
    // `chunk_size` will actually produce when re-decoding them.
    let index = GzipIndex::from_block_map(&entries, 1, &producer.fetcher().window_map());
    let mut buf = Vec::new();
    index.write_format_a(&mut buf).unwrap();
    let parsed = GzipIndex::read_format_a(&mut &buf[..]).unwrap();

    let mut consumer = ParallelReader::new(data, config);
    consumer.fetcher().block_map().set_block_offsets(parsed.block_map_entries());
    consumer.fetcher().block_map().finalize();
    for (offset, window) in parsed.windows() {
        consumer.fetcher().window_map().insert(offset, window);
    }
    consumer.set_total_decoded_size(parsed.uncompressed_size.max(input.len() as u64));

    let seek_to = 150_001u64;
    consumer.seek(SeekFrom::Start(seek_to)).unwrap();
    let mut tail = Vec::new();
    consumer.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, input[seek_to as usize..]);
}
