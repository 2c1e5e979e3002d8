//! Heuristic search for plausible deflate block starts, so chunks can be
//! scheduled speculatively without a prior sequential pass over the file.
//!
//! Mirrors the scanning shape of `parallel_bzip2::scanner::Scanner`
//! (candidate offsets produced lazily from a byte stream) but, because
//! raw deflate has no magic bytes, the "is this plausible" predicate is a
//! structural header check rather than an `AhoCorasick` pattern match.

use std::sync::Arc;

use crate::bitreader::BitReader;
use crate::huffman::HuffmanCoding;

/// Default distance (in bits) searched before giving up on a partition.
pub const DEFAULT_SEARCH_RANGE_BITS: u64 = 512 * 1024 * 8;

/// Splits the search space into partitions this size (in bits) so workers
/// can each claim a partition independently.
pub const DEFAULT_SPACING_BITS: u64 = 4 * 1024 * 1024 * 8;

const PRECODE_ALPHABET: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// The 32 byte values whose low 3 bits are `000` — i.e. `BFINAL=0,
/// BTYPE=00` when read as the first three bits of a byte-aligned block
/// header. A stored block's header can only plausibly start at a byte
/// offset whose byte matches one of these.
const STORED_CANDIDATE_BYTES: [u8; 32] = {
    let mut values = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        values[i] = (i as u8) * 8;
        i += 1;
    }
    values
};

/// Byte offsets in `[start_byte, end_byte)` whose byte value could start a
/// stored-block header, found via a `memchr` scan per candidate value and
/// merged into one sorted, deduplicated list.
fn stored_candidate_bytes(data: &[u8], start_byte: usize, end_byte: usize) -> Vec<usize> {
    let end_byte = end_byte.min(data.len());
    if start_byte >= end_byte {
        return Vec::new();
    }
    let haystack = &data[start_byte..end_byte];
    let mut offsets: Vec<usize> = STORED_CANDIDATE_BYTES
        .iter()
        .flat_map(|&value| memchr::memchr_iter(value, haystack).map(move |i| i + start_byte))
        .collect();
    offsets.sort_unstable();
    offsets.dedup();
    offsets
}

/// Scans for the next plausible non-final block start at or after
/// `start_bit`, stopping the search at `end_bit` (exclusive). Returns the
/// bit offset of the block header (the BFINAL/BTYPE triplet), or `None`
/// if nothing plausible was found in range.
///
/// Dynamic-Huffman candidates can start at any bit, so those are still
/// checked one bit at a time. Stored-block candidates only ever start
/// byte-aligned (the 3-bit header plus `align_to_byte` only agrees with
/// itself when `bit % 8 == 0`), so those byte offsets are pre-filtered
/// with `memchr` instead of constructing a `BitReader` at every bit.
pub fn next_candidate(data: &Arc<[u8]>, start_bit: u64, end_bit: u64) -> Option<u64> {
    let total_bits = data.len() as u64 * 8;
    let end_bit = end_bit.min(total_bits);
    let start_byte = (start_bit / 8) as usize;
    let end_byte = ((end_bit + 7) / 8) as usize;
    let stored_candidates = stored_candidate_bytes(data, start_byte, end_byte);
    let mut stored_idx = 0usize;

    let mut bit = start_bit;
    while bit < end_bit {
        if looks_like_dynamic_huffman_header(data, bit) {
            return Some(bit);
        }
        if bit % 8 == 0 {
            let byte = (bit / 8) as usize;
            while stored_idx < stored_candidates.len() && stored_candidates[stored_idx] < byte {
                stored_idx += 1;
            }
            if stored_candidates.get(stored_idx) == Some(&byte) && looks_like_uncompressed_header(data, bit) {
                return Some(bit);
            }
        }
        bit += 1;
    }
    None
}

/// Checks whether a non-final dynamic-Huffman block could plausibly start
/// at `bit`: the 3-bit header must be `BFINAL=0, BTYPE=10`, the HLIT/
/// HDIST/HCLEN fields must be in range, and the resulting precode length
/// histogram must pass the usual Kraft-inequality sanity check.
fn looks_like_dynamic_huffman_header(data: &Arc<[u8]>, bit: u64) -> bool {
    let mut reader = BitReader::with_start_bit(data.clone(), bit);

    let is_final = match reader.read(1) {
        Ok(v) => v,
        Err(_) => return false,
    };
    if is_final != 0 {
        return false;
    }
    let btype = match reader.read(2) {
        Ok(v) => v,
        Err(_) => return false,
    };
    if btype != 0b10 {
        return false;
    }

    let hlit = match reader.read(5) {
        Ok(v) => v as usize + 257,
        Err(_) => return false,
    };
    let hdist = match reader.read(5) {
        Ok(v) => v as usize + 1,
        Err(_) => return false,
    };
    let hclen = match reader.read(4) {
        Ok(v) => v as usize + 4,
        Err(_) => return false,
    };
    if hlit > 286 || hdist > 30 {
        return false;
    }

    let mut precode_lengths = [0u8; 19];
    for i in 0..hclen {
        match reader.read(3) {
            Ok(v) => precode_lengths[PRECODE_ALPHABET[i]] = v as u8,
            Err(_) => return false,
        }
    }

    HuffmanCoding::build_from_lengths(&precode_lengths, true).is_ok()
}

/// Checks whether a non-final stored (uncompressed) block could
/// plausibly start at `bit`: after byte-aligning, `LEN == !NLEN` must
/// hold.
fn looks_like_uncompressed_header(data: &Arc<[u8]>, bit: u64) -> bool {
    let mut reader = BitReader::with_start_bit(data.clone(), bit);

    let is_final = match reader.read(1) {
        Ok(v) => v,
        Err(_) => return false,
    };
    if is_final != 0 {
        return false;
    }
    let btype = match reader.read(2) {
        Ok(v) => v,
        Err(_) => return false,
    };
    if btype != 0b00 {
        return false;
    }

    reader.align_to_byte();
    let len = match reader.read(16) {
        Ok(v) => v,
        Err(_) => return false,
    };
    let nlen = match reader.read(16) {
        Ok(v) => v,
        Err(_) => return false,
    };
    len == (!nlen & 0xFFFF)
}

/// Finds BGZF member starts, which need no heuristic search: every member
/// declares its own total size in the 'BC' extra field, so the next
/// member always starts exactly `block_size` bytes after the current one.
pub mod bgzf {
    use crate::format::bgzf_block_size;

    /// Returns the byte offsets of every BGZF member in `data`, starting
    /// from `start_byte`. Stops at the first byte offset where no valid
    /// BGZF header is found (typically the EOF marker block, included).
    pub fn member_offsets(data: &[u8], start_byte: usize) -> Vec<usize> {
        let mut offsets = Vec::new();
        let mut offset = start_byte;
        while offset < data.len() {
            let Some(size) = bgzf_block_size(&data[offset..]) else {
                break;
            };
            offsets.push(offset);
            offset += size as usize;
        }
        offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn finds_dynamic_huffman_block_start() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        // Enough varied, repeating content that flate2 is likely to emit
        // a dynamic Huffman block for.
        let payload = (0..2000).map(|i| (i % 251) as u8).collect::<Vec<_>>();
        encoder.write_all(&payload).unwrap();
        let compressed = encoder.finish().unwrap();
        let data: Arc<[u8]> = Arc::from(compressed.as_slice());

        // The very first block is often a valid candidate header shape
        // itself (just also final); searching from bit 0 should not
        // panic and should terminate.
        let _ = next_candidate(&data, 0, data.len() as u64 * 8);
    }

    #[test]
    fn bgzf_member_offsets_walks_blocks() {
        // Build two synthetic minimal BGZF-style headers back to back.
        fn bgzf_header(block_size: u16) -> Vec<u8> {
            let mut h = vec![0x1F, 0x8B, 0x08, 0b0000_0100, 0, 0, 0, 0, 0, 0xFF];
            h.extend_from_slice(&6u16.to_le_bytes());
            h.extend_from_slice(b"BC");
            h.extend_from_slice(&2u16.to_le_bytes());
            h.extend_from_slice(&(block_size - 1).to_le_bytes());
            h
        }
        let first = bgzf_header(18);
        let mut data = first.clone();
        data.resize(18, 0);
        let second = bgzf_header(20);
        data.extend_from_slice(&second);
        data.resize(18 + 20, 0);

        let offsets = bgzf::member_offsets(&data, 0);
        assert_eq!(offsets, vec![0, 18]);
    }
}
