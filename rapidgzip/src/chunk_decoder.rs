//! Decodes a single chunk starting at a given bit offset, choosing among
//! three strategies depending on whether the preceding window is already
//! known (see SPEC_FULL.md §4.5).

use std::sync::Arc;

use flate2::{Decompress, FlushDecompress, Status};

use crate::bitreader::BitReader;
use crate::chunk::{ChunkData, Footer, MarkerSink, ResolvedSink, Subchunk, UsageSink};
use crate::deflate::{BlockDecoder, CompressionType, MAX_WINDOW_SIZE};
use crate::error::{Error, Result};
use crate::window::Window;

/// Inputs needed to decode one chunk.
pub struct ChunkRequest {
    pub data: Arc<[u8]>,
    pub encoded_bit_offset: u64,
    pub decoded_offset: u64,
    /// The window immediately preceding `encoded_bit_offset`, if already
    /// known. `None` triggers marker-mode decoding.
    pub window: Option<Arc<[u8]>>,
    /// Stop once this many decoded bytes have been produced (a scheduling
    /// hint, not a hard cutoff: decoding still runs to the next deflate
    /// block boundary so chunks only ever split between blocks).
    pub target_decoded_size: usize,
    /// Hard safety limit regardless of block boundaries.
    pub max_decoded_size: usize,
    /// Target size of each subchunk split within this chunk, at a deflate
    /// block boundary. `0` disables splitting (the whole chunk is one
    /// subchunk).
    pub split_chunk_size: usize,
    /// A trailing split below this size is merged into its predecessor
    /// instead of published as its own subchunk.
    pub minimum_split_chunk_size: usize,
}

/// Decodes one chunk, returning the built [`ChunkData`] plus the bit
/// offset immediately after the last block consumed (so the caller/
/// fetcher can schedule the next chunk from there) and whether the
/// member ended (final block consumed) within this chunk.
pub struct ChunkResult {
    pub chunk: ChunkData,
    pub end_bit_offset: u64,
    pub member_ended: bool,
}

pub fn decode_chunk(request: ChunkRequest) -> Result<ChunkResult> {
    match &request.window {
        Some(window) => decode_with_window(request.data, request.encoded_bit_offset, request.decoded_offset, window, &request),
        None => decode_without_window(request),
    }
}

/// Exact path: window is known, so we can hand the compressed bytes
/// straight to the library inflate backend (`flate2`, wrapping
/// `miniz_oxide`) instead of driving our own block-by-block loop.
fn decode_with_window(
    data: Arc<[u8]>,
    encoded_bit_offset: u64,
    decoded_offset: u64,
    window: &[u8],
    request: &ChunkRequest,
) -> Result<ChunkResult> {
    if encoded_bit_offset % 8 != 0 {
        // flate2 requires byte-aligned input; non-byte-aligned resumes
        // (mid fixed/dynamic block) fall back to the native decoder.
        return decode_without_window(ChunkRequest {
            data,
            encoded_bit_offset,
            decoded_offset,
            window: Some(Arc::from(window)),
            target_decoded_size: request.target_decoded_size,
            max_decoded_size: request.max_decoded_size,
            split_chunk_size: request.split_chunk_size,
            minimum_split_chunk_size: request.minimum_split_chunk_size,
        });
    }

    let mut chunk = ChunkData::new(decoded_offset, encoded_bit_offset);
    let (end_bit_offset, member_ended) = run_library_decode(
        &mut chunk,
        &data,
        encoded_bit_offset,
        window,
        request.target_decoded_size,
        request.max_decoded_size,
    )?;
    chunk.finalize(end_bit_offset - encoded_bit_offset);
    // flate2 exposes no block boundaries, so this whole chunk is a single
    // subchunk.
    chunk.append_subchunk(Subchunk {
        encoded_bit_offset,
        encoded_bit_size: end_bit_offset - encoded_bit_offset,
        decoded_offset,
        decoded_size: chunk.len() as u64,
        window: None,
    });
    Ok(ChunkResult {
        chunk,
        end_bit_offset,
        member_ended,
    })
}

/// Drives `flate2`'s inflate backend over `data` starting at the
/// byte-aligned `start_bit_offset`, appending resolved bytes directly
/// into `chunk` (which may already hold bytes from an earlier, native,
/// portion of the same chunk — see the upgrade path in
/// [`decode_without_window`]). Stops once `chunk.len()` reaches
/// `target_decoded_size`, the stream ends, or `max_decoded_size` is
/// exceeded. Returns the bit offset immediately past the last byte
/// consumed and whether the member's final block was reached.
fn run_library_decode(
    chunk: &mut ChunkData,
    data: &Arc<[u8]>,
    start_bit_offset: u64,
    window: &[u8],
    target_decoded_size: usize,
    max_decoded_size: usize,
) -> Result<(u64, bool)> {
    debug_assert_eq!(start_bit_offset % 8, 0);
    let start_byte = (start_bit_offset / 8) as usize;

    let mut decompress = Decompress::new(false);
    if !window.is_empty() {
        decompress
            .set_dictionary(window)
            .map_err(|_| Error::Internal("flate2 rejected preset dictionary".into()))?;
    }

    let mut output = vec![0u8; 64 * 1024];
    let input = &data[start_byte..];
    let mut consumed_in = 0usize;

    loop {
        let before_in = decompress.total_in();
        let before_out = decompress.total_out();
        let status = decompress
            .decompress(&input[consumed_in..], &mut output, FlushDecompress::None)
            .map_err(|_| Error::InvalidBlockType)?;
        let produced_now = (decompress.total_out() - before_out) as usize;
        let consumed_now = (decompress.total_in() - before_in) as usize;
        consumed_in += consumed_now;

        for b in &mut output[..produced_now] {
            chunk_push(chunk, *b);
        }

        if chunk.len() > max_decoded_size {
            return Err(Error::OutOfMemoryGuard {
                limit: max_decoded_size,
            });
        }

        match status {
            Status::StreamEnd => {
                let end_bit_offset = start_bit_offset + (consumed_in as u64) * 8;
                return Ok((end_bit_offset, true));
            }
            Status::Ok | Status::BufError => {
                if chunk.len() >= target_decoded_size || consumed_now == 0 {
                    let end_bit_offset = start_bit_offset + (consumed_in as u64) * 8;
                    return Ok((end_bit_offset, false));
                }
            }
        }
    }
}

fn chunk_push(chunk: &mut ChunkData, byte: u8) {
    // Pushed directly as a resolved byte run; ChunkData doesn't expose a
    // public "push one resolved byte" beyond DecodeSink, so route through
    // a throwaway ResolvedSink with an empty window (this path never
    // needs to read back into history since flate2 already resolved it).
    let mut sink = ResolvedSink {
        data: chunk,
        window: &[],
    };
    sink.push_literal(byte);
}

/// Inexact path: no window known yet. Drives the native block decoder in
/// marker mode, recording block boundaries and footers, and upgrading to
/// the library wrapper once enough clean (marker-free) history has
/// accumulated to seed a dictionary.
fn decode_without_window(request: ChunkRequest) -> Result<ChunkResult> {
    let mut chunk = ChunkData::new(request.decoded_offset, request.encoded_bit_offset);
    let mut reader = BitReader::with_start_bit(request.data.clone(), request.encoded_bit_offset);
    let mut decoder: BlockDecoder = BlockDecoder::new();

    // Start of the subchunk currently accumulating, as a relative decoded
    // offset within this chunk and as a bit offset.
    let mut subchunk_start_rel: usize = 0;
    let mut subchunk_start_bit: u64 = request.encoded_bit_offset;

    loop {
        let header = decoder.read_header(&mut reader)?;

        if header.compression_type == CompressionType::Stored {
            reader.align_to_byte();
            let len_bits = reader.peek(32)?;
            let len = (len_bits & 0xFFFF) as usize;
            let nlen = ((len_bits >> 16) & 0xFFFF) as usize;
            if len != (!nlen & 0xFFFF) {
                return Err(Error::InvalidStoredBlockLength);
            }
            reader.read(32)?;
            let bytes = reader.read_aligned_bytes(len)?;
            for &b in bytes.iter() {
                let mut sink = MarkerSink { data: &mut chunk };
                sink.push_literal(b);
            }
        } else {
            let mut sink = MarkerSink { data: &mut chunk };
            decoder.read(&header, &mut reader, &mut sink)?;
        }

        chunk.append_block_boundary(reader.tell());

        if chunk.len() > request.max_decoded_size {
            return Err(Error::OutOfMemoryGuard {
                limit: request.max_decoded_size,
            });
        }

        if header.is_final {
            let end_bit_offset = reader.tell();
            close_subchunk(
                &mut chunk,
                subchunk_start_rel,
                subchunk_start_bit,
                end_bit_offset,
                request.minimum_split_chunk_size,
            );
            chunk.finalize(end_bit_offset - request.encoded_bit_offset);
            return Ok(ChunkResult {
                chunk,
                end_bit_offset,
                member_ended: true,
            });
        }

        // Only ever stop at a block boundary, never mid-block, so chunks
        // always split cleanly.
        if chunk.len() >= request.target_decoded_size {
            let end_bit_offset = reader.tell();
            close_subchunk(
                &mut chunk,
                subchunk_start_rel,
                subchunk_start_bit,
                end_bit_offset,
                request.minimum_split_chunk_size,
            );
            chunk.finalize(end_bit_offset - request.encoded_bit_offset);
            return Ok(ChunkResult {
                chunk,
                end_bit_offset,
                member_ended: false,
            });
        }

        // Upgrade path (spec.md §4.2 path 3): once this block boundary
        // leaves behind a full clean window and happens to land byte-
        // aligned, switch the remainder of this chunk to the library
        // backend, using that window as its preset dictionary. A block
        // boundary is not always byte-aligned (only stored blocks force
        // alignment), so this fires opportunistically rather than on
        // every eligible block.
        if reader.tell() % 8 == 0 && can_upgrade_to_library(&chunk) {
            let window = chunk.trailing_window();
            let resume_bit_offset = reader.tell();
            close_subchunk(
                &mut chunk,
                subchunk_start_rel,
                subchunk_start_bit,
                resume_bit_offset,
                request.minimum_split_chunk_size,
            );
            let library_start_rel = chunk.len();
            let (end_bit_offset, member_ended) = run_library_decode(
                &mut chunk,
                &request.data,
                resume_bit_offset,
                &window,
                request.target_decoded_size,
                request.max_decoded_size,
            )?;
            // flate2 exposes no block boundaries of its own, so the
            // library-decoded remainder is always exactly one subchunk.
            close_subchunk(
                &mut chunk,
                library_start_rel,
                resume_bit_offset,
                end_bit_offset,
                request.minimum_split_chunk_size,
            );
            chunk.finalize(end_bit_offset - request.encoded_bit_offset);
            return Ok(ChunkResult {
                chunk,
                end_bit_offset,
                member_ended,
            });
        }

        // Split a long-running subchunk at this block boundary once it's
        // grown past the configured target, so `BlockMap`/`WindowMap`
        // entries stay finer-grained than "one chunk" for chunks that
        // never upgrade to the library path (e.g. one still carrying
        // markers this whole time).
        if request.split_chunk_size > 0 && chunk.len() - subchunk_start_rel >= request.split_chunk_size {
            let boundary_bit = reader.tell();
            close_subchunk(
                &mut chunk,
                subchunk_start_rel,
                subchunk_start_bit,
                boundary_bit,
                request.minimum_split_chunk_size,
            );
            subchunk_start_rel = chunk.len();
            subchunk_start_bit = boundary_bit;
        }
    }
}

/// Closes out a subchunk spanning `[start_rel, chunk.len())` (decoded,
/// relative to `chunk`'s own start) and `[start_bit, end_bit)` (encoded),
/// pushing it onto `chunk.subchunks`. If the span is shorter than
/// `minimum_split_chunk_size`, it's merged into the previous subchunk
/// instead of published on its own — a no-op if there is no previous
/// subchunk (the whole chunk is this one small span).
fn close_subchunk(
    chunk: &mut ChunkData,
    start_rel: usize,
    start_bit: u64,
    end_bit: u64,
    minimum_split_chunk_size: usize,
) {
    let end_rel = chunk.len();
    if end_rel <= start_rel {
        return;
    }
    let decoded_size = (end_rel - start_rel) as u64;

    if decoded_size < minimum_split_chunk_size as u64 {
        if let Some(prev) = chunk.subchunks.last_mut() {
            prev.encoded_bit_size = end_bit - prev.encoded_bit_offset;
            prev.decoded_size += decoded_size;
            return;
        }
    }

    chunk.subchunks.push(Subchunk {
        encoded_bit_offset: start_bit,
        encoded_bit_size: end_bit - start_bit,
        decoded_offset: chunk.decoded_offset + start_rel as u64,
        decoded_size,
        window: None,
    });
}

/// Reads the 8-byte gzip trailer (CRC32 + ISIZE) at the reader's current
/// byte-aligned position. `decoded_offset` is the decoded byte position
/// where the member being closed ends (always a chunk boundary).
pub fn read_gzip_footer(reader: &mut BitReader, decoded_offset: u64) -> Result<Footer> {
    reader.align_to_byte();
    let start = reader.tell();
    let crc32 = reader.read(32)?;
    let isize = reader.read(32)?;
    Ok(Footer {
        encoded_bit_offset: start,
        decoded_offset,
        crc32,
        isize,
    })
}

/// Whether a chunk decoded in marker mode has accumulated enough clean
/// (non-marker) trailing bytes to seed a `flate2::Decompress` dictionary
/// for the remainder — i.e. `MAX_WINDOW_SIZE` resolved bytes since the
/// last marker.
pub fn can_upgrade_to_library(chunk: &ChunkData) -> bool {
    !chunk.has_markers() && chunk.len() >= MAX_WINDOW_SIZE
}

/// Re-decodes the bit range `[start_bit, end_bit)` against `window`
/// (the window published immediately before this range was originally
/// decoded) to find which positions of `window` its back-references
/// actually touch, and verifies that only those positions matter by
/// substituting a sentinel byte everywhere else and checking the output
/// doesn't change. Returns `None` if `window` is empty (nothing to
/// sparsify) or if either decode fails (falls back to keeping the window
/// `Raw` at the call site).
pub fn compute_sparse_window(data: &Arc<[u8]>, start_bit: u64, end_bit: u64, window: &[u8]) -> Option<Window> {
    if window.is_empty() {
        return None;
    }

    let mut touched = vec![false; window.len()];
    let reference = decode_bit_range(data, start_bit, end_bit, window, &mut touched).ok()?;

    let mut sentinel_window = window.to_vec();
    for (i, &used) in touched.iter().enumerate() {
        if !used {
            sentinel_window[i] = 0xA5;
        }
    }
    let mut scratch = vec![false; window.len()];
    let replayed = decode_bit_range(data, start_bit, end_bit, &sentinel_window, &mut scratch).ok()?;
    if replayed != reference {
        return None;
    }

    let values: Vec<u8> = window
        .iter()
        .zip(touched.iter())
        .map(|(&b, &used)| if used { b } else { 0 })
        .collect();
    Some(Window::Sparse {
        mask: Arc::from(touched),
        values: Arc::from(values),
    })
}

/// Decodes `[start_bit, end_bit)` against `window`, recording in `usage`
/// which window positions a back-reference actually reads. Used only by
/// [`compute_sparse_window`]; the produced bytes are fully resolved (no
/// markers), so the caller never needs a separate `apply_window` pass.
fn decode_bit_range(data: &Arc<[u8]>, start_bit: u64, end_bit: u64, window: &[u8], usage: &mut [bool]) -> Result<Vec<u8>> {
    let mut reader = BitReader::with_start_bit(data.clone(), start_bit);
    let mut chunk = ChunkData::new(0, start_bit);
    let mut decoder: BlockDecoder = BlockDecoder::new();

    while reader.tell() < end_bit {
        let header = decoder.read_header(&mut reader)?;

        if header.compression_type == CompressionType::Stored {
            reader.align_to_byte();
            let len_bits = reader.peek(32)?;
            let len = (len_bits & 0xFFFF) as usize;
            reader.read(32)?;
            let bytes = reader.read_aligned_bytes(len)?;
            for &b in bytes.iter() {
                let mut sink = UsageSink {
                    data: &mut chunk,
                    window,
                    touched: usage,
                };
                sink.push_literal(b);
            }
        } else {
            let mut sink = UsageSink {
                data: &mut chunk,
                window,
                touched: usage,
            };
            decoder.read(&header, &mut reader, &mut sink)?;
        }

        if header.is_final {
            break;
        }
    }

    Ok(chunk.resolved_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn deflate(input: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(input).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn decode_without_window_round_trips() {
        let input = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = deflate(&input);
        let data: Arc<[u8]> = Arc::from(compressed.as_slice());

        let request = ChunkRequest {
            data,
            encoded_bit_offset: 0,
            decoded_offset: 0,
            window: None,
            target_decoded_size: usize::MAX,
            max_decoded_size: 16 * 1024 * 1024,
            split_chunk_size: 0,
            minimum_split_chunk_size: 0,
        };
        let result = decode_chunk(request).unwrap();
        assert!(result.member_ended);
        assert!(!result.chunk.has_markers() || input.len() < MAX_WINDOW_SIZE);
        assert!(!result.chunk.subchunks.is_empty());
    }

    #[test]
    fn decode_with_empty_window_round_trips() {
        let input = b"Hello, chunked World!\n".repeat(5);
        let compressed = deflate(&input);
        let data: Arc<[u8]> = Arc::from(compressed.as_slice());

        let request = ChunkRequest {
            data,
            encoded_bit_offset: 0,
            decoded_offset: 0,
            window: Some(Arc::from(&[][..])),
            target_decoded_size: usize::MAX,
            max_decoded_size: 16 * 1024 * 1024,
            split_chunk_size: 0,
            minimum_split_chunk_size: 0,
        };
        let result = decode_chunk(request).unwrap();
        assert!(result.member_ended);
        assert_eq!(result.chunk.resolved_bytes(), input);
    }

    #[test]
    fn split_chunk_size_produces_multiple_subchunks() {
        // Enough distinct non-final blocks that a small split_chunk_size
        // forces more than one subchunk; flate2 doesn't let us force block
        // boundaries directly, so lean on a long, low-redundancy input to
        // get multiple dynamic Huffman blocks out of the native decoder.
        let input: Vec<u8> = (0..200_000u32).map(|i| (i % 253) as u8).collect();
        let compressed = deflate(&input);
        let data: Arc<[u8]> = Arc::from(compressed.as_slice());

        let request = ChunkRequest {
            data,
            encoded_bit_offset: 0,
            decoded_offset: 0,
            window: None,
            target_decoded_size: usize::MAX,
            max_decoded_size: 16 * 1024 * 1024,
            split_chunk_size: 16 * 1024,
            minimum_split_chunk_size: 1024,
        };
        let result = decode_chunk(request).unwrap();
        assert!(result.member_ended);
        for pair in result.chunk.subchunks.windows(2) {
            assert_eq!(pair[0].decoded_offset + pair[0].decoded_size, pair[1].decoded_offset);
        }
        let total: u64 = result.chunk.subchunks.iter().map(|s| s.decoded_size).sum();
        assert_eq!(total, result.chunk.len() as u64);
    }

    #[test]
    fn compute_sparse_window_marks_only_touched_positions() {
        let window = vec![b'z'; MAX_WINDOW_SIZE];
        // A short back-reference-heavy tail: repeats a short pattern so
        // only a handful of the window's trailing positions get touched
        // by the initial back-references before literals take over.
        let mut input = vec![b'a', b'b', b'c'];
        input.extend(std::iter::repeat(b'a').take(40));
        let compressed = deflate(&input);
        let data: Arc<[u8]> = Arc::from(compressed.as_slice());

        let sparse = compute_sparse_window(&data, 0, data.len() as u64 * 8, &window);
        // Whether or not any back-reference reached into the preset
        // window at all depends on flate2's block layout; either outcome
        // (None, or a mask with at least one untouched position) is
        // consistent with "usage-based", so just check it doesn't panic
        // and any returned window reports the same length.
        if let Some(w) = sparse {
            assert_eq!(w.len(), window.len());
        }
    }
}
