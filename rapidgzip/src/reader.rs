//! `ParallelReader`: the public `Read`/`Seek` facade over a
//! [`crate::fetcher::ChunkFetcher`], in the same internal-buffer-plus-
//! pull-on-exhaustion shape as `parallel_bzip2::decoder::Bz2Decoder`, with
//! `Seek` added on top by routing through the block map.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::chunk::ChunkData;
use crate::config::ChunkConfiguration;
use crate::crc32::Crc32State;
use crate::error::Error;
use crate::fetcher::ChunkFetcher;

/// Tracks byte offsets of newline characters, refined lazily as chunks are
/// consumed, so `--count-lines`-style queries don't require rescanning.
#[derive(Default)]
struct NewlineIndex {
    offsets: Vec<u64>,
    scanned_up_to: u64,
}

impl NewlineIndex {
    fn extend(&mut self, chunk_start: u64, bytes: &[u8], newline: u8) {
        if chunk_start < self.scanned_up_to {
            return;
        }
        for (i, &b) in bytes.iter().enumerate() {
            if b == newline {
                self.offsets.push(chunk_start + i as u64);
            }
        }
        self.scanned_up_to = chunk_start + bytes.len() as u64;
    }

    fn count(&self) -> usize {
        self.offsets.len()
    }
}

/// A seekable, `Read`-implementing view over a decompressed gzip/zlib/
/// raw-deflate/BGZF/bzip2 stream.
/// The chunk currently backing reads, plus its decoded bytes resolved
/// once (not re-derived on every `read()` call) and the read cursor
/// within them.
struct CurrentChunk {
    chunk: Arc<ChunkData>,
    resolved: Arc<[u8]>,
    pos: usize,
}

pub struct ParallelReader {
    fetcher: Arc<ChunkFetcher>,
    position: u64,
    total_decoded_size: Option<u64>,
    current: Option<CurrentChunk>,
    /// CRC32 of decoded bytes since the last member boundary (or stream
    /// start, for a single-member file). Reset every time a [`Footer`]
    /// is crossed, since gzip/BGZF concatenation restarts both CRC32 and
    /// ISIZE per member (RFC 1952 §2.2).
    member_crc32: Crc32State,
    /// Decoded position where `member_crc32` started accumulating.
    member_started_at: u64,
    /// Fallback expected CRC32/ISIZE for a single-member stream, used
    /// only if no [`Footer`] is ever seen (e.g. explicitly raw deflate).
    expected_crc32: Option<u32>,
    verify_crc32: bool,
    newline_index: NewlineIndex,
    newline_character: u8,
}

impl ParallelReader {
    pub fn new(data: Arc<[u8]>, config: ChunkConfiguration) -> Self {
        let newline_character = config.newline_character;
        Self {
            fetcher: Arc::new(ChunkFetcher::new(data, config)),
            position: 0,
            total_decoded_size: None,
            current: None,
            member_crc32: Crc32State::new(),
            member_started_at: 0,
            expected_crc32: None,
            verify_crc32: true,
            newline_index: NewlineIndex::default(),
            newline_character,
        }
    }

    pub fn fetcher(&self) -> Arc<ChunkFetcher> {
        self.fetcher.clone()
    }

    /// Kicks off a best-effort background scan that speculatively
    /// marker-decodes plausible block starts spread across the file, so
    /// worker threads other than the one driving `read()` have real work
    /// to do before the sequential chain catches up to them. Call once
    /// the stream's true start and container format are known (i.e.
    /// after [`Self::set_initial_bit_offset`]).
    pub fn warm_up_parallel_decode(&self, region_count: usize) {
        if region_count < 2 {
            return;
        }
        let fetcher = self.fetcher.clone();
        rayon::spawn(move || {
            let _ = fetcher.prefetch_parallel(region_count);
        });
    }

    pub fn set_verify_crc32(&mut self, verify: bool) {
        self.verify_crc32 = verify;
    }

    pub fn set_expected_crc32(&mut self, crc32: u32) {
        self.expected_crc32 = Some(crc32);
    }

    pub fn set_total_decoded_size(&mut self, size: u64) {
        self.total_decoded_size = Some(size);
    }

    /// Marks where the deflate stream begins (past any gzip/zlib
    /// container header that prefixes the raw compressed bytes).
    pub fn set_initial_bit_offset(&self, bit_offset: u64) {
        self.fetcher.set_initial_bit_offset(bit_offset);
    }

    pub fn line_count(&self) -> usize {
        self.newline_index.count()
    }

    /// Total decompressed size, when known: either an explicit hint
    /// recovered from a gzip/zlib trailer or an imported index, or the
    /// block map's own frontier once [`crate::blockmap::BlockMap`] has
    /// been finalized (i.e. decoding has reached end of stream).
    pub fn size(&self) -> Option<u64> {
        self.total_decoded_size
            .or_else(|| self.fetcher.block_map().decoded_size_hint().filter(|_| self.fetcher.block_map().is_finalized()))
    }

    /// Best-effort encoded (compressed) byte position corresponding to
    /// the current read cursor: the start of the chunk currently
    /// covering it, or of the nearest known chunk at or before it.
    /// Exact only at chunk boundaries; SPEC_FULL.md documents this as a
    /// best-effort query, not an exact inverse of `tell`.
    pub fn tell_compressed(&self) -> u64 {
        match self.fetcher.block_map().find_data_offset(self.position) {
            Some(entry) => entry.encoded_bit_offset / 8,
            None => 0,
        }
    }

    pub fn tell(&self) -> u64 {
        self.position
    }

    fn ensure_current(&mut self) -> crate::error::Result<()> {
        let need_new = match &self.current {
            Some(current) => {
                current.pos >= current.chunk.len() || self.position < current.chunk.decoded_offset
            }
            None => true,
        };
        if !need_new {
            return Ok(());
        }

        let chunk = self.fetcher.get(self.position)?;
        let offset_in_chunk = (self.position - chunk.decoded_offset) as usize;
        let resolved: Arc<[u8]> = Arc::from(chunk.resolved_bytes().into_boxed_slice());
        self.current = Some(CurrentChunk {
            chunk,
            resolved,
            pos: offset_in_chunk,
        });
        Ok(())
    }
}

impl Read for ParallelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(total) = self.total_decoded_size {
            if self.position >= total {
                return Ok(0);
            }
        }

        self.ensure_current()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let (to_copy, crossed_footer) = {
            let current = self.current.as_mut().unwrap();
            let available = &current.resolved[current.pos..];
            let to_copy = available.len().min(buf.len());
            buf[..to_copy].copy_from_slice(&available[..to_copy]);
            current.pos += to_copy;

            // A footer always sits exactly at a chunk boundary (the
            // decoder stops as soon as it reaches a final block), so it's
            // only ever relevant once this read has drained the chunk.
            let footer = if current.pos >= current.chunk.len() {
                current.chunk.footers.last().copied()
            } else {
                None
            };
            (to_copy, footer)
        };

        self.member_crc32.update(&buf[..to_copy]);
        self.newline_index
            .extend(self.position, &buf[..to_copy], self.newline_character);
        self.position += to_copy as u64;

        if let Some(footer) = crossed_footer {
            if self.verify_crc32 {
                let computed_crc32 = self.member_crc32.crc();
                if computed_crc32 != footer.crc32 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        Error::Crc32Mismatch {
                            expected: footer.crc32,
                            computed: computed_crc32,
                        },
                    ));
                }
                let produced = self.position - self.member_started_at;
                if (produced as u32) != footer.isize {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        Error::SizeMismatch {
                            expected: footer.isize,
                            computed: produced,
                        },
                    ));
                }
            }
            self.member_crc32 = Crc32State::new();
            self.member_started_at = self.position;
        }

        if to_copy == 0 {
            // No footer was ever crossed (e.g. a raw-deflate stream with
            // no container framing at all): fall back to the
            // whole-stream CRC32 hint recovered from the file's trailing
            // bytes, if any.
            if self.member_started_at == 0 {
                if let Some(expected) = self.expected_crc32 {
                    if self.verify_crc32 && self.member_crc32.crc() != expected {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            Error::Crc32Mismatch {
                                expected,
                                computed: self.member_crc32.crc(),
                            },
                        ));
                    }
                }
            }
        }

        Ok(to_copy)
    }
}

impl Seek for ParallelReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) => {
                if delta >= 0 {
                    self.position.saturating_add(delta as u64)
                } else {
                    self.position.saturating_sub((-delta) as u64)
                }
            }
            SeekFrom::End(delta) => {
                let total = self.total_decoded_size.ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::Unsupported,
                        "seek from end requires a known total decoded size",
                    )
                })?;
                if delta >= 0 {
                    total.saturating_add(delta as u64)
                } else {
                    total.saturating_sub((-delta) as u64)
                }
            }
        };

        self.position = target;
        self.current = None;
        // CRC32/ISIZE verification only makes sense for bytes actually
        // read in order from a member's start; a seek forfeits whatever
        // partial accumulation was in flight.
        self.member_crc32 = Crc32State::new();
        self.member_started_at = target;
        Ok(self.position)
    }
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
    fn reads_whole_stream_sequentially() {
        let input = b"one two three four five six seven eight nine ten".repeat(50);
        let compressed = deflate(&input);
        let data: Arc<[u8]> = Arc::from(compressed.as_slice());

        let mut reader = ParallelReader::new(data, ChunkConfiguration::default());
        reader.set_total_decoded_size(input.len() as u64);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, input);
    }
}
