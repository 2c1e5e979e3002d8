//! `ChunkFetcher`: cache + worker-pool orchestration tying
//! [`crate::blockfinder`], [`crate::chunk_decoder`], [`crate::window`] and
//! [`crate::blockmap`] together.
//!
//! The dispatch shape — a scan stage handing candidate offsets to a Rayon
//! worker pool, results flowing back through a bounded channel — is lifted
//! directly from `parallel_bzip2::lib::parallel_bzip2_cat` and
//! `Bz2Decoder::new`, generalized from "decode once, emit in arrival
//! order" to "decode speculatively, cache by decoded-byte budget, resolve
//! markers lazily."
//!
//! Two decode chains cooperate here:
//!
//! - The *authoritative* chain (`get`/`decode_and_cache`/`advance_frontier`)
//!   is strictly sequential: it always knows the exact encoded bit offset
//!   to resume from, because every decode records where it stopped (a
//!   "resume point") keyed by the decoded-byte frontier it produced.
//!   Nothing returned through this chain is ever a guess.
//! - The *speculative* chain (`prefetch_parallel`) runs independently of
//!   the authoritative one: it asks [`blockfinder::next_candidate`] for
//!   plausible block starts spread across the file and marker-decodes
//!   each in parallel, entirely window-free. Results are cached by
//!   encoded bit offset, not trusted. The authoritative chain consults
//!   this cache opportunistically when it happens to resume at a bit
//!   offset a speculative decode already covered — validated implicitly,
//!   since the authoritative chain only ever asks for the *exact* next
//!   bit offset it independently derived.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::bitreader::BitReader;
use crate::blockfinder;
use crate::blockmap::{BlockMap, BlockMapEntry};
use crate::chunk::ChunkData;
use crate::chunk_decoder::{self, ChunkRequest, ChunkResult};
use crate::config::ChunkConfiguration;
use crate::error::{Error, Result};
use crate::format::FileType;
use crate::window::{Window, WindowMap};

/// Below this many remaining bits, a failed heuristic scan is treated as
/// genuine end of stream rather than block-finder exhaustion — not even
/// enough left for another block header, let alone a trailer.
const MIN_TRAILING_BITS: u64 = 64;

struct CachedChunk {
    decoded_offset: u64,
    data: Arc<ChunkData>,
}

/// Where a prior decode stopped: the bit offset to resume from, and
/// whether it stopped because a gzip member's final block was reached
/// (in which case resuming means first skipping that member's trailer
/// and the next member's header, not just continuing the bitstream).
#[derive(Debug, Clone, Copy)]
struct ResumePoint {
    bit_offset: u64,
    member_ended: bool,
}

/// Orchestrates parallel, cached, marker-aware chunk decoding over a
/// shared compressed buffer.
pub struct ChunkFetcher {
    data: Arc<[u8]>,
    config: Mutex<ChunkConfiguration>,
    file_type: Mutex<FileType>,
    window_map: Arc<WindowMap>,
    block_map: Arc<BlockMap>,
    cache: Mutex<VecDeque<CachedChunk>>,
    cache_bytes: Mutex<usize>,
    /// Resume points, keyed by the decoded-byte frontier they resume.
    resume_points: Mutex<HashMap<u64, ResumePoint>>,
    /// Speculative, unvalidated decodes keyed by their encoded bit offset,
    /// populated by [`Self::prefetch_parallel`].
    speculative: Mutex<HashMap<u64, ChunkResult>>,
    stop: Arc<AtomicBool>,
    indexing_callbacks: Mutex<Vec<Box<dyn Fn(&BlockMapEntry) + Send + Sync>>>,
    initial_bit_offset: Mutex<u64>,
}

impl ChunkFetcher {
    pub fn new(data: Arc<[u8]>, config: ChunkConfiguration) -> Self {
        Self {
            data,
            config: Mutex::new(config),
            file_type: Mutex::new(FileType::Unknown),
            window_map: Arc::new(WindowMap::new()),
            block_map: Arc::new(BlockMap::new()),
            cache: Mutex::new(VecDeque::new()),
            cache_bytes: Mutex::new(0),
            resume_points: Mutex::new(HashMap::new()),
            speculative: Mutex::new(HashMap::new()),
            stop: Arc::new(AtomicBool::new(false)),
            indexing_callbacks: Mutex::new(Vec::new()),
            initial_bit_offset: Mutex::new(0),
        }
    }

    pub fn set_chunk_configuration(&self, config: ChunkConfiguration) {
        *self.config.lock().unwrap() = config;
    }

    pub fn block_map(&self) -> Arc<BlockMap> {
        self.block_map.clone()
    }

    pub fn window_map(&self) -> Arc<WindowMap> {
        self.window_map.clone()
    }

    pub fn add_chunk_indexing_callback(&self, callback: Box<dyn Fn(&BlockMapEntry) + Send + Sync>) {
        self.indexing_callbacks.lock().unwrap().push(callback);
    }

    /// Records where the deflate stream actually starts (past any gzip/
    /// zlib container header), so [`Self::get`] doesn't have to assume
    /// "nothing decoded yet" always means bit offset 0.
    pub fn set_initial_bit_offset(&self, bit_offset: u64) {
        *self.initial_bit_offset.lock().unwrap() = bit_offset;
    }

    /// Records the container format, which governs whether a final block
    /// can plausibly be followed by another member's header (gzip/BGZF
    /// concatenation) or is always the true end of the stream (zlib, raw
    /// deflate).
    pub fn set_file_type(&self, file_type: FileType) {
        *self.file_type.lock().unwrap() = file_type;
    }

    fn supports_member_concatenation(&self) -> bool {
        matches!(*self.file_type.lock().unwrap(), FileType::Gzip | FileType::Bgzf)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Returns the chunk covering `decoded_offset`, decoding (and
    /// caching) it if necessary, resolving markers against the preceding
    /// window as the final step.
    ///
    /// When `decoded_offset` sits exactly at the frontier of everything
    /// decoded so far, this advances the frontier one chunk at a time
    /// (following the recorded resume point, including hopping over a
    /// gzip member boundary) until it either covers `decoded_offset` or
    /// genuinely runs out of stream.
    pub fn get(&self, decoded_offset: u64) -> Result<Arc<ChunkData>> {
        if let Some(cached) = self.find_cached(decoded_offset) {
            return Ok(cached);
        }

        loop {
            if let Some(entry) = self.block_map.find_data_offset(decoded_offset) {
                let frontier = entry.decoded_offset + entry.decoded_size;
                if decoded_offset < frontier {
                    // Known range, but evicted from the cache: re-decode
                    // it without touching the block map or resume points
                    // again (both already reflect this entry).
                    return self.redecode_existing(entry);
                }
                // At or past everything decoded so far: keep advancing
                // one chunk at a time (an arbitrary forward seek just
                // means more iterations of this loop) until the target
                // is covered or the stream is genuinely exhausted.
                if self.advance_frontier(entry)? {
                    continue;
                }
                return Err(Error::OffsetOutOfBounds { offset: decoded_offset });
            }

            if decoded_offset == 0 && self.block_map.is_empty() {
                let start = *self.initial_bit_offset.lock().unwrap();
                self.decode_and_cache(start, 0)?;
                continue;
            }

            return Err(Error::OffsetOutOfBounds { offset: decoded_offset });
        }
    }

    fn find_cached(&self, decoded_offset: u64) -> Option<Arc<ChunkData>> {
        let cache = self.cache.lock().unwrap();
        cache
            .iter()
            .find(|c| {
                c.decoded_offset <= decoded_offset
                    && decoded_offset < c.decoded_offset + c.data.len() as u64
            })
            .map(|c| c.data.clone())
    }

    /// Decodes a chunk whose extent is already known (present in the
    /// block map) but fell out of the decode cache. Byte-for-byte
    /// deterministic given the same bit offset, decoded offset and
    /// window, so this reproduces the original chunk without touching
    /// any of the bookkeeping `decode_and_cache` owns.
    fn redecode_existing(&self, entry: BlockMapEntry) -> Result<Arc<ChunkData>> {
        let config = self.config.lock().unwrap().clone();
        let (mut result, window) = self.decode_one(entry.encoded_bit_offset, entry.decoded_offset, &config)?;
        if let Some(window_bytes) = window {
            result.chunk.apply_window(&window_bytes)?;
        }
        let chunk = Arc::new(result.chunk);
        self.cache_insert(entry.decoded_offset, chunk.clone());
        Ok(chunk)
    }

    /// Runs the chunk decoder once, without applying any side effects
    /// beyond the decode itself. Returns the raw result plus the window
    /// bytes used (if any), so callers can apply the window, record
    /// bookkeeping, or both.
    fn decode_one(
        &self,
        encoded_bit_offset: u64,
        decoded_offset: u64,
        config: &ChunkConfiguration,
    ) -> Result<(ChunkResult, Option<Arc<[u8]>>)> {
        let window = self.window_map.get(decoded_offset);
        let window_bytes = window.as_ref().map(|w| w.decompress());
        let request = ChunkRequest {
            data: self.data.clone(),
            encoded_bit_offset,
            decoded_offset,
            window: window_bytes.clone(),
            target_decoded_size: config.chunk_size,
            max_decoded_size: config.max_decoded_chunk_size,
            split_chunk_size: config.split_chunk_size,
            minimum_split_chunk_size: config.minimum_split_chunk_size,
        };
        let result = chunk_decoder::decode_chunk(request)?;
        Ok((result, window_bytes))
    }

    /// Decodes a genuinely new chunk at the frontier, advancing the block
    /// map, window map and resume points.
    fn decode_and_cache(&self, encoded_bit_offset: u64, decoded_offset: u64) -> Result<Arc<ChunkData>> {
        let config = self.config.lock().unwrap().clone();

        // A speculative decode may already have done this exact work.
        let precomputed = self.speculative.lock().unwrap().remove(&encoded_bit_offset);
        let (mut result, window_bytes) = match precomputed {
            Some(mut result) => {
                result.chunk.rebase(decoded_offset);
                let window = self.window_map.get(decoded_offset);
                let window_bytes = window.as_ref().map(|w| w.decompress());
                (result, window_bytes)
            }
            None => self.decode_one(encoded_bit_offset, decoded_offset, &config)?,
        };

        if let Some(window_bytes) = &window_bytes {
            result.chunk.apply_window(window_bytes)?;
        }
        if result.chunk.has_markers() {
            // Speculative decode without enough window to resolve: this
            // only happens if a precomputed chunk was spliced in before
            // its real window was available, which `get`'s frontier
            // check should prevent. Treat as a hard decode failure
            // rather than silently caching unresolved markers.
            return Err(Error::Internal(
                "chunk still has unresolved markers after applying its window".into(),
            ));
        }

        self.finalize_decoded_chunk(encoded_bit_offset, decoded_offset, result, window_bytes, &config)
    }

    fn finalize_decoded_chunk(
        &self,
        encoded_bit_offset: u64,
        decoded_offset: u64,
        mut result: ChunkResult,
        input_window: Option<Arc<[u8]>>,
        config: &ChunkConfiguration,
    ) -> Result<Arc<ChunkData>> {
        let frontier = decoded_offset + result.chunk.len() as u64;
        debug_assert!(result.chunk.subchunks.first().map_or(true, |s| s.encoded_bit_offset == encoded_bit_offset));

        if result.member_ended && self.supports_member_concatenation() {
            if let Some(footer) = self.try_read_member_footer(result.end_bit_offset, frontier) {
                result.chunk.append_footer(footer);
            }
        }

        // The window this chunk itself consumed was published (as `Raw`,
        // or not at all for the very first chunk) by whatever finalized
        // the preceding chunk, before anyone could know which of its
        // positions this chunk's own back-references would actually
        // reach. Now that it's decoded, retroactively refine that
        // `WindowMap` entry into its usage-based sparse form.
        if config.use_sparse_windows {
            if let (Some(window_bytes), Some(first)) = (input_window.as_deref(), result.chunk.subchunks.first()) {
                if let Some(sparse) = chunk_decoder::compute_sparse_window(
                    &self.data,
                    first.encoded_bit_offset,
                    first.encoded_bit_offset + first.encoded_bit_size,
                    window_bytes,
                ) {
                    self.window_map.insert(decoded_offset, sparse);
                }
            }
        }

        let preceding = input_window.as_deref().unwrap_or(&[]);
        let subchunk_count = result.chunk.subchunks.len();
        for i in 0..subchunk_count {
            let subchunk = result.chunk.subchunks[i].clone();
            let entry = BlockMapEntry {
                encoded_bit_offset: subchunk.encoded_bit_offset,
                decoded_offset: subchunk.decoded_offset,
                decoded_size: subchunk.decoded_size,
            };
            self.block_map.push(entry);
            for callback in self.indexing_callbacks.lock().unwrap().iter() {
                callback(&entry);
            }

            let end_offset = subchunk.decoded_offset + subchunk.decoded_size;
            let rel_end = (end_offset - decoded_offset) as usize;

            if i + 1 == subchunk_count {
                // Last subchunk: this is the chunk's own frontier. LZ77
                // history never crosses a gzip member boundary, so a
                // member's trailing window is always empty, not its own
                // decoded bytes. Otherwise usage of this window isn't
                // known yet -- it's refined above, by whichever decode
                // consumes it next.
                if result.member_ended {
                    self.window_map.insert(end_offset, Window::Empty);
                } else {
                    let window_bytes = result.chunk.window_ending_at(rel_end, preceding);
                    self.window_map.insert(end_offset, Window::Raw(Arc::from(window_bytes.as_slice())));
                }
            } else {
                // An interior subchunk boundary: the next subchunk was
                // decoded right here, in the same chunk, so its usage of
                // this window is already known -- publish it sparse
                // immediately instead of Raw-then-refine.
                let window_bytes = result.chunk.window_ending_at(rel_end, preceding);
                let next = &result.chunk.subchunks[i + 1];
                let published = config
                    .use_sparse_windows
                    .then(|| {
                        chunk_decoder::compute_sparse_window(
                            &self.data,
                            next.encoded_bit_offset,
                            next.encoded_bit_offset + next.encoded_bit_size,
                            &window_bytes,
                        )
                    })
                    .flatten()
                    .unwrap_or_else(|| Window::Raw(Arc::from(window_bytes.as_slice())));
                self.window_map.insert(end_offset, published);
            }
        }

        self.resume_points.lock().unwrap().insert(
            frontier,
            ResumePoint {
                bit_offset: result.end_bit_offset,
                member_ended: result.member_ended,
            },
        );

        let chunk = Arc::new(result.chunk);
        self.cache_insert(decoded_offset, chunk.clone());
        Ok(chunk)
    }

    /// Advances the decoded frontier exactly one chunk past `entry`,
    /// following its recorded resume point (hopping over a gzip member
    /// boundary first if needed). Returns `false` once the stream is
    /// genuinely exhausted (no resume point and no further member).
    fn advance_frontier(&self, entry: BlockMapEntry) -> Result<bool> {
        let frontier = entry.decoded_offset + entry.decoded_size;
        let resume = self.resume_points.lock().unwrap().get(&frontier).copied();
        let had_resume_point = resume.is_some();

        let next_bit_offset = match resume {
            Some(ResumePoint { bit_offset, member_ended: false }) => Some(bit_offset),
            Some(ResumePoint { bit_offset, member_ended: true }) => {
                if self.supports_member_concatenation() {
                    self.next_member_bit_offset(bit_offset)?
                } else {
                    None
                }
            }
            None => {
                // No recorded resume point, e.g. this frontier came from
                // an imported index rather than our own decode. Fall
                // back to the heuristic scanner to find the next block.
                self.next_candidate(entry.encoded_bit_offset + 1)
            }
        };

        match next_bit_offset {
            Some(bit_offset) => {
                self.decode_and_cache(bit_offset, frontier)?;
                Ok(true)
            }
            None => {
                let total_bits = self.data.len() as u64 * 8;
                let remaining_bits = total_bits.saturating_sub(entry.encoded_bit_offset + 1);
                if !had_resume_point && remaining_bits > MIN_TRAILING_BITS {
                    // A resume point came from our own decode chain, so
                    // `None` there always means real end of stream (the
                    // member's final block was consumed). Without one
                    // (block map seeded externally), `None` with
                    // meaningful data still ahead means the heuristic
                    // scanner genuinely failed to find a block, not that
                    // the stream ended.
                    let search_from = entry.encoded_bit_offset + 1;
                    let config = self.config.lock().unwrap();
                    let search_end = (search_from + config.search_range_bits).min(total_bits);
                    drop(config);
                    return Err(Error::NoBlockInRange {
                        start: search_from,
                        end: search_end,
                    });
                }
                // Nothing decodable follows: the block map's extent is
                // now the stream's true size, per SPEC_FULL.md §4.5.
                self.block_map.finalize();
                Ok(false)
            }
        }
    }

    /// Given the bit offset immediately after a gzip member's final
    /// block, tries to parse its 8-byte trailer followed by another
    /// member's header, returning the bit offset where that member's
    /// deflate stream begins. `None` means this was the last member.
    fn next_member_bit_offset(&self, end_bit_offset: u64) -> Result<Option<u64>> {
        let mut reader = BitReader::with_start_bit(self.data.clone(), end_bit_offset);
        reader.align_to_byte();
        let trailer_start = (reader.tell() / 8) as usize;
        let next_header_byte = match trailer_start.checked_add(8) {
            Some(b) if b < self.data.len() => b,
            _ => return Ok(None),
        };
        match crate::format::gzip_header_size(&self.data[next_header_byte..]) {
            Ok(header_len) => Ok(Some((next_header_byte + header_len) as u64 * 8)),
            Err(_) => Ok(None),
        }
    }

    fn try_read_member_footer(&self, end_bit_offset: u64, decoded_offset: u64) -> Option<crate::chunk::Footer> {
        let mut reader = BitReader::with_start_bit(self.data.clone(), end_bit_offset);
        chunk_decoder::read_gzip_footer(&mut reader, decoded_offset).ok()
    }

    fn cache_insert(&self, decoded_offset: u64, chunk: Arc<ChunkData>) {
        let config = self.config.lock().unwrap();
        let budget = config.prefetch_cache_bytes;
        drop(config);

        let mut cache = self.cache.lock().unwrap();
        let mut bytes = self.cache_bytes.lock().unwrap();
        *bytes += chunk.len();
        cache.push_back(CachedChunk {
            decoded_offset,
            data: chunk,
        });

        while *bytes > budget {
            if let Some(evicted) = cache.pop_front() {
                *bytes = bytes.saturating_sub(evicted.data.len());
            } else {
                break;
            }
        }
    }

    /// Prefetches and decodes chunks covering `[start, start + count *
    /// chunk_size)` in parallel via the global Rayon pool, populating the
    /// cache ahead of sequential consumption. Only walks ranges already
    /// present in the block map (i.e. the frontier itself is always
    /// advanced by the authoritative chain in [`Self::get`]); this just
    /// warms the cache for chunks that were already decoded but evicted.
    pub fn prefetch(&self, start_decoded_offset: u64, count: usize) -> Result<()> {
        let config = self.config.lock().unwrap().clone();
        let mut entries = Vec::with_capacity(count);
        let mut cursor = start_decoded_offset;

        for _ in 0..count {
            if self.is_stopped() {
                break;
            }
            match self.block_map.find_data_offset(cursor) {
                Some(entry) if cursor < entry.decoded_offset + entry.decoded_size => {
                    cursor = entry.decoded_offset + entry.decoded_size;
                    entries.push(entry);
                }
                _ => break,
            }
        }

        if entries.is_empty() {
            return Ok(());
        }

        use rayon::prelude::*;
        let results: Vec<_> = entries
            .par_iter()
            .map(|&entry| self.decode_one(entry.encoded_bit_offset, entry.decoded_offset, &config))
            .collect();

        for result in results {
            let (mut result, window) = result?;
            if let Some(window_bytes) = window {
                result.chunk.apply_window(&window_bytes)?;
            }
            if !result.chunk.has_markers() {
                let decoded_offset = result.chunk.decoded_offset;
                self.cache_insert(decoded_offset, Arc::new(result.chunk));
            }
        }
        Ok(())
    }

    /// Speculatively marker-decodes up to `region_count - 1` candidate
    /// block starts spread evenly across the remaining stream, entirely
    /// independent of the authoritative decode chain. Results are cached
    /// by encoded bit offset only; [`Self::decode_and_cache`] consults
    /// this cache when (and only when) the authoritative chain
    /// independently resumes at that exact bit offset, which is what
    /// makes using a speculative result safe even though the candidate
    /// search itself is a heuristic that can (and does) produce false
    /// positives elsewhere in the file.
    ///
    /// Mirrors `parallel_bzip2_cat`'s scan-then-parallel-decode shape,
    /// generalized from bzip2's self-delimiting magic-number blocks
    /// (exact offsets from an `AhoCorasick` scan) to deflate's
    /// structurally-plausible-but-unconfirmed ones.
    pub fn prefetch_parallel(&self, region_count: usize) -> Result<()> {
        if region_count < 2 {
            return Ok(());
        }
        let total_bits = self.data.len() as u64 * 8;
        let start_bit = *self.initial_bit_offset.lock().unwrap();
        if total_bits <= start_bit {
            return Ok(());
        }
        let config = self.config.lock().unwrap().clone();

        // Merge regions that would otherwise fall below the configured
        // floor: speculatively decoding a sliver too small to amortize its
        // own bookkeeping is wasted work, not a useful split.
        let remaining_bytes = (total_bits - start_bit) / 8;
        let min_region_bytes = config.minimum_split_chunk_size.max(1) as u64;
        let region_count = region_count.min(
            (remaining_bytes / min_region_bytes).max(1) as usize,
        );
        if region_count < 2 {
            return Ok(());
        }

        let span = (total_bits - start_bit) / region_count as u64;
        if span == 0 {
            return Ok(());
        }

        let mut candidates = Vec::with_capacity(region_count - 1);
        for i in 1..region_count {
            if self.is_stopped() {
                break;
            }
            let search_from = start_bit + span * i as u64;
            let search_to = (search_from + config.search_range_bits).min(total_bits);
            if let Some(bit_offset) = blockfinder::next_candidate(&self.data, search_from, search_to) {
                candidates.push(bit_offset);
            }
        }
        candidates.sort_unstable();
        candidates.dedup();

        use rayon::prelude::*;
        let decoded: Vec<(u64, ChunkResult)> = candidates
            .par_iter()
            .filter_map(|&bit_offset| {
                let request = ChunkRequest {
                    data: self.data.clone(),
                    encoded_bit_offset: bit_offset,
                    decoded_offset: 0,
                    window: None,
                    target_decoded_size: config.chunk_size,
                    max_decoded_size: config.max_decoded_chunk_size,
                    split_chunk_size: config.split_chunk_size,
                    minimum_split_chunk_size: config.minimum_split_chunk_size,
                };
                chunk_decoder::decode_chunk(request).ok().map(|r| (bit_offset, r))
            })
            .collect();

        let mut speculative = self.speculative.lock().unwrap();
        for (bit_offset, result) in decoded {
            speculative.insert(bit_offset, result);
        }
        Ok(())
    }

    /// Finds the next candidate chunk start at or after `after_bit`,
    /// delegating to [`blockfinder::next_candidate`].
    pub fn next_candidate(&self, after_bit: u64) -> Option<u64> {
        let config = self.config.lock().unwrap();
        let range = config.search_range_bits;
        drop(config);
        blockfinder::next_candidate(&self.data, after_bit, after_bit + range)
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
    fn get_advances_past_first_chunk() {
        // Force small chunks so a single stream spans several of them,
        // exercising the frontier-advance path in `get`.
        let input = b"the quick brown fox jumps over the lazy dog ".repeat(2000);
        let compressed = deflate(&input);
        let data: Arc<[u8]> = Arc::from(compressed.as_slice());

        let mut config = ChunkConfiguration::default();
        config.chunk_size = 4096;
        let fetcher = ChunkFetcher::new(data, config);

        let first = fetcher.get(0).unwrap();
        assert!(first.len() > 0);
        let next_offset = first.len() as u64;

        let second = fetcher.get(next_offset).unwrap();
        assert_eq!(second.decoded_offset, next_offset);
        assert!(!second.has_markers());
    }

    #[test]
    fn get_reaches_end_of_stream() {
        let input = b"short stream".to_vec();
        let compressed = deflate(&input);
        let data: Arc<[u8]> = Arc::from(compressed.as_slice());

        let fetcher = ChunkFetcher::new(data, ChunkConfiguration::default());
        let chunk = fetcher.get(0).unwrap();
        assert_eq!(chunk.resolved_bytes(), input);

        let past_end = fetcher.get(chunk.len() as u64);
        assert!(past_end.is_err());
    }
}
