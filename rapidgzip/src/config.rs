//! Per-reader tunables. Grouped into one `Clone`-able struct so
//! [`crate::fetcher::ChunkFetcher::set_chunk_configuration`] can swap the
//! whole set atomically under one lock, the same way the teacher's
//! `tune_threads` recomputes a small settings bundle and hands it to the
//! pipeline in one shot.

use crate::blockfinder::{DEFAULT_SEARCH_RANGE_BITS, DEFAULT_SPACING_BITS};

#[derive(Debug, Clone)]
pub struct ChunkConfiguration {
    /// Target decoded bytes per chunk; actual chunks may be shorter
    /// (ending at the preceding block boundary) or merged with a
    /// neighbor if they'd fall below `minimum_split_chunk_size`.
    pub chunk_size: usize,
    /// Deflate-block-boundary granularity a chunk's own decoded range is
    /// split into for `BlockMap`/`WindowMap` indexing (a subchunk never
    /// crosses a `chunk_size` boundary, so this should stay well under
    /// it). A trailing split below `minimum_split_chunk_size` is merged
    /// into its predecessor instead of published on its own.
    pub split_chunk_size: usize,
    pub minimum_split_chunk_size: usize,
    pub max_decoded_chunk_size: usize,
    /// Number of worker threads; `0` means let Rayon pick based on the
    /// available parallelism.
    pub parallelization: usize,
    pub search_range_bits: u64,
    pub partition_spacing_bits: u64,
    pub use_sparse_windows: bool,
    pub prefetch_cache_bytes: usize,
    /// Character used for `--count-lines`; `b'\n'` unless overridden.
    pub newline_character: u8,
}

impl Default for ChunkConfiguration {
    fn default() -> Self {
        Self {
            chunk_size: 4 * 1024 * 1024,
            split_chunk_size: 1024 * 1024,
            minimum_split_chunk_size: 256 * 1024,
            max_decoded_chunk_size: 256 * 1024 * 1024,
            parallelization: 0,
            search_range_bits: DEFAULT_SEARCH_RANGE_BITS,
            partition_spacing_bits: DEFAULT_SPACING_BITS,
            use_sparse_windows: true,
            prefetch_cache_bytes: 512 * 1024 * 1024,
            newline_character: b'\n',
        }
    }
}
