use std::io;

/// Errors surfaced by the decoding engine.
///
/// Variants distinguish speculative failures (caught internally while a
/// [`crate::blockfinder::BlockFinder`] is still guessing at candidate
/// offsets) from committed failures (propagated once a chunk start has been
/// accepted and decoding is no longer speculative).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unexpected end of input while reading bitstream")]
    UnexpectedEof,

    #[error("invalid deflate block header (BTYPE == 3)")]
    InvalidBlockType,

    #[error("invalid or over-subscribed Huffman code lengths")]
    InvalidCodeLengths,

    #[error("uncompressed block length check failed (LEN != ~NLEN)")]
    InvalidStoredBlockLength,

    #[error("back-reference distance too far: {distance} > {available} available bytes")]
    InvalidDistance { distance: usize, available: usize },

    #[error("invalid gzip/zlib/bzip2 header magic")]
    InvalidHeader,

    #[error("zlib preset dictionaries (FDICT) are not supported")]
    PresetDictionaryUnsupported,

    #[error("CRC32 mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    Crc32Mismatch { expected: u32, computed: u32 },

    #[error("ISIZE mismatch: expected {expected}, decoded {computed}")]
    SizeMismatch { expected: u32, computed: u64 },

    #[error("no plausible block start found in range [{start}, {end})")]
    NoBlockInRange { start: u64, end: u64 },

    #[error("requested offset {offset} lies beyond the end of the decoded stream")]
    OffsetOutOfBounds { offset: u64 },

    #[error("decoded block exceeds the {limit} byte safety guard")]
    OutOfMemoryGuard { limit: usize },

    #[error("corrupt or unsupported index file: {0}")]
    InvalidIndex(String),

    #[error("index file format/version {0} is not supported")]
    UnsupportedIndexVersion(u32),

    #[error("internal consistency error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
