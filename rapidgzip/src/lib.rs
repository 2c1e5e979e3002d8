//! Parallel decompression engine for gzip, zlib, raw-deflate and BGZF
//! streams, with bzip2 as a companion format, plus a persistent on-disk
//! seek index.
//!
//! ```no_run
//! use rapidgzip::{open, ChunkConfiguration};
//! use std::io::Read;
//!
//! let mut reader = open("archive.gz", ChunkConfiguration::default()).unwrap();
//! let mut contents = Vec::new();
//! reader.read_to_end(&mut contents).unwrap();
//! ```

pub mod bitreader;
pub mod blockfinder;
pub mod blockmap;
pub mod bzip2_chunk;
pub mod chunk;
pub mod chunk_decoder;
pub mod config;
pub mod crc32;
pub mod deflate;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod huffman;
pub mod index;
pub mod reader;
pub mod window;

pub use chunk::ChunkData;
pub use config::ChunkConfiguration;
pub use error::{Error, Result};
pub use fetcher::ChunkFetcher;
pub use format::FileType;
pub use reader::ParallelReader;

use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Opens a file at `path` for parallel, seekable decompression, sniffing
/// its format (gzip/zlib/raw-deflate/BGZF) and validating the header
/// eagerly so format errors surface immediately rather than on first
/// read.
///
/// Bzip2 files are not supported by this entry point (their block layout
/// has no shared window/seek semantics with deflate); use
/// [`bzip2_chunk::Scanner`] directly for those.
pub fn open<P: AsRef<Path>>(path: P, config: ChunkConfiguration) -> Result<ParallelReader> {
    let bytes = fs::read(path)?;
    open_bytes(Arc::from(bytes.into_boxed_slice()), config)
}

/// As [`open`], but over an in-memory buffer (e.g. from `memmap2::Mmap`
/// coerced into an `Arc<[u8]>` by the caller).
pub fn open_bytes(data: Arc<[u8]>, config: ChunkConfiguration) -> Result<ParallelReader> {
    let file_type = format::sniff(&data);
    let header_bytes = match file_type {
        FileType::Gzip | FileType::Bgzf => format::gzip_header_size(&data)?,
        FileType::Zlib => {
            format::validate_zlib_header(&data)?;
            2
        }
        FileType::Bzip2 => {
            return Err(Error::Internal(
                "bzip2 input requires the bzip2_chunk module directly".into(),
            ))
        }
        // Raw deflate has no magic; callers that know their input is raw
        // deflate still go through this path with no header to skip.
        FileType::Deflate | FileType::Unknown => 0,
    };

    let parallelization = config.parallelization;
    let mut reader = ParallelReader::new(data.clone(), config);
    reader.set_initial_bit_offset(header_bytes as u64 * 8);
    reader.fetcher().set_file_type(file_type);

    let region_count = if parallelization == 0 {
        rayon::current_num_threads()
    } else {
        parallelization
    };
    reader.warm_up_parallel_decode(region_count);

    if data.len() >= header_bytes + 8 {
        if let Some((crc32, isize)) = trailing_gzip_metadata(&data) {
            reader.set_expected_crc32(crc32);
            reader.set_total_decoded_size(isize as u64);
            return Ok(reader);
        }
    }
    Ok(reader)
}

/// Reads the final 8 bytes of a single-member gzip/zlib stream as the
/// trailing CRC32 + ISIZE fields, when present. Multi-member and BGZF
/// streams need the full per-member walk described in SPEC_FULL.md §6 and
/// are left to the caller (e.g. via an imported index) rather than
/// guessed here.
fn trailing_gzip_metadata(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 8 {
        return None;
    }
    let tail = &data[data.len() - 8..];
    let crc32 = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let isize = u32::from_le_bytes([tail[4], tail[5], tail[6], tail[7]]);
    Some((crc32, isize))
}

/// Convenience wrapper that fully decompresses `path` into memory. Not
/// recommended for large files; prefer [`open`] with `Read`/`Seek`.
pub fn decompress_to_vec<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    use std::io::Read;
    let mut reader = open(path, ChunkConfiguration::default())?;
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn sniffs_and_opens_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"hello from a real gzip member\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let result = open_bytes(Arc::from(compressed.into_boxed_slice()), ChunkConfiguration::default());
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_bzip2_through_open() {
        let data: Arc<[u8]> = Arc::from(&b"BZh9"[..]);
        assert!(open_bytes(data, ChunkConfiguration::default()).is_err());
    }
}
