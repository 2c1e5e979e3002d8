//! On-disk seek index codecs: Format A (`indexed_gzip`-compatible GZIDX)
//! and Format B (BGZF `.gzi`-compatible). Byte layouts ported from
//! `examples/original_source/.../IndexFileFormat.hpp`.

use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::blockmap::BlockMapEntry;
use crate::error::{Error, Result};
use crate::window::{Window, WindowMap};

const GZIDX_MAGIC: &[u8; 5] = b"GZIDX";

#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub compressed_bit_offset: u64,
    pub decoded_offset: u64,
    pub window: Option<Arc<[u8]>>,
}

#[derive(Debug, Clone, Default)]
pub struct GzipIndex {
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub checkpoint_spacing: u64,
    pub checkpoints: Vec<Checkpoint>,
}

impl GzipIndex {
    /// Builds an index from the fetcher's `BlockMap`, looking each emitted
    /// checkpoint's window up in `window_map` so a re-imported index can
    /// actually resume decoding without re-scanning from the start of the
    /// file.
    pub fn from_block_map(entries: &[BlockMapEntry], checkpoint_spacing: u64, window_map: &WindowMap) -> Self {
        let mut checkpoints = Vec::new();
        let mut last_decoded = None;
        for entry in entries {
            let should_emit = match last_decoded {
                None => true,
                Some(prev) => entry.decoded_offset.saturating_sub(prev) >= checkpoint_spacing,
            };
            if should_emit {
                let window = window_map.get(entry.decoded_offset).map(|w| w.decompress());
                checkpoints.push(Checkpoint {
                    compressed_bit_offset: entry.encoded_bit_offset,
                    decoded_offset: entry.decoded_offset,
                    window,
                });
                last_decoded = Some(entry.decoded_offset);
            }
        }
        let (compressed_size, uncompressed_size) = entries
            .last()
            .map(|e| (e.encoded_bit_offset / 8, e.decoded_offset + e.decoded_size))
            .unwrap_or((0, 0));

        Self {
            compressed_size,
            uncompressed_size,
            checkpoint_spacing,
            checkpoints,
        }
    }

    /// Writes Format A (`GZIDX`), matching `indexed_gzip`'s v1 layout
    /// byte-for-byte (SPEC_FULL.md §6): 5-byte magic, 1-byte version,
    /// 1-byte reserved flags, `compressedSize`/`uncompressedSize` as
    /// `u64`, `spacing`/`windowSize` as `u32`, `checkpointCount` as
    /// `u32`, then one 18-byte record per checkpoint (byte-rounded
    /// compressed offset, decoded offset, sub-byte bit shift, window
    /// flag), followed by each checkpoint's 32768-byte zero-left-padded
    /// window for checkpoints that carry one.
    pub fn write_format_a<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(GZIDX_MAGIC)?;
        writer.write_all(&[1u8])?; // version 1
        writer.write_all(&[0u8])?; // reserved flags
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        writer.write_all(&self.uncompressed_size.to_le_bytes())?;
        writer.write_all(&(self.checkpoint_spacing as u32).to_le_bytes())?;
        writer.write_all(&(crate::deflate::MAX_WINDOW_SIZE as u32).to_le_bytes())?;
        writer.write_all(&(self.checkpoints.len() as u32).to_le_bytes())?;

        for checkpoint in &self.checkpoints {
            let (bytes_rounded_down, bits) = split_bit_offset(checkpoint.compressed_bit_offset);
            writer.write_all(&bytes_rounded_down.to_le_bytes())?;
            writer.write_all(&checkpoint.decoded_offset.to_le_bytes())?;
            writer.write_all(&[bits])?;
            let has_window = checkpoint.window.is_some() as u8;
            writer.write_all(&[has_window])?;
        }
        for checkpoint in &self.checkpoints {
            if let Some(window) = &checkpoint.window {
                let mut padded = vec![0u8; 32768];
                let start = 32768 - window.len().min(32768);
                padded[start..].copy_from_slice(&window[window.len().saturating_sub(32768)..]);
                writer.write_all(&padded)?;
            }
        }
        Ok(())
    }

    pub fn read_format_a<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 5];
        reader.read_exact(&mut magic)?;
        if &magic != GZIDX_MAGIC {
            return Err(Error::InvalidIndex("bad GZIDX magic".into()));
        }
        let mut version_byte = [0u8; 1];
        reader.read_exact(&mut version_byte)?;
        let version = version_byte[0] as u32;
        if version != 0 && version != 1 {
            return Err(Error::UnsupportedIndexVersion(version));
        }
        let mut reserved = [0u8; 1];
        reader.read_exact(&mut reserved)?;

        let compressed_size = read_u64(reader)?;
        let uncompressed_size = read_u64(reader)?;
        let checkpoint_spacing = read_u32(reader)? as u64;
        let window_size = read_u32(reader)?;
        if window_size != crate::deflate::MAX_WINDOW_SIZE as u32 {
            return Err(Error::InvalidIndex(format!(
                "unexpected window size {window_size} (must be 32768)"
            )));
        }
        let count = read_u32(reader)? as usize;

        let mut flags = Vec::with_capacity(count);
        let mut positions = Vec::with_capacity(count);
        for i in 0..count {
            let bytes_rounded_down = read_u64(reader)?;
            let decoded_offset = read_u64(reader)?;
            let mut bits = [0u8; 1];
            reader.read_exact(&mut bits)?;
            let compressed_bit_offset = bytes_rounded_down * 8 - bits[0] as u64;
            // v0 has no per-checkpoint flag byte; every checkpoint but the
            // first carries a window (`indexed_gzip`'s v0 convention).
            let has_window = if version == 1 {
                let mut flag = [0u8; 1];
                reader.read_exact(&mut flag)?;
                flag[0] != 0
            } else {
                i != 0
            };
            positions.push((compressed_bit_offset, decoded_offset));
            flags.push(has_window);
        }

        let mut checkpoints = Vec::with_capacity(count);
        for (i, (compressed_bit_offset, decoded_offset)) in positions.into_iter().enumerate() {
            let window = if flags[i] {
                let mut buf = vec![0u8; 32768];
                reader.read_exact(&mut buf)?;
                Some(Arc::from(buf))
            } else {
                None
            };
            checkpoints.push(Checkpoint {
                compressed_bit_offset,
                decoded_offset,
                window,
            });
        }

        Ok(Self {
            compressed_size,
            uncompressed_size,
            checkpoint_spacing,
            checkpoints,
        })
    }

    /// Writes Format B, the simple BGZF `.gzi` layout: a `u64` count
    /// followed by that many `(compressed_offset, uncompressed_offset)`
    /// pairs, both little-endian `u64`s. A count of all-ones bits
    /// signals "zero checkpoints" (an `indexed_gzip` convention for
    /// distinguishing an empty index from a truncated file).
    pub fn write_format_b<W: Write>(&self, writer: &mut W) -> Result<()> {
        let count = if self.checkpoints.is_empty() {
            u64::MAX
        } else {
            self.checkpoints.len() as u64
        };
        writer.write_all(&count.to_le_bytes())?;
        for checkpoint in &self.checkpoints {
            writer.write_all(&(checkpoint.compressed_bit_offset / 8).to_le_bytes())?;
            writer.write_all(&checkpoint.decoded_offset.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read_format_b<R: Read>(reader: &mut R) -> Result<Self> {
        let raw_count = read_u64(reader)?;
        let count = if raw_count == u64::MAX { 0 } else { raw_count as usize };

        let mut checkpoints = Vec::with_capacity(count);
        for _ in 0..count {
            let compressed_offset = read_u64(reader)?;
            let decoded_offset = read_u64(reader)?;
            checkpoints.push(Checkpoint {
                compressed_bit_offset: compressed_offset * 8,
                decoded_offset,
                window: None,
            });
        }

        let (compressed_size, uncompressed_size) = checkpoints
            .last()
            .map(|c| (c.compressed_bit_offset / 8, c.decoded_offset))
            .unwrap_or((0, 0));

        Ok(Self {
            compressed_size,
            uncompressed_size,
            checkpoint_spacing: 0,
            checkpoints,
        })
    }

    /// Converts checkpoints carrying windows into `Window` values, for
    /// seeding a `WindowMap` after import.
    pub fn windows(&self) -> Vec<(u64, Window)> {
        self.checkpoints
            .iter()
            .filter_map(|c| c.window.as_ref().map(|w| (c.decoded_offset, Window::Raw(w.clone()))))
            .collect()
    }

    pub fn block_map_entries(&self) -> Vec<BlockMapEntry> {
        let mut entries = Vec::with_capacity(self.checkpoints.len());
        for window in self.checkpoints.windows(2) {
            let (a, b) = (&window[0], &window[1]);
            entries.push(BlockMapEntry {
                encoded_bit_offset: a.compressed_bit_offset,
                decoded_offset: a.decoded_offset,
                decoded_size: b.decoded_offset - a.decoded_offset,
            });
        }
        if let Some(last) = self.checkpoints.last() {
            entries.push(BlockMapEntry {
                encoded_bit_offset: last.compressed_bit_offset,
                decoded_offset: last.decoded_offset,
                decoded_size: self.uncompressed_size.saturating_sub(last.decoded_offset),
            });
        }
        entries
    }
}

/// Splits a bit offset into the `(compressedOffsetInBytesRoundedDown,
/// bits)` pair the Format A record stores, s.t. `compressedOffsetInBits
/// == bytesRoundedDown * 8 - bits` with `bits` in `0..=7`.
fn split_bit_offset(bit_offset: u64) -> (u64, u8) {
    let bytes_rounded_down = (bit_offset + 7) / 8;
    let bits = (bytes_rounded_down * 8 - bit_offset) as u8;
    (bytes_rounded_down, bits)
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> GzipIndex {
        GzipIndex {
            compressed_size: 1000,
            uncompressed_size: 100_000,
            checkpoint_spacing: 32 * 1024 * 1024,
            checkpoints: vec![
                Checkpoint {
                    compressed_bit_offset: 0,
                    decoded_offset: 0,
                    window: None,
                },
                Checkpoint {
                    compressed_bit_offset: 8000,
                    decoded_offset: 50_000,
                    window: Some(Arc::from(vec![7u8; 32768])),
                },
            ],
        }
    }

    #[test]
    fn format_a_round_trips() {
        let index = sample_index();
        let mut buf = Vec::new();
        index.write_format_a(&mut buf).unwrap();

        let parsed = GzipIndex::read_format_a(&mut &buf[..]).unwrap();
        assert_eq!(parsed.compressed_size, index.compressed_size);
        assert_eq!(parsed.uncompressed_size, index.uncompressed_size);
        assert_eq!(parsed.checkpoints.len(), 2);
        assert!(parsed.checkpoints[0].window.is_none());
        assert!(parsed.checkpoints[1].window.is_some());
    }

    #[test]
    fn format_b_round_trips() {
        let index = sample_index();
        let mut buf = Vec::new();
        index.write_format_b(&mut buf).unwrap();

        let parsed = GzipIndex::read_format_b(&mut &buf[..]).unwrap();
        assert_eq!(parsed.checkpoints.len(), 2);
        assert_eq!(parsed.checkpoints[1].decoded_offset, 50_000);
    }

    #[test]
    fn format_b_empty_uses_sentinel_count() {
        let index = GzipIndex::default();
        let mut buf = Vec::new();
        index.write_format_b(&mut buf).unwrap();
        assert_eq!(&buf[..8], &u64::MAX.to_le_bytes());

        let parsed = GzipIndex::read_format_b(&mut &buf[..]).unwrap();
        assert!(parsed.checkpoints.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = b"NOT_GZIDX_HEADER_BYTES".to_vec();
        assert!(GzipIndex::read_format_a(&mut &buf[..]).is_err());
    }
}
