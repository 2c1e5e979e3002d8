//! `ChunkData`: the decoded-output buffer a [`crate::chunk_decoder`] builds,
//! in either fully-resolved or marker form, plus marker resolution once a
//! chunk's window becomes known.

use std::sync::Arc;

use crate::crc32::Crc32State;
use crate::deflate::{DecodeSink, MAX_WINDOW_SIZE};
use crate::error::{Error, Result};
use crate::window::Window;

/// A two-byte symbol emitted while decoding without a known window:
/// values `0..=255` are resolved literal bytes, values
/// `MAX_WINDOW_SIZE..2*MAX_WINDOW_SIZE` name a byte at `value -
/// MAX_WINDOW_SIZE` within the (still unknown) 32 KiB window that will
/// eventually precede this chunk.
pub type MarkerByte = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateBlockBoundary {
    pub encoded_bit_offset: u64,
    pub decoded_offset: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Footer {
    pub encoded_bit_offset: u64,
    /// Decoded byte offset at which the member this footer closes ends —
    /// always a chunk boundary, since a chunk decoder stops as soon as it
    /// hits a final block (see `chunk_decoder::decode_chunk`).
    pub decoded_offset: u64,
    pub crc32: u32,
    pub isize: u32,
}

/// One contiguous run of decoded bytes, either fully resolved or still
/// containing unresolved markers.
enum Run {
    Bytes(Vec<u8>),
    Markers(Vec<MarkerByte>),
}

/// An independently indexable slice of a chunk's decoded output, split at
/// deflate block boundaries (see `chunk_decoder`'s splitting logic) so
/// `BlockMap`/`WindowMap` bookkeeping can live at a finer grain than "one
/// chunk" without the fetcher needing to know how a chunk was decoded.
#[derive(Debug, Clone)]
pub struct Subchunk {
    pub encoded_bit_offset: u64,
    pub encoded_bit_size: u64,
    pub decoded_offset: u64,
    pub decoded_size: u64,
    pub window: Option<Arc<Window>>,
}

/// The decoded output of one chunk, built incrementally by a chunk
/// decoder and finalized once its extent is known.
pub struct ChunkData {
    runs: Vec<Run>,
    pub block_boundaries: Vec<DeflateBlockBoundary>,
    pub footers: Vec<Footer>,
    pub subchunks: Vec<Subchunk>,
    pub decoded_offset: u64,
    pub encoded_bit_offset: u64,
    pub encoded_bit_size: u64,
    crc32: Crc32State,
    finalized: bool,
}

impl ChunkData {
    pub fn new(decoded_offset: u64, encoded_bit_offset: u64) -> Self {
        Self {
            runs: Vec::new(),
            block_boundaries: Vec::new(),
            footers: Vec::new(),
            subchunks: Vec::new(),
            decoded_offset,
            encoded_bit_offset,
            encoded_bit_size: 0,
            crc32: Crc32State::new(),
            finalized: false,
        }
    }

    pub fn append_block_boundary(&mut self, encoded_bit_offset: u64) {
        self.block_boundaries.push(DeflateBlockBoundary {
            encoded_bit_offset,
            decoded_offset: self.decoded_offset + self.len() as u64,
        });
    }

    pub fn append_footer(&mut self, footer: Footer) {
        self.footers.push(footer);
    }

    pub fn append_subchunk(&mut self, subchunk: Subchunk) {
        self.subchunks.push(subchunk);
    }

    /// Re-bases every decoded-offset field (the chunk's own, its block
    /// boundaries', footers', and subchunks') onto `new_decoded_offset`.
    /// Used when a chunk was decoded speculatively before its true
    /// position in the stream was known (see
    /// `ChunkFetcher::prefetch_parallel`), which builds it with a
    /// placeholder `decoded_offset` of `0`.
    pub fn rebase(&mut self, new_decoded_offset: u64) {
        let delta = new_decoded_offset as i128 - self.decoded_offset as i128;
        for boundary in &mut self.block_boundaries {
            boundary.decoded_offset = (boundary.decoded_offset as i128 + delta) as u64;
        }
        for footer in &mut self.footers {
            footer.decoded_offset = (footer.decoded_offset as i128 + delta) as u64;
        }
        for subchunk in &mut self.subchunks {
            subchunk.decoded_offset = (subchunk.decoded_offset as i128 + delta) as u64;
        }
        self.decoded_offset = new_decoded_offset;
    }

    pub fn finalize(&mut self, encoded_bit_size: u64) {
        self.encoded_bit_size = encoded_bit_size;
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn len(&self) -> usize {
        self.runs
            .iter()
            .map(|run| match run {
                Run::Bytes(b) => b.len(),
                Run::Markers(m) => m.len(),
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if any run still holds unresolved markers.
    pub fn has_markers(&self) -> bool {
        self.runs.iter().any(|run| matches!(run, Run::Markers(_)))
    }

    /// Returns the fully-resolved bytes, panicking if markers remain —
    /// callers must resolve markers via [`Self::apply_window`] first.
    pub fn resolved_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for run in &self.runs {
            match run {
                Run::Bytes(b) => out.extend_from_slice(b),
                Run::Markers(_) => {
                    panic!("resolved_bytes called on a ChunkData with unresolved markers")
                }
            }
        }
        out
    }

    /// Resolves every marker against `window` (the up-to-32KiB history
    /// immediately preceding this chunk), merging marker runs into byte
    /// runs in place. Ported from `MarkerReplacement.hpp`'s `MapMarkers`.
    pub fn apply_window(&mut self, window: &[u8]) -> Result<()> {
        let full_window = window.len() >= MAX_WINDOW_SIZE;
        for run in &mut self.runs {
            if let Run::Markers(markers) = run {
                let mut resolved = Vec::with_capacity(markers.len());
                for &value in markers.iter() {
                    resolved.push(resolve_marker(value, window, full_window)?);
                }
                *run = Run::Bytes(resolved);
            }
        }
        Ok(())
    }

    /// Computes the CRC32 of this chunk's bytes. Requires markers to
    /// already be resolved.
    pub fn compute_crc32(&self) -> Crc32State {
        let mut state = Crc32State::new();
        for run in &self.runs {
            match run {
                Run::Bytes(b) => state.update(b),
                Run::Markers(_) => {
                    panic!("compute_crc32 called on a ChunkData with unresolved markers")
                }
            }
        }
        state
    }

    /// The trailing up-to-32KiB window this chunk leaves behind for the
    /// next one, if markers are already resolved.
    pub fn trailing_window(&self) -> Vec<u8> {
        let bytes = self.resolved_bytes();
        let start = bytes.len().saturating_sub(MAX_WINDOW_SIZE);
        bytes[start..].to_vec()
    }

    /// The up-to-32KiB window ending at relative offset `rel_end` within
    /// this chunk's own resolved output, splicing in the tail of
    /// `preceding` (the window this chunk itself decoded against) when
    /// `rel_end` bytes alone aren't enough to fill a full window — unlike
    /// [`Self::trailing_window`], which only ever looks at this chunk's
    /// own bytes and so under-reports history for chunks shorter than
    /// `MAX_WINDOW_SIZE`.
    pub fn window_ending_at(&self, rel_end: usize, preceding: &[u8]) -> Vec<u8> {
        let bytes = self.resolved_bytes();
        let own = &bytes[..rel_end.min(bytes.len())];
        if own.len() >= MAX_WINDOW_SIZE {
            return own[own.len() - MAX_WINDOW_SIZE..].to_vec();
        }
        let needed_from_preceding = MAX_WINDOW_SIZE - own.len();
        let take_preceding = needed_from_preceding.min(preceding.len());
        let mut out = Vec::with_capacity(take_preceding + own.len());
        out.extend_from_slice(&preceding[preceding.len() - take_preceding..]);
        out.extend_from_slice(own);
        out
    }
}

/// Reads `relative_back` bytes back from the end of already-produced
/// (resolved) runs, without looking into any preceding window. Shared by
/// [`ResolvedSink`] and [`UsageSink`], which differ only in what happens
/// once a back-reference reaches past this chunk's own output.
fn byte_at_in_runs(runs: &[Run], relative_back: usize) -> Option<u8> {
    let mut remaining = relative_back;
    for run in runs.iter().rev() {
        let bytes = match run {
            Run::Bytes(b) => b,
            Run::Markers(_) => return None,
        };
        if remaining <= bytes.len() {
            return Some(bytes[bytes.len() - remaining]);
        }
        remaining -= bytes.len();
    }
    None
}

fn resolve_marker(value: MarkerByte, window: &[u8], full_window: bool) -> Result<u8> {
    if value <= u8::MAX as u16 {
        return Ok(value as u8);
    }
    if value < MAX_WINDOW_SIZE as u16 {
        return Err(Error::Internal("unresolvable 2-byte marker code".into()));
    }
    let index = (value - MAX_WINDOW_SIZE as u16) as usize;
    if !full_window && index >= window.len() {
        return Err(Error::Internal("window too small to resolve marker".into()));
    }
    window
        .get(index)
        .copied()
        .ok_or_else(|| Error::Internal("window too small to resolve marker".into()))
}

/// `DecodeSink` that resolves back-references directly, for use once the
/// chunk's window is already known (the "exact" and "upgrade" decode
/// paths in [`crate::chunk_decoder`]).
pub struct ResolvedSink<'a> {
    pub data: &'a mut ChunkData,
    /// Bytes decoded before `data` started (the window), kept so
    /// back-references can reach into it.
    pub window: &'a [u8],
}

impl<'a> ResolvedSink<'a> {
    fn byte_at(&self, relative_back: usize) -> Option<u8> {
        let produced = self.data.len();
        if relative_back <= produced {
            byte_at_in_runs(&self.data.runs, relative_back)
        } else {
            let window_index = self.window.len().checked_sub(relative_back - produced)?;
            self.window.get(window_index).copied()
        }
    }
}

impl<'a> DecodeSink for ResolvedSink<'a> {
    fn len(&self) -> usize {
        self.data.len() + self.window.len()
    }

    fn push_literal(&mut self, byte: u8) {
        match self.data.runs.last_mut() {
            Some(Run::Bytes(bytes)) => bytes.push(byte),
            _ => self.data.runs.push(Run::Bytes(vec![byte])),
        }
    }

    fn push_back_reference(&mut self, distance: usize, length: usize) -> Result<()> {
        if distance == 0 || distance > self.data.len() + self.window.len() {
            return Err(Error::InvalidDistance {
                distance,
                available: self.data.len() + self.window.len(),
            });
        }
        for _ in 0..length {
            let byte = self.byte_at(distance).ok_or(Error::InvalidDistance {
                distance,
                available: self.data.len() + self.window.len(),
            })?;
            self.push_literal(byte);
        }
        Ok(())
    }
}

/// `DecodeSink` identical to [`ResolvedSink`] except it also records,
/// into `touched`, every position of `window` a back-reference actually
/// reads. Used only by `chunk_decoder::compute_sparse_window`'s re-scan,
/// never on the normal decode path.
pub struct UsageSink<'a> {
    pub data: &'a mut ChunkData,
    pub window: &'a [u8],
    pub touched: &'a mut [bool],
}

impl<'a> UsageSink<'a> {
    fn byte_at(&mut self, relative_back: usize) -> Option<u8> {
        let produced = self.data.len();
        if relative_back <= produced {
            byte_at_in_runs(&self.data.runs, relative_back)
        } else {
            let window_index = self.window.len().checked_sub(relative_back - produced)?;
            if let Some(slot) = self.touched.get_mut(window_index) {
                *slot = true;
            }
            self.window.get(window_index).copied()
        }
    }
}

impl<'a> DecodeSink for UsageSink<'a> {
    fn len(&self) -> usize {
        self.data.len() + self.window.len()
    }

    fn push_literal(&mut self, byte: u8) {
        match self.data.runs.last_mut() {
            Some(Run::Bytes(bytes)) => bytes.push(byte),
            _ => self.data.runs.push(Run::Bytes(vec![byte])),
        }
    }

    fn push_back_reference(&mut self, distance: usize, length: usize) -> Result<()> {
        if distance == 0 || distance > self.data.len() + self.window.len() {
            return Err(Error::InvalidDistance {
                distance,
                available: self.data.len() + self.window.len(),
            });
        }
        for _ in 0..length {
            let byte = self.byte_at(distance).ok_or(Error::InvalidDistance {
                distance,
                available: self.data.len() + self.window.len(),
            })?;
            self.push_literal(byte);
        }
        Ok(())
    }
}

/// `DecodeSink` that emits markers for distances reaching before the
/// start of this chunk (the "inexact without window" decode path).
pub struct MarkerSink<'a> {
    pub data: &'a mut ChunkData,
}

impl<'a> MarkerSink<'a> {
    fn marker_at(&self, relative_back: usize) -> Option<MarkerByte> {
        let produced = self.data.len();
        if relative_back > produced {
            // Reaches before this chunk's own output. The eventual window
            // is assumed to be exactly MAX_WINDOW_SIZE bytes (the deflate
            // maximum); `back_into_window == 1` means "the byte right
            // before this chunk", i.e. window index MAX_WINDOW_SIZE - 1.
            // `apply_window` re-validates this assumption against the
            // window actually handed to it.
            let back_into_window = relative_back - produced;
            if back_into_window > MAX_WINDOW_SIZE {
                return None;
            }
            let index_in_window = MAX_WINDOW_SIZE - back_into_window;
            return Some((MAX_WINDOW_SIZE + index_in_window) as MarkerByte);
        }
        let mut remaining = relative_back;
        for run in self.data.runs.iter().rev() {
            match run {
                Run::Bytes(bytes) => {
                    if remaining <= bytes.len() {
                        return Some(bytes[bytes.len() - remaining] as MarkerByte);
                    }
                    remaining -= bytes.len();
                }
                Run::Markers(markers) => {
                    if remaining <= markers.len() {
                        return Some(markers[markers.len() - remaining]);
                    }
                    remaining -= markers.len();
                }
            }
        }
        None
    }
}

impl<'a> DecodeSink for MarkerSink<'a> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn push_literal(&mut self, byte: u8) {
        match self.data.runs.last_mut() {
            Some(Run::Bytes(bytes)) => bytes.push(byte),
            _ => self.data.runs.push(Run::Bytes(vec![byte])),
        }
    }

    fn push_back_reference(&mut self, distance: usize, length: usize) -> Result<()> {
        if distance == 0 || distance > MAX_WINDOW_SIZE {
            return Err(Error::InvalidDistance {
                distance,
                available: self.data.len(),
            });
        }
        for _ in 0..length {
            match self.marker_at(distance) {
                Some(value) => self.push_marker(value),
                None => {
                    // Distance reaches before the start of the stream
                    // itself (not just before this chunk) -- only valid
                    // at the very start of a member, where it's a hard
                    // error.
                    return Err(Error::InvalidDistance {
                        distance,
                        available: self.data.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl<'a> MarkerSink<'a> {
    fn push_marker(&mut self, value: MarkerByte) {
        match self.data.runs.last_mut() {
            Some(Run::Markers(markers)) => markers.push(value),
            _ => self.data.runs.push(Run::Markers(vec![value])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_sink_handles_literal_and_back_reference() {
        let mut chunk = ChunkData::new(0, 0);
        {
            let mut sink = ResolvedSink {
                data: &mut chunk,
                window: &[],
            };
            sink.push_literal(b'a');
            sink.push_literal(b'b');
            sink.push_back_reference(2, 4).unwrap();
        }
        assert_eq!(chunk.resolved_bytes(), b"ababab".to_vec());
    }

    #[test]
    fn resolved_sink_reads_into_window() {
        let mut chunk = ChunkData::new(100, 0);
        let window = vec![b'x', b'y', b'z'];
        {
            let mut sink = ResolvedSink {
                data: &mut chunk,
                window: &window,
            };
            sink.push_back_reference(3, 3).unwrap();
        }
        assert_eq!(chunk.resolved_bytes(), b"xyz".to_vec());
    }

    #[test]
    fn marker_sink_emits_markers_for_unknown_history() {
        let mut chunk = ChunkData::new(100, 0);
        {
            let mut sink = MarkerSink { data: &mut chunk };
            sink.push_literal(b'a');
            // distance 5 reaches 4 bytes before this chunk's single byte.
            sink.push_back_reference(5, 1).unwrap();
        }
        assert!(chunk.has_markers());
    }

    #[test]
    fn apply_window_resolves_markers() {
        let mut chunk = ChunkData::new(100, 0);
        {
            let mut sink = MarkerSink { data: &mut chunk };
            sink.push_back_reference(1, 1).unwrap();
        }
        assert!(chunk.has_markers());

        let mut window = vec![0u8; MAX_WINDOW_SIZE];
        *window.last_mut().unwrap() = b'Z';
        chunk.apply_window(&window).unwrap();

        assert_eq!(chunk.resolved_bytes(), vec![b'Z']);
    }

    #[test]
    fn window_ending_at_splices_preceding_for_short_chunks() {
        let mut chunk = ChunkData::new(0, 0);
        {
            let mut sink = ResolvedSink { data: &mut chunk, window: &[] };
            sink.push_literal(b'x');
            sink.push_literal(b'y');
        }
        let preceding = vec![b'a'; MAX_WINDOW_SIZE];
        let window = chunk.window_ending_at(2, &preceding);
        assert_eq!(window.len(), MAX_WINDOW_SIZE);
        assert_eq!(&window[window.len() - 2..], b"xy");
        assert!(window[..window.len() - 2].iter().all(|&b| b == b'a'));
    }
}
