//! Shared back-reference windows: the last (up to) 32 KiB of decoded
//! output preceding a chunk, looked up by the decoded offset at which the
//! chunk starts.
//!
//! Windows are constructed once and published by `Arc`: after insertion
//! they are never mutated, only cloned and shared, which is what lets
//! `WindowMap` guard its index with a single `Mutex` without becoming a
//! bottleneck for readers of already-published windows.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::deflate::MAX_WINDOW_SIZE;

/// A back-reference window, in one of a few representations depending on
/// how much the producer already knew when it was built.
#[derive(Debug, Clone)]
pub enum Window {
    /// No preceding history (start of stream).
    Empty,
    /// The full, exact window bytes.
    Raw(Arc<[u8]>),
    /// A window where only the positions an actual back-reference was
    /// observed to read are meaningful. `mask[i]` is `true` when
    /// `values[i]` holds a real byte; `false` means "never touched, value
    /// unspecified" (stored as `0`). Built by re-decoding the bit range
    /// that consumed this window and recording which offsets its
    /// back-references actually reached
    /// (`chunk_decoder::compute_sparse_window`), then verifying that
    /// replacing every untouched position with an arbitrary byte and
    /// re-decoding still produces identical output — never by diffing
    /// two windows against each other.
    Sparse {
        mask: Arc<[bool]>,
        values: Arc<[u8]>,
    },
}

impl Window {
    /// Materializes the window as a contiguous byte slice, at most
    /// [`MAX_WINDOW_SIZE`] bytes long.
    pub fn decompress(&self) -> Arc<[u8]> {
        match self {
            Window::Empty => Arc::from(&[][..]),
            Window::Raw(bytes) => bytes.clone(),
            Window::Sparse { mask, values } => {
                let mut out = vec![0u8; mask.len()];
                for (i, &present) in mask.iter().enumerate() {
                    if present {
                        out[i] = values[i];
                    }
                }
                Arc::from(out)
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Window::Empty => 0,
            Window::Raw(bytes) => bytes.len(),
            Window::Sparse { mask, .. } => mask.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared, offset-indexed store of back-reference windows.
///
/// Guarded by a single `Mutex`, matching the teacher's "shared `HashMap`
/// behind a lock" approach to cross-worker shared state (see
/// `Bz2Decoder`'s out-of-order block map) — window publication is rare
/// relative to decode work, so lock contention is not a concern.
#[derive(Default)]
pub struct WindowMap {
    windows: Mutex<BTreeMap<u64, Arc<Window>>>,
}

impl WindowMap {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(BTreeMap::new()),
        }
    }

    /// Publishes the window of decoded history immediately preceding
    /// `decoded_offset`. A later insert at an offset that already holds a
    /// non-empty window is ignored unless the new window is itself
    /// non-empty, so a speculative or racing empty placeholder can never
    /// clobber a real window already published there.
    pub fn insert(&self, decoded_offset: u64, window: Window) {
        let mut map = self.windows.lock().unwrap();
        if window.is_empty() {
            if let Some(existing) = map.get(&decoded_offset) {
                if !existing.is_empty() {
                    return;
                }
            }
        }
        map.insert(decoded_offset, Arc::new(window));
    }

    pub fn get(&self, decoded_offset: u64) -> Option<Arc<Window>> {
        self.windows.lock().unwrap().get(&decoded_offset).cloned()
    }

    pub fn contains(&self, decoded_offset: u64) -> bool {
        self.windows.lock().unwrap().contains_key(&decoded_offset)
    }

    /// Drops windows no longer reachable by any pending seek, keeping
    /// memory bounded for long sequential reads. Windows with outstanding
    /// `Arc` clones held by in-flight chunks are unaffected — only the
    /// map's own reference is released.
    pub fn release_up_to(&self, decoded_offset: u64) {
        let mut map = self.windows.lock().unwrap();
        let keep = map.split_off(&decoded_offset);
        *map = keep;
    }

    pub fn len(&self) -> usize {
        self.windows.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_round_trip() {
        let map = WindowMap::new();
        let data: Arc<[u8]> = Arc::from(vec![1u8; MAX_WINDOW_SIZE].as_slice());
        map.insert(1000, Window::Raw(data.clone()));

        let fetched = map.get(1000).unwrap();
        assert_eq!(fetched.decompress().as_ref(), data.as_ref());
    }

    #[test]
    fn missing_offset_returns_none() {
        let map = WindowMap::new();
        assert!(map.get(42).is_none());
    }

    #[test]
    fn release_up_to_drops_earlier_windows() {
        let map = WindowMap::new();
        map.insert(0, Window::Empty);
        map.insert(1000, Window::Empty);
        map.insert(2000, Window::Empty);

        map.release_up_to(1000);

        assert!(!map.contains(0));
        assert!(map.contains(1000));
        assert!(map.contains(2000));
    }

    #[test]
    fn sparse_window_decompresses_only_touched_positions() {
        let mask: Arc<[bool]> = Arc::from(vec![false, true, false, true]);
        let values: Arc<[u8]> = Arc::from(vec![0, 42, 0, 7]);
        let window = Window::Sparse { mask, values };

        assert_eq!(window.decompress().as_ref(), &[0, 42, 0, 7]);
        assert_eq!(window.len(), 4);
        assert!(!window.is_empty());
    }
}
