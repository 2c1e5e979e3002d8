//! Ordered index mapping encoded bit offsets to the decoded byte ranges
//! they produce, used to resolve a seek request to the nearest chunk
//! start without decoding everything before it.

use std::sync::RwLock;

/// One entry: a deflate block (or bzip2 block) started at `encoded_bit_offset`
/// and produced bytes `[decoded_offset, decoded_offset + decoded_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMapEntry {
    pub encoded_bit_offset: u64,
    pub decoded_offset: u64,
    pub decoded_size: u64,
}

/// Strictly-increasing-by-both-axes index of block starts, supporting
/// binary search from a decoded offset back to the best known block start
/// at or before it.
#[derive(Default)]
pub struct BlockMap {
    entries: RwLock<Vec<BlockMapEntry>>,
    finalized: RwLock<bool>,
}

impl BlockMap {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            finalized: RwLock::new(false),
        }
    }

    /// Appends a new entry. Entries must be pushed in increasing order of
    /// both `encoded_bit_offset` and `decoded_offset`; violating this is a
    /// logic error in the caller (a fetcher producing chunks out of
    /// order), not a recoverable runtime condition.
    pub fn push(&self, entry: BlockMapEntry) {
        let mut entries = self.entries.write().unwrap();
        if let Some(last) = entries.last() {
            assert!(
                entry.encoded_bit_offset >= last.encoded_bit_offset
                    && entry.decoded_offset >= last.decoded_offset,
                "BlockMap entries must be inserted in increasing order"
            );
        }
        entries.push(entry);
    }

    /// Bulk-imports entries already known to be sorted, e.g. from an
    /// imported index file.
    pub fn set_block_offsets(&self, mut entries: Vec<BlockMapEntry>) {
        entries.sort_by_key(|e| e.decoded_offset);
        *self.entries.write().unwrap() = entries;
    }

    pub fn finalize(&self) {
        *self.finalized.write().unwrap() = true;
    }

    pub fn is_finalized(&self) -> bool {
        *self.finalized.read().unwrap()
    }

    /// Finds the entry whose decoded range contains (or most closely
    /// precedes) `decoded_offset`, i.e. the best chunk to start decoding
    /// from to reach that offset.
    pub fn find_data_offset(&self, decoded_offset: u64) -> Option<BlockMapEntry> {
        let entries = self.entries.read().unwrap();
        match entries.binary_search_by_key(&decoded_offset, |e| e.decoded_offset) {
            Ok(idx) => Some(entries[idx]),
            Err(0) => None,
            Err(idx) => Some(entries[idx - 1]),
        }
    }

    /// Total decoded size known so far (the end of the last entry).
    pub fn decoded_size_hint(&self) -> Option<u64> {
        self.entries
            .read()
            .unwrap()
            .last()
            .map(|e| e.decoded_offset + e.decoded_size)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter_snapshot(&self) -> Vec<BlockMapEntry> {
        self.entries.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(bit: u64, decoded: u64, size: u64) -> BlockMapEntry {
        BlockMapEntry {
            encoded_bit_offset: bit,
            decoded_offset: decoded,
            decoded_size: size,
        }
    }

    #[test]
    fn find_data_offset_picks_containing_entry() {
        let map = BlockMap::new();
        map.push(entry(0, 0, 100));
        map.push(entry(800, 100, 100));
        map.push(entry(1600, 200, 100));

        let found = map.find_data_offset(150).unwrap();
        assert_eq!(found.decoded_offset, 100);
    }

    #[test]
    fn find_data_offset_exact_match() {
        let map = BlockMap::new();
        map.push(entry(0, 0, 100));
        map.push(entry(800, 100, 100));

        let found = map.find_data_offset(100).unwrap();
        assert_eq!(found.encoded_bit_offset, 800);
    }

    #[test]
    fn find_data_offset_before_first_entry_is_none() {
        let map = BlockMap::new();
        map.push(entry(800, 100, 100));
        assert!(map.find_data_offset(50).is_none());
    }

    #[test]
    #[should_panic]
    fn push_out_of_order_panics() {
        let map = BlockMap::new();
        map.push(entry(800, 100, 100));
        map.push(entry(0, 0, 100));
    }

    #[test]
    fn set_block_offsets_sorts_input() {
        let map = BlockMap::new();
        map.set_block_offsets(vec![entry(800, 100, 100), entry(0, 0, 100)]);
        let snapshot = map.iter_snapshot();
        assert_eq!(snapshot[0].decoded_offset, 0);
        assert_eq!(snapshot[1].decoded_offset, 100);
    }
}
