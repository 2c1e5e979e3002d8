#![no_main]

use libfuzzer_sys::fuzz_target;
use rapidgzip::index::GzipIndex;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1_000_000 {
        return;
    }

    // Parsing untrusted index files must never panic, only error out.
    let mut cursor = Cursor::new(data);
    if let Ok(index) = GzipIndex::read_format_a(&mut cursor) {
        // A successfully parsed index must re-serialize without panicking
        // and should describe a consistent checkpoint ordering.
        let mut buf = Vec::new();
        let _ = index.write_format_a(&mut buf);

        let mut prev: Option<(u64, u64)> = None;
        for checkpoint in &index.checkpoints {
            if let Some((prev_compressed, prev_decoded)) = prev {
                assert!(checkpoint.compressed_bit_offset >= prev_compressed);
                assert!(checkpoint.decoded_offset >= prev_decoded);
            }
            prev = Some((checkpoint.compressed_bit_offset, checkpoint.decoded_offset));
        }
    }

    let mut cursor = Cursor::new(data);
    if let Ok(index) = GzipIndex::read_format_b(&mut cursor) {
        let mut buf = Vec::new();
        let _ = index.write_format_b(&mut buf);
    }
});
