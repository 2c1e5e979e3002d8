#![no_main]

use libfuzzer_sys::fuzz_target;
use rapidgzip::blockfinder::next_candidate;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 10_000_000 {
        return;
    }

    let data: Arc<[u8]> = Arc::from(data);
    let total_bits = data.len() as u64 * 8;

    let mut found = 0usize;
    let mut bit = 0u64;
    while bit < total_bits {
        match next_candidate(&data, bit, total_bits) {
            Some(candidate) => {
                assert!(candidate >= bit, "candidate {} before search start {}", candidate, bit);
                assert!(candidate < total_bits, "candidate {} past end {}", candidate, total_bits);
                bit = candidate + 1;
                found += 1;
                if found > 10_000 {
                    break;
                }
            }
            None => break,
        }
    }
});
