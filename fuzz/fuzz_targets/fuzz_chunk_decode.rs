#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rapidgzip::chunk_decoder::{decode_chunk, ChunkRequest};
use std::sync::Arc;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    data: Vec<u8>,
    start_bit: u64,
}

const MAX_DECODED: usize = 4 * 1024 * 1024;

fuzz_target!(|input: FuzzInput| {
    if input.data.is_empty() || input.data.len() > 1_000_000 {
        return;
    }

    let total_bits = input.data.len() as u64 * 8;
    let start_bit = input.start_bit % total_bits;
    let data: Arc<[u8]> = Arc::from(input.data.as_slice());

    // No window: exercises marker-mode decoding, the path that must
    // never read past bytes it hasn't resolved yet.
    let request = ChunkRequest {
        data: data.clone(),
        encoded_bit_offset: start_bit,
        decoded_offset: 0,
        window: None,
        target_decoded_size: MAX_DECODED,
        max_decoded_size: MAX_DECODED,
        split_chunk_size: 0,
        minimum_split_chunk_size: 0,
    };
    // Either a clean decode or a typed error; never a panic.
    let _ = decode_chunk(request);

    // Same offset with a resolved (all-zero) window present: exercises
    // the exact/library decode paths instead of marker mode.
    let window: Arc<[u8]> = Arc::from(vec![0u8; 32768].into_boxed_slice());
    let request = ChunkRequest {
        data,
        encoded_bit_offset: start_bit,
        decoded_offset: 0,
        window: Some(window),
        target_decoded_size: MAX_DECODED,
        max_decoded_size: MAX_DECODED,
        split_chunk_size: 16 * 1024,
        minimum_split_chunk_size: 4 * 1024,
    };
    let _ = decode_chunk(request);
});
