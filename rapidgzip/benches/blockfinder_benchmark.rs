use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use rapidgzip::blockfinder::next_candidate;
use std::io::Write;
use std::sync::Arc;

/// Varied enough content that flate2 mixes dynamic-Huffman and stored
/// blocks, giving the heuristic scan real candidates and false positives
/// to sift through.
fn sample_deflate(size_mb: usize) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    let payload: Vec<u8> = (0..size_mb * 1024 * 1024)
        .map(|i| ((i * 2654435761u64 as usize) % 251) as u8)
        .collect();
    encoder.write_all(&payload).unwrap();
    encoder.finish().unwrap()
}

fn bench_blockfinder(c: &mut Criterion) {
    let mut group = c.benchmark_group("blockfinder");

    for size_mb in [1, 4, 16].iter() {
        let compressed = sample_deflate(*size_mb);
        let data: Arc<[u8]> = Arc::from(compressed.as_slice());
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{size_mb}MB")),
            &data,
            |b, data| {
                b.iter(|| {
                    let total_bits = data.len() as u64 * 8;
                    next_candidate(data, 1, total_bits)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_blockfinder);
criterion_main!(benches);
