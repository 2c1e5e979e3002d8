use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use flate2::write::GzEncoder;
use flate2::Compression;
use rapidgzip::{open_bytes, ChunkConfiguration};
use std::io::{Read, Write};
use std::sync::Arc;

/// A few megabytes of text-ish, repetitive data: enough variety that
/// deflate emits a mix of dynamic Huffman and stored blocks, which is the
/// traffic the chunk decoder's three decode paths are built for.
fn sample_gzip(size: usize) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let line = b"the quick brown fox jumps over the lazy dog\n";
    let mut written = 0;
    while written < size {
        encoder.write_all(line).unwrap();
        written += line.len();
    }
    encoder.finish().unwrap()
}

fn bench_decode(c: &mut Criterion) {
    let compressed = sample_gzip(8 * 1024 * 1024);
    let data: Arc<[u8]> = Arc::from(compressed.as_slice());

    let mut group = c.benchmark_group("gzip_decode");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("rapidgzip_parallel_reader", |b| {
        b.iter(|| {
            let mut reader = open_bytes(data.clone(), ChunkConfiguration::default()).unwrap();
            let mut buffer = [0u8; 8192];
            let mut total = 0usize;
            loop {
                let n = reader.read(&mut buffer).unwrap();
                if n == 0 {
                    break;
                }
                total += n;
            }
            total
        })
    });

    group.bench_function("flate2_sequential", |b| {
        b.iter(|| {
            let mut decoder = flate2::read::GzDecoder::new(&data[..]);
            let mut buffer = [0u8; 8192];
            let mut total = 0usize;
            loop {
                let n = decoder.read(&mut buffer).unwrap();
                if n == 0 {
                    break;
                }
                total += n;
            }
            total
        })
    });

    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
