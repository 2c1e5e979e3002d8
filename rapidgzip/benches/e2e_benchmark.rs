use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flate2::write::GzEncoder;
use flate2::Compression;
use rapidgzip::{open_bytes, ChunkConfiguration};
use std::io::{Read, Write};
use std::sync::Arc;

/// Large enough, varied enough gzip stream that chunking actually pays
/// off: many megabytes spanning several chunk boundaries.
fn sample_gzip(size: usize) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut written = 0;
    let mut counter: u64 = 0;
    while written < size {
        let line = format!("line {counter} the quick brown fox jumps over the lazy dog\n");
        encoder.write_all(line.as_bytes()).unwrap();
        written += line.len();
        counter += 1;
    }
    encoder.finish().unwrap()
}

/// End-to-end throughput as a function of requested parallelization,
/// exercising the full open -> warm-up -> sequential-drain path rather
/// than just the block finder or a single chunk decode.
fn bench_end_to_end(c: &mut Criterion) {
    let compressed = sample_gzip(32 * 1024 * 1024);
    let data: Arc<[u8]> = Arc::from(compressed.as_slice());

    let mut group = c.benchmark_group("end_to_end_parallel_reader");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(10);

    for parallelization in [1usize, 2, 4, 8] {
        let config = ChunkConfiguration {
            chunk_size: 2 * 1024 * 1024,
            parallelization,
            ..ChunkConfiguration::default()
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(parallelization),
            &config,
            |b, config| {
                b.iter(|| {
                    let mut reader = open_bytes(data.clone(), config.clone()).unwrap();
                    let mut buffer = [0u8; 65536];
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
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_end_to_end);
criterion_main!(benches);
