//! Performance benchmarks for sluice-lzma
//!
//! This benchmark suite evaluates:
//! - Compression speed at different levels
//! - Compression and decompression speed across data patterns
//! - Decoder cost of small output slices (finish-mode bookkeeping)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sluice_core::SystemAllocator;
use sluice_lzma::{
    FinishMode, HEADER_SIZE, LzmaDecoder, LzmaParams, compress_bytes, decompress_bytes,
};
use std::hint::black_box;

/// Type alias for pattern generator functions
type PatternGenerator = fn(usize) -> Vec<u8>;

mod test_data {
    /// Uniform data - all bytes are the same (best compression)
    pub fn uniform(size: usize) -> Vec<u8> {
        vec![0xAA; size]
    }

    /// Random data - no patterns (worst compression)
    pub fn random(size: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(size);
        let mut seed: u64 = 0x123456789ABCDEF0;
        for _ in 0..size {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            data.push((seed >> 32) as u8);
        }
        data
    }

    /// Text-like data - realistic scenario
    pub fn text_like(size: usize) -> Vec<u8> {
        let text = b"The quick brown fox jumps over the lazy dog. \
                     Pack my box with five dozen liquor jugs. \
                     How vexingly quick daft zebras jump! \
                     Lorem ipsum dolor sit amet, consectetur adipiscing elit. ";
        text.iter().copied().cycle().take(size).collect()
    }
}

const MEDIUM: usize = 100 * 1024;

fn bench_compression_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression_levels");
    let data = test_data::text_like(MEDIUM);

    for level in [0, 3, 5, 9] {
        let params = LzmaParams::preset(level).unwrap();
        group.throughput(Throughput::Bytes(MEDIUM as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("level_{level}")),
            &data,
            |b, data| {
                b.iter(|| black_box(compress_bytes(black_box(data), &params).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_patterns(c: &mut Criterion) {
    let patterns: [(&str, PatternGenerator); 3] = [
        ("uniform", test_data::uniform),
        ("random", test_data::random),
        ("text", test_data::text_like),
    ];
    let params = LzmaParams::default();

    let mut group = c.benchmark_group("compress_patterns");
    for (name, generator) in patterns {
        let data = generator(MEDIUM);
        group.throughput(Throughput::Bytes(MEDIUM as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &data, |b, data| {
            b.iter(|| black_box(compress_bytes(black_box(data), &params).unwrap()));
        });
    }
    group.finish();

    let mut group = c.benchmark_group("decompress_patterns");
    for (name, generator) in patterns {
        let compressed = compress_bytes(&generator(MEDIUM), &params).unwrap();
        group.throughput(Throughput::Bytes(MEDIUM as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(name),
            &compressed,
            |b, compressed| {
                b.iter(|| black_box(decompress_bytes(black_box(compressed)).unwrap()));
            },
        );
    }
    group.finish();
}

fn bench_output_slice_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoder_output_slices");
    let params = LzmaParams::default();
    let compressed = compress_bytes(&test_data::text_like(MEDIUM), &params).unwrap();
    let payload = &compressed[HEADER_SIZE..];

    for slice in [64usize, 4096, MEDIUM] {
        group.throughput(Throughput::Bytes(MEDIUM as u64));
        group.bench_with_input(BenchmarkId::from_parameter(slice), &slice, |b, &slice| {
            b.iter(|| {
                let mut decoder = LzmaDecoder::new(&params.properties(), &SystemAllocator).unwrap();
                let mut out = vec![0u8; slice];
                let mut input = payload;
                let mut produced = 0;
                while produced < MEDIUM {
                    let want = slice.min(MEDIUM - produced);
                    let mode = if want == MEDIUM - produced {
                        FinishMode::End
                    } else {
                        FinishMode::Any
                    };
                    let progress = decoder.decode(&mut out[..want], input, mode).unwrap();
                    input = &input[progress.consumed..];
                    produced += progress.produced;
                }
                black_box(produced)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compression_levels,
    bench_patterns,
    bench_output_slice_sizes
);
criterion_main!(benches);
