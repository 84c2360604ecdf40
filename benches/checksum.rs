//! Checksum library benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use camotun::engine::checksum;

fn bench_checksums(c: &mut Criterion) {
    let data: Vec<u8> = (0..1500u32).map(|i| (i * 31) as u8).collect();

    let mut group = c.benchmark_group("checksum_1500b");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("internet", |b| {
        b.iter(|| checksum::internet_checksum(black_box(&data), 0))
    });
    group.bench_function("crc32", |b| {
        b.iter(|| {
            checksum::crc(
                black_box(&data),
                32,
                0xEDB8_8320,
                0xFFFF_FFFF,
                0xFFFF_FFFF,
            )
        })
    });
    group.bench_function("fletcher16", |b| {
        b.iter(|| checksum::fletcher16(black_box(&data)))
    });
    group.bench_function("adler32", |b| b.iter(|| checksum::adler32(black_box(&data))));
    group.bench_function("xor16", |b| {
        b.iter(|| checksum::xor_words(black_box(&data), 16))
    });
    group.bench_function("rolling_hash", |b| {
        b.iter(|| checksum::rolling_hash(black_box(&data)))
    });

    group.finish();
}

criterion_group!(benches, bench_checksums);
criterion_main!(benches);
