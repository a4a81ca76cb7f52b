use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use pgmatch::matching::hash_matcher::ConstLenHashMatcher;

const READ_LENGTH: usize = 100;
const READS_COUNT: usize = 2_000;
const PG_LENGTH: usize = 1 << 20;

fn deterministic_dna(len: usize, mut state: u32) -> Vec<u8> {
    let bases = [b'A', b'C', b'G', b'T'];
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            bases[(state >> 16) as usize % 4]
        })
        .collect()
}

fn bench_scan(c: &mut Criterion) {
    let pg = deterministic_dna(PG_LENGTH, 0xAC67);
    let mut matcher = ConstLenHashMatcher::new(READ_LENGTH);
    for i in 0..READS_COUNT {
        let start = (i * 509) % (PG_LENGTH - READ_LENGTH);
        matcher.add_pattern(&pg[start..start + READ_LENGTH], i as u32);
    }

    let mut group = c.benchmark_group("hash_matcher");
    group.throughput(Throughput::Bytes(PG_LENGTH as u64));
    group.bench_function("scan_1mib_2k_patterns", |b| {
        b.iter(|| black_box(matcher.iterate_over(black_box(&pg)).count()))
    });
    group.finish();
}

criterion_group!(benches, bench_scan);
criterion_main!(benches);
