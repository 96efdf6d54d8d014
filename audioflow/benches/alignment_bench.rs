//! Benchmarks for transcript alignment.

use audioflow::core::SpeakerSegment;
use audioflow::stages::align_segments;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn segments(count: usize) -> Vec<SpeakerSegment> {
    (0..count)
        .map(|i| {
            let start = i as f64 * 3.0;
            SpeakerSegment::new(format!("SPEAKER_{}", i % 4), start, start + 3.0)
        })
        .collect()
}

fn transcript(words: usize) -> String {
    (0..words).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

fn alignment_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("align_segments");

    for count in [10, 100, 1_000] {
        let segments = segments(count);
        let transcript = transcript(count * 8);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| align_segments(black_box(&segments), black_box(&transcript)));
        });
    }

    group.finish();
}

criterion_group!(benches, alignment_benchmark);
criterion_main!(benches);
