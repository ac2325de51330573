//! Benchmarks for raw frame assembly and register batching
//!
//! Frame sizes match the sensors' native resolutions.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use protocol::{RegisterWrite, assemble_image, pack_batch, plan_batches};
use std::num::NonZeroUsize;

fn benchmark_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble_image");

    for (width, height) in [(128usize, 8usize), (192, 16), (128, 128)] {
        let raw: Vec<u8> = (0..width * height / 2)
            .map(|i| (i % 256) as u8)
            .collect();
        let mut out = vec![0u8; width * height];

        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, height)),
            &raw,
            |b, raw| b.iter(|| assemble_image(black_box(raw), width, height, &mut out)),
        );
    }

    group.finish();
}

fn benchmark_batching(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_batching");

    // Init tables are a few hundred writes with a barrier every block
    let writes: Vec<RegisterWrite> = (0..512u32)
        .map(|i| {
            if i % 40 == 39 {
                RegisterWrite::barrier()
            } else {
                RegisterWrite::new(0x80 + (i % 64) as u8, i as u8)
            }
        })
        .collect();
    let max = NonZeroUsize::new(16).unwrap();

    group.bench_function("plan_512", |b| {
        b.iter(|| plan_batches(black_box(&writes), max).count())
    });

    group.bench_function("plan_and_pack_512", |b| {
        b.iter(|| {
            plan_batches(black_box(&writes), max)
                .map(|range| pack_batch(&writes[range]).len())
                .sum::<usize>()
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_assemble, benchmark_batching);
criterion_main!(benches);
