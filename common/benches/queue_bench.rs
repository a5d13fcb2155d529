// Benchmarks for the SPSC ring buffer
//
// Measures single push/pop round trips and burst drain patterns at the ring
// sizes the trading pipeline uses.

use common::lf_queue::LFQueue;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_single_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_single_ops");
    group.throughput(Throughput::Elements(1));

    group.bench_function("push_pop_roundtrip", |b| {
        let queue: LFQueue<u64> = LFQueue::new(1024);
        let mut counter = 0u64;
        b.iter(|| {
            let _ = queue.push(black_box(counter));
            counter = counter.wrapping_add(1);
            black_box(queue.pop())
        });
    });

    group.finish();
}

fn bench_bursts(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_bursts");

    for burst in [16usize, 256, 4096] {
        group.throughput(Throughput::Elements(burst as u64));
        group.bench_with_input(BenchmarkId::new("fill_drain", burst), &burst, |b, &n| {
            let queue: LFQueue<u64> = LFQueue::new(8192);
            b.iter(|| {
                for i in 0..n as u64 {
                    let _ = queue.push(black_box(i));
                }
                while let Some(item) = queue.pop() {
                    black_box(item);
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_ops, bench_bursts);
criterion_main!(benches);
