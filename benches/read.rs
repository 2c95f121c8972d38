use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tempfile::tempdir;

use seglogq::{Error, OpenOptions, Queue};
use std::time::Duration;

const RECORDS: usize = 10_000;

fn bench_tailing_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    for &size in &[64_usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let dir = tempdir().expect("tempdir");
                    let prefix = dir.path().join("bench_queue");
                    let mut queue = Queue::open(&prefix, 64 << 20, OpenOptions::DEFAULT).expect("open");
                    let payload = vec![0u8; size];
                    for i in 0..RECORDS {
                        queue.write(i as i64, &payload).expect("write");
                    }
                    let reader = queue.make_reader(0).expect("make reader");
                    (dir, queue, reader)
                },
                |(_dir, queue, mut reader)| {
                    for _ in 0..RECORDS {
                        reader.read(Some(Duration::ZERO)).expect("read");
                    }
                    assert!(matches!(
                        reader.read(Some(Duration::ZERO)),
                        Err(Error::Infeasible)
                    ));
                    drop(queue);
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tailing_read);
criterion_main!(benches);
