use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::scope;

use snapcache::{ObjectCache, SharedSnapshot};

/*
 * Readers either hold their handle (forcing writers down the clone path) or
 * drop it straight away (letting writers mutate in place). Vary the payload
 * size to see what the clone costs.
 */

fn snapshot_mutate(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_mutate");
    for size in [16usize, 1024, 65536] {
        group.throughput(Throughput::Elements(1));

        group.bench_with_input(BenchmarkId::new("in_place", size), &size, |b, &size| {
            let snap = SharedSnapshot::new(vec![0u8; size]);
            b.iter(|| snap.mutate(|v| v[0] = v[0].wrapping_add(1)))
        });

        group.bench_with_input(BenchmarkId::new("cloned", size), &size, |b, &size| {
            let snap = SharedSnapshot::new(vec![0u8; size]);
            b.iter(|| {
                let held = snap.read();
                snap.mutate(|v| v[0] = v[0].wrapping_add(1));
                black_box(held)
            })
        });
    }
    group.finish();
}

fn snapshot_read_contended(c: &mut Criterion) {
    let snap = SharedSnapshot::new(vec![0u64; 1024]);
    let stop = AtomicBool::new(false);

    scope(|scope| {
        let snap_ref = &snap;
        let stop_ref = &stop;
        scope.spawn(move || {
            while !stop_ref.load(Ordering::Relaxed) {
                snap_ref.mutate(|v| v[0] += 1);
            }
        });

        c.bench_function("snapshot_read_contended", |b| {
            b.iter(|| {
                let h = snap.read();
                black_box(h[0])
            })
        });

        stop.store(true, Ordering::Relaxed);
    });
}

fn pool_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_get");

    group.bench_function("hit", |b| {
        let pool = ObjectCache::from_fn(|k: &u64| vec![*k; 256]);
        let _held = pool.fetch(&1);
        b.iter(|| black_box(pool.fetch(&1)))
    });

    group.bench_function("churn", |b| {
        let pool = ObjectCache::from_fn(|k: &u64| vec![*k; 256]);
        b.iter(|| black_box(pool.fetch(&1)))
    });

    group.finish();
}

criterion_group!(benches, snapshot_mutate, snapshot_read_contended, pool_get);
criterion_main!(benches);
