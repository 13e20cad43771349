use std::collections::HashMap;
use std::hint::black_box;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rw_spinlock::{RwSpinLock, Sharded};

const THREADS: [usize; 3] = [1, 4, 8];
const OPS_PER_THREAD: u64 = 10_000;

fn uncontended_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended");

    let spin = RwSpinLock::new(0u64);
    let std_lock = RwLock::new(0u64);

    group.bench_function("rw_spinlock/read", |b| b.iter(|| black_box(*spin.read())));
    group.bench_function("rw_spinlock/write", |b| b.iter(|| *spin.write() += 1));
    group.bench_function("std_rwlock/read", |b| {
        b.iter(|| black_box(*std_lock.read().unwrap()))
    });
    group.bench_function("std_rwlock/write", |b| b.iter(|| *std_lock.write().unwrap() += 1));

    group.finish();
}

/// Every thread increments keys in its own stride and looks up a neighbour,
/// the access pattern of a sharded word count.
fn run_sharded(threads: usize) -> Duration {
    let map: Arc<Sharded<HashMap<u64, u64>>> =
        Arc::new(Sharded::new(threads * threads, HashMap::new));

    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let map = map.clone();
            thread::spawn(move || {
                let mut hits = 0u64;
                for i in 0..OPS_PER_THREAD {
                    let key = (t as u64 * 7919 + i) % 1024;
                    *map.write(&key).entry(key).or_default() += 1;
                    hits += map.read(&(key + 1)).contains_key(&(key + 1)) as u64;
                }
                black_box(hits)
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    start.elapsed()
}

fn run_std_sharded(threads: usize) -> Duration {
    let shards: Arc<Vec<RwLock<HashMap<u64, u64>>>> = Arc::new(
        (0..threads * threads)
            .map(|_| RwLock::new(HashMap::new()))
            .collect(),
    );

    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let shards = shards.clone();
            thread::spawn(move || {
                let n = shards.len() as u64;
                let mut hits = 0u64;
                for i in 0..OPS_PER_THREAD {
                    let key = (t as u64 * 7919 + i) % 1024;
                    *shards[(key % n) as usize]
                        .write()
                        .unwrap()
                        .entry(key)
                        .or_default() += 1;
                    let probe = key + 1;
                    hits += shards[(probe % n) as usize]
                        .read()
                        .unwrap()
                        .contains_key(&probe) as u64;
                }
                black_box(hits)
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    start.elapsed()
}

fn sharded_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("sharded_word_count");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    for &threads in &THREADS {
        group.bench_with_input(
            BenchmarkId::new("rw_spinlock", threads),
            &threads,
            |b, &threads| {
                b.iter_custom(|iters| (0..iters).map(|_| run_sharded(threads)).sum());
            },
        );
        group.bench_with_input(
            BenchmarkId::new("std_rwlock", threads),
            &threads,
            |b, &threads| {
                b.iter_custom(|iters| (0..iters).map(|_| run_std_sharded(threads)).sum());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, uncontended_benchmark, sharded_benchmark);
criterion_main!(benches);
