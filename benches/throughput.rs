//! Throughput Benchmark for snapkv
//!
//! Measures the storage engine under put/get-heavy workloads, plus the
//! cost of a snapshot pass.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;
use snapkv::storage::KVStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Benchmark PUT operations
fn bench_put(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(KVStore::new(64, dir.path()));

    let mut group = c.benchmark_group("put");
    group.throughput(Throughput::Elements(1));

    group.bench_function("put_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store.put(format!("key:{i}"), json!("small_value"), None);
            i += 1;
        });
    });

    group.bench_function("put_medium", |b| {
        let mut i = 0u64;
        let value = json!("x".repeat(1024)); // 1KB string value
        b.iter(|| {
            store.put(format!("key:{i}"), value.clone(), None);
            i += 1;
        });
    });

    group.bench_function("put_structured", |b| {
        let mut i = 0u64;
        let value = json!({"user": 42, "tags": ["a", "b", "c"], "score": 9.5});
        b.iter(|| {
            store.put(format!("key:{i}"), value.clone(), Some(3600.0));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(KVStore::new(64, dir.path()));

    // Pre-populate with data
    for i in 0..100_000 {
        store.put(format!("key:{i}"), json!(i), None);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.get(&format!("key:{}", i % 100_000)).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.get(&format!("missing:{i}")).is_err());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(KVStore::new(64, dir.path()));

    // Pre-populate
    for i in 0..10_000 {
        store.put(format!("key:{i}"), json!(i), None);
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                // 20% writes
                store.put(format!("new:{i}"), json!("value"), None);
            } else {
                // 80% reads
                black_box(store.get(&format!("key:{}", i % 10_000)).ok());
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let dir = TempDir::new().unwrap();
            let store = Arc::new(KVStore::new(64, dir.path()));
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let store = Arc::clone(&store);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{t}:{i}");
                            store.put(key.clone(), json!("value"), None);
                            let _ = store.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(store.len());
        });
    });

    group.finish();
}

/// Benchmark cleanup over a store with a mixed TTL population
fn bench_cleanup(c: &mut Criterion) {
    let mut group = c.benchmark_group("cleanup");

    group.bench_function("cleanup_10k_live", |b| {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(KVStore::new(64, dir.path()));
        for i in 0..10_000 {
            // Far-future TTLs: the pass scans everything, evicts nothing.
            store.put(format!("key:{i}"), json!(i), Some(3600.0));
        }
        b.iter(|| {
            black_box(store.cleanup());
        });
    });

    group.finish();
}

/// Benchmark a full snapshot pass
fn bench_to_disk(c: &mut Criterion) {
    let mut group = c.benchmark_group("to_disk");

    group.bench_function("flush_10k_entries", |b| {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(KVStore::new(64, dir.path()));
        let mut i = 0u64;
        b.iter(|| {
            // Each pass sees one new key per shard region, so the
            // changed shards are actually flushed.
            store.put(format!("key:{i}"), json!(i), None);
            i += 1;
            store.to_disk().unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_put,
    bench_get,
    bench_mixed,
    bench_concurrent,
    bench_cleanup,
    bench_to_disk,
);

criterion_main!(benches);
