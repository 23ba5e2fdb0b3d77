use std::{hint::black_box, time::Instant};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lontar::{
    storage::table::Table,
    types::{Key, row::Row},
    utils::mock::create_temp_db_path_with_prefix,
};

const DATASET_SIZES: &[u32] = &[100, 1_000, 10_000];

// Generous page cap so splits never hit the limit mid-bench.
const BENCH_MAX_PAGES: u32 = 16_384;

fn bench_row(id: Key) -> Row {
    Row::new(id, &format!("user{id}"), &format!("user{id}@example.com")).unwrap()
}

fn populated_table(prefix: &str, size: u32) -> (Table, std::path::PathBuf) {
    let path = create_temp_db_path_with_prefix(prefix);
    let mut table = Table::open_with_limit(&path, BENCH_MAX_PAGES).unwrap();
    for id in 1..=size {
        table.insert(&bench_row(id)).unwrap();
    }
    (table, path)
}

fn benchmark_sequential_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_insert");
    for &size in DATASET_SIZES {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_custom(|iters| {
                let mut total_duration = std::time::Duration::new(0, 0);
                for _ in 0..iters {
                    let path = create_temp_db_path_with_prefix("bench_seq_insert");
                    let mut table = Table::open_with_limit(&path, BENCH_MAX_PAGES).unwrap();
                    let start = Instant::now();
                    for id in 1..=size {
                        table.insert(black_box(&bench_row(id))).unwrap();
                    }
                    total_duration += start.elapsed();
                    drop(table);
                    let _ = std::fs::remove_file(&path);
                }
                total_duration
            });
        });
    }
    group.finish();
}

fn benchmark_shuffled_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("shuffled_insert");
    for &size in DATASET_SIZES {
        // Deterministic shuffle; 37 is coprime with every dataset size.
        let keys: Vec<Key> = (0..size).map(|i| (i * 37) % size + 1).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &keys, |b, keys| {
            b.iter_custom(|iters| {
                let mut total_duration = std::time::Duration::new(0, 0);
                for _ in 0..iters {
                    let path = create_temp_db_path_with_prefix("bench_shuf_insert");
                    let mut table = Table::open_with_limit(&path, BENCH_MAX_PAGES).unwrap();
                    let start = Instant::now();
                    for &id in keys {
                        table.insert(black_box(&bench_row(id))).unwrap();
                    }
                    total_duration += start.elapsed();
                    drop(table);
                    let _ = std::fs::remove_file(&path);
                }
                total_duration
            });
        });
    }
    group.finish();
}

fn benchmark_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_scan");
    for &size in DATASET_SIZES {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (mut table, path) = populated_table("bench_scan", size);
            b.iter(|| {
                let rows = black_box(table.select(None).unwrap());
                assert_eq!(rows.len(), size as usize);
            });
            drop(table);
            let _ = std::fs::remove_file(&path);
        });
    }
    group.finish();
}

fn benchmark_point_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_lookup");
    for &size in DATASET_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (mut table, path) = populated_table("bench_lookup", size);
            let mut key = 0;
            b.iter(|| {
                key = key % size + 1;
                let cursor = table.find(black_box(key)).unwrap();
                black_box(table.row_at(&cursor).unwrap());
            });
            drop(table);
            let _ = std::fs::remove_file(&path);
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_sequential_insert,
    benchmark_shuffled_insert,
    benchmark_full_scan,
    benchmark_point_lookup
);

criterion_main!(benches);
