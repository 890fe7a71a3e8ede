//! Table Operations Benchmarks
//!
//! Row decoding, snapshot lookups, and a full table read against the
//! in-memory document.
//!
//! Run with: `cargo bench --bench table_ops`

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use esperar::prelude::*;

fn users(count: usize) -> Vec<UserRecord> {
    (0..count)
        .map(|i| UserRecord::new(format!("User {i}"), format!("user{i}@bench.io"), 18 + (i % 60) as u32))
        .collect()
}

fn bench_row_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_decoding");

    let cases = vec![
        ("well_formed", vec!["17", "John Doe", "john.doe@test.com", "30 Year's", "Edit Delete"]),
        ("short", vec!["17", "John Doe"]),
        ("padded", vec![" 17 ", "  John Doe ", " john.doe@test.com", "30 Year's  "]),
    ];

    for (name, cells) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &cells, |bench, cells| {
            bench.iter(|| {
                let row = UserRow::from_cells(black_box(cells.as_slice()));
                black_box(row.and_then(|r| r.age_years()));
            });
        });
    }

    group.finish();
}

fn bench_snapshot_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_lookup");

    for size in [10usize, 100, 1000] {
        let rows = users(size)
            .iter()
            .enumerate()
            .map(|(i, u)| {
                UserRow::from_cells(&[i.to_string(), u.name.clone(), u.email.clone(), u.age_label()])
                    .unwrap()
            })
            .collect();
        let snapshot = TableSnapshot::new(rows);
        let last = format!("user{}@bench.io", size - 1);

        group.bench_with_input(BenchmarkId::new("find_by_email", size), &snapshot, |bench, s| {
            bench.iter(|| black_box(s.find_by_email(black_box(&last))));
        });
        group.bench_with_input(BenchmarkId::new("records", size), &snapshot, |bench, s| {
            bench.iter(|| black_box(s.records()));
        });
    }

    group.finish();
}

fn bench_read_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_table");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let config = HarnessConfig::new().with_poll_interval(1);

    for size in [5usize, 50] {
        let doc = MockDocument::new().with_users(users(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |bench, doc| {
            let page = UserManagementPage::new(doc, &config);
            bench.iter(|| black_box(runtime.block_on(page.read_table()).unwrap().len()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_row_decoding,
    bench_snapshot_lookup,
    bench_read_table
);
criterion_main!(benches);
