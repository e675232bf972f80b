//! Fill throughput across the three memory layouts.

use core_book::{AxisConfig, BookStore, H1D};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn bench_fills(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill");

    let mut store = BookStore::new(4);
    let single = store
        .book_single("/bench/", "single", || {
            H1D::new("single", [AxisConfig::new("x", 1000, 0.0, 1000.0)])
        })
        .unwrap();
    let copy = store
        .book_multi_copy("/bench/", "copy", || {
            H1D::new("copy", [AxisConfig::new("x", 1000, 0.0, 1000.0)])
        })
        .unwrap();
    let shared = store
        .book_multi_shared("/bench/", "shared", || {
            H1D::new("shared", [AxisConfig::new("x", 1000, 0.0, 1000.0)])
        })
        .unwrap();

    group.bench_function("single", |b| {
        let mut x = 0u32;
        b.iter(|| {
            x = x.wrapping_add(997);
            single.fill([black_box(f64::from(x % 1000))], 1.0);
        });
    });
    group.bench_function("multi_copy", |b| {
        let mut x = 0u32;
        b.iter(|| {
            x = x.wrapping_add(997);
            copy.fill([black_box(f64::from(x % 1000))], 1.0);
        });
    });
    group.bench_function("multi_shared_buffered", |b| {
        let mut x = 0u32;
        b.iter(|| {
            x = x.wrapping_add(997);
            shared.fill([black_box(f64::from(x % 1000))], 1.0);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fills);
criterion_main!(benches);
