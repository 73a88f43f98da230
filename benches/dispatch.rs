//! Request dispatch benchmarks.
//!
//! Measures the per-request cost firegate adds before any I/O: path
//! classification, static path resolution, and listing rendering.

use std::hint::black_box;
use std::path::Path;

use criterion::{Criterion, criterion_group, criterion_main};
use firegate::router::Route;
use firegate::static_files::{ListingEntry, render_listing, resolve_path};

fn bench_classify(c: &mut Criterion) {
    let paths = [
        "/",
        "/firebase/read",
        "/firebase/write",
        "/firebase/unknown",
        "/pg/assets/app.bundle.js",
    ];
    c.bench_function("route_classify", |b| {
        b.iter(|| {
            for path in &paths {
                black_box(Route::classify(black_box(path)));
            }
        })
    });
}

fn bench_resolve(c: &mut Criterion) {
    let root = Path::new("/srv/site");
    c.bench_function("resolve_path", |b| {
        b.iter(|| black_box(resolve_path(root, black_box("/pg/assets/img%20one.png"))))
    });
}

fn bench_listing(c: &mut Criterion) {
    let entries: Vec<ListingEntry> = (0..200)
        .map(|i| ListingEntry {
            name: format!("file <{i}>.txt"),
            is_dir: i % 10 == 0,
        })
        .collect();
    c.bench_function("render_listing_200", |b| {
        b.iter(|| black_box(render_listing("/pg/", black_box(&entries))))
    });
}

criterion_group!(benches, bench_classify, bench_resolve, bench_listing);
criterion_main!(benches);
