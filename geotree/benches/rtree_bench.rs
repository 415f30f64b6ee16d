//! R-Tree benchmarks

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use geotree::{
    ArrayEnvelopeDecoder, DiskNodeStore, Envelope, MemoryNodeStore, NodeStore, RTreeConfig,
    RTreeIndex, SearchIntersectWindow,
};
use tempfile::tempdir;

fn memory_index() -> (Arc<MemoryNodeStore>, RTreeIndex) {
    let store = Arc::new(MemoryNodeStore::new());
    let decoder = Arc::new(ArrayEnvelopeDecoder::new(store.clone()));
    let index = RTreeIndex::new(store.clone(), decoder, RTreeConfig::default()).unwrap();
    (store, index)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("RTreeIndex Insert");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_with_setup(memory_index, |(store, index)| {
                for i in 0..size {
                    let x = (i % 100) as f64;
                    let y = (i / 100) as f64;
                    let record = store.create_record(&[x, y, x + 1.0, y + 1.0]).unwrap();
                    index.add(record).unwrap();
                }
                black_box(index.count().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("RTreeIndex Search");

    let (store, index) = memory_index();
    for i in 0..10000 {
        let x = (i % 100) as f64;
        let y = (i / 100) as f64;
        let record = store.create_record(&[x, y, x + 1.0, y + 1.0]).unwrap();
        index.add(record).unwrap();
    }

    group.bench_function("window_search_10k", |b| {
        b.iter(|| {
            let window = Envelope::rect(25.0, 25.0, 75.0, 75.0).unwrap();
            let filter = Arc::new(SearchIntersectWindow::new(index.envelope_decoder(), window));
            black_box(index.search(filter).count())
        });
    });

    group.finish();
}

fn bench_disk_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("RTreeIndex Disk Insert");

    group.bench_function("insert_1k_paged", |b| {
        b.iter_with_setup(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("bench.gtree");
                let store = Arc::new(DiskNodeStore::create(&path).unwrap());
                let decoder = Arc::new(ArrayEnvelopeDecoder::new(store.clone()));
                let index =
                    RTreeIndex::new(store.clone(), decoder, RTreeConfig::default()).unwrap();
                (store, index, dir)
            },
            |(store, index, _dir)| {
                for i in 0..1000 {
                    let x = (i % 100) as f64;
                    let y = (i / 100) as f64;
                    let record = store.create_record(&[x, y, x + 1.0, y + 1.0]).unwrap();
                    index.add(record).unwrap();
                }
                black_box(index.count().unwrap())
            },
        );
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_search, bench_disk_insert);
criterion_main!(benches);
