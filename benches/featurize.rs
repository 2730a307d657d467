//! Feature derivation benchmarks
//!
//! - Per-backbone extraction cost on a fixed molecule set
//! - Cache derivation throughput by worker count
//! - Parquet partition write and read

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use molprop_data::cache::{CacheOptions, FeatureCache, MemoryArtifactStore};
use molprop_data::dataset::{Record, Split, SplitName};
use molprop_data::features::Backbone;
use molprop_data::storage::{read_partition, write_partition};

const MOLECULES: &[&str] = &[
    "CC(=O)Oc1ccccc1C(=O)O",
    "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",
    "CC(C)Cc1ccc(cc1)[C@@H](C)C(=O)O",
    "c1ccc2c(c1)cccc2",
    "OC[C@H]1OC(O)[C@H](O)[C@@H](O)[C@@H]1O",
    "Clc1ccc(cc1)C(c1ccc(Cl)cc1)C(Cl)(Cl)Cl",
    "CCN(CC)CCNC(=O)c1ccc(N)cc1",
    "C1CCCCC1",
];

/// Split with `n` records cycling over the molecule set
fn make_split(n: usize) -> Split {
    let records = (0..n)
        .map(|i| Record::new(MOLECULES[i % MOLECULES.len()], vec![0.0, 1.0]))
        .collect();
    Split::new(SplitName::Train, records)
}

fn bench_extractors(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    let records: Vec<Record> = MOLECULES.iter().map(|s| Record::new(*s, vec![0.0])).collect();

    for backbone in Backbone::ALL {
        let extractor = backbone.extractor();
        group.bench_with_input(BenchmarkId::from_parameter(backbone.id()), &records, |b, records| {
            b.iter(|| {
                for record in records {
                    black_box(extractor.extract(black_box(record)).ok());
                }
            });
        });
    }
    group.finish();
}

fn bench_cache_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_derive");
    let split = make_split(2_000);
    let extractor = Backbone::DnnMorgan.extractor();

    for workers in [1usize, 2, 4, 8] {
        let options = CacheOptions::default().num_workers(workers).disable_saving(true);
        group.bench_with_input(BenchmarkId::from_parameter(workers), &split, |b, split| {
            let cache = FeatureCache::new(MemoryArtifactStore::new(), options);
            b.iter(|| black_box(cache.load_or_derive("bench", split, extractor.as_ref()).unwrap()));
        });
    }
    group.finish();
}

fn bench_partition_io(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.parquet");
    let split = make_split(10_000);

    c.bench_function("partition_write_10k", |b| {
        b.iter(|| write_partition(&path, black_box(&split)).unwrap());
    });
    write_partition(&path, &split).unwrap();
    c.bench_function("partition_read_10k", |b| {
        b.iter(|| black_box(read_partition(&path, SplitName::Train, 2).unwrap()));
    });
}

criterion_group!(benches, bench_extractors, bench_cache_derivation, bench_partition_io);
criterion_main!(benches);
