//! Performance benchmarks for the wallet sync layer.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use wallet_tracker::docstore::ListenerConfig;
use wallet_tracker::wallet::newest_first;
use wallet_tracker::{
    CollectionPath, Color, DocumentDb, DocumentId, MemoryDb, Record, Repository, Timestamp, UserId,
};

fn record(i: i64) -> Record {
    Record {
        account_id: DocumentId::new("acc"),
        account_name: "Cash".into(),
        category: format!("category-{}", i % 7),
        amount: (i * 13 % 1000).to_string(),
        currency: "EGP".into(),
        color: Color::RED.encode(),
        // Scrambled so sorting has work to do
        timestamp: Some(Timestamp((i * 7919) % 100_003)),
        ..Default::default()
    }
}

/// Benchmark sorting a records snapshot
fn bench_newest_first(c: &mut Criterion) {
    let mut group = c.benchmark_group("newest_first");

    for size in [100, 1_000, 10_000] {
        let records: Vec<_> = (0..size).map(record).collect();
        group.bench_with_input(BenchmarkId::new("records", size), &records, |b, records| {
            b.iter(|| {
                let mut records = records.clone();
                newest_first(&mut records);
                black_box(records)
            })
        });
    }

    group.finish();
}

/// Benchmark a write reaching a live listener as a decoded snapshot
fn bench_snapshot_republish(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_republish");

    for size in [10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("collection_size", size), &size, |b, &size| {
            let db: Arc<dyn DocumentDb> = Arc::new(MemoryDb::in_memory());
            let repo = Repository::new(db, UserId::new("bench"))
                .with_listener_config(ListenerConfig { buffer_size: 1024 });
            let records = repo.records();
            for i in 0..size {
                records.add(&record(i)).unwrap();
            }

            let mut stream = records.subscribe();
            stream.next().unwrap().unwrap();

            b.iter(|| {
                records.add(&record(size)).unwrap();
                black_box(stream.next().unwrap().unwrap().len())
            });
        });
    }

    group.finish();
}

/// Benchmark journaled writes
fn bench_journaled_add(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let db = MemoryDb::open(wallet_tracker::DbConfig {
        path: Some(dir.path().join("db")),
    })
    .unwrap();
    let path = CollectionPath::new(UserId::new("bench"), "records");
    let fields = wallet_tracker::repository::encode(&record(1)).unwrap();

    c.bench_function("journaled_add", |b| {
        b.iter(|| black_box(db.add(&path, fields.clone(), Some("timestamp")).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_newest_first,
    bench_snapshot_republish,
    bench_journaled_add
);
criterion_main!(benches);
