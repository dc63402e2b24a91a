//! Journal write, replay filter and recovery costs.

use crate::kernels::{Counters, Increment};
use criterion::{BenchmarkId, Criterion};
use prevalence_rs::prelude::*;
use prevalence_rs::{JournalEntry, filter_command_entries};
use std::hint::black_box;

fn raw_stream(count: u64) -> Vec<JournalEntry<Increment>> {
    let mut raw = Vec::with_capacity(count as usize + count as usize / 10);
    for id in 1..=count {
        raw.push(JournalEntry::command(id, id, Increment { key: id as u32 % 64 }));
        if id % 10 == 0 {
            raw.push(JournalEntry::rollback_marker(id, id));
        }
    }
    raw
}

/// Register all benchmarks for journaling and recovery.
pub fn register_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("Engine - Journal");

    for &count in &[1_000u64, 10_000] {
        group.bench_with_input(
            BenchmarkId::new("filter_command_entries", count),
            &count,
            |b, &count| {
                b.iter_with_setup(
                    || raw_stream(count),
                    |raw| black_box(filter_command_entries(raw.into_iter().map(Ok))),
                );
            },
        );
    }

    group.bench_function("file_store_execute", |b| {
        let dir = tempfile::tempdir().expect("tempdir must be created in bench setup");
        let store: FileStore<Counters, Increment> =
            FileStore::open(dir.path()).expect("file store must open in bench setup");
        let engine = Engine::create(Counters::default(), store, EngineConfiguration::new())
            .expect("engine creation must succeed in bench setup");
        let mut key = 0u32;
        b.iter(|| {
            key = (key + 1) % 64;
            black_box(engine.execute(Increment { key }))
        });
    });

    for &count in &[1_000u32, 10_000] {
        let store: MemoryStore<Counters, Increment> = MemoryStore::new();
        {
            let engine =
                Engine::create(Counters::default(), store.clone(), EngineConfiguration::new())
                    .expect("engine creation must succeed in bench setup");
            for i in 0..count {
                engine
                    .execute(Increment { key: i % 64 })
                    .expect("command must succeed in bench setup");
            }
        }
        group.bench_with_input(BenchmarkId::new("load_replay", count), &count, |b, _| {
            b.iter(|| {
                let engine: Engine<Counters, Increment> =
                    Engine::load(store.clone(), EngineConfiguration::new())
                        .expect("load must succeed in bench");
                black_box(engine.revision())
            })
        });
    }

    group.finish();
}
