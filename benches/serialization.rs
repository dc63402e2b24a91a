//! Benchmarks comparing JSON vs Bincode for images and result cloning.

use crate::kernels::Counters;
use criterion::Criterion;
use prevalence_rs::prelude::*;
use std::hint::black_box;

fn make_model(keys: u32) -> Counters {
    let mut model = Counters::default();
    for key in 0..keys {
        model.values.insert(key, u64::from(key) * 31);
    }
    model.revision = u64::from(keys);
    model
}

pub fn register_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");

    let model = make_model(10_000);

    // ─── JSON ───────────────────────────────────────────────────────
    let json = Serializer::json();

    group.bench_function("json_encode_image", |b| {
        b.iter(|| json.to_bytes(black_box(&model)))
    });

    let json_bytes = json
        .to_bytes(&model)
        .expect("json image serialization must succeed in bench setup");

    group.bench_function("json_decode_image", |b| {
        b.iter(|| json.from_bytes::<Counters>(black_box(&json_bytes)))
    });

    group.bench_function("json_deep_clone", |b| {
        b.iter(|| json.deep_clone(black_box(&model)))
    });

    // ─── Bincode ────────────────────────────────────────────────────
    #[cfg(feature = "bincode")]
    {
        let bincode = Serializer::new(SerializationFormat::Bincode);

        group.bench_function("bincode_encode_image", |b| {
            b.iter(|| bincode.to_bytes(black_box(&model)))
        });

        let bin_bytes = bincode
            .to_bytes(&model)
            .expect("bincode image serialization must succeed in bench setup");

        group.bench_function("bincode_decode_image", |b| {
            b.iter(|| bincode.from_bytes::<Counters>(black_box(&bin_bytes)))
        });

        group.bench_function("bincode_deep_clone", |b| {
            b.iter(|| bincode.deep_clone(black_box(&model)))
        });

        // Print size comparison (visible in bench output)
        eprintln!(
            "[size] image: JSON={} bytes, Bincode={} bytes ({:.0}% smaller)",
            json_bytes.len(),
            bin_bytes.len(),
            (1.0 - bin_bytes.len() as f64 / json_bytes.len() as f64) * 100.0
        );
    }

    group.finish();
}
