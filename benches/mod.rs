use criterion::{criterion_group, criterion_main};

mod journal;
mod serialization;

use journal::register_benchmarks as register_journal_benchmarks;
use kernels::register_benchmarks as register_kernel_benchmarks;
use serialization::register_benchmarks as register_serialization_benchmarks;

// Define the benchmark groups
criterion_group!(
    benches,
    register_kernel_benchmarks,
    register_journal_benchmarks,
    register_serialization_benchmarks,
);

criterion_main!(benches);
