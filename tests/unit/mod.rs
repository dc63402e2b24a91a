mod common;
mod concurrency_tests;
mod file_store_recovery_tests;
mod replay_filter_tests;
mod snapshot_tests;
