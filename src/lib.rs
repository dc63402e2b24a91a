//! # Object Prevalence Engine
//!
//! An in-process object-prevalence engine. The whole application state
//! lives in memory as a single model, every mutation is a serializable
//! command written to an append-only journal, and recovery rebuilds the
//! model from a checksummed base image plus a filtered replay of that
//! journal.
//!
//! ## Key Features
//!
//! - **Three Execution Strategies**: a pessimistic kernel (execute, then
//!   journal), an optimistic kernel (journal, then execute, with rollback
//!   markers on failure) and an immutable kernel (build the next model
//!   value, journal, swap).
//!
//! - **Reader / Upgrade / Writer Locking**: queries run concurrently with
//!   each other, and queries already running when a command starts are not
//!   interrupted by its `prepare` phase. Only `execute` takes the exclusive
//!   level. Every acquisition is bounded by a timeout.
//!
//! - **Crash-Safe Journal**: entries are framed with a CRC32 and written to
//!   pre-allocated, memory-mapped segments. Rolled-back commands are
//!   filtered out on replay, so the persisted history never refers to a
//!   command whose effect was not kept.
//!
//! - **Checksummed Images**: base images and named snapshots carry a
//!   SHA-256 digest and are replaced atomically.
//!
//! - **Result Isolation**: command and query results are deep-cloned through
//!   the configured serializer unless the operation declares them safe.
//!
//! ## Design Goals
//!
//! 1. **Correctness**: a failure in the middle of a mutation never leaves
//!    the journal describing a state the model does not have.
//! 2. **Read Throughput**: the common read path takes a shared lock only.
//! 3. **Simplicity**: application code is plain Rust structs and enums;
//!    persistence is a property of the engine, not of the model.
//!
//! ## Example
//!
//! ```rust
//! use prevalence_rs::prelude::*;
//! use serde::{Deserialize, Serialize};
//! use std::collections::BTreeMap;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Ledger {
//!     revision: u64,
//!     balances: BTreeMap<String, i64>,
//! }
//!
//! impl Model for Ledger {
//!     fn revision(&self) -> u64 {
//!         self.revision
//!     }
//!     fn set_revision(&mut self, revision: u64) {
//!         self.revision = revision;
//!     }
//! }
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! enum LedgerCommand {
//!     Deposit { account: String, amount: i64 },
//!     Withdraw { account: String, amount: i64 },
//! }
//!
//! impl Command<Ledger> for LedgerCommand {
//!     type Output = i64;
//!
//!     fn prepare(&mut self, ledger: &Ledger) -> Result<(), CommandError> {
//!         if let LedgerCommand::Withdraw { account, amount } = &*self {
//!             let balance = ledger.balances.get(account).copied().unwrap_or(0);
//!             if balance < *amount {
//!                 return Err(CommandError::rejected("insufficient funds"));
//!             }
//!         }
//!         Ok(())
//!     }
//!
//!     fn execute(&self, ledger: &mut Ledger) -> Result<i64, CommandError> {
//!         let (account, delta) = match self {
//!             LedgerCommand::Deposit { account, amount } => (account, *amount),
//!             LedgerCommand::Withdraw { account, amount } => (account, -*amount),
//!         };
//!         let balance = ledger.balances.entry(account.clone()).or_default();
//!         *balance += delta;
//!         Ok(*balance)
//!     }
//! }
//!
//! # fn main() -> Result<(), EngineError> {
//! let engine = Engine::create(Ledger::default(), MemoryStore::new(), EngineConfiguration::new())?;
//!
//! engine.execute(LedgerCommand::Deposit { account: "alice".into(), amount: 100 })?;
//! let rejected = engine.execute(LedgerCommand::Withdraw { account: "alice".into(), amount: 500 });
//! assert!(matches!(rejected, Err(EngineError::CommandRejected { .. })));
//!
//! let balance = engine.query(|l: &Ledger| l.balances.get("alice").copied())?;
//! assert_eq!(balance, Some(100));
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage
//!
//! Two stores are provided. `MemoryStore` keeps everything in process and
//! is meant for tests and embedded use. `FileStore` keeps a directory:
//!
//! ```text
//! <dir>/model.image
//! <dir>/snapshots/<name>.snapshot
//! <dir>/journal/segment-{start:020}.journal
//! ```
//!
//! Any other backend can be plugged in by implementing `JournalStore`.
//!
//! ## Feature Flags
//!
//! - `bincode`: adds `SerializationFormat::Bincode` for images, journal
//!   payloads and result cloning.
//! - `metrics`: emits command, rollback-marker and restore counters through
//!   the `metrics` facade.
//!
//! ## Status
//! This project is currently in active development and is not yet suitable
//! for production use.

pub mod prevalence;

pub mod prelude;
mod utils;

pub use prevalence::command_journal::{CommandJournal, filter_command_entries};
pub use prevalence::config::{EngineConfiguration, KernelKind, SynchronizerKind};
pub use prevalence::engine::Engine;
pub use prevalence::error::{CommandError, EngineError};
pub use prevalence::journal::{
    FileStore, JournalEntry, JournalError, JournalItem, JournalReadIter, JournalStore,
    JournalWriter, MemoryStore, SnapshotInfo,
};
pub use prevalence::kernel::{Kernel, KernelCore};
pub use prevalence::model::{Command, FnQuery, Model, Query};
pub use prevalence::serialization::{SerializationError, SerializationFormat, Serializer};
pub use prevalence::synchronizer::{
    LockGuard, LockLevel, NullSynchronizer, ReadWriteSynchronizer, SyncError, Synchronizer,
};
pub use prevalence::telemetry::CommandOutcome;
pub use utils::{current_time_millis, current_time_nanos};
