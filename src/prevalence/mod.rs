//! Object prevalence: an in-memory model made durable by a command journal.

pub mod command_journal;
pub mod config;
/// The engine façade: execution, queries, images, snapshots and recovery.
pub mod engine;
pub mod error;
pub mod journal;
/// Pessimistic, optimistic and immutable execution strategies.
pub mod kernel;
pub mod model;
pub mod serialization;
pub mod synchronizer;
/// Command outcome logging and optional metrics.
pub mod telemetry;
#[cfg(test)]
mod tests;

pub use command_journal::{CommandJournal, filter_command_entries};
pub use config::{DEFAULT_LOCK_TIMEOUT, EngineConfiguration, KernelKind, SynchronizerKind};
pub use engine::Engine;
pub use error::{CommandError, EngineError};
pub use journal::{
    FileStore, JournalEntry, JournalError, JournalItem, JournalStore, JournalWriter,
    MemoryStore, SnapshotInfo,
};
pub use kernel::{Kernel, KernelCore};
pub use model::{Command, FnQuery, Model, Query};
pub use serialization::{SerializationError, SerializationFormat, Serializer};
pub use synchronizer::{
    LockGuard, LockLevel, NullSynchronizer, ReadWriteSynchronizer, SyncError, Synchronizer,
};
