//! Storage subsystem: journal entries, the store contract and its
//! implementations.
//!
//! # Types
//!
//! - [`JournalEntry`] / [`JournalItem`]: a command or rollback marker with
//!   its id and timestamp
//! - [`JournalStore`]: storage contract for images, snapshots and journal
//! - [`JournalWriter`]: append handle for the journal
//! - [`MemoryStore`]: in-process store for tests and embedded use
//! - [`FileStore`]: directory store with checksummed images and
//!   memory-mapped, CRC-protected journal segments
//! - [`JournalError`]: error type for storage operations

pub mod error;
pub mod file_store;
pub mod memory_store;
pub mod store;
pub mod types;

pub use error::JournalError;
pub use file_store::{DEFAULT_SEGMENT_SIZE, ENTRY_CRC_SIZE, ENTRY_HEADER_SIZE, FileStore};
pub use memory_store::MemoryStore;
pub use store::{JournalReadIter, JournalStore, JournalWriter};
pub use types::{JournalEntry, JournalItem, SnapshotInfo};
