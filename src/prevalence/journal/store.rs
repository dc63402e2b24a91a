//! The storage contract the engine depends on.
//!
//! A [`JournalStore`] keeps three things: the base image the model is
//! rebuilt from, named snapshots, and the append-only journal of entries
//! written after the base image. The engine only ever talks to storage
//! through this trait; see `MemoryStore` and `FileStore` for the provided
//! implementations.

use super::error::JournalError;
use super::types::{JournalEntry, SnapshotInfo};

/// Type alias for the lazy iterator returned by the `read_entries*` family.
///
/// Each item is either a decoded [`JournalEntry`] or a [`JournalError`]
/// (e.g. corrupt CRC, deserialization failure).
pub type JournalReadIter<C> = Box<dyn Iterator<Item = Result<JournalEntry<C>, JournalError>>>;

/// Append handle returned by [`JournalStore::open_journal_writer`].
///
/// Implementations must make an entry durable before
/// [`write`](JournalWriter::write) returns `Ok(())`.
pub trait JournalWriter<C>: Send {
    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if serialization, I/O or flushing fails, or
    /// [`JournalError::WriterClosed`] after [`close`](JournalWriter::close).
    fn write(&mut self, entry: &JournalEntry<C>) -> Result<(), JournalError>;

    /// Flush and release the writer.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the final flush fails.
    fn close(&mut self) -> Result<(), JournalError>;
}

/// Persistent storage for base images, snapshots and the journal.
///
/// # Type Parameters
///
/// * `M`: the model type stored in images and snapshots.
/// * `C`: the command type recorded in the journal.
///
/// # Thread Safety
///
/// The trait requires `Send + Sync` so a store can be shared between the
/// engine and diagnostics. There is a single journal writer at a time.
pub trait JournalStore<M, C>: Send + Sync {
    /// Read the base image.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::ModelNotFound`] if no image was written.
    fn read_model(&self) -> Result<M, JournalError>;

    /// Replace the base image.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] on serialization or I/O failure.
    fn write_model(&self, model: &M) -> Result<(), JournalError>;

    /// Read a named snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::SnapshotNotFound`] for an unknown name.
    fn read_snapshot(&self, name: &str) -> Result<M, JournalError>;

    /// Write a named snapshot, replacing one with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidSnapshotName`] or an I/O error.
    fn write_snapshot(&self, name: &str, model: &M) -> Result<(), JournalError>;

    /// Describe every stored snapshot, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the listing cannot be read.
    fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>, JournalError>;

    /// Open the journal for appending. The first entry the caller writes
    /// will carry id `after_id + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the journal cannot be opened.
    fn open_journal_writer(&self, after_id: u64) -> Result<Box<dyn JournalWriter<C>>, JournalError>;

    /// Read every journal entry in id order.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the journal cannot be opened. Errors on
    /// individual entries are reported through the iterator.
    fn read_entries(&self) -> Result<JournalReadIter<C>, JournalError>;

    /// Read entries whose id is `id` or greater.
    ///
    /// # Errors
    ///
    /// See [`read_entries`](JournalStore::read_entries).
    fn read_entries_from(&self, id: u64) -> Result<JournalReadIter<C>, JournalError>
    where
        C: 'static,
    {
        let entries = self.read_entries()?;
        Ok(Box::new(entries.filter(move |entry| match entry {
            Ok(entry) => entry.id >= id,
            Err(_) => true,
        })))
    }

    /// Read entries created at or before `timestamp_ns`.
    ///
    /// # Errors
    ///
    /// See [`read_entries`](JournalStore::read_entries).
    fn read_entries_before_or_at(&self, timestamp_ns: u64) -> Result<JournalReadIter<C>, JournalError>
    where
        C: 'static,
    {
        let entries = self.read_entries()?;
        Ok(Box::new(entries.take_while(move |entry| match entry {
            Ok(entry) => entry.timestamp_ns <= timestamp_ns,
            Err(_) => true,
        })))
    }

    /// Discard every journal entry. Called after a new base image has been
    /// written, since the image now covers that history.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] on I/O failure.
    fn clear_journal(&self) -> Result<(), JournalError>;

    /// Returns true if a base image exists.
    fn exists(&self) -> bool;

    /// Check that a new store can be created here.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::AlreadyExists`] if a base image is present.
    fn verify_can_create(&self) -> Result<(), JournalError>;

    /// Check that this store can be loaded.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::ModelNotFound`] if there is no base image.
    fn verify_can_load(&self) -> Result<(), JournalError>;
}

/// Rejects snapshot names that are empty or could escape the snapshot
/// namespace.
pub(crate) fn validate_snapshot_name(name: &str) -> Result<(), JournalError> {
    let invalid = name.trim().is_empty()
        || name.contains(['/', '\\'])
        || name == "."
        || name == "..";
    if invalid {
        return Err(JournalError::InvalidSnapshotName {
            name: name.to_string(),
        });
    }
    Ok(())
}
