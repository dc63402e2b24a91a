//! Sequence ids, rollback markers and the replay filter.
//!
//! [`CommandJournal`] sits between the kernels and a [`JournalStore`]. It
//! hands out ids, writes command entries and rollback markers through the
//! store's writer, and turns a raw entry stream back into the commands that
//! actually took effect.
//!
//! For any id there is at most one command entry and at most one rollback
//! marker, and a marker is only ever written after its command.

use super::journal::{JournalEntry, JournalError, JournalStore, JournalWriter};
use crate::utils::current_time_nanos;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Returns the command entries of `raw` that were not rolled back.
///
/// Collects the ids of every rollback marker, then keeps each command entry
/// whose id is not among them, in stream order and with its original id.
/// Markers never appear in the output and need not be adjacent to the
/// command they invalidate.
///
/// # Errors
///
/// Returns the first read error in `raw`.
pub fn filter_command_entries<C, I>(raw: I) -> Result<Vec<JournalEntry<C>>, JournalError>
where
    I: IntoIterator<Item = Result<JournalEntry<C>, JournalError>>,
{
    let entries = raw.into_iter().collect::<Result<Vec<_>, _>>()?;
    let rolled_back: HashSet<u64> = entries
        .iter()
        .filter(|entry| entry.is_rollback_marker())
        .map(|entry| entry.id)
        .collect();

    Ok(entries
        .into_iter()
        .filter(|entry| !entry.is_rollback_marker() && !rolled_back.contains(&entry.id))
        .collect())
}

/// Assigns ids and writes commands and rollback markers to a store.
///
/// A new `CommandJournal` is closed; call [`open`](CommandJournal::open)
/// once the id of the last stored entry is known.
pub struct CommandJournal<M, C> {
    store: Arc<dyn JournalStore<M, C>>,
    writer: Option<Box<dyn JournalWriter<C>>>,
    last_id: u64,
    /// Id of the most recent append that has no marker yet.
    rollback_candidate: Option<u64>,
}

impl<M, C: Clone> CommandJournal<M, C> {
    /// Wraps `store`. The journal starts closed.
    pub fn new(store: Arc<dyn JournalStore<M, C>>) -> Self {
        Self {
            store,
            writer: None,
            last_id: 0,
            rollback_candidate: None,
        }
    }

    /// Opens a writer. The next append gets id `after_id + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the store cannot open a writer.
    pub fn open(&mut self, after_id: u64) -> Result<(), JournalError> {
        self.close()?;
        self.writer = Some(self.store.open_journal_writer(after_id)?);
        self.last_id = after_id;
        self.rollback_candidate = None;
        debug!(after_id, "command journal opened");
        Ok(())
    }

    /// Appends `command` with the next id and returns that id once the
    /// entry is durable.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::WriterClosed`] when closed, or the store's
    /// write error. The id is not consumed on failure.
    pub fn append(&mut self, command: &C) -> Result<u64, JournalError> {
        let writer = self.writer.as_mut().ok_or(JournalError::WriterClosed)?;
        let id = self.last_id.saturating_add(1);
        let entry = JournalEntry::command(id, current_time_nanos(), command.clone());
        writer.write(&entry)?;
        self.last_id = id;
        self.rollback_candidate = Some(id);
        trace!(id, "command journaled");
        Ok(id)
    }

    /// Writes a rollback marker for the most recent append and returns its
    /// id.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::NoCommandToRollBack`] if nothing was appended
    /// since the writer was opened or the last append already has a marker,
    /// [`JournalError::WriterClosed`] when closed, or the store's write
    /// error.
    pub fn write_rollback_marker(&mut self) -> Result<u64, JournalError> {
        let writer = self.writer.as_mut().ok_or(JournalError::WriterClosed)?;
        let id = self
            .rollback_candidate
            .ok_or(JournalError::NoCommandToRollBack)?;
        writer.write(&JournalEntry::rollback_marker(id, current_time_nanos()))?;
        self.rollback_candidate = None;
        warn!(id, "rollback marker written");
        Ok(id)
    }

    /// Discards the whole journal and reopens it so the next append gets
    /// id 1. Used once a new base image covers the history.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if closing, clearing or reopening fails.
    pub fn clear(&mut self) -> Result<(), JournalError> {
        self.close()?;
        self.store.clear_journal()?;
        self.open(0)
    }

    /// Releases the writer. Closing a closed journal does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the final flush fails.
    pub fn close(&mut self) -> Result<(), JournalError> {
        if let Some(mut writer) = self.writer.take() {
            self.rollback_candidate = None;
            writer.close()?;
            debug!(last_id = self.last_id, "command journal closed");
        }
        Ok(())
    }

    /// Returns true while a writer is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Id of the last entry written, or the id the journal was opened after.
    #[must_use]
    pub fn last_entry_id(&self) -> u64 {
        self.last_id
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn JournalStore<M, C>> {
        &self.store
    }

    /// Reads the full stored journal and filters it for replay.
    ///
    /// Also returns the highest id present in the raw stream, markers
    /// included, so a writer reopened afterwards never reuses an id.
    ///
    /// # Errors
    ///
    /// Returns the store's read error.
    pub fn command_entries(&self) -> Result<(Vec<JournalEntry<C>>, u64), JournalError>
    where
        C: 'static,
    {
        let mut max_id = 0u64;
        let raw = self.store.read_entries()?.inspect(|entry| {
            if let Ok(entry) = entry {
                max_id = max_id.max(entry.id);
            }
        });
        let entries = filter_command_entries(raw)?;
        Ok((entries, max_id))
    }
}
