//! Journal entry types.
//!
//! A [`JournalEntry`] is created once by the command journal when a command
//! or rollback marker is appended, and is never modified afterwards.

use serde::{Deserialize, Serialize};

/// The payload of a [`JournalEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalItem<C> {
    /// A command that was (or, for the optimistic kernel, was about to be)
    /// applied to the model.
    Command(C),

    /// Invalidates the command entry with the same id. Replay skips both.
    RollbackMarker,
}

/// A single record in the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry<C> {
    /// Sequence number. Starts at 1, increases by one per command, and is
    /// shared by a rollback marker and the command it invalidates.
    pub id: u64,

    /// Wall-clock time in nanoseconds since the Unix epoch when the entry
    /// was created.
    pub timestamp_ns: u64,

    /// The recorded item.
    pub item: JournalItem<C>,
}

impl<C> JournalEntry<C> {
    /// Creates a command entry.
    pub fn command(id: u64, timestamp_ns: u64, command: C) -> Self {
        Self {
            id,
            timestamp_ns,
            item: JournalItem::Command(command),
        }
    }

    /// Creates a rollback marker for the command entry with `id`.
    pub fn rollback_marker(id: u64, timestamp_ns: u64) -> Self {
        Self {
            id,
            timestamp_ns,
            item: JournalItem::RollbackMarker,
        }
    }

    /// Returns true if this entry is a rollback marker.
    #[must_use]
    #[inline]
    pub fn is_rollback_marker(&self) -> bool {
        matches!(self.item, JournalItem::RollbackMarker)
    }

    /// Returns the command, if this is a command entry.
    #[must_use]
    pub fn as_command(&self) -> Option<&C> {
        match &self.item {
            JournalItem::Command(command) => Some(command),
            JournalItem::RollbackMarker => None,
        }
    }

    /// Consumes the entry and returns its command, if any.
    #[must_use]
    pub fn into_command(self) -> Option<C> {
        match self.item {
            JournalItem::Command(command) => Some(command),
            JournalItem::RollbackMarker => None,
        }
    }
}

/// Describes a named snapshot held by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// The name the snapshot was created with.
    pub name: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_ms: u64,
    /// Size of the stored image in bytes.
    pub size_bytes: u64,
}
