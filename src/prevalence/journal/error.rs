//! Error types for the journal and storage subsystem.
//!
//! [`JournalError`] covers all failure modes of the journal store: I/O
//! errors, corrupt entries, damaged images and misuse of the command
//! journal's writer protocol.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur within the journal subsystem.
#[derive(Debug)]
#[non_exhaustive]
pub enum JournalError {
    /// An I/O error occurred while reading or writing store files.
    Io {
        /// The underlying I/O error message.
        message: String,
        /// The file path involved, if known.
        path: Option<PathBuf>,
    },

    /// A journal entry failed CRC32 integrity verification.
    CorruptEntry {
        /// The id of the corrupt entry.
        id: u64,
        /// The CRC32 checksum stored with the entry.
        expected_crc: u32,
        /// The CRC32 checksum computed from the entry bytes.
        actual_crc: u32,
    },

    /// A journal entry payload could not be deserialized.
    DeserializationError {
        /// The id of the entry that failed to deserialize.
        id: u64,
        /// The underlying deserialization error message.
        message: String,
    },

    /// A model or journal payload could not be serialized.
    SerializationError {
        /// The underlying serialization error message.
        message: String,
    },

    /// A serialized entry does not fit in an empty journal segment.
    EntryTooLarge {
        /// The size of the serialized entry in bytes.
        entry_bytes: usize,
        /// The configured segment size in bytes.
        segment_size: usize,
    },

    /// A model image failed its SHA-256 check or has a foreign header.
    CorruptImage {
        /// Where the image was read from.
        source: String,
        /// What was wrong with it.
        message: String,
    },

    /// No base image has been written yet.
    ModelNotFound,

    /// The named snapshot does not exist.
    SnapshotNotFound {
        /// The requested snapshot name.
        name: String,
    },

    /// Snapshot names must be non-empty and free of path separators.
    InvalidSnapshotName {
        /// The rejected name.
        name: String,
    },

    /// `verify_can_create` found an existing base image.
    AlreadyExists {
        /// Description of the existing store.
        location: String,
    },

    /// The journal writer has been closed.
    WriterClosed,

    /// A rollback marker was requested but no command has been appended
    /// since the writer was opened, or the last command already carries one.
    NoCommandToRollBack,

    /// An internal mutex was poisoned.
    MutexPoisoned,

    /// The journal entry has an invalid header (truncated or malformed).
    InvalidEntryHeader {
        /// Byte offset within the segment where the error occurred.
        offset: usize,
        /// Description of the header problem.
        message: String,
    },
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalError::Io { message, path } => {
                if let Some(p) = path {
                    write!(f, "journal I/O error at {}: {message}", p.display())
                } else {
                    write!(f, "journal I/O error: {message}")
                }
            }
            JournalError::CorruptEntry {
                id,
                expected_crc,
                actual_crc,
            } => {
                write!(
                    f,
                    "corrupt journal entry {id}: \
                     expected CRC {expected_crc:#010x}, got {actual_crc:#010x}"
                )
            }
            JournalError::DeserializationError { id, message } => {
                write!(f, "journal deserialization error at entry {id}: {message}")
            }
            JournalError::SerializationError { message } => {
                write!(f, "journal serialization error: {message}")
            }
            JournalError::EntryTooLarge {
                entry_bytes,
                segment_size,
            } => {
                write!(
                    f,
                    "journal entry too large: {entry_bytes} bytes exceeds \
                     segment size {segment_size} bytes"
                )
            }
            JournalError::CorruptImage { source, message } => {
                write!(f, "corrupt model image {source}: {message}")
            }
            JournalError::ModelNotFound => write!(f, "no base image found"),
            JournalError::SnapshotNotFound { name } => {
                write!(f, "snapshot not found: {name}")
            }
            JournalError::InvalidSnapshotName { name } => {
                write!(f, "invalid snapshot name: {name:?}")
            }
            JournalError::AlreadyExists { location } => {
                write!(f, "a base image already exists at {location}")
            }
            JournalError::WriterClosed => write!(f, "journal writer is closed"),
            JournalError::NoCommandToRollBack => {
                write!(f, "no command entry to roll back in the current journal segment")
            }
            JournalError::MutexPoisoned => write!(f, "journal internal mutex poisoned"),
            JournalError::InvalidEntryHeader { offset, message } => {
                write!(
                    f,
                    "invalid journal entry header at offset {offset}: {message}"
                )
            }
        }
    }
}

impl std::error::Error for JournalError {}

impl From<std::io::Error> for JournalError {
    #[cold]
    fn from(err: std::io::Error) -> Self {
        JournalError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

impl JournalError {
    /// Wraps an I/O error with the path it occurred on.
    #[cold]
    pub(crate) fn io_at(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        JournalError::Io {
            message: err.to_string(),
            path: Some(path.into()),
        }
    }
}
