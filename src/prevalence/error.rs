//! Engine error types
//!
//! [`CommandError`] is what application commands and queries return.
//! [`EngineError`] is what the engine hands back to callers; it records
//! where a failure happened and whether the model had to be reconciled.

use super::journal::JournalError;
use super::serialization::SerializationError;
use super::synchronizer::SyncError;
use std::fmt;

/// Failure reported by a command's `prepare`/`execute`/`redo` or by a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The operation refused to run. Safe to retry with different input.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The operation failed part way through.
    #[error("failed: {0}")]
    Failed(String),

    /// The operation hit a condition that makes the engine unusable.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CommandError {
    /// Shorthand for [`CommandError::Rejected`].
    pub fn rejected(reason: impl Into<String>) -> Self {
        CommandError::Rejected(reason.into())
    }

    /// Shorthand for [`CommandError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        CommandError::Failed(reason.into())
    }

    /// Shorthand for [`CommandError::Fatal`].
    pub fn fatal(reason: impl Into<String>) -> Self {
        CommandError::Fatal(reason.into())
    }

    /// Returns true for [`CommandError::Fatal`].
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandError::Fatal(_))
    }
}

/// Errors returned by the engine and its kernels.
#[derive(Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// `prepare` refused the command. Model and journal are untouched.
    CommandRejected {
        /// The error returned by the command
        cause: CommandError,
    },

    /// `execute` failed. The model has been reconciled before this error
    /// was returned: either restored from the journal or, for the
    /// immutable kernel, the new model value was discarded.
    CommandFailed {
        /// The error returned by the command
        cause: CommandError,
        /// Whether a full restore was performed
        restored: bool,
    },

    /// A query returned an error. Queries never change state.
    QueryFailed {
        /// The error returned by the query
        cause: CommandError,
    },

    /// A lock level was not granted within the configured timeout.
    /// Nothing was mutated.
    Timeout(SyncError),

    /// A store operation failed outside of command processing
    /// (snapshots, base images, listing).
    Store(JournalError),

    /// A result could not be deep-cloned. When returned from
    /// `Engine::execute` the command itself was committed and journaled.
    Serialization(SerializationError),

    /// The configuration was rejected.
    InvalidConfiguration {
        /// What is wrong with it
        message: String,
    },

    /// The engine is no longer usable and has been closed.
    Fatal {
        /// Description of the failure
        message: String,
    },

    /// The engine has been closed.
    Disposed,
}

impl EngineError {
    /// Builds a [`EngineError::Fatal`].
    #[cold]
    pub fn fatal(message: impl Into<String>) -> Self {
        EngineError::Fatal {
            message: message.into(),
        }
    }

    /// Returns true if this error closes the engine.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Fatal { .. })
    }

    /// Returns true if the failure was a lock timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Timeout(_))
    }

    /// Maps a `prepare` failure, promoting [`CommandError::Fatal`].
    pub(crate) fn from_prepare(cause: CommandError) -> Self {
        if cause.is_fatal() {
            EngineError::fatal(format!("command prepare: {cause}"))
        } else {
            EngineError::CommandRejected { cause }
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::CommandRejected { cause } => {
                write!(f, "command rejected during prepare: {cause}")
            }
            EngineError::CommandFailed { cause, restored } => {
                if *restored {
                    write!(
                        f,
                        "command failed during execute, model restored from journal: {cause}"
                    )
                } else {
                    write!(
                        f,
                        "command failed during execute, new model discarded: {cause}"
                    )
                }
            }
            EngineError::QueryFailed { cause } => write!(f, "query failed: {cause}"),
            EngineError::Timeout(err) => write!(f, "{err}"),
            EngineError::Store(err) => write!(f, "store error: {err}"),
            EngineError::Serialization(err) => write!(f, "result clone failed: {err}"),
            EngineError::InvalidConfiguration { message } => {
                write!(f, "invalid engine configuration: {message}")
            }
            EngineError::Fatal { message } => write!(f, "fatal engine error: {message}"),
            EngineError::Disposed => write!(f, "engine has been closed"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::CommandRejected { cause }
            | EngineError::CommandFailed { cause, .. }
            | EngineError::QueryFailed { cause } => Some(cause),
            EngineError::Timeout(err) => Some(err),
            EngineError::Store(err) => Some(err),
            EngineError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SyncError> for EngineError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Poisoned => EngineError::fatal("synchronizer state poisoned"),
            timeout => EngineError::Timeout(timeout),
        }
    }
}

impl From<JournalError> for EngineError {
    fn from(err: JournalError) -> Self {
        EngineError::Store(err)
    }
}

impl From<SerializationError> for EngineError {
    fn from(err: SerializationError) -> Self {
        EngineError::Serialization(err)
    }
}
