//! Execution strategies.
//!
//! A kernel decides when a command is journaled relative to when it
//! mutates the model, and how the model is reconciled when a command fails.
//!
//! - [`PessimisticKernel`]: execute, then journal (default)
//! - [`OptimisticKernel`]: journal, then execute; rollback markers on
//!   failure
//! - [`ImmutableKernel`]: build the next model value, journal, swap
//!
//! All three share a [`KernelCore`].

mod immutable;
mod optimistic;
mod pessimistic;
mod shared;

pub use immutable::ImmutableKernel;
pub use optimistic::OptimisticKernel;
pub use pessimistic::PessimisticKernel;
pub use shared::KernelCore;

use super::config::KernelKind;
use super::error::{CommandError, EngineError};
use super::journal::JournalError;
use super::model::{Command, Model};
use tracing::error;

/// A command execution strategy.
pub trait Kernel<M: Model, C: Command<M>>: Send + Sync {
    /// Which strategy this is.
    fn kind(&self) -> KernelKind;

    /// The shared model, locks and journal.
    fn core(&self) -> &KernelCore<M, C>;

    /// Prepares, executes and journals `command`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::CommandRejected`] if `prepare` refused the command
    /// - [`EngineError::CommandFailed`] if `execute` failed; the model has
    ///   been reconciled
    /// - [`EngineError::Timeout`] if a lock was not granted in time
    /// - [`EngineError::Fatal`] if the journal could not be written or the
    ///   model could not be reconciled
    fn execute_command(&self, command: C) -> Result<C::Output, EngineError>;
}

/// Builds the kernel selected by `kind` around `core`.
pub fn build_kernel<M: Model, C: Command<M>>(
    kind: KernelKind,
    core: KernelCore<M, C>,
) -> Box<dyn Kernel<M, C>> {
    match kind {
        KernelKind::Pessimistic => Box::new(PessimisticKernel::new(core)),
        KernelKind::Optimistic => Box::new(OptimisticKernel::new(core)),
        KernelKind::Immutable => Box::new(ImmutableKernel::new(core)),
    }
}

/// A journal write failed during command processing. A writer closed by
/// the engine's own shutdown means the engine is gone, not broken.
#[cold]
fn journal_failure(err: JournalError) -> EngineError {
    if matches!(err, JournalError::WriterClosed) {
        return EngineError::Disposed;
    }
    error!(error = %err, "journal write failed during command processing");
    EngineError::fatal(format!("journal write failed: {err}"))
}

/// Maps an `execute` failure, promoting [`CommandError::Fatal`].
fn execute_failure(cause: CommandError, restored: bool) -> EngineError {
    if cause.is_fatal() {
        EngineError::fatal(format!("command execute: {cause}"))
    } else {
        EngineError::CommandFailed { cause, restored }
    }
}
