use super::{Kernel, KernelCore, execute_failure, journal_failure};
use crate::prevalence::config::KernelKind;
use crate::prevalence::error::EngineError;
use crate::prevalence::model::{Command, Model};
use crate::prevalence::synchronizer::LockGuard;
use crate::prevalence::telemetry;
use tracing::{trace, warn};

/// Journals a command first, then executes it.
///
/// The journal write happens before any model lock is taken, so readers
/// are not held up by journal I/O. Commands are serialized by the command
/// gate. If the command then fails to prepare, times out or fails to
/// execute, a rollback marker invalidates the journaled entry; an execute
/// failure additionally rebuilds the model.
///
/// The command is journaled before `prepare` runs, so whatever `prepare`
/// captures into the command is not in the journaled copy. Commands run
/// through this kernel should keep `prepare` free of side inputs.
pub struct OptimisticKernel<M: Model, C: Command<M>> {
    core: KernelCore<M, C>,
}

impl<M: Model, C: Command<M>> OptimisticKernel<M, C> {
    /// Wraps `core`.
    pub fn new(core: KernelCore<M, C>) -> Self {
        Self { core }
    }

    /// Invalidates the journal entry `id`.
    fn roll_back(&self, id: u64) -> Result<(), EngineError> {
        let marked = self
            .core
            .journal()?
            .write_rollback_marker()
            .map_err(journal_failure)?;
        telemetry::record_rollback_marker(KernelKind::Optimistic);
        if marked != id {
            return Err(EngineError::fatal(format!(
                "rollback marker for entry {marked} written while rolling back {id}"
            )));
        }
        Ok(())
    }
}

impl<M: Model, C: Command<M>> Kernel<M, C> for OptimisticKernel<M, C> {
    fn kind(&self) -> KernelKind {
        KernelKind::Optimistic
    }

    fn core(&self) -> &KernelCore<M, C> {
        &self.core
    }

    fn execute_command(&self, mut command: C) -> Result<C::Output, EngineError> {
        let core = &self.core;
        let _gate = LockGuard::write(core.command_gate())?;

        let id = core.journal()?.append(&command).map_err(journal_failure)?;

        let mut guard = match LockGuard::upgrade(core.synchronizer()) {
            Ok(guard) => guard,
            Err(err) => {
                warn!(id, error = %err, "lock timeout after journaling, rolling back");
                self.roll_back(id)?;
                return Err(err.into());
            }
        };

        let prepared = {
            let model = core.read_model()?;
            command.prepare(&model)
        };
        if let Err(cause) = prepared {
            drop(guard);
            warn!(id, error = %cause, "prepare failed after journaling, rolling back");
            self.roll_back(id)?;
            return Err(EngineError::from_prepare(cause));
        }

        if let Err(err) = guard.escalate() {
            drop(guard);
            warn!(id, error = %err, "lock timeout after journaling, rolling back");
            self.roll_back(id)?;
            return Err(err.into());
        }

        let mut journal = core.journal()?;
        let mut model = core.write_model()?;
        match command.execute(&mut model) {
            Ok(output) => {
                let revision = model.revision().saturating_add(1);
                model.set_revision(revision);
                trace!(id, revision, "command committed");
                Ok(output)
            }
            Err(cause) => {
                drop(model);
                warn!(id, error = %cause, "command execute failed, rolling back and restoring");
                journal.write_rollback_marker().map_err(journal_failure)?;
                telemetry::record_rollback_marker(KernelKind::Optimistic);
                core.restore_locked(&mut journal)?;
                Err(execute_failure(cause, true))
            }
        }
    }
}
