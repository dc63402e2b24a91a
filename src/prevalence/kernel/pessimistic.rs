use super::{Kernel, KernelCore, execute_failure, journal_failure};
use crate::prevalence::config::KernelKind;
use crate::prevalence::error::EngineError;
use crate::prevalence::model::{Command, Model};
use crate::prevalence::synchronizer::LockGuard;
use tracing::{trace, warn};

/// Executes a command, then journals it.
///
/// `prepare` runs under the upgrade level, so queries already in progress
/// finish undisturbed. The level is escalated to write for `execute`. A
/// failed `execute` may have left the model half mutated, so the model is
/// rebuilt from the store before the error is returned.
pub struct PessimisticKernel<M: Model, C: Command<M>> {
    core: KernelCore<M, C>,
}

impl<M: Model, C: Command<M>> PessimisticKernel<M, C> {
    /// Wraps `core`.
    pub fn new(core: KernelCore<M, C>) -> Self {
        Self { core }
    }
}

impl<M: Model, C: Command<M>> Kernel<M, C> for PessimisticKernel<M, C> {
    fn kind(&self) -> KernelKind {
        KernelKind::Pessimistic
    }

    fn core(&self) -> &KernelCore<M, C> {
        &self.core
    }

    fn execute_command(&self, mut command: C) -> Result<C::Output, EngineError> {
        let core = &self.core;
        let mut guard = LockGuard::upgrade(core.synchronizer())?;
        {
            let model = core.read_model()?;
            command.prepare(&model).map_err(EngineError::from_prepare)?;
        }
        guard.escalate()?;

        let mut journal = core.journal()?;
        if !journal.is_open() {
            return Err(EngineError::Disposed);
        }
        let mut model = core.write_model()?;
        let cause = match command.execute(&mut model) {
            Ok(output) => match journal.append(&command) {
                Ok(id) => {
                    let revision = model.revision().saturating_add(1);
                    model.set_revision(revision);
                    trace!(id, revision, "command committed");
                    return Ok(output);
                }
                Err(err) => {
                    // The model holds an effect the journal does not.
                    drop(model);
                    let fatal = journal_failure(err);
                    core.restore_locked(&mut journal)?;
                    return Err(fatal);
                }
            },
            Err(cause) => cause,
        };

        drop(model);
        warn!(error = %cause, "command execute failed, restoring model");
        core.restore_locked(&mut journal)?;
        Err(execute_failure(cause, true))
    }
}
