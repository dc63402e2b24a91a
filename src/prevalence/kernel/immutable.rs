use super::{Kernel, KernelCore, execute_failure, journal_failure};
use crate::prevalence::config::KernelKind;
use crate::prevalence::error::EngineError;
use crate::prevalence::model::{Command, Model};
use crate::prevalence::synchronizer::LockGuard;
use tracing::trace;

/// Builds the next model value from a shared borrow, journals the command,
/// then swaps the new value in.
///
/// The live model is never mutated in place, so a failed command leaves it
/// untouched and no restore is needed. The write level is only held for
/// the journal write and the swap. Commands are serialized by the command
/// gate, so each next value is built from the previous one even when the
/// synchronizer excludes nothing.
pub struct ImmutableKernel<M: Model, C: Command<M>> {
    core: KernelCore<M, C>,
}

impl<M: Model, C: Command<M>> ImmutableKernel<M, C> {
    /// Wraps `core`.
    pub fn new(core: KernelCore<M, C>) -> Self {
        Self { core }
    }
}

impl<M: Model, C: Command<M>> Kernel<M, C> for ImmutableKernel<M, C> {
    fn kind(&self) -> KernelKind {
        KernelKind::Immutable
    }

    fn core(&self) -> &KernelCore<M, C> {
        &self.core
    }

    fn execute_command(&self, mut command: C) -> Result<C::Output, EngineError> {
        let core = &self.core;
        let _gate = LockGuard::write(core.command_gate())?;
        let mut guard = LockGuard::upgrade(core.synchronizer())?;

        let (mut next, output) = {
            let model = core.read_model()?;
            command.prepare(&model).map_err(EngineError::from_prepare)?;
            command
                .execute_immutably(&model)
                .map_err(|cause| execute_failure(cause, false))?
        };

        guard.escalate()?;
        let id = core.journal()?.append(&command).map_err(journal_failure)?;

        let mut model = core.write_model()?;
        let revision = model.revision().saturating_add(1);
        next.set_revision(revision);
        *model = next;
        trace!(id, revision, "model replaced");
        Ok(output)
    }
}
