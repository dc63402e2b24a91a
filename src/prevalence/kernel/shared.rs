//! State shared by every kernel strategy.

use crate::prevalence::command_journal::CommandJournal;
use crate::prevalence::error::EngineError;
use crate::prevalence::journal::JournalStore;
use crate::prevalence::model::{Command, Model, Query};
use crate::prevalence::synchronizer::{LockGuard, ReadWriteSynchronizer, Synchronizer};
use crate::prevalence::telemetry;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// The model, its locks and its journal.
///
/// Lock order is command gate, then synchronizer, then journal mutex, then
/// the model `RwLock`. The `RwLock` is only taken after the synchronizer has
/// granted the matching level, so it is never contended for long.
pub struct KernelCore<M: Model, C: Command<M>> {
    model: RwLock<M>,
    synchronizer: Arc<dyn Synchronizer>,
    command_gate: ReadWriteSynchronizer,
    journal: Mutex<CommandJournal<M, C>>,
    store: Arc<dyn JournalStore<M, C>>,
}

impl<M: Model, C: Command<M>> KernelCore<M, C> {
    /// Rebuilds the model from `store` and opens the journal for appending.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the base image or journal cannot be
    /// read, or [`EngineError::Fatal`] if a journaled command fails to redo.
    pub fn load(
        store: Arc<dyn JournalStore<M, C>>,
        synchronizer: Arc<dyn Synchronizer>,
        lock_timeout: Duration,
    ) -> Result<Self, EngineError> {
        let mut journal = CommandJournal::new(Arc::clone(&store));
        let model = replay(store.as_ref(), &mut journal)?;
        Ok(Self {
            model: RwLock::new(model),
            synchronizer,
            command_gate: ReadWriteSynchronizer::new(lock_timeout),
            journal: Mutex::new(journal),
            store,
        })
    }

    /// The synchronizer guarding the model.
    #[must_use]
    pub fn synchronizer(&self) -> &dyn Synchronizer {
        self.synchronizer.as_ref()
    }

    /// The execution-level lock. Held at write level by every optimistic
    /// command and by maintenance operations.
    #[must_use]
    pub fn command_gate(&self) -> &dyn Synchronizer {
        &self.command_gate
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn JournalStore<M, C>> {
        &self.store
    }

    /// Current model revision.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Fatal`] if the model lock is poisoned.
    pub fn revision(&self) -> Result<u64, EngineError> {
        Ok(self.read_model()?.revision())
    }

    pub(crate) fn read_model(&self) -> Result<RwLockReadGuard<'_, M>, EngineError> {
        self.model
            .read()
            .map_err(|_| EngineError::fatal("model lock poisoned"))
    }

    pub(crate) fn write_model(&self) -> Result<RwLockWriteGuard<'_, M>, EngineError> {
        self.model
            .write()
            .map_err(|_| EngineError::fatal("model lock poisoned"))
    }

    pub(crate) fn journal(&self) -> Result<MutexGuard<'_, CommandJournal<M, C>>, EngineError> {
        self.journal
            .lock()
            .map_err(|_| EngineError::fatal("command journal mutex poisoned"))
    }

    /// Runs `query` under the read level. Never journals.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Timeout`] if the read level is not granted,
    /// [`EngineError::QueryFailed`] if the query fails, or
    /// [`EngineError::Fatal`] for a fatal query error.
    pub fn execute_query<Q: Query<M>>(&self, query: &Q) -> Result<Q::Output, EngineError> {
        let _guard = LockGuard::read(self.synchronizer())?;
        let model = self.read_model()?;
        query.execute(&model).map_err(|cause| {
            if cause.is_fatal() {
                EngineError::fatal(format!("query: {cause}"))
            } else {
                EngineError::QueryFailed { cause }
            }
        })
    }

    /// Rebuilds the model from the store under the command gate and the
    /// write level.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Timeout`] if a lock is not granted. Any other
    /// failure leaves the engine unusable and is returned as
    /// [`EngineError::Fatal`].
    pub fn restore(&self) -> Result<(), EngineError> {
        let _gate = LockGuard::write(self.command_gate())?;
        let _guard = LockGuard::write(self.synchronizer())?;
        let mut journal = self.journal()?;
        self.restore_locked(&mut journal)
    }

    /// Rebuilds the model. The caller must hold the write level and the
    /// journal mutex.
    pub(crate) fn restore_locked(
        &self,
        journal: &mut CommandJournal<M, C>,
    ) -> Result<(), EngineError> {
        telemetry::record_restore();
        let rebuilt = replay(self.store.as_ref(), journal).map_err(|e| {
            error!(error = %e, "restore failed");
            if e.is_fatal() {
                e
            } else {
                EngineError::fatal(format!("restore: {e}"))
            }
        })?;
        *self.write_model()? = rebuilt;
        Ok(())
    }

    /// Swaps in a new model. The caller must hold the write level.
    pub(crate) fn replace_model(&self, model: M) -> Result<(), EngineError> {
        *self.write_model()? = model;
        Ok(())
    }
}

/// Closes the writer, loads the base image, redoes every surviving command
/// and reopens the writer after the highest id in the stored journal.
fn replay<M: Model, C: Command<M>>(
    store: &dyn JournalStore<M, C>,
    journal: &mut CommandJournal<M, C>,
) -> Result<M, EngineError> {
    let started = Instant::now();
    journal.close()?;

    let mut model = store.read_model()?;
    let (entries, max_id) = journal.command_entries()?;
    let replayed = entries.len();

    for entry in entries {
        let id = entry.id;
        let Some(command) = entry.into_command() else {
            continue;
        };
        command.redo(&mut model).map_err(|cause| {
            EngineError::fatal(format!("redo of journal entry {id} failed: {cause}"))
        })?;
        model.set_revision(model.revision().saturating_add(1));
        debug!(id, "journal entry replayed");
    }

    journal.open(max_id)?;

    info!(
        replayed,
        last_id = max_id,
        revision = model.revision(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "model restored"
    );
    Ok(model)
}
