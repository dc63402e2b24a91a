//! The engine façade.
//!
//! [`Engine`] owns the kernel chosen by its configuration and exposes
//! command execution, queries, base images, snapshots, revert and recovery.
//! It is either active or closed; once closed, every operation returns
//! [`EngineError::Disposed`].

use super::config::{EngineConfiguration, KernelKind};
use super::error::EngineError;
use super::journal::{JournalStore, SnapshotInfo};
use super::kernel::{Kernel, KernelCore, build_kernel};
use super::model::{Command, FnQuery, Model, Query};
use super::serialization::Serializer;
use super::synchronizer::LockGuard;
use super::telemetry::{self, CommandOutcome};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// An in-memory model kept durable by a command journal.
///
/// The engine is `Send + Sync`; share it between threads with an `Arc`.
///
/// # Example
///
/// ```rust
/// use prevalence_rs::prelude::*;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Numbers {
///     revision: u64,
///     items: Vec<i64>,
/// }
///
/// impl Model for Numbers {
///     fn revision(&self) -> u64 {
///         self.revision
///     }
///     fn set_revision(&mut self, revision: u64) {
///         self.revision = revision;
///     }
/// }
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Append(i64);
///
/// impl Command<Numbers> for Append {
///     type Output = ();
///
///     fn execute(&self, model: &mut Numbers) -> Result<(), CommandError> {
///         model.items.push(self.0);
///         Ok(())
///     }
/// }
///
/// # fn main() -> Result<(), EngineError> {
/// let engine = Engine::create(
///     Numbers::default(),
///     MemoryStore::new(),
///     EngineConfiguration::new(),
/// )?;
/// engine.execute(Append(42))?;
/// engine.execute(Append(58))?;
/// let sum = engine.query(|m: &Numbers| m.items.iter().sum::<i64>())?;
/// assert_eq!(sum, 100);
/// assert_eq!(engine.revision()?, 2);
/// # Ok(())
/// # }
/// ```
pub struct Engine<M: Model, C: Command<M>> {
    kernel: Box<dyn Kernel<M, C>>,
    config: EngineConfiguration,
    serializer: Serializer,
    closed: AtomicBool,
}

impl<M: Model, C: Command<M>> Engine<M, C> {
    /// Writes `model` as the base image of an empty store, then loads it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] wrapping
    /// [`JournalError::AlreadyExists`](super::journal::JournalError::AlreadyExists)
    /// if the store already holds a model, or any error of
    /// [`load`](Engine::load).
    pub fn create<S>(model: M, store: S, config: EngineConfiguration) -> Result<Self, EngineError>
    where
        S: JournalStore<M, C> + 'static,
    {
        Self::create_shared(model, Arc::new(store), config)
    }

    /// Loads the model held by `store`, replaying its journal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfiguration`] for a bad
    /// configuration, [`EngineError::Store`] if the store has no model or
    /// cannot be read, or [`EngineError::Fatal`] if a journaled command
    /// fails to redo.
    pub fn load<S>(store: S, config: EngineConfiguration) -> Result<Self, EngineError>
    where
        S: JournalStore<M, C> + 'static,
    {
        Self::load_shared(Arc::new(store), config)
    }

    /// Loads `store` if it holds a model, otherwise creates it from
    /// `factory()`.
    ///
    /// # Errors
    ///
    /// See [`create`](Engine::create) and [`load`](Engine::load).
    pub fn load_or_create<S, F>(
        store: S,
        config: EngineConfiguration,
        factory: F,
    ) -> Result<Self, EngineError>
    where
        S: JournalStore<M, C> + 'static,
        F: FnOnce() -> M,
    {
        let store: Arc<dyn JournalStore<M, C>> = Arc::new(store);
        if store.exists() {
            Self::load_shared(store, config)
        } else {
            Self::create_shared(factory(), store, config)
        }
    }

    /// [`create`](Engine::create) for a store that is shared with other
    /// owners.
    ///
    /// # Errors
    ///
    /// See [`create`](Engine::create).
    pub fn create_shared(
        model: M,
        store: Arc<dyn JournalStore<M, C>>,
        config: EngineConfiguration,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        store.verify_can_create()?;
        store.write_model(&model)?;
        info!(revision = model.revision(), "base image created");
        Self::load_shared(store, config)
    }

    /// [`load`](Engine::load) for a store that is shared with other owners.
    ///
    /// # Errors
    ///
    /// See [`load`](Engine::load).
    pub fn load_shared(
        store: Arc<dyn JournalStore<M, C>>,
        config: EngineConfiguration,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        store.verify_can_load()?;

        let core = KernelCore::load(store, config.create_synchronizer(), config.lock_timeout)?;
        let revision = core.revision()?;
        let kernel = build_kernel(config.kernel, core);
        info!(kernel = config.kernel.as_str(), revision, "engine loaded");

        Ok(Self {
            kernel,
            serializer: Serializer::new(config.serialization),
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Runs `command` through the kernel and returns its output.
    ///
    /// The output is deep-cloned when result cloning is on and the command
    /// does not declare its result safe.
    ///
    /// # Errors
    ///
    /// Returns the kernel's error (see [`Kernel::execute_command`]),
    /// [`EngineError::Serialization`] if the output cannot be cloned, or
    /// [`EngineError::Disposed`] once closed. A fatal error closes the
    /// engine. A [`EngineError::Serialization`] from here means the command
    /// was committed and journaled; only its output was lost, so retrying
    /// applies it twice.
    pub fn execute(&self, command: C) -> Result<C::Output, EngineError> {
        self.ensure_open()?;
        let clone = self.config.clone_results && !command.result_is_safe();
        let result = self
            .kernel
            .execute_command(command)
            .and_then(|output| self.clone_if(clone, output));
        telemetry::record_command(self.kind(), CommandOutcome::of(&result));
        self.observe(result)
    }

    /// Runs `query` under the read level.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::QueryFailed`], [`EngineError::Timeout`],
    /// [`EngineError::Serialization`] or [`EngineError::Disposed`].
    pub fn execute_query<Q: Query<M>>(&self, query: &Q) -> Result<Q::Output, EngineError> {
        self.ensure_open()?;
        let clone = self.config.clone_results && !query.result_is_safe();
        let result = self
            .kernel
            .core()
            .execute_query(query)
            .and_then(|output| self.clone_if(clone, output));
        self.observe(result)
    }

    /// Runs a closure as a query.
    ///
    /// # Errors
    ///
    /// See [`execute_query`](Engine::execute_query).
    pub fn query<F, R>(&self, f: F) -> Result<R, EngineError>
    where
        F: Fn(&M) -> R,
        R: Serialize + DeserializeOwned,
    {
        self.execute_query(&FnQuery::new(f))
    }

    /// Rebuilds the model from the base image and the journal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Timeout`] if the locks are not granted; any
    /// other failure is [`EngineError::Fatal`] and closes the engine.
    pub fn restore(&self) -> Result<(), EngineError> {
        self.ensure_open()?;
        let result = self.kernel.core().restore();
        self.observe(result)
    }

    /// Persists the current model as the new base image and clears the
    /// journal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the image cannot be written (the
    /// journal is left intact), [`EngineError::Timeout`], or
    /// [`EngineError::Fatal`] if the journal cannot be cleared after the
    /// image was written.
    pub fn write_base_image(&self) -> Result<(), EngineError> {
        self.ensure_open()?;
        let result = self.write_base_image_locked();
        self.observe(result)
    }

    fn write_base_image_locked(&self) -> Result<(), EngineError> {
        let core = self.kernel.core();
        let _gate = LockGuard::write(core.command_gate())?;
        let _guard = LockGuard::read(core.synchronizer())?;
        let mut journal = core.journal()?;
        let model = core.read_model()?;

        core.store().write_model(&model)?;
        journal.clear().map_err(|e| {
            EngineError::fatal(format!("journal not cleared after base image write: {e}"))
        })?;
        info!(revision = model.revision(), "base image written");
        Ok(())
    }

    /// Discards the journal and returns to the base image.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the image cannot be read,
    /// [`EngineError::Timeout`], or [`EngineError::Fatal`] if the journal
    /// cannot be cleared.
    pub fn revert_to_image(&self) -> Result<(), EngineError> {
        self.ensure_open()?;
        let result = self.revert(None);
        self.observe(result)
    }

    /// Replaces the model with the snapshot `name`, which also becomes the
    /// new base image, and discards the journal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the snapshot cannot be read or
    /// persisted, [`EngineError::Timeout`], or [`EngineError::Fatal`] if the
    /// journal cannot be cleared.
    pub fn revert_to_snapshot(&self, name: &str) -> Result<(), EngineError> {
        self.ensure_open()?;
        let result = self.revert(Some(name));
        self.observe(result)
    }

    fn revert(&self, snapshot: Option<&str>) -> Result<(), EngineError> {
        let core = self.kernel.core();
        let _gate = LockGuard::write(core.command_gate())?;
        let _guard = LockGuard::write(core.synchronizer())?;
        let mut journal = core.journal()?;

        let model = match snapshot {
            Some(name) => {
                let model = core.store().read_snapshot(name)?;
                core.store().write_model(&model)?;
                model
            }
            None => core.store().read_model()?,
        };

        journal
            .clear()
            .map_err(|e| EngineError::fatal(format!("journal not cleared on revert: {e}")))?;
        let revision = model.revision();
        core.replace_model(model)?;
        info!(snapshot = snapshot.unwrap_or("<base image>"), revision, "model reverted");
        Ok(())
    }

    /// Persists a named copy of the current model.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] for an invalid name or I/O failure,
    /// [`EngineError::Timeout`] or [`EngineError::Disposed`].
    pub fn create_snapshot(&self, name: &str) -> Result<(), EngineError> {
        self.ensure_open()?;
        let result = self.create_snapshot_locked(name);
        self.observe(result)
    }

    fn create_snapshot_locked(&self, name: &str) -> Result<(), EngineError> {
        let core = self.kernel.core();
        let _guard = LockGuard::read(core.synchronizer())?;
        let model = core.read_model()?;
        core.store().write_snapshot(name, &model)?;
        info!(name, revision = model.revision(), "snapshot created");
        Ok(())
    }

    /// Describes the stored snapshots, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] or [`EngineError::Disposed`].
    pub fn snapshots(&self) -> Result<Vec<SnapshotInfo>, EngineError> {
        self.ensure_open()?;
        Ok(self.kernel.core().store().list_snapshots()?)
    }

    /// Waits for running operations, closes the journal and marks the
    /// engine closed. Closing a closed engine does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Timeout`] if running operations do not finish
    /// in time (the engine stays open), or [`EngineError::Store`] if the
    /// journal's final flush fails (the engine is closed regardless).
    pub fn close(&self) -> Result<(), EngineError> {
        if self.is_closed() {
            return Ok(());
        }
        let core = self.kernel.core();
        let _gate = LockGuard::write(core.command_gate())?;
        let _guard = LockGuard::write(core.synchronizer())?;
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        core.journal()?.close()?;
        info!(kernel = self.kind().as_str(), "engine closed");
        Ok(())
    }

    /// Returns true once the engine has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Current model revision.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Disposed`] once closed.
    pub fn revision(&self) -> Result<u64, EngineError> {
        self.ensure_open()?;
        self.kernel.core().revision()
    }

    /// The kernel strategy in use.
    #[must_use]
    pub fn kind(&self) -> KernelKind {
        self.kernel.kind()
    }

    /// The configuration the engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfiguration {
        &self.config
    }

    #[inline]
    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.is_closed() {
            return Err(EngineError::Disposed);
        }
        Ok(())
    }

    fn clone_if<T>(&self, clone: bool, value: T) -> Result<T, EngineError>
    where
        T: Serialize + DeserializeOwned,
    {
        if !clone {
            return Ok(value);
        }
        Ok(self.serializer.deep_clone(&value)?)
    }

    /// Closes the engine if `result` carries a fatal error.
    fn observe<T>(&self, result: Result<T, EngineError>) -> Result<T, EngineError> {
        if let Err(err) = &result
            && err.is_fatal()
        {
            self.shut_down_after_fatal(err);
        }
        result
    }

    #[cold]
    fn shut_down_after_fatal(&self, err: &EngineError) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        error!(error = %err, "fatal error, closing engine");
        match self.kernel.core().journal() {
            Ok(mut journal) => {
                if let Err(e) = journal.close() {
                    warn!(error = %e, "journal close after fatal error failed");
                }
            }
            Err(e) => warn!(error = %e, "journal unavailable after fatal error"),
        }
    }
}

impl<M: Model, C: Command<M>> Drop for Engine<M, C> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "engine close on drop failed");
            self.closed.store(true, Ordering::SeqCst);
        }
    }
}

impl<M: Model, C: Command<M>> std::fmt::Debug for Engine<M, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("kernel", &self.kind())
            .field("closed", &self.is_closed())
            .field("config", &self.config)
            .finish()
    }
}
