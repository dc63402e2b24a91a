//! Engine configuration.
//!
//! [`EngineConfiguration`] is read once when an engine is built and never
//! changes afterwards. It is a plain value: build it in code with the
//! `with_*` methods or deserialize it from whatever configuration source the
//! application already uses.

use super::error::EngineError;
use super::serialization::SerializationFormat;
use super::synchronizer::{NullSynchronizer, ReadWriteSynchronizer, Synchronizer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default time to wait for a lock level before failing with a timeout.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// The execution strategy used by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    /// Execute, then journal. A failed execute triggers a full restore.
    #[default]
    Pessimistic,
    /// Journal, then execute. A failed command gets a rollback marker and
    /// a full restore.
    Optimistic,
    /// Commands produce a new model value which replaces the old one.
    Immutable,
}

impl KernelKind {
    /// Lower-case name, as used in logs and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            KernelKind::Pessimistic => "pessimistic",
            KernelKind::Optimistic => "optimistic",
            KernelKind::Immutable => "immutable",
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which [`Synchronizer`] guards the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynchronizerKind {
    /// [`ReadWriteSynchronizer`] with the configured timeout.
    #[default]
    ReadWrite,
    /// [`NullSynchronizer`]; only for single-threaded use.
    Null,
}

/// Settings fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfiguration {
    /// Execution strategy.
    pub kernel: KernelKind,
    /// Model synchronization.
    pub synchronizer: SynchronizerKind,
    /// How long any lock acquisition may wait.
    pub lock_timeout: Duration,
    /// Deep-clone results before returning them, unless the operation
    /// declares its result safe.
    pub clone_results: bool,
    /// Format used to deep-clone results.
    pub serialization: SerializationFormat,
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self {
            kernel: KernelKind::default(),
            synchronizer: SynchronizerKind::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            clone_results: true,
            serialization: SerializationFormat::default(),
        }
    }
}

impl EngineConfiguration {
    /// The default configuration: pessimistic kernel, read/write
    /// synchronizer, five second lock timeout, cloned results.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the kernel.
    #[must_use]
    pub fn with_kernel(mut self, kernel: KernelKind) -> Self {
        self.kernel = kernel;
        self
    }

    /// Selects the synchronizer.
    #[must_use]
    pub fn with_synchronizer(mut self, synchronizer: SynchronizerKind) -> Self {
        self.synchronizer = synchronizer;
        self
    }

    /// Sets the lock timeout.
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Enables or disables result cloning.
    #[must_use]
    pub fn with_clone_results(mut self, clone_results: bool) -> Self {
        self.clone_results = clone_results;
        self
    }

    /// Sets the result cloning format.
    #[must_use]
    pub fn with_serialization(mut self, format: SerializationFormat) -> Self {
        self.serialization = format;
        self
    }

    /// Checks the configuration for values an engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfiguration`] for a zero lock timeout.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.lock_timeout.is_zero() {
            return Err(EngineError::InvalidConfiguration {
                message: "lock_timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Builds the synchronizer this configuration asks for.
    #[must_use]
    pub fn create_synchronizer(&self) -> Arc<dyn Synchronizer> {
        match self.synchronizer {
            SynchronizerKind::ReadWrite => Arc::new(ReadWriteSynchronizer::new(self.lock_timeout)),
            SynchronizerKind::Null => Arc::new(NullSynchronizer),
        }
    }
}
