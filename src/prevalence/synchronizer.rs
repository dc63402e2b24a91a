//! Reader / upgrade / writer synchronization with bounded waits.
//!
//! The engine coordinates access to the model through a [`Synchronizer`].
//! Three levels exist:
//!
//! - **Read**: shared; any number of holders.
//! - **Upgrade**: held by at most one caller. It coexists with readers that
//!   were already inside but blocks new readers and upgraders. Only an
//!   upgrade holder may escalate to write with
//!   [`upgrade_to_write`](Synchronizer::upgrade_to_write).
//! - **Write**: fully exclusive.
//!
//! Every acquisition waits at most the configured timeout. A timed out
//! acquisition leaves the lock exactly as it found it.
//!
//! Callers normally go through [`LockGuard`], which remembers every level
//! an operation entered and releases all of them on drop.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A lock level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockLevel {
    /// Shared read access.
    Read,
    /// Intent to write.
    Upgrade,
    /// Exclusive write access.
    Write,
}

impl fmt::Display for LockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockLevel::Read => write!(f, "read"),
            LockLevel::Upgrade => write!(f, "upgrade"),
            LockLevel::Write => write!(f, "write"),
        }
    }
}

/// Errors returned by a [`Synchronizer`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The level was not granted in time.
    #[error("timed out after {timeout:?} waiting for the {level} lock")]
    Timeout {
        /// The level that was requested.
        level: LockLevel,
        /// How long the caller waited.
        timeout: Duration,
    },

    /// The internal state mutex was poisoned.
    #[error("synchronizer state mutex poisoned")]
    Poisoned,
}

/// Coordinates access to the model.
pub trait Synchronizer: Send + Sync + fmt::Debug {
    /// Acquire a shared read level.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Timeout`] if not granted in time.
    fn enter_read(&self) -> Result<(), SyncError>;

    /// Acquire the upgrade level.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Timeout`] if not granted in time.
    fn enter_upgrade(&self) -> Result<(), SyncError>;

    /// Acquire the write level directly, without holding upgrade.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Timeout`] if not granted in time.
    fn enter_write(&self) -> Result<(), SyncError>;

    /// Escalate an upgrade the caller already holds to write. Waits for
    /// readers that are still inside to leave.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Timeout`] if the readers do not drain in time;
    /// the caller still holds upgrade.
    fn upgrade_to_write(&self) -> Result<(), SyncError>;

    /// Release one level.
    fn exit(&self, level: LockLevel);
}

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    upgrader: bool,
    writer: bool,
    waiting_writers: usize,
}

/// A [`Synchronizer`] built on a mutex and condition variable.
///
/// Writers waiting for [`enter_write`](Synchronizer::enter_write) block new
/// readers and upgraders so that maintenance operations cannot starve.
#[derive(Debug)]
pub struct ReadWriteSynchronizer {
    state: Mutex<LockState>,
    changed: Condvar,
    timeout: Duration,
}

impl ReadWriteSynchronizer {
    /// Creates an unlocked synchronizer that waits at most `timeout` per
    /// acquisition.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            changed: Condvar::new(),
            timeout,
        }
    }

    /// The configured wait bound.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of readers currently inside.
    #[must_use]
    pub fn active_readers(&self) -> usize {
        self.lock_state().readers
    }

    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        // The state is a handful of counters that are never left half
        // updated, so a poisoned guard is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_until<'a, F>(
        &self,
        level: LockLevel,
        guard: MutexGuard<'a, LockState>,
        mut blocked: F,
    ) -> Result<MutexGuard<'a, LockState>, SyncError>
    where
        F: FnMut(&mut LockState) -> bool,
    {
        let (guard, result) = self
            .changed
            .wait_timeout_while(guard, self.timeout, |state| blocked(state))
            .map_err(|_| SyncError::Poisoned)?;
        if result.timed_out() {
            return Err(SyncError::Timeout {
                level,
                timeout: self.timeout,
            });
        }
        Ok(guard)
    }
}

impl Synchronizer for ReadWriteSynchronizer {
    fn enter_read(&self) -> Result<(), SyncError> {
        let state = self.lock_state();
        let mut state = self.wait_until(LockLevel::Read, state, |s| {
            s.writer || s.upgrader || s.waiting_writers > 0
        })?;
        state.readers += 1;
        Ok(())
    }

    fn enter_upgrade(&self) -> Result<(), SyncError> {
        let state = self.lock_state();
        let mut state = self.wait_until(LockLevel::Upgrade, state, |s| {
            s.writer || s.upgrader || s.waiting_writers > 0
        })?;
        state.upgrader = true;
        Ok(())
    }

    fn enter_write(&self) -> Result<(), SyncError> {
        let mut state = self.lock_state();
        state.waiting_writers += 1;
        match self.wait_until(LockLevel::Write, state, |s| {
            s.writer || s.upgrader || s.readers > 0
        }) {
            Ok(mut state) => {
                state.waiting_writers -= 1;
                state.writer = true;
                Ok(())
            }
            Err(err) => {
                let mut state = self.lock_state();
                state.waiting_writers = state.waiting_writers.saturating_sub(1);
                drop(state);
                // Readers may have been parked behind this writer.
                self.changed.notify_all();
                Err(err)
            }
        }
    }

    fn upgrade_to_write(&self) -> Result<(), SyncError> {
        let state = self.lock_state();
        let mut state =
            self.wait_until(LockLevel::Write, state, |s| s.writer || s.readers > 0)?;
        state.writer = true;
        Ok(())
    }

    fn exit(&self, level: LockLevel) {
        let mut state = self.lock_state();
        match level {
            LockLevel::Read => state.readers = state.readers.saturating_sub(1),
            LockLevel::Upgrade => state.upgrader = false,
            LockLevel::Write => state.writer = false,
        }
        drop(state);
        self.changed.notify_all();
    }
}

/// A pass-through [`Synchronizer`] for single-threaded use or models that
/// are never shared mutably.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSynchronizer;

impl Synchronizer for NullSynchronizer {
    #[inline]
    fn enter_read(&self) -> Result<(), SyncError> {
        Ok(())
    }

    #[inline]
    fn enter_upgrade(&self) -> Result<(), SyncError> {
        Ok(())
    }

    #[inline]
    fn enter_write(&self) -> Result<(), SyncError> {
        Ok(())
    }

    #[inline]
    fn upgrade_to_write(&self) -> Result<(), SyncError> {
        Ok(())
    }

    #[inline]
    fn exit(&self, _level: LockLevel) {}
}

/// Holds the levels one logical operation has entered.
///
/// Dropping the guard (or calling [`exit`](LockGuard::exit)) releases every
/// level it holds, most recent first. An upgrade that was escalated to
/// write is therefore released with a single exit.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    sync: &'a dyn Synchronizer,
    held: Vec<LockLevel>,
}

impl<'a> LockGuard<'a> {
    /// Enters the read level.
    ///
    /// # Errors
    ///
    /// Propagates the synchronizer's timeout.
    pub fn read(sync: &'a dyn Synchronizer) -> Result<Self, SyncError> {
        sync.enter_read()?;
        Ok(Self::holding(sync, LockLevel::Read))
    }

    /// Enters the upgrade level.
    ///
    /// # Errors
    ///
    /// Propagates the synchronizer's timeout.
    pub fn upgrade(sync: &'a dyn Synchronizer) -> Result<Self, SyncError> {
        sync.enter_upgrade()?;
        Ok(Self::holding(sync, LockLevel::Upgrade))
    }

    /// Enters the write level directly.
    ///
    /// # Errors
    ///
    /// Propagates the synchronizer's timeout.
    pub fn write(sync: &'a dyn Synchronizer) -> Result<Self, SyncError> {
        sync.enter_write()?;
        Ok(Self::holding(sync, LockLevel::Write))
    }

    fn holding(sync: &'a dyn Synchronizer, level: LockLevel) -> Self {
        let mut held = Vec::with_capacity(2);
        held.push(level);
        Self { sync, held }
    }

    /// Escalates a held upgrade to write. Does nothing if write is
    /// already held. A guard without upgrade falls back to a direct write
    /// acquisition, which cannot succeed while the guard itself holds read.
    ///
    /// # Errors
    ///
    /// Returns a timeout if in-progress readers do not leave in time. The
    /// guard keeps its upgrade level either way.
    pub fn escalate(&mut self) -> Result<(), SyncError> {
        if self.holds(LockLevel::Write) {
            return Ok(());
        }
        if self.holds(LockLevel::Upgrade) {
            self.sync.upgrade_to_write()?;
        } else {
            self.sync.enter_write()?;
        }
        self.held.push(LockLevel::Write);
        Ok(())
    }

    /// Returns true if `level` is held by this guard.
    #[must_use]
    pub fn holds(&self, level: LockLevel) -> bool {
        self.held.contains(&level)
    }

    /// Releases every level now.
    pub fn exit(self) {
        drop(self);
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        while let Some(level) = self.held.pop() {
            self.sync.exit(level);
        }
    }
}

impl fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("held", &self.held).finish()
    }
}
