//! Contracts for the prevalent model and the operations run against it.
//!
//! A [`Model`] is the single root of application state. It changes only
//! through [`Command`] values, which are journaled, and is read through
//! [`Query`] values, which are not.
//!
//! Applications usually describe every mutation as one enum and implement
//! [`Command`] for it, the same way a sequencer describes its inputs:
//!
//! ```rust
//! use prevalence_rs::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Counter {
//!     revision: u64,
//!     value: i64,
//! }
//!
//! impl Model for Counter {
//!     fn revision(&self) -> u64 {
//!         self.revision
//!     }
//!     fn set_revision(&mut self, revision: u64) {
//!         self.revision = revision;
//!     }
//! }
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! enum CounterCommand {
//!     Add(i64),
//! }
//!
//! impl Command<Counter> for CounterCommand {
//!     type Output = i64;
//!
//!     fn execute(&self, model: &mut Counter) -> Result<i64, CommandError> {
//!         match self {
//!             CounterCommand::Add(n) => model.value += n,
//!         }
//!         Ok(model.value)
//!     }
//! }
//! ```

use super::error::CommandError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// The root aggregate of application state.
///
/// The revision is stored inside the model so that it travels with base
/// images and snapshots. Kernels increment it once per committed command
/// and once per replayed command.
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The number of commands applied since the model was created.
    fn revision(&self) -> u64;

    /// Overwrites the revision counter.
    fn set_revision(&mut self, revision: u64);
}

/// A journaled unit of mutation.
///
/// `prepare` runs with an upgrade lock and a shared borrow of the model.
/// It may reject the command or capture non-deterministic inputs (clock
/// readings, generated ids) into `self`; the prepared command is what the
/// pessimistic and immutable kernels journal, so replay sees the same
/// inputs.
///
/// `execute` runs with the write lock. If it fails after touching the
/// model the kernel restores the model before the error reaches the caller.
///
/// `redo` is used during replay and must reproduce the effect of `execute`
/// from the prepared state alone.
pub trait Command<M: Model>:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    /// What `execute` returns to the caller.
    type Output: Serialize + DeserializeOwned + Send + 'static;

    /// Validate against the current model and capture prepared inputs.
    fn prepare(&mut self, _model: &M) -> Result<(), CommandError> {
        Ok(())
    }

    /// Apply the command to the model.
    fn execute(&self, model: &mut M) -> Result<Self::Output, CommandError>;

    /// Re-apply a journaled command during recovery.
    fn redo(&self, model: &mut M) -> Result<(), CommandError> {
        self.execute(model).map(|_| ())
    }

    /// Produce a new model value instead of mutating in place.
    ///
    /// The default clones the model and runs [`execute`](Command::execute)
    /// on the clone. Persistent data structures override this to share
    /// structure with the previous value.
    fn execute_immutably(&self, model: &M) -> Result<(M, Self::Output), CommandError> {
        let mut next = model.clone();
        let output = self.execute(&mut next)?;
        Ok((next, output))
    }

    /// Return true if the output holds no aliasing into the model, which
    /// lets the engine skip the defensive clone.
    fn result_is_safe(&self) -> bool {
        false
    }
}

/// A read-only operation against the model.
pub trait Query<M: Model> {
    /// What the query returns.
    type Output: Serialize + DeserializeOwned;

    /// Run the query.
    fn execute(&self, model: &M) -> Result<Self::Output, CommandError>;

    /// See [`Command::result_is_safe`].
    fn result_is_safe(&self) -> bool {
        false
    }
}

/// Adapts a closure into a [`Query`].
pub struct FnQuery<F> {
    f: F,
    result_is_safe: bool,
}

impl<F> FnQuery<F> {
    /// Wraps `f`; its results are cloned when the engine is configured to.
    pub fn new(f: F) -> Self {
        Self {
            f,
            result_is_safe: false,
        }
    }

    /// Marks the closure's results as free of aliasing.
    #[must_use]
    pub fn safe(mut self) -> Self {
        self.result_is_safe = true;
        self
    }
}

impl<M, F, R> Query<M> for FnQuery<F>
where
    M: Model,
    F: Fn(&M) -> R,
    R: Serialize + DeserializeOwned,
{
    type Output = R;

    fn execute(&self, model: &M) -> Result<R, CommandError> {
        Ok((self.f)(model))
    }

    fn result_is_safe(&self) -> bool {
        self.result_is_safe
    }
}
