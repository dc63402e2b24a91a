/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 18/10/26
******************************************************************************/

//! Prelude module that re-exports commonly used types and traits.
//!
//! This module provides a convenient way to import the most commonly used
//! types and traits from the prevalence-rs crate. Instead of importing each
//! type individually, you can use:
//!
//! ```rust
//! use prevalence_rs::prelude::*;
//! ```
//!
//! This will import everything needed to define a model, its commands and
//! run them through an engine.

// Engine and configuration
pub use crate::prevalence::config::{EngineConfiguration, KernelKind, SynchronizerKind};
pub use crate::prevalence::engine::Engine;

// Model contracts
pub use crate::prevalence::model::{Command, FnQuery, Model, Query};

// Errors
pub use crate::prevalence::error::{CommandError, EngineError};
pub use crate::prevalence::journal::JournalError;

// Stores
pub use crate::prevalence::journal::{FileStore, JournalStore, MemoryStore, SnapshotInfo};

// Serialization
pub use crate::prevalence::serialization::{SerializationFormat, Serializer};

// Utility functions
pub use crate::utils::current_time_millis;
