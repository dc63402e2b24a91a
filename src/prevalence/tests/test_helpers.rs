//! Model and commands shared by the engine and kernel tests.

use crate::prevalence::config::{EngineConfiguration, KernelKind};
use crate::prevalence::engine::Engine;
use crate::prevalence::error::CommandError;
use crate::prevalence::journal::MemoryStore;
use crate::prevalence::model::{Command, Model};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

pub const ALL_KERNELS: [KernelKind; 3] = [
    KernelKind::Pessimistic,
    KernelKind::Optimistic,
    KernelKind::Immutable,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Numbers {
    pub revision: u64,
    pub items: Vec<i64>,
}

impl Model for Numbers {
    fn revision(&self) -> u64 {
        self.revision
    }

    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NumbersCommand {
    Append(i64),
    /// Refused by `prepare`.
    Reject,
    /// Pushes the value, then fails, leaving the model half mutated.
    FailAfterPush(i64),
    /// Fails with a fatal error without touching the model.
    Fatal,
    /// Records the item count seen by `prepare` and appends it.
    AppendCount { seen: Option<usize> },
    /// Holds the write level for the given time, then appends.
    SlowAppend { value: i64, millis: u64 },
}

impl Command<Numbers> for NumbersCommand {
    type Output = usize;

    fn prepare(&mut self, model: &Numbers) -> Result<(), CommandError> {
        match self {
            NumbersCommand::Reject => Err(CommandError::rejected("not allowed")),
            NumbersCommand::AppendCount { seen } => {
                *seen = Some(model.items.len());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn execute(&self, model: &mut Numbers) -> Result<usize, CommandError> {
        match self {
            NumbersCommand::Append(value) => model.items.push(*value),
            NumbersCommand::Reject => return Err(CommandError::rejected("not allowed")),
            NumbersCommand::FailAfterPush(value) => {
                model.items.push(*value);
                return Err(CommandError::failed("failed after push"));
            }
            NumbersCommand::Fatal => return Err(CommandError::fatal("unrecoverable")),
            NumbersCommand::AppendCount { seen } => {
                let count = seen.ok_or_else(|| CommandError::failed("not prepared"))?;
                model.items.push(count as i64);
            }
            NumbersCommand::SlowAppend { value, millis } => {
                thread::sleep(Duration::from_millis(*millis));
                model.items.push(*value);
            }
        }
        Ok(model.items.len())
    }
}

pub type TestStore = MemoryStore<Numbers, NumbersCommand>;
pub type TestEngine = Engine<Numbers, NumbersCommand>;

pub fn config(kind: KernelKind) -> EngineConfiguration {
    EngineConfiguration::new()
        .with_kernel(kind)
        .with_lock_timeout(Duration::from_millis(200))
}

/// Creates an engine over a fresh memory store and returns a second handle
/// onto that store for inspection.
pub fn new_engine(kind: KernelKind) -> (TestStore, TestEngine) {
    let store = TestStore::new();
    let engine = TestEngine::create(Numbers::default(), store.clone(), config(kind))
        .unwrap_or_else(|e| panic!("create {kind} engine: {e}"));
    (store, engine)
}

pub fn items(engine: &TestEngine) -> Vec<i64> {
    engine
        .query(|m: &Numbers| m.items.clone())
        .unwrap_or_else(|e| panic!("query: {e}"))
}

pub fn sum(engine: &TestEngine) -> i64 {
    engine
        .query(|m: &Numbers| m.items.iter().sum::<i64>())
        .unwrap_or_else(|e| panic!("query: {e}"))
}

pub fn reload(store: &TestStore, kind: KernelKind) -> TestEngine {
    TestEngine::load(store.clone(), config(kind)).unwrap_or_else(|e| panic!("load: {e}"))
}
