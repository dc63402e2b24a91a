//! A small account ledger used by the integration tests.

#![allow(dead_code)]

use prevalence_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const ALL_KERNELS: [KernelKind; 3] = [
    KernelKind::Pessimistic,
    KernelKind::Optimistic,
    KernelKind::Immutable,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub revision: u64,
    pub balances: BTreeMap<String, i64>,
}

impl Ledger {
    pub fn balance(&self, account: &str) -> i64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total(&self) -> i64 {
        self.balances.values().sum()
    }
}

impl Model for Ledger {
    fn revision(&self) -> u64 {
        self.revision
    }

    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerCommand {
    Deposit { account: String, amount: i64 },
    Transfer { from: String, to: String, amount: i64 },
    /// Credits `to`, then fails before debiting `from`.
    BrokenTransfer { from: String, to: String, amount: i64 },
}

impl LedgerCommand {
    pub fn deposit(account: &str, amount: i64) -> Self {
        LedgerCommand::Deposit {
            account: account.to_string(),
            amount,
        }
    }

    pub fn transfer(from: &str, to: &str, amount: i64) -> Self {
        LedgerCommand::Transfer {
            from: from.to_string(),
            to: to.to_string(),
            amount,
        }
    }

    pub fn broken_transfer(from: &str, to: &str, amount: i64) -> Self {
        LedgerCommand::BrokenTransfer {
            from: from.to_string(),
            to: to.to_string(),
            amount,
        }
    }
}

impl Command<Ledger> for LedgerCommand {
    type Output = i64;

    fn prepare(&mut self, ledger: &Ledger) -> Result<(), CommandError> {
        if let LedgerCommand::Transfer { from, amount, .. } = &*self
            && ledger.balance(from) < *amount
        {
            return Err(CommandError::rejected(format!("{from}: insufficient funds")));
        }
        Ok(())
    }

    fn execute(&self, ledger: &mut Ledger) -> Result<i64, CommandError> {
        match self {
            LedgerCommand::Deposit { account, amount } => {
                let balance = ledger.balances.entry(account.clone()).or_default();
                *balance += amount;
                Ok(*balance)
            }
            LedgerCommand::Transfer { from, to, amount } => {
                *ledger.balances.entry(to.clone()).or_default() += amount;
                let balance = ledger.balances.entry(from.clone()).or_default();
                *balance -= amount;
                Ok(*balance)
            }
            LedgerCommand::BrokenTransfer { to, amount, .. } => {
                *ledger.balances.entry(to.clone()).or_default() += amount;
                Err(CommandError::failed("debit side unavailable"))
            }
        }
    }
}

pub type LedgerEngine = Engine<Ledger, LedgerCommand>;

pub fn config(kind: KernelKind) -> EngineConfiguration {
    EngineConfiguration::new()
        .with_kernel(kind)
        .with_lock_timeout(Duration::from_secs(2))
}

pub fn current(engine: &LedgerEngine) -> Ledger {
    engine
        .query(|l: &Ledger| l.clone())
        .expect("query ledger")
}
