//! Shared pieces of the demo binaries: logger setup and a bank ledger
//! model.

use prevalence_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::Level;

/// Installs a `fmt` subscriber. The level comes from `LOGLEVEL`
/// (`trace`, `debug`, `info`, `warn`, `error`), defaulting to `info`.
pub fn setup_logger() {
    let level = std::env::var("LOGLEVEL")
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bank {
    pub revision: u64,
    pub accounts: BTreeMap<String, i64>,
    /// Opening times captured during `prepare`.
    pub opened_ms: BTreeMap<String, u64>,
}

impl Bank {
    pub fn balance(&self, account: &str) -> i64 {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    pub fn total(&self) -> i64 {
        self.accounts.values().sum()
    }
}

impl Model for Bank {
    fn revision(&self) -> u64 {
        self.revision
    }

    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BankCommand {
    Open { account: String, at_ms: Option<u64> },
    Deposit { account: String, amount: i64 },
    Transfer { from: String, to: String, amount: i64 },
}

impl Command<Bank> for BankCommand {
    type Output = i64;

    fn prepare(&mut self, bank: &Bank) -> Result<(), CommandError> {
        match self {
            BankCommand::Open { account, at_ms } => {
                if bank.accounts.contains_key(account) {
                    return Err(CommandError::rejected(format!("{account} already open")));
                }
                // Captured once so replay sees the same timestamp.
                *at_ms = Some(current_time_millis());
            }
            BankCommand::Deposit { account, .. } => {
                if !bank.accounts.contains_key(account) {
                    return Err(CommandError::rejected(format!("{account} is not open")));
                }
            }
            BankCommand::Transfer { from, to, amount } => {
                if !bank.accounts.contains_key(to) {
                    return Err(CommandError::rejected(format!("{to} is not open")));
                }
                if bank.balance(from) < *amount {
                    return Err(CommandError::rejected(format!("{from}: insufficient funds")));
                }
            }
        }
        Ok(())
    }

    fn execute(&self, bank: &mut Bank) -> Result<i64, CommandError> {
        match self {
            BankCommand::Open { account, at_ms } => {
                let at_ms = at_ms.ok_or_else(|| CommandError::failed("open was not prepared"))?;
                bank.accounts.insert(account.clone(), 0);
                bank.opened_ms.insert(account.clone(), at_ms);
                Ok(0)
            }
            BankCommand::Deposit { account, amount } => {
                let balance = bank.accounts.entry(account.clone()).or_default();
                *balance += amount;
                Ok(*balance)
            }
            BankCommand::Transfer { from, to, amount } => {
                *bank.accounts.entry(to.clone()).or_default() += amount;
                let balance = bank.accounts.entry(from.clone()).or_default();
                *balance -= amount;
                Ok(*balance)
            }
        }
    }

    fn result_is_safe(&self) -> bool {
        true
    }
}

pub fn open(account: &str) -> BankCommand {
    BankCommand::Open {
        account: account.to_string(),
        at_ms: None,
    }
}

pub fn deposit(account: &str, amount: i64) -> BankCommand {
    BankCommand::Deposit {
        account: account.to_string(),
        amount,
    }
}

pub fn transfer(from: &str, to: &str, amount: i64) -> BankCommand {
    BankCommand::Transfer {
        from: from.to_string(),
        to: to.to_string(),
        amount,
    }
}
