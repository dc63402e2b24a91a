use demos::{Bank, BankCommand, deposit, open, setup_logger, transfer};
use prevalence_rs::prelude::*;
use std::env;
use std::error::Error;
use std::path::PathBuf;
use tracing::{info, warn};

type BankEngine = Engine<Bank, BankCommand>;

fn main() -> Result<(), Box<dyn Error>> {
    setup_logger();

    // Use the first argument as the store directory, or a fresh temp dir
    let dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join(format!("prevalence-ledger-{}", std::process::id())));
    info!("Store directory: {}", dir.display());

    let config = EngineConfiguration::new().with_kernel(KernelKind::Pessimistic);

    {
        let store = FileStore::open(&dir)?;
        let engine = BankEngine::load_or_create(store, config.clone(), Bank::default)?;
        info!("Engine ready at revision {}", engine.revision()?);

        for account in ["alice", "bob"] {
            match engine.execute(open(account)) {
                Ok(_) => info!("Opened account {account}"),
                Err(EngineError::CommandRejected { cause }) => info!("Skipped: {cause}"),
                Err(e) => return Err(e.into()),
            }
        }

        engine.execute(deposit("alice", 100))?;
        let remaining = engine.execute(transfer("alice", "bob", 30))?;
        info!("alice has {remaining} after paying bob");

        // Rejected in prepare: nothing reaches the journal
        if let Err(e) = engine.execute(transfer("bob", "alice", 1_000)) {
            warn!("Transfer refused: {e}");
        }

        engine.close()?;
    }

    // Reopen the directory: the model is rebuilt from the image and journal
    let store = FileStore::open(&dir)?;
    let engine = BankEngine::load(store, config)?;
    let bank = engine.query(|b: &Bank| b.clone())?;
    info!(
        "Recovered revision {}: alice={} bob={} total={}",
        bank.revision,
        bank.balance("alice"),
        bank.balance("bob"),
        bank.total()
    );
    for (account, at_ms) in &bank.opened_ms {
        info!("{account} opened at {at_ms} ms");
    }

    // Fold the journal into a new base image
    engine.write_base_image()?;
    info!("Base image written; journal cleared");

    Ok(())
}
