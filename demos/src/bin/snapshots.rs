use demos::{Bank, BankCommand, deposit, open, setup_logger};
use prevalence_rs::prelude::*;
use std::env;
use std::error::Error;
use tracing::info;

fn main() -> Result<(), Box<dyn Error>> {
    setup_logger();

    let dir = env::temp_dir().join(format!("prevalence-snapshots-{}", std::process::id()));
    let store: FileStore<Bank, BankCommand> = FileStore::open(&dir)?;
    let engine = Engine::create(Bank::default(), store, EngineConfiguration::new())?;

    engine.execute(open("carol"))?;
    engine.execute(deposit("carol", 50))?;
    engine.create_snapshot("before-bonus")?;
    info!("Snapshot taken at revision {}", engine.revision()?);

    engine.execute(deposit("carol", 1_000))?;
    info!(
        "carol after bonus: {}",
        engine.query(|b: &Bank| b.balance("carol"))?
    );

    for snapshot in engine.snapshots()? {
        info!(
            "Snapshot {} ({} bytes, created at {} ms)",
            snapshot.name, snapshot.size_bytes, snapshot.created_ms
        );
    }

    engine.revert_to_snapshot("before-bonus")?;
    info!(
        "carol after revert: {} (revision {})",
        engine.query(|b: &Bank| b.balance("carol"))?,
        engine.revision()?
    );

    engine.close()?;
    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
