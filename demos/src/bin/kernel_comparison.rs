use demos::{Bank, BankCommand, deposit, setup_logger, transfer};
use prevalence_rs::prelude::*;
use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::info;

const ACCOUNTS: usize = 32;
const THREADS: usize = 4;
const COMMANDS_PER_THREAD: usize = 2_500;

fn opened_bank() -> Bank {
    let mut bank = Bank::default();
    for i in 0..ACCOUNTS {
        let account = format!("acct-{i}");
        bank.accounts.insert(account.clone(), 1_000);
        bank.opened_ms.insert(account, current_time_millis());
    }
    bank
}

fn run(kind: KernelKind) -> Result<(), Box<dyn Error>> {
    let config = EngineConfiguration::new().with_kernel(kind);
    let engine: Arc<Engine<Bank, BankCommand>> =
        Arc::new(Engine::create(opened_bank(), MemoryStore::new(), config)?);

    let started = Instant::now();
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut rejected = 0usize;
                for i in 0..COMMANDS_PER_THREAD {
                    let from = format!("acct-{}", (t + i) % ACCOUNTS);
                    let to = format!("acct-{}", (t + i + 1) % ACCOUNTS);
                    let command = if i % 10 == 0 {
                        deposit(&from, 5)
                    } else {
                        transfer(&from, &to, 7)
                    };
                    if let Err(EngineError::CommandRejected { .. }) = engine.execute(command) {
                        rejected += 1;
                    }
                    if i % 4 == 0 {
                        let _ = engine.query(|b: &Bank| b.total());
                    }
                }
                rejected
            })
        })
        .collect();

    let mut rejected = 0;
    for handle in handles {
        rejected += handle.join().map_err(|_| "worker thread panicked")?;
    }
    let elapsed = started.elapsed();

    let total = engine.query(|b: &Bank| b.total())?;
    let revision = engine.revision()?;
    let commands = THREADS * COMMANDS_PER_THREAD;
    info!(
        "{:>12}: {commands} commands in {:?} ({:.0} cmd/s), {rejected} rejected, revision {revision}, total {total}",
        kind.as_str(),
        elapsed,
        commands as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    setup_logger();
    info!("Running the same workload through every kernel");
    for kind in [
        KernelKind::Pessimistic,
        KernelKind::Optimistic,
        KernelKind::Immutable,
    ] {
        run(kind)?;
    }
    Ok(())
}
