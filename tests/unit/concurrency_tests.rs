#[cfg(test)]
mod tests_concurrency {
    use crate::common::*;
    use prevalence_rs::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    const WRITERS: usize = 4;
    const READERS: usize = 4;
    const DEPOSITS_PER_WRITER: usize = 50;

    #[test]
    fn readers_never_observe_torn_transfers() {
        for kind in ALL_KERNELS {
            let engine = Arc::new(
                LedgerEngine::create(Ledger::default(), MemoryStore::new(), config(kind))
                    .expect("create engine"),
            );
            engine
                .execute(LedgerCommand::deposit("pool", 1_000))
                .expect("seed");

            let done = Arc::new(AtomicBool::new(false));

            let readers: Vec<_> = (0..READERS)
                .map(|_| {
                    let engine = Arc::clone(&engine);
                    let done = Arc::clone(&done);
                    thread::spawn(move || {
                        while !done.load(Ordering::Acquire) {
                            let total = engine.query(|l: &Ledger| l.total()).expect("query");
                            // Transfers move money without creating it.
                            assert_eq!(total, 1_000);
                        }
                    })
                })
                .collect();

            let writers: Vec<_> = (0..WRITERS)
                .map(|w| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        let account = format!("writer-{w}");
                        for _ in 0..DEPOSITS_PER_WRITER {
                            engine
                                .execute(LedgerCommand::transfer("pool", &account, 1))
                                .expect("transfer");
                            let _ = engine.execute(LedgerCommand::broken_transfer(
                                "pool", &account, 1,
                            ));
                        }
                    })
                })
                .collect();

            for writer in writers {
                writer.join().expect("writer thread");
            }
            done.store(true, Ordering::Release);
            for reader in readers {
                reader.join().expect("reader thread");
            }

            let ledger = current(&engine);
            assert_eq!(ledger.total(), 1_000, "{kind}");
            assert_eq!(
                ledger.balance("pool"),
                1_000 - (WRITERS * DEPOSITS_PER_WRITER) as i64,
                "{kind}"
            );
            assert_eq!(
                ledger.revision,
                1 + (WRITERS * DEPOSITS_PER_WRITER) as u64,
                "{kind}"
            );
        }
    }

    #[test]
    fn close_while_busy_disposes_remaining_commands() {
        let engine = Arc::new(
            LedgerEngine::create(
                Ledger::default(),
                MemoryStore::new(),
                config(KernelKind::Pessimistic),
            )
            .expect("create engine"),
        );

        let writers: Vec<_> = (0..WRITERS)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let mut committed = 0u64;
                    loop {
                        match engine.execute(LedgerCommand::deposit("alice", 1)) {
                            Ok(_) => committed += 1,
                            Err(EngineError::Disposed) => return committed,
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                })
            })
            .collect();

        thread::sleep(std::time::Duration::from_millis(50));
        engine.close().expect("close");

        let committed: u64 = writers
            .into_iter()
            .map(|w| w.join().expect("writer thread"))
            .sum();
        assert!(engine.is_closed());
        assert!(committed > 0);
    }
}
