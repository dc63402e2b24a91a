#[cfg(test)]
mod tests_snapshots {
    use crate::common::*;
    use prevalence_rs::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn snapshots_are_listed_oldest_first() {
        let dir = tempdir().expect("tempdir");
        let store: FileStore<Ledger, LedgerCommand> = FileStore::open(dir.path()).expect("store");
        let engine = LedgerEngine::create(Ledger::default(), store, config(KernelKind::Pessimistic))
            .expect("create engine");

        engine
            .execute(LedgerCommand::deposit("alice", 1))
            .expect("deposit");
        engine.create_snapshot("first").expect("first snapshot");
        std::thread::sleep(std::time::Duration::from_millis(20));
        engine
            .execute(LedgerCommand::deposit("alice", 1))
            .expect("deposit");
        engine.create_snapshot("second").expect("second snapshot");

        let snapshots = engine.snapshots().expect("list snapshots");
        let names: Vec<&str> = snapshots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(snapshots.iter().all(|s| s.size_bytes > 0));
        assert!(snapshots[0].created_ms <= snapshots[1].created_ms);
    }

    #[test]
    fn revert_to_snapshot_survives_restart() {
        let dir = tempdir().expect("tempdir");
        {
            let store: FileStore<Ledger, LedgerCommand> =
                FileStore::open(dir.path()).expect("store");
            let engine =
                LedgerEngine::create(Ledger::default(), store, config(KernelKind::Optimistic))
                    .expect("create engine");
            engine
                .execute(LedgerCommand::deposit("alice", 10))
                .expect("deposit");
            engine.create_snapshot("checkpoint").expect("snapshot");
            engine
                .execute(LedgerCommand::transfer("alice", "bob", 10))
                .expect("transfer");

            engine
                .revert_to_snapshot("checkpoint")
                .expect("revert to snapshot");
            let ledger = current(&engine);
            assert_eq!(ledger.balance("alice"), 10);
            assert_eq!(ledger.balance("bob"), 0);

            engine
                .execute(LedgerCommand::deposit("carol", 2))
                .expect("deposit");
        }

        let store: FileStore<Ledger, LedgerCommand> = FileStore::open(dir.path()).expect("store");
        let engine = LedgerEngine::load(store, config(KernelKind::Optimistic)).expect("load");
        let ledger = current(&engine);
        assert_eq!(ledger.balance("alice"), 10);
        assert_eq!(ledger.balance("bob"), 0);
        assert_eq!(ledger.balance("carol"), 2);
        assert_eq!(ledger.revision, 2);
    }

    #[test]
    fn revert_to_image_drops_uncheckpointed_work() {
        let engine = LedgerEngine::create(
            Ledger::default(),
            MemoryStore::new(),
            config(KernelKind::Immutable),
        )
        .expect("create engine");
        engine
            .execute(LedgerCommand::deposit("alice", 3))
            .expect("deposit");

        engine.revert_to_image().expect("revert");

        let ledger = current(&engine);
        assert_eq!(ledger, Ledger::default());
        engine
            .execute(LedgerCommand::deposit("alice", 4))
            .expect("deposit after revert");
        assert_eq!(current(&engine).balance("alice"), 4);
    }
}
