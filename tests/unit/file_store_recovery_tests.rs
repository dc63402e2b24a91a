#[cfg(test)]
mod tests_file_store_recovery {
    use crate::common::*;
    use prevalence_rs::prelude::*;
    use prevalence_rs::prevalence::journal::ENTRY_HEADER_SIZE;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    type LedgerStore = FileStore<Ledger, LedgerCommand>;

    fn open_store(dir: &Path) -> LedgerStore {
        FileStore::open_with_segment_size(dir, 4096).expect("open file store")
    }

    fn first_segment(store: &LedgerStore) -> std::path::PathBuf {
        let mut segments: Vec<_> = fs::read_dir(store.journal_dir())
            .expect("read journal dir")
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        segments.sort();
        segments.into_iter().next().expect("at least one segment")
    }

    #[test]
    fn reload_after_drop_replays_journal() {
        for kind in ALL_KERNELS {
            let dir = tempdir().expect("tempdir");
            {
                let engine =
                    LedgerEngine::create(Ledger::default(), open_store(dir.path()), config(kind))
                        .expect("create engine");
                engine
                    .execute(LedgerCommand::deposit("alice", 100))
                    .expect("deposit");
                engine
                    .execute(LedgerCommand::transfer("alice", "bob", 40))
                    .expect("transfer");
            }

            let engine =
                LedgerEngine::load(open_store(dir.path()), config(kind)).expect("load engine");
            let ledger = current(&engine);
            assert_eq!(ledger.balance("alice"), 60, "{kind}");
            assert_eq!(ledger.balance("bob"), 40, "{kind}");
            assert_eq!(ledger.revision, 2, "{kind}");
        }
    }

    #[test]
    fn failed_commands_are_not_replayed() {
        for kind in ALL_KERNELS {
            let dir = tempdir().expect("tempdir");
            {
                let engine =
                    LedgerEngine::create(Ledger::default(), open_store(dir.path()), config(kind))
                        .expect("create engine");
                engine
                    .execute(LedgerCommand::deposit("alice", 10))
                    .expect("deposit");
                let failed = engine.execute(LedgerCommand::broken_transfer("alice", "bob", 5));
                assert!(matches!(failed, Err(EngineError::CommandFailed { .. })));
                let rejected = engine.execute(LedgerCommand::transfer("alice", "bob", 500));
                assert!(matches!(rejected, Err(EngineError::CommandRejected { .. })));
                engine
                    .execute(LedgerCommand::transfer("alice", "bob", 3))
                    .expect("transfer");

                let live = current(&engine);
                assert_eq!(live.balance("bob"), 3, "{kind}");
            }

            let engine =
                LedgerEngine::load(open_store(dir.path()), config(kind)).expect("load engine");
            let ledger = current(&engine);
            assert_eq!(ledger.balance("alice"), 7, "{kind}");
            assert_eq!(ledger.balance("bob"), 3, "{kind}");
            assert_eq!(ledger.total(), 10, "{kind}");
            assert_eq!(ledger.revision, 2, "{kind}");
        }
    }

    #[test]
    fn journal_spans_segments() {
        let dir = tempdir().expect("tempdir");
        {
            let engine = LedgerEngine::create(
                Ledger::default(),
                open_store(dir.path()),
                config(KernelKind::Optimistic),
            )
            .expect("create engine");
            for i in 0..200 {
                engine
                    .execute(LedgerCommand::deposit(&format!("account-{}", i % 7), 1))
                    .expect("deposit");
                if i % 25 == 0 {
                    let _ = engine.execute(LedgerCommand::broken_transfer("x", "y", 1));
                }
            }
        }

        let store = open_store(dir.path());
        let segments = fs::read_dir(store.journal_dir())
            .expect("read journal dir")
            .count();
        assert!(segments > 1, "expected rotation, found {segments} segment(s)");
        store.verify_integrity().expect("journal is intact");

        let engine =
            LedgerEngine::load(store, config(KernelKind::Optimistic)).expect("load engine");
        let ledger = current(&engine);
        assert_eq!(ledger.total(), 200);
        assert_eq!(ledger.balance("y"), 0);
        assert_eq!(ledger.revision, 200);
    }

    #[test]
    fn base_image_survives_restart() {
        let dir = tempdir().expect("tempdir");
        {
            let engine = LedgerEngine::create(
                Ledger::default(),
                open_store(dir.path()),
                config(KernelKind::Pessimistic),
            )
            .expect("create engine");
            engine
                .execute(LedgerCommand::deposit("alice", 5))
                .expect("deposit");
            engine.write_base_image().expect("write base image");
            engine
                .execute(LedgerCommand::deposit("alice", 6))
                .expect("deposit");
        }

        let engine = LedgerEngine::load(open_store(dir.path()), config(KernelKind::Pessimistic))
            .expect("load engine");
        let ledger = current(&engine);
        assert_eq!(ledger.balance("alice"), 11);
        assert_eq!(ledger.revision, 2);
    }

    #[test]
    fn corrupted_journal_entry_fails_load() {
        let dir = tempdir().expect("tempdir");
        {
            let engine = LedgerEngine::create(
                Ledger::default(),
                open_store(dir.path()),
                config(KernelKind::Pessimistic),
            )
            .expect("create engine");
            engine
                .execute(LedgerCommand::deposit("alice", 5))
                .expect("deposit");
        }

        let store = open_store(dir.path());
        let segment = first_segment(&store);
        let mut bytes = fs::read(&segment).expect("read segment");
        bytes[ENTRY_HEADER_SIZE] ^= 0xFF;
        fs::write(&segment, &bytes).expect("write segment");

        let err = LedgerEngine::load(store, config(KernelKind::Pessimistic))
            .expect_err("corruption must be detected");
        assert!(
            matches!(err, EngineError::Store(JournalError::CorruptEntry { id: 1, .. })),
            "{err}"
        );
    }

    #[test]
    fn tampered_image_fails_load() {
        let dir = tempdir().expect("tempdir");
        {
            let _engine = LedgerEngine::create(
                Ledger::default(),
                open_store(dir.path()),
                config(KernelKind::Pessimistic),
            )
            .expect("create engine");
        }

        let image = dir.path().join("model.image");
        let mut bytes = fs::read(&image).expect("read image");
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        fs::write(&image, &bytes).expect("write image");

        let err = LedgerEngine::load(open_store(dir.path()), config(KernelKind::Pessimistic))
            .expect_err("tampering must be detected");
        assert!(
            matches!(err, EngineError::Store(JournalError::CorruptImage { .. })),
            "{err}"
        );
    }

    #[test]
    fn load_or_create_on_fresh_directory() {
        let dir = tempdir().expect("tempdir");
        let engine = LedgerEngine::load_or_create(
            open_store(&dir.path().join("nested")),
            config(KernelKind::Immutable),
            Ledger::default,
        )
        .expect("create engine");
        engine
            .execute(LedgerCommand::deposit("carol", 1))
            .expect("deposit");
        drop(engine);

        let engine = LedgerEngine::load_or_create(
            open_store(&dir.path().join("nested")),
            config(KernelKind::Immutable),
            || panic!("directory already holds a model"),
        )
        .expect("load engine");
        assert_eq!(current(&engine).balance("carol"), 1);
    }
}
