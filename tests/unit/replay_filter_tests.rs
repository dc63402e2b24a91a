#[cfg(test)]
mod tests_replay_filter {
    use crate::common::*;
    use prevalence_rs::prelude::*;
    use prevalence_rs::{JournalEntry, filter_command_entries};
    use proptest::prelude::*;

    /// Builds a raw stream of `plan.len()` commands. A command whose plan
    /// entry is `Some(delay)` gets a rollback marker written `delay`
    /// commands later (or at the end of the stream).
    fn raw_stream(plan: &[Option<usize>]) -> Vec<JournalEntry<u64>> {
        let mut pending: Vec<(usize, u64)> = Vec::new();
        let mut raw = Vec::new();
        let mut ts = 0u64;
        for (index, delay) in plan.iter().enumerate() {
            let id = index as u64 + 1;
            ts += 1;
            raw.push(JournalEntry::command(id, ts, id * 10));
            if let Some(delay) = delay {
                pending.push((index + delay, id));
            }
            pending.retain(|&(due, marked)| {
                if due <= index {
                    ts += 1;
                    raw.push(JournalEntry::rollback_marker(marked, ts));
                    false
                } else {
                    true
                }
            });
        }
        for (_, marked) in pending {
            ts += 1;
            raw.push(JournalEntry::rollback_marker(marked, ts));
        }
        raw
    }

    #[derive(Debug, Clone)]
    enum Step {
        Deposit(i64),
        Transfer(i64),
        Broken(i64),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (1i64..50).prop_map(Step::Deposit),
            (1i64..80).prop_map(Step::Transfer),
            (1i64..20).prop_map(Step::Broken),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn filter_keeps_exactly_the_surviving_commands(
            plan in prop::collection::vec(prop::option::of(0usize..6), 0..60)
        ) {
            let raw = raw_stream(&plan);
            let kept = filter_command_entries(raw.into_iter().map(Ok))
                .unwrap_or_else(|e| panic!("filter: {e}"));

            let expected: Vec<u64> = plan
                .iter()
                .enumerate()
                .filter(|(_, delay)| delay.is_none())
                .map(|(index, _)| index as u64 + 1)
                .collect();
            let ids: Vec<u64> = kept.iter().map(|e| e.id).collect();

            prop_assert_eq!(ids, expected);
            prop_assert!(kept.iter().all(|e| !e.is_rollback_marker()));
            prop_assert!(kept.iter().all(|e| e.as_command() == Some(&(e.id * 10))));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn reload_matches_live_model(
            kind_index in 0usize..3,
            steps in prop::collection::vec(step(), 1..40)
        ) {
            let kind = ALL_KERNELS[kind_index];
            let store: MemoryStore<Ledger, LedgerCommand> = MemoryStore::new();
            let engine = LedgerEngine::create(Ledger::default(), store.clone(), config(kind))
                .unwrap_or_else(|e| panic!("create: {e}"));

            for step in &steps {
                let command = match step {
                    Step::Deposit(amount) => LedgerCommand::deposit("a", *amount),
                    Step::Transfer(amount) => LedgerCommand::transfer("a", "b", *amount),
                    Step::Broken(amount) => LedgerCommand::broken_transfer("a", "b", *amount),
                };
                let result = engine.execute(command);
                prop_assert!(
                    !matches!(result, Err(EngineError::Fatal { .. })),
                    "unexpected fatal error"
                );
            }

            let live = current(&engine);
            prop_assert!(live.balance("a") >= 0);
            engine.close().unwrap_or_else(|e| panic!("close: {e}"));

            let reloaded = LedgerEngine::load(store, config(kind))
                .unwrap_or_else(|e| panic!("load: {e}"));
            prop_assert_eq!(current(&reloaded), live);
        }
    }
}
