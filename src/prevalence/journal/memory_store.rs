//! In-process [`JournalStore`] implementation.
//!
//! [`MemoryStore`] keeps images and snapshots as serialized bytes, so every
//! read produces an independent model just as a disk read would, and keeps
//! journal entries in a shared vector. It is what tests and embedded,
//! non-durable deployments use.

use super::error::JournalError;
use super::store::{JournalReadIter, JournalStore, JournalWriter, validate_snapshot_name};
use super::types::{JournalEntry, SnapshotInfo};
use crate::prevalence::serialization::Serializer;
use crate::utils::current_time_millis;
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::trace;

struct StoredImage {
    info: SnapshotInfo,
    bytes: Vec<u8>,
}

/// A [`JournalStore`] held entirely in memory.
///
/// Cloning a `MemoryStore` is cheap and yields a handle onto the same
/// storage, which lets a test keep a handle for inspection after handing
/// another one to an engine.
pub struct MemoryStore<M, C> {
    serializer: Serializer,
    image: Arc<Mutex<Option<Vec<u8>>>>,
    snapshots: Arc<DashMap<String, StoredImage>>,
    entries: Arc<Mutex<Vec<JournalEntry<C>>>>,
    fail_writes: Arc<AtomicBool>,
    _model: PhantomData<fn() -> M>,
}

impl<M, C> MemoryStore<M, C> {
    /// Creates an empty store using JSON for images.
    #[must_use]
    pub fn new() -> Self {
        Self::with_serializer(Serializer::json())
    }

    /// Creates an empty store with the given image serializer.
    #[must_use]
    pub fn with_serializer(serializer: Serializer) -> Self {
        Self {
            serializer,
            image: Arc::new(Mutex::new(None)),
            snapshots: Arc::new(DashMap::new()),
            entries: Arc::new(Mutex::new(Vec::new())),
            fail_writes: Arc::new(AtomicBool::new(false)),
            _model: PhantomData,
        }
    }

    /// Makes every subsequent journal write fail with an I/O error until
    /// called again with `false`. Simulates a failed journal device.
    pub fn fail_journal_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns a copy of every stored journal entry.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::MutexPoisoned`] if a writer panicked.
    pub fn entries(&self) -> Result<Vec<JournalEntry<C>>, JournalError>
    where
        C: Clone,
    {
        let entries = self.entries.lock().map_err(|_| JournalError::MutexPoisoned)?;
        Ok(entries.clone())
    }

    /// Number of stored journal entries, markers included.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

impl<M, C> Default for MemoryStore<M, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, C> Clone for MemoryStore<M, C> {
    fn clone(&self) -> Self {
        Self {
            serializer: self.serializer,
            image: Arc::clone(&self.image),
            snapshots: Arc::clone(&self.snapshots),
            entries: Arc::clone(&self.entries),
            fail_writes: Arc::clone(&self.fail_writes),
            _model: PhantomData,
        }
    }
}

impl<M, C> MemoryStore<M, C>
where
    M: Serialize + DeserializeOwned,
{
    fn encode(&self, model: &M) -> Result<Vec<u8>, JournalError> {
        self.serializer
            .to_bytes(model)
            .map_err(|e| JournalError::SerializationError { message: e.message })
    }

    fn decode(&self, source: &str, bytes: &[u8]) -> Result<M, JournalError> {
        self.serializer
            .from_bytes(bytes)
            .map_err(|e| JournalError::CorruptImage {
                source: source.to_string(),
                message: e.message,
            })
    }
}

impl<M, C> JournalStore<M, C> for MemoryStore<M, C>
where
    M: Serialize + DeserializeOwned + Send + Sync,
    C: Clone + Send + Sync + 'static,
{
    fn read_model(&self) -> Result<M, JournalError> {
        let image = self.image.lock().map_err(|_| JournalError::MutexPoisoned)?;
        let bytes = image.as_ref().ok_or(JournalError::ModelNotFound)?;
        self.decode("memory base image", bytes)
    }

    fn write_model(&self, model: &M) -> Result<(), JournalError> {
        let bytes = self.encode(model)?;
        let mut image = self.image.lock().map_err(|_| JournalError::MutexPoisoned)?;
        trace!(bytes = bytes.len(), "memory store: base image written");
        *image = Some(bytes);
        Ok(())
    }

    fn read_snapshot(&self, name: &str) -> Result<M, JournalError> {
        validate_snapshot_name(name)?;
        let stored = self
            .snapshots
            .get(name)
            .ok_or_else(|| JournalError::SnapshotNotFound {
                name: name.to_string(),
            })?;
        self.decode(name, &stored.bytes)
    }

    fn write_snapshot(&self, name: &str, model: &M) -> Result<(), JournalError> {
        validate_snapshot_name(name)?;
        let bytes = self.encode(model)?;
        let info = SnapshotInfo {
            name: name.to_string(),
            created_ms: current_time_millis(),
            size_bytes: bytes.len() as u64,
        };
        self.snapshots
            .insert(name.to_string(), StoredImage { info, bytes });
        Ok(())
    }

    fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>, JournalError> {
        let mut infos: Vec<SnapshotInfo> = self
            .snapshots
            .iter()
            .map(|stored| stored.value().info.clone())
            .collect();
        infos.sort_by(|a, b| a.created_ms.cmp(&b.created_ms).then_with(|| a.name.cmp(&b.name)));
        Ok(infos)
    }

    fn open_journal_writer(&self, after_id: u64) -> Result<Box<dyn JournalWriter<C>>, JournalError> {
        trace!(after_id, "memory store: journal writer opened");
        Ok(Box::new(MemoryJournalWriter {
            entries: Arc::clone(&self.entries),
            fail_writes: Arc::clone(&self.fail_writes),
            closed: false,
        }))
    }

    fn read_entries(&self) -> Result<JournalReadIter<C>, JournalError> {
        let entries = self.entries.lock().map_err(|_| JournalError::MutexPoisoned)?;
        let snapshot: Vec<JournalEntry<C>> = entries.clone();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }

    fn clear_journal(&self) -> Result<(), JournalError> {
        let mut entries = self.entries.lock().map_err(|_| JournalError::MutexPoisoned)?;
        entries.clear();
        Ok(())
    }

    fn exists(&self) -> bool {
        self.image.lock().map(|i| i.is_some()).unwrap_or(false)
    }

    fn verify_can_create(&self) -> Result<(), JournalError> {
        if self.exists() {
            return Err(JournalError::AlreadyExists {
                location: "memory store".to_string(),
            });
        }
        Ok(())
    }

    fn verify_can_load(&self) -> Result<(), JournalError> {
        if !self.exists() {
            return Err(JournalError::ModelNotFound);
        }
        Ok(())
    }
}

struct MemoryJournalWriter<C> {
    entries: Arc<Mutex<Vec<JournalEntry<C>>>>,
    fail_writes: Arc<AtomicBool>,
    closed: bool,
}

impl<C: Clone + Send> JournalWriter<C> for MemoryJournalWriter<C> {
    fn write(&mut self, entry: &JournalEntry<C>) -> Result<(), JournalError> {
        if self.closed {
            return Err(JournalError::WriterClosed);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(JournalError::Io {
                message: "simulated journal write failure".to_string(),
                path: None,
            });
        }
        let mut entries = self.entries.lock().map_err(|_| JournalError::MutexPoisoned)?;
        entries.push(entry.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), JournalError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prevalence::journal::types::JournalItem;

    type Store = MemoryStore<Vec<u32>, String>;

    #[test]
    fn test_model_round_trip_yields_independent_copies() {
        let store = Store::new();
        assert!(!store.exists());
        assert!(matches!(store.read_model(), Err(JournalError::ModelNotFound)));

        store.write_model(&vec![1, 2, 3]).unwrap_or_else(|e| panic!("write: {e}"));
        assert!(store.exists());
        assert!(store.verify_can_load().is_ok());
        assert!(matches!(
            store.verify_can_create(),
            Err(JournalError::AlreadyExists { .. })
        ));

        let mut first = store.read_model().unwrap_or_default();
        first.push(4);
        let second = store.read_model().unwrap_or_default();
        assert_eq!(second, vec![1, 2, 3]);
    }

    #[test]
    fn test_snapshot_names_are_validated_on_read() {
        let store = Store::new();
        assert!(matches!(
            store.read_snapshot("../escape"),
            Err(JournalError::InvalidSnapshotName { .. })
        ));
        assert!(matches!(
            store.read_snapshot("missing"),
            Err(JournalError::SnapshotNotFound { .. })
        ));
    }

    #[test]
    fn test_writer_appends_and_rejects_after_close() {
        let store = Store::new();
        let mut writer = store
            .open_journal_writer(0)
            .unwrap_or_else(|e| panic!("open: {e}"));
        assert!(writer.write(&JournalEntry::command(1, 10, "a".to_string())).is_ok());
        assert!(writer.write(&JournalEntry::rollback_marker(1, 11)).is_ok());
        assert!(writer.close().is_ok());
        assert!(matches!(
            writer.write(&JournalEntry::command(2, 12, "b".to_string())),
            Err(JournalError::WriterClosed)
        ));

        let entries = store.entries().unwrap_or_default();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].item, JournalItem::RollbackMarker);
    }

    #[test]
    fn test_simulated_write_failure() {
        let store = Store::new();
        let mut writer = store
            .open_journal_writer(0)
            .unwrap_or_else(|e| panic!("open: {e}"));
        store.fail_journal_writes(true);
        assert!(matches!(
            writer.write(&JournalEntry::command(1, 1, "x".to_string())),
            Err(JournalError::Io { .. })
        ));
        store.fail_journal_writes(false);
        assert!(writer.write(&JournalEntry::command(1, 1, "x".to_string())).is_ok());
        assert_eq!(store.entry_count(), 1);
    }

    #[test]
    fn test_point_in_time_and_from_reads() {
        let store = Store::new();
        let mut writer = store
            .open_journal_writer(0)
            .unwrap_or_else(|e| panic!("open: {e}"));
        for id in 1..=5u64 {
            let entry = JournalEntry::command(id, id * 100, format!("cmd-{id}"));
            assert!(writer.write(&entry).is_ok());
        }

        let before: Vec<u64> = store
            .read_entries_before_or_at(300)
            .unwrap_or_else(|e| panic!("read: {e}"))
            .filter_map(Result::ok)
            .map(|e| e.id)
            .collect();
        assert_eq!(before, vec![1, 2, 3]);

        let from: Vec<u64> = store
            .read_entries_from(4)
            .unwrap_or_else(|e| panic!("read: {e}"))
            .filter_map(Result::ok)
            .map(|e| e.id)
            .collect();
        assert_eq!(from, vec![4, 5]);

        assert!(store.clear_journal().is_ok());
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn test_snapshots_are_listed_and_validated() {
        let store = Store::new();
        assert!(store.write_snapshot("nightly", &vec![7]).is_ok());
        assert!(matches!(
            store.write_snapshot("../escape", &vec![7]),
            Err(JournalError::InvalidSnapshotName { .. })
        ));
        let names: Vec<String> = store
            .list_snapshots()
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["nightly".to_string()]);
        assert_eq!(store.read_snapshot("nightly").unwrap_or_default(), vec![7]);
        assert!(matches!(
            store.read_snapshot("missing"),
            Err(JournalError::SnapshotNotFound { .. })
        ));
    }
}
