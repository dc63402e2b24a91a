//! Durable, directory-backed [`JournalStore`].
//!
//! # Directory Layout
//!
//! ```text
//! <dir>/model.image                         base image
//! <dir>/snapshots/<name>.snapshot           named snapshots
//! <dir>/journal/segment-{start:020}.journal journal segments
//! ```
//!
//! # Image Format
//!
//! ```text
//! [4 bytes: magic "PIMG"][4 bytes LE: format version]
//! [32 bytes: SHA-256 of payload][N bytes: payload]
//! ```
//!
//! Images are written to a temporary file, synced and renamed into place,
//! so a crash never leaves a half-written base image behind.
//!
//! # On-Disk Entry Format (little-endian)
//!
//! ```text
//! [4 bytes: entry_length][8 bytes: id][8 bytes: timestamp_ns]
//! [N bytes: payload][4 bytes: CRC32]
//! ```
//!
//! - `entry_length`: total bytes after itself (id + timestamp + payload +
//!   CRC = 20 + N).
//! - CRC32 covers: id ‖ timestamp_ns ‖ payload (not `entry_length`).
//! - The payload is the serialized [`JournalItem`].
//!
//! Segments are pre-allocated, memory-mapped and rotated when full. A
//! segment is named after the first id it holds; a rollback marker that
//! opens a segment shares its id with the command before it, so in that
//! case the name is bumped past the previous segment's.

use super::error::JournalError;
use super::store::{JournalReadIter, JournalStore, JournalWriter, validate_snapshot_name};
use super::types::{JournalEntry, JournalItem, SnapshotInfo};
use crate::prevalence::serialization::Serializer;
use memmap2::{Mmap, MmapMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, trace, warn};

/// Default segment size in bytes (64 MB).
pub const DEFAULT_SEGMENT_SIZE: usize = 64 * 1024 * 1024;

/// Size of the fixed-size entry header in bytes.
///
/// Layout: `[4 bytes entry_length][8 bytes id][8 bytes timestamp_ns]`
pub const ENTRY_HEADER_SIZE: usize = 4 + 8 + 8;

/// Size of the CRC32 trailer appended to each entry in bytes.
pub const ENTRY_CRC_SIZE: usize = 4;

/// Magic bytes opening every image file.
pub const IMAGE_MAGIC: [u8; 4] = *b"PIMG";

/// Image format version written by this build.
pub const IMAGE_FORMAT_VERSION: u32 = 1;

const IMAGE_HEADER_SIZE: usize = 4 + 4 + 32;
const MODEL_FILE: &str = "model.image";
const SNAPSHOT_DIR: &str = "snapshots";
const SNAPSHOT_EXTENSION: &str = "snapshot";
const JOURNAL_DIR: &str = "journal";

/// A [`JournalStore`] keeping images and journal segments in a directory.
///
/// # Example
///
/// ```rust,no_run
/// use prevalence_rs::prevalence::journal::{FileStore, JournalStore};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store: FileStore<Vec<String>, String> = FileStore::open("/tmp/ledger")?;
/// if !store.exists() {
///     store.write_model(&Vec::new())?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct FileStore<M, C> {
    dir: PathBuf,
    segment_size: usize,
    serializer: Serializer,
    _phantom: PhantomData<fn() -> (M, C)>,
}

impl<M, C> FileStore<M, C> {
    /// Open or create a store in the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the directories cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, JournalError> {
        Self::open_with_segment_size(dir, DEFAULT_SEGMENT_SIZE)
    }

    /// Open or create a store with a custom journal segment size.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the directories cannot be created.
    pub fn open_with_segment_size<P: AsRef<Path>>(
        dir: P,
        segment_size: usize,
    ) -> Result<Self, JournalError> {
        let dir = dir.as_ref().to_path_buf();
        for sub in [dir.clone(), dir.join(SNAPSHOT_DIR), dir.join(JOURNAL_DIR)] {
            fs::create_dir_all(&sub).map_err(|e| JournalError::io_at(e, &sub))?;
        }
        debug!(dir = %dir.display(), segment_size, "file store opened");
        Ok(Self {
            dir,
            segment_size,
            serializer: Serializer::json(),
            _phantom: PhantomData,
        })
    }

    /// Use `serializer` for images and journal payloads.
    #[must_use]
    pub fn with_serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = serializer;
        self
    }

    /// The store's root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The directory holding journal segments.
    #[must_use]
    pub fn journal_dir(&self) -> PathBuf {
        self.dir.join(JOURNAL_DIR)
    }

    fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    fn snapshot_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(SNAPSHOT_DIR)
            .join(format!("{name}.{SNAPSHOT_EXTENSION}"))
    }

    /// Check the CRC of every entry in every journal segment.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::CorruptEntry`] for the first entry whose
    /// checksum does not match, or [`JournalError::InvalidEntryHeader`] for
    /// a truncated entry.
    pub fn verify_integrity(&self) -> Result<(), JournalError> {
        let journal_dir = self.journal_dir();
        for start in list_segments(&journal_dir)? {
            let path = segment_path(&journal_dir, start);
            let file = File::open(&path).map_err(|e| JournalError::io_at(e, &path))?;
            if file.metadata().map_err(|e| JournalError::io_at(e, &path))?.len() == 0 {
                continue;
            }

            // SAFETY: Read-only mapping of a file we just opened; the store
            // has a single writer which only appends past the scanned region.
            let mmap = unsafe { Mmap::map(&file).map_err(|e| JournalError::io_at(e, &path))? };

            let mut offset = 0usize;
            loop {
                match frame_at(&mmap, offset) {
                    Frame::End => break,
                    Frame::Truncated => {
                        return Err(JournalError::InvalidEntryHeader {
                            offset,
                            message: format!(
                                "truncated entry in segment {}",
                                path.display()
                            ),
                        });
                    }
                    Frame::Entry(frame) => {
                        frame.verify()?;
                        offset = frame.end;
                    }
                }
            }
        }
        Ok(())
    }
}

impl<M, C> FileStore<M, C>
where
    M: Serialize + DeserializeOwned,
{
    fn write_image(&self, path: &Path, model: &M) -> Result<u64, JournalError> {
        let payload = self
            .serializer
            .to_bytes(model)
            .map_err(|e| JournalError::SerializationError { message: e.message })?;

        let mut hasher = Sha256::new();
        hasher.update(&payload);
        let digest = hasher.finalize();

        let mut buf = Vec::with_capacity(IMAGE_HEADER_SIZE + payload.len());
        buf.extend_from_slice(&IMAGE_MAGIC);
        buf.extend_from_slice(&IMAGE_FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(digest.as_slice());
        buf.extend_from_slice(&payload);

        let tmp = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp).map_err(|e| JournalError::io_at(e, &tmp))?;
            file.write_all(&buf).map_err(|e| JournalError::io_at(e, &tmp))?;
            file.sync_all().map_err(|e| JournalError::io_at(e, &tmp))?;
        }
        fs::rename(&tmp, path).map_err(|e| JournalError::io_at(e, path))?;

        trace!(path = %path.display(), bytes = buf.len(), "image written");
        Ok(buf.len() as u64)
    }

    fn read_image(&self, path: &Path) -> Result<M, JournalError> {
        let data = fs::read(path).map_err(|e| JournalError::io_at(e, path))?;
        let source = path.display().to_string();
        let corrupt = |message: String| JournalError::CorruptImage {
            source: source.clone(),
            message,
        };

        if data.len() < IMAGE_HEADER_SIZE {
            return Err(corrupt(format!("{} bytes is shorter than the header", data.len())));
        }
        if data[..4] != IMAGE_MAGIC {
            return Err(corrupt("missing image magic".to_string()));
        }
        let version = read_u32_le(&data, 4).unwrap_or(0);
        if version != IMAGE_FORMAT_VERSION {
            return Err(corrupt(format!("unsupported image version {version}")));
        }

        let payload = &data[IMAGE_HEADER_SIZE..];
        let mut hasher = Sha256::new();
        hasher.update(payload);
        let digest = hasher.finalize();
        if digest.as_slice() != &data[8..IMAGE_HEADER_SIZE] {
            return Err(corrupt("SHA-256 checksum mismatch".to_string()));
        }

        self.serializer
            .from_bytes(payload)
            .map_err(|e| corrupt(e.message))
    }
}

impl<M, C> JournalStore<M, C> for FileStore<M, C>
where
    M: Serialize + DeserializeOwned + Send + Sync,
    C: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn read_model(&self) -> Result<M, JournalError> {
        let path = self.model_path();
        if !path.exists() {
            return Err(JournalError::ModelNotFound);
        }
        self.read_image(&path)
    }

    fn write_model(&self, model: &M) -> Result<(), JournalError> {
        self.write_image(&self.model_path(), model).map(|_| ())
    }

    fn read_snapshot(&self, name: &str) -> Result<M, JournalError> {
        validate_snapshot_name(name)?;
        let path = self.snapshot_path(name);
        if !path.exists() {
            return Err(JournalError::SnapshotNotFound {
                name: name.to_string(),
            });
        }
        self.read_image(&path)
    }

    fn write_snapshot(&self, name: &str, model: &M) -> Result<(), JournalError> {
        validate_snapshot_name(name)?;
        let bytes = self.write_image(&self.snapshot_path(name), model)?;
        debug!(name, bytes, "snapshot written");
        Ok(())
    }

    fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>, JournalError> {
        let dir = self.dir.join(SNAPSHOT_DIR);
        let entries = fs::read_dir(&dir).map_err(|e| JournalError::io_at(e, &dir))?;

        let mut infos = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| JournalError::io_at(e, &dir))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let metadata = entry.metadata().map_err(|e| JournalError::io_at(e, &path))?;
            let created_ms = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            infos.push(SnapshotInfo {
                name: name.to_string(),
                created_ms,
                size_bytes: metadata.len(),
            });
        }

        infos.sort_by(|a, b| a.created_ms.cmp(&b.created_ms).then_with(|| a.name.cmp(&b.name)));
        Ok(infos)
    }

    fn open_journal_writer(&self, after_id: u64) -> Result<Box<dyn JournalWriter<C>>, JournalError> {
        let journal_dir = self.journal_dir();
        let segments = list_segments(&journal_dir)?;

        let (segment, segment_start) = if let Some(latest) = segments.last() {
            let path = segment_path(&journal_dir, *latest);
            (SegmentWriter::open_existing(&path, self.segment_size)?, *latest)
        } else {
            let start = after_id.saturating_add(1);
            let path = segment_path(&journal_dir, start);
            (SegmentWriter::create(&path, self.segment_size)?, start)
        };

        debug!(
            after_id,
            segment_start,
            write_pos = segment.write_pos,
            "journal writer opened"
        );

        Ok(Box::new(FileJournalWriter {
            journal_dir,
            segment_size: self.segment_size,
            serializer: self.serializer,
            segment: Some(segment),
            segment_start,
            _phantom: PhantomData,
        }))
    }

    fn read_entries(&self) -> Result<JournalReadIter<C>, JournalError> {
        let journal_dir = self.journal_dir();
        let segments = list_segments(&journal_dir)?;
        Ok(Box::new(SegmentIterator::<C> {
            dir: journal_dir,
            segments,
            segment_idx: 0,
            offset: 0,
            mmap: None,
            serializer: self.serializer,
            _phantom: PhantomData,
        }))
    }

    fn clear_journal(&self) -> Result<(), JournalError> {
        let journal_dir = self.journal_dir();
        let segments = list_segments(&journal_dir)?;
        for start in &segments {
            let path = segment_path(&journal_dir, *start);
            fs::remove_file(&path).map_err(|e| JournalError::io_at(e, &path))?;
        }
        debug!(removed = segments.len(), "journal segments cleared");
        Ok(())
    }

    fn exists(&self) -> bool {
        self.model_path().exists()
    }

    fn verify_can_create(&self) -> Result<(), JournalError> {
        if self.exists() {
            return Err(JournalError::AlreadyExists {
                location: self.dir.display().to_string(),
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

impl<M, C> std::fmt::Debug for FileStore<M, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("dir", &self.dir)
            .field("segment_size", &self.segment_size)
            .field("format", &self.serializer.format())
            .finish()
    }
}

// ─── Writing ────────────────────────────────────────────────────────────────

/// Manages writing to a single memory-mapped segment file.
struct SegmentWriter {
    mmap: MmapMut,
    write_pos: usize,
    capacity: usize,
    path: PathBuf,
}

impl SegmentWriter {
    /// Create a new segment file, pre-allocated to `capacity` zero bytes.
    fn create(path: &Path, capacity: usize) -> Result<Self, JournalError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| JournalError::io_at(e, path))?;

        file.set_len(capacity as u64)
            .map_err(|e| JournalError::io_at(e, path))?;

        // SAFETY: The segment is owned by the store's single writer and is
        // not truncated while the mapping is alive.
        let mmap = unsafe { MmapMut::map_mut(&file).map_err(|e| JournalError::io_at(e, path))? };

        Ok(Self {
            mmap,
            write_pos: 0,
            capacity,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing segment for appending after its last entry.
    fn open_existing(path: &Path, min_capacity: usize) -> Result<Self, JournalError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| JournalError::io_at(e, path))?;

        let mut capacity = file
            .metadata()
            .map_err(|e| JournalError::io_at(e, path))?
            .len() as usize;

        // An empty file cannot be mapped.
        if capacity == 0 {
            file.set_len(min_capacity as u64)
                .map_err(|e| JournalError::io_at(e, path))?;
            capacity = min_capacity;
        }

        // SAFETY: See `create`.
        let mmap = unsafe { MmapMut::map_mut(&file).map_err(|e| JournalError::io_at(e, path))? };
        let write_pos = scan_write_position(&mmap);

        Ok(Self {
            mmap,
            write_pos,
            capacity,
            path: path.to_path_buf(),
        })
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.write_pos)
    }

    /// Copy an encoded entry to the current position and flush it to disk.
    fn write_entry(&mut self, entry_bytes: &[u8]) -> Result<(), JournalError> {
        let end = self
            .write_pos
            .checked_add(entry_bytes.len())
            .filter(|end| *end <= self.capacity)
            .ok_or(JournalError::EntryTooLarge {
                entry_bytes: entry_bytes.len(),
                segment_size: self.capacity,
            })?;

        self.mmap[self.write_pos..end].copy_from_slice(entry_bytes);
        self.mmap
            .flush_range(self.write_pos, entry_bytes.len())
            .map_err(|e| JournalError::io_at(e, &self.path))?;
        self.write_pos = end;
        Ok(())
    }

    fn flush(&self) -> Result<(), JournalError> {
        self.mmap
            .flush()
            .map_err(|e| JournalError::io_at(e, &self.path))
    }
}

struct FileJournalWriter<C> {
    journal_dir: PathBuf,
    segment_size: usize,
    serializer: Serializer,
    segment: Option<SegmentWriter>,
    segment_start: u64,
    _phantom: PhantomData<fn(C)>,
}

impl<C: Serialize> FileJournalWriter<C> {
    /// Serialize and frame a single entry in the on-disk format.
    fn encode_entry(&self, entry: &JournalEntry<C>) -> Result<Vec<u8>, JournalError> {
        let payload = self
            .serializer
            .to_bytes(&entry.item)
            .map_err(|e| JournalError::SerializationError { message: e.message })?;

        // entry_length = 8 (id) + 8 (ts) + payload + 4 (crc)
        let entry_length = u32::try_from(payload.len())
            .ok()
            .and_then(|len| len.checked_add(8 + 8 + ENTRY_CRC_SIZE as u32))
            .ok_or(JournalError::SerializationError {
                message: "entry size overflow".to_string(),
            })?;

        let mut buf = Vec::with_capacity(entry_length as usize + 4);
        buf.extend_from_slice(&entry_length.to_le_bytes());
        buf.extend_from_slice(&entry.id.to_le_bytes());
        buf.extend_from_slice(&entry.timestamp_ns.to_le_bytes());
        buf.extend_from_slice(&payload);

        let crc = crc32fast::hash(&buf[4..]);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Flush the full segment and continue in a fresh one.
    fn rotate(&mut self, first_id: u64) -> Result<(), JournalError> {
        let start = first_id.max(self.segment_start.saturating_add(1));
        if let Some(old) = self.segment.take() {
            old.flush()?;
        }
        let path = segment_path(&self.journal_dir, start);
        self.segment = Some(SegmentWriter::create(&path, self.segment_size)?);
        self.segment_start = start;
        debug!(segment_start = start, "journal segment rotated");
        Ok(())
    }
}

impl<C: Serialize> JournalWriter<C> for FileJournalWriter<C> {
    fn write(&mut self, entry: &JournalEntry<C>) -> Result<(), JournalError> {
        let entry_bytes = self.encode_entry(entry)?;

        let (remaining, used) = self
            .segment
            .as_ref()
            .map(|segment| (segment.remaining(), segment.write_pos))
            .ok_or(JournalError::WriterClosed)?;

        if remaining < entry_bytes.len() && used > 0 {
            self.rotate(entry.id)?;
        }

        let segment = self.segment.as_mut().ok_or(JournalError::WriterClosed)?;
        // Still too large for a fresh segment?
        if segment.remaining() < entry_bytes.len() {
            return Err(JournalError::EntryTooLarge {
                entry_bytes: entry_bytes.len(),
                segment_size: self.segment_size,
            });
        }
        segment.write_entry(&entry_bytes)
    }

    fn close(&mut self) -> Result<(), JournalError> {
        if let Some(segment) = self.segment.take() {
            segment.flush()?;
        }
        Ok(())
    }
}

impl<C> Drop for FileJournalWriter<C> {
    fn drop(&mut self) {
        if let Some(segment) = self.segment.take()
            && let Err(e) = segment.flush()
        {
            warn!(error = %e, "journal segment flush on drop failed");
        }
    }
}

// ─── Iteration ──────────────────────────────────────────────────────────────

/// Iterates journal entries across every segment file, oldest first.
struct SegmentIterator<C> {
    dir: PathBuf,
    segments: Vec<u64>,
    segment_idx: usize,
    offset: usize,
    mmap: Option<Mmap>,
    serializer: Serializer,
    _phantom: PhantomData<fn() -> C>,
}

impl<C: DeserializeOwned> SegmentIterator<C> {
    /// Map the next non-empty segment. Returns false if none is left.
    fn load_next_segment(&mut self) -> Result<bool, JournalError> {
        while let Some(start) = self.segments.get(self.segment_idx).copied() {
            self.segment_idx = self.segment_idx.saturating_add(1);
            self.offset = 0;

            let path = segment_path(&self.dir, start);
            let file = File::open(&path).map_err(|e| JournalError::io_at(e, &path))?;
            if file.metadata().map_err(|e| JournalError::io_at(e, &path))?.len() == 0 {
                continue;
            }

            // SAFETY: Read-only mapping; the single writer only appends past
            // the region this iterator decodes.
            let mmap = unsafe { Mmap::map(&file).map_err(|e| JournalError::io_at(e, &path))? };
            self.mmap = Some(mmap);
            return Ok(true);
        }
        self.mmap = None;
        Ok(false)
    }

    /// Decode the entry at `self.offset` in the current segment.
    fn decode_next(&mut self) -> Option<Result<JournalEntry<C>, JournalError>> {
        let mmap = self.mmap.as_ref()?;
        let frame = match frame_at(mmap, self.offset) {
            Frame::Entry(frame) => frame,
            Frame::End | Frame::Truncated => return None,
        };
        self.offset = frame.end;

        if let Err(e) = frame.verify() {
            return Some(Err(e));
        }

        let item: JournalItem<C> = match self.serializer.from_bytes(frame.payload) {
            Ok(item) => item,
            Err(e) => {
                return Some(Err(JournalError::DeserializationError {
                    id: frame.id,
                    message: e.message,
                }));
            }
        };

        Some(Ok(JournalEntry {
            id: frame.id,
            timestamp_ns: frame.timestamp_ns,
            item,
        }))
    }
}

impl<C: DeserializeOwned> Iterator for SegmentIterator<C> {
    type Item = Result<JournalEntry<C>, JournalError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(result) = self.decode_next() {
                return Some(result);
            }
            // Current segment exhausted (or not yet loaded).
            match self.load_next_segment() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

// ─── Framing helpers ────────────────────────────────────────────────────────

struct EntryFrame<'a> {
    id: u64,
    timestamp_ns: u64,
    payload: &'a [u8],
    checksummed: &'a [u8],
    stored_crc: u32,
    end: usize,
}

impl EntryFrame<'_> {
    fn verify(&self) -> Result<(), JournalError> {
        let actual_crc = crc32fast::hash(self.checksummed);
        if actual_crc != self.stored_crc {
            return Err(JournalError::CorruptEntry {
                id: self.id,
                expected_crc: self.stored_crc,
                actual_crc,
            });
        }
        Ok(())
    }
}

enum Frame<'a> {
    /// Zero-filled region or end of data.
    End,
    /// A length prefix pointing past the end of the segment.
    Truncated,
    Entry(EntryFrame<'a>),
}

fn frame_at(data: &[u8], offset: usize) -> Frame<'_> {
    let Some(entry_length) = read_u32_le(data, offset) else {
        return Frame::End;
    };
    let entry_length = entry_length as usize;
    if entry_length == 0 {
        return Frame::End;
    }
    if entry_length < ENTRY_HEADER_SIZE - 4 + ENTRY_CRC_SIZE {
        return Frame::Truncated;
    }

    let body_start = offset + 4;
    let Some(end) = body_start.checked_add(entry_length).filter(|end| *end <= data.len()) else {
        return Frame::Truncated;
    };
    let crc_start = end - ENTRY_CRC_SIZE;

    match (
        read_u64_le(data, body_start),
        read_u64_le(data, body_start + 8),
        read_u32_le(data, crc_start),
    ) {
        (Some(id), Some(timestamp_ns), Some(stored_crc)) => Frame::Entry(EntryFrame {
            id,
            timestamp_ns,
            payload: &data[offset + ENTRY_HEADER_SIZE..crc_start],
            checksummed: &data[body_start..crc_start],
            stored_crc,
            end,
        }),
        _ => Frame::Truncated,
    }
}

#[inline]
fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

#[inline]
fn read_u64_le(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset.checked_add(8)?)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

/// Byte offset just past the last framed entry.
fn scan_write_position(data: &[u8]) -> usize {
    let mut offset = 0usize;
    while let Frame::Entry(frame) = frame_at(data, offset) {
        offset = frame.end;
    }
    offset
}

/// Build the path for a segment file given its start id.
fn segment_path(dir: &Path, start_id: u64) -> PathBuf {
    dir.join(format!("segment-{start_id:020}.journal"))
}

/// List segment start ids in the directory, ascending.
fn list_segments(dir: &Path) -> Result<Vec<u64>, JournalError> {
    let entries = fs::read_dir(dir).map_err(|e| JournalError::io_at(e, dir))?;

    let mut starts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| JournalError::io_at(e, dir))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(rest) = name.strip_prefix("segment-")
            && let Some(start) = rest.strip_suffix(".journal")
            && let Ok(start) = start.parse::<u64>()
        {
            starts.push(start);
        }
    }
    starts.sort_unstable();
    Ok(starts)
}
