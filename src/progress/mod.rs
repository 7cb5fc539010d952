//! Durable record of completed books.
//!
//! The progress file is a JSON object mapping record ids (as strings) to
//! [`DownloadRecord`] values. Presence of an id means the book was acquired;
//! nothing else is consulted to decide whether to skip a record.
//!
//! Every [`ProgressStore::record_complete`] rewrites the whole file through a
//! temporary file in the same directory, fsyncs it and renames it over the
//! old one, so a reader sees either the previous or the new state. A
//! `<file>.lock` advisory lock keeps a second live process off the same file.
//!
//! # Example
//!
//! ```no_run
//! use audiobook_core::progress::{DownloadRecord, ProgressStore};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = ProgressStore::open("download_progress.json")?;
//! if !store.is_complete(7) {
//!     let record = DownloadRecord::completed_now("A - B", "https://youtu.be/x", "", "books/a.mp3");
//!     store.record_complete(7, record)?;
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod record;

pub use error::StoreError;
pub use record::{DownloadRecord, TIMESTAMP_FORMAT};

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use record::StoredEntry;

/// Default progress file name.
pub const DEFAULT_PROGRESS_FILE: &str = "download_progress.json";

/// Suffix of the advisory lock file next to the store.
const LOCK_SUFFIX: &str = ".lock";

/// Exclusive owner of the persisted completion map.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    entries: BTreeMap<u32, DownloadRecord>,
    // Held for the store's lifetime; closing it releases the lock.
    _lock: File,
}

/// Aggregate view of the store for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub total: usize,
    /// Completed count per category; legacy entries count under "".
    pub per_category: BTreeMap<String, usize>,
    /// Entries carrying only a title.
    pub legacy_entries: usize,
    /// Most recent completion, if any entry is timestamped.
    pub latest: Option<(u32, NaiveDateTime)>,
}

impl StoreSummary {
    /// Summarizes entries from an open store or a plain [`ProgressStore::load`].
    pub fn from_records<'a>(records: impl IntoIterator<Item = (u32, &'a DownloadRecord)>) -> Self {
        let mut summary = Self::default();
        for (id, record) in records {
            summary.total += 1;
            *summary
                .per_category
                .entry(record.category.clone())
                .or_insert(0) += 1;
            if record.is_legacy() {
                summary.legacy_entries += 1;
            }
            if let Some(at) = record.completed_at
                && summary.latest.is_none_or(|(_, latest)| at > latest)
            {
                summary.latest = Some((id, at));
            }
        }
        summary
    }
}

impl ProgressStore {
    /// Opens (or starts) the store at `path`, taking its lock and loading it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] when another process holds the store,
    /// [`StoreError::CorruptState`] when the file cannot be parsed, and
    /// [`StoreError::Io`] for filesystem failures.
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let lock_path = lock_path_for(&path);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StoreError::io(&lock_path, e))?;
        if lock.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked { path });
        }

        let entries = Self::load(&path)?;
        info!(entries = entries.len(), "progress store opened");
        Ok(Self {
            path,
            entries,
            _lock: lock,
        })
    }

    /// Reads a progress file without locking it.
    ///
    /// A missing file is an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptState`] when the file exists but is not a
    /// progress document, and [`StoreError::Io`] when it cannot be read.
    pub fn load(path: &Path) -> Result<BTreeMap<u32, DownloadRecord>, StoreError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no progress file yet");
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let stored: BTreeMap<u32, StoredEntry> =
            serde_json::from_str(&raw).map_err(|source| StoreError::CorruptState {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(stored
            .into_iter()
            .map(|(id, entry)| (id, DownloadRecord::from(entry)))
            .collect())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true when `id` was acquired in this or any earlier run.
    #[must_use]
    pub fn is_complete(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&DownloadRecord> {
        self.entries.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records `id` as complete; the file is durable before this returns.
    ///
    /// On failure the in-memory state is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file cannot be written.
    #[instrument(skip(self, record), fields(path = %self.path.display()))]
    pub fn record_complete(&mut self, id: u32, record: DownloadRecord) -> Result<(), StoreError> {
        let previous = self.entries.insert(id, record);
        if let Err(e) = self.persist() {
            match previous {
                Some(old) => {
                    self.entries.insert(id, old);
                }
                None => {
                    self.entries.remove(&id);
                }
            }
            warn!(error = %e, "failed to persist progress");
            return Err(e);
        }
        debug!(entries = self.entries.len(), "progress persisted");
        Ok(())
    }

    /// Iterates entries in id order.
    pub fn records(&self) -> impl Iterator<Item = (u32, &DownloadRecord)> {
        self.entries.iter().map(|(id, record)| (*id, record))
    }

    #[must_use]
    pub fn summary(&self) -> StoreSummary {
        StoreSummary::from_records(self.records())
    }

    fn persist(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        write_atomically(&self.path, json.as_bytes())
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

/// Temp file in the target directory, fsync, rename over the target.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    temp.write_all(bytes)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| StoreError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;

    sync_directory(dir);
    Ok(())
}

/// Makes the rename itself durable where the platform allows it.
#[cfg(unix)]
fn sync_directory(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|handle| handle.sync_all()) {
        debug!(dir = %dir.display(), error = %e, "directory fsync failed");
    }
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn record(title: &str) -> DownloadRecord {
        DownloadRecord::completed_now(title, "https://youtu.be/x", "Фантастика", "books/x.mp3")
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::open(dir.path().join("progress.json")).unwrap();
        assert!(store.is_empty());
        assert!(!store.is_complete(1));
    }

    #[test]
    fn test_record_complete_is_visible_immediately_and_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        let mut store = ProgressStore::open(&path).unwrap();

        assert!(!store.is_complete(5));
        store.record_complete(5, record("A - B")).unwrap();
        assert!(store.is_complete(5));

        let on_disk = ProgressStore::load(&path).unwrap();
        assert_eq!(on_disk.get(&5).unwrap().title, "A - B");
    }

    #[test]
    fn test_file_is_keyed_by_string_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        let mut store = ProgressStore::open(&path).unwrap();
        store.record_complete(12, record("A - B")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["12"]["title"], "A - B");
        assert_eq!(raw["12"]["url"], "https://youtu.be/x");
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, "{\"1\": ").unwrap();
        let err = ProgressStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::CorruptState { .. }));
    }

    #[test]
    fn test_legacy_entries_are_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(
            &path,
            r#"{"3": "Old Author - Old Title", "4": {"title": "New", "url": "u", "category": "c", "file_path": "f", "downloaded_at": "2024-01-02 03:04:05"}}"#,
        )
        .unwrap();

        let store = ProgressStore::open(&path).unwrap();
        assert!(store.is_complete(3));
        assert!(store.get(3).unwrap().is_legacy());
        assert!(!store.get(4).unwrap().is_legacy());

        let summary = store.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.legacy_entries, 1);
        assert_eq!(summary.latest.unwrap().0, 4);
        assert_eq!(summary.per_category.get("c"), Some(&1));

        let unlocked = ProgressStore::load(&path).unwrap();
        let from_load = StoreSummary::from_records(unlocked.iter().map(|(id, r)| (*id, r)));
        assert_eq!(from_load, summary);
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        let _first = ProgressStore::open(&path).unwrap();
        let err = ProgressStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Locked { .. }));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        drop(ProgressStore::open(&path).unwrap());
        assert!(ProgressStore::open(&path).is_ok());
    }

    #[test]
    fn test_failed_write_keeps_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        let mut store = ProgressStore::open(&path).unwrap();
        // A directory at the target path makes the rename fail.
        fs::create_dir(&path).unwrap();
        assert!(store.record_complete(9, record("X")).is_err());
        assert!(!store.is_complete(9));
    }

    #[test]
    fn test_lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/a/progress.json")),
            PathBuf::from("/a/progress.json.lock")
        );
    }
}
