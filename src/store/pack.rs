use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info};

use super::compaction;
use super::recovery;
use super::state::StoreState;
use super::stream::{RecordReader, RecordWriter};
use super::Store;
use crate::backing::BackingFile;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::flock::FileLock;
use crate::index::IndexEntry;
use crate::record;

/// Embedded object store keeping every blob in one append-only backing
/// file. New records land at the end of the file; a delete flips the
/// record's tombstone byte; an overwrite tombstones the old record and
/// appends the new one. Space comes back only when compaction rewrites
/// the file without its tombstoned records.
///
/// One reader/writer lock governs the instance: reads and queries share
/// it, mutations and compaction hold it exclusively. Operations are
/// linearizable in lock-acquisition order.
pub struct PackStore {
    config: StoreConfig,
    _lock: FileLock,
    state: RwLock<StoreState>,
}

impl PackStore {
    /// Opens the store at `path` with default configuration (no
    /// compaction).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(StoreConfig::new(path))
    }

    /// Opens the store: takes the instance lock, then scans the backing
    /// file to rebuild the index and tombstone counters. The backing
    /// file (and its parent directory) are created if missing. A second
    /// open against the same backing file fails while this one lives.
    pub fn open_with_config(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let lock = FileLock::acquire(lock_path(&config.path))?;
        let state = recovery::recover_state(&config.path)?;
        info!(
            path = %config.path.display(),
            live = state.index.len(),
            deleted = state.deleted_count,
            "opened store"
        );
        Ok(Self {
            config,
            _lock: lock,
            state: RwLock::new(state),
        })
    }

    /// Number of tombstoned records currently in the backing file.
    pub fn deleted_count(&self) -> u32 {
        self.state.read().deleted_count
    }

    /// Total declared payload bytes of those tombstoned records.
    pub fn deleted_size(&self) -> u64 {
        self.state.read().deleted_size
    }

    /// Opens an incremental reader over the payload stored at `path`.
    /// The shared lock is held only while the record is resolved; the
    /// reader itself runs on a private handle.
    pub fn read_stream(&self, path: &str) -> Result<RecordReader> {
        let state = self.state.read();
        let entry = state
            .index
            .get(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        RecordReader::open(&self.config.path, entry)
    }

    /// Opens an incremental writer that reserves a record at the end of
    /// the backing file. The exclusive lock is retained by the writer
    /// until it is finished or dropped; closing backpatches the true
    /// payload size into the reserved header. Any existing record at
    /// `path` is tombstoned up front (or refused without `overwrite`).
    pub fn write_stream(&self, path: &str, overwrite: bool) -> Result<RecordWriter<'_>> {
        let mut state = self.state.write();
        if state.index.contains(path) {
            if !overwrite {
                return Err(Error::AlreadyExists(path.to_string()));
            }
            self.tombstone(&mut state, path)?;
        }
        // Compact before reserving: a rewrite later would move the
        // reservation out from under the writer.
        compaction::maybe_compact(&self.config, &mut state)?;
        RecordWriter::open(state, &self.config.path, path)
    }

    /// Flips the tombstone byte of the record at `path` and moves its
    /// accounting from the index to the deleted counters.
    fn tombstone(&self, state: &mut StoreState, path: &str) -> Result<()> {
        let entry = state
            .index
            .remove(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        let mut backing = BackingFile::open(&self.config.path)?;
        backing.write_at(
            record::tombstone_offset(entry.offset),
            &[record::TOMBSTONE_DELETED],
        )?;
        state.note_deleted(entry.size);
        Ok(())
    }

    /// Appends a complete record (header + payload) at end-of-file and
    /// indexes it.
    fn append_record(&self, state: &mut StoreState, path: &str, contents: &[u8]) -> Result<()> {
        if contents.len() > i32::MAX as usize {
            return Err(Error::Malformed(format!(
                "payload of {} bytes exceeds the record size limit",
                contents.len()
            )));
        }
        let size = contents.len() as u32;

        let mut buf = Vec::with_capacity(record::header_len(path) as usize + contents.len());
        record::encode_header(&mut buf, path, size)?;
        buf.extend_from_slice(contents);

        let mut backing = BackingFile::open(&self.config.path)?;
        let start = backing.append(&buf)?;
        state.index.insert(
            path.to_string(),
            IndexEntry {
                size,
                offset: start + record::header_len(path),
            },
        );
        Ok(())
    }
}

impl Store for PackStore {
    fn exists(&self, path: &str) -> bool {
        self.state.read().index.matches_prefix(path)
    }

    fn list(&self, path: &str) -> HashSet<String> {
        self.state.read().index.list(path)
    }

    fn find(&self, name: &str) -> Vec<String> {
        self.state.read().index.find(name)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let state = self.state.read();
        let entry = state
            .index
            .get(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        let mut backing = BackingFile::open_readonly(&self.config.path)?;
        backing.read_at(entry.offset, entry.size as usize)
    }

    fn write(&self, path: &str, contents: &[u8], overwrite: bool) -> Result<()> {
        let mut state = self.state.write();
        if state.index.contains(path) {
            if !overwrite {
                return Err(Error::AlreadyExists(path.to_string()));
            }
            self.tombstone(&mut state, path)?;
        }
        self.append_record(&mut state, path, contents)?;
        debug!(path, bytes = contents.len(), "wrote record");
        compaction::maybe_compact(&self.config, &mut state)
    }

    fn delete(&self, path: &str) -> Result<()> {
        let mut state = self.state.write();
        if !state.index.contains(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        self.tombstone(&mut state, path)?;
        debug!(path, "deleted record");
        compaction::maybe_compact(&self.config, &mut state)
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}
