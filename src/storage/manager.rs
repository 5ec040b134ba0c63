//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Enumerate live keys across all tables

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{BenchError, Result};
use crate::memtable::{MemTable, MemTableEntry};

use super::{SSTableBuilder, SSTableReader, TableSummary};

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock; lookups take the write side because
///   `SSTableReader::get` seeks its file handle
/// - `next_sstable_id`: Atomic counter (lock-free)
pub struct StorageManager {
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// Discovers `sstable_NNNNNN.sst` files and opens them newest first.
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() {
                if let Some(id) = Self::parse_sstable_id(&file_path) {
                    ids.push(id);
                }
            }
        }
        ids.sort_unstable_by(|a, b| b.cmp(a));

        let sstables = ids
            .iter()
            .map(|&id| SSTableReader::open(&Self::sstable_path_with_dir(path, id)))
            .collect::<Result<Vec<_>>>()?;

        let next_id = ids.first().map(|&id| id + 1).unwrap_or(1);
        tracing::debug!(dir = %path.display(), tables = sstables.len(), "storage opened");

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// Returns `Ok(None)` when the key is absent or its newest entry is a tombstone.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut sstables = self.sstables.write();

        for reader in sstables.iter_mut() {
            if !reader.might_contain(key) {
                continue;
            }
            match reader.get(key) {
                Ok(found) => return Ok(found),
                Err(BenchError::KeyNotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Resolve every key to its newest state: `true` if live, `false` if deleted
    ///
    /// Keys already present in `shadowed` (newer state from the memtable) are
    /// left untouched.
    pub fn key_states(&self, shadowed: &HashSet<Vec<u8>>) -> Result<BTreeMap<Vec<u8>, bool>> {
        let sstables = self.sstables.read();
        let mut states = BTreeMap::new();

        for reader in sstables.iter() {
            for (key, live) in reader.key_states() {
                if shadowed.contains(key) || states.contains_key(key) {
                    continue;
                }
                states.insert(key.to_vec(), live);
            }
        }

        Ok(states)
    }

    /// Flush a MemTable to a new SSTable and make it the newest table
    pub fn flush(&self, memtable: &MemTable) -> Result<TableSummary> {
        if memtable.is_empty() {
            return Err(BenchError::Storage("Cannot flush empty MemTable".to_string()));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let mut builder = SSTableBuilder::new(&path)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(&key, &v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(&key)?,
            }
        }
        let metadata = builder.finish()?;
        let reader = SSTableReader::open(&path)?;

        self.sstables.write().insert(0, reader);
        tracing::debug!(
            id,
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "memtable flushed to SSTable"
        );

        Ok(metadata)
    }

    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        name.strip_prefix("sstable_")?.parse().ok()
    }
}
