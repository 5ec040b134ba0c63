//! Engine Module
//!
//! The persistent key-value engine both store adapters run on.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Commit multi-record write batches atomically
//! - Provide read transactions that exclude writers
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::config::{Config, Durability};
use crate::error::{BenchError, Result};
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// A set of puts and deletes committed as one unit
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<Operation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
        }
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(Operation::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(Operation::Delete { key: key.into() });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (write/put/delete/flush): take `txn_lock` exclusively
///   - Only ONE write batch at a time
///   - Order: txn_lock → WAL → memtable → storage
///
/// - **Read transactions**: take `txn_lock` shared, so a transaction never
///   observes half of a batch
///
/// - **Plain reads** (`get`): no transaction lock; the MemTable and
///   StorageManager lock internally
pub struct Engine {
    config: Config,

    /// Directory for SSTables
    storage_dir: PathBuf,

    /// Write-ahead log (exclusive access needed)
    wal: Mutex<WalWriter>,

    memtable: MemTable,

    storage: StorageManager,

    /// Writers exclusive, read transactions shared
    txn_lock: RwLock<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Recover from WAL if it exists, flush what was recovered
    /// 4. Start a fresh WAL continuing the LSN sequence
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        let mut next_lsn = 1;
        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery"
                );
            }

            for entry in entries {
                Self::apply(&memtable, entry.operation);
            }
            next_lsn = recovery.last_lsn + 1;

            // Recovered data must be durable in an SSTable before the WAL is reset
            if !memtable.is_empty() {
                tracing::info!(entries = memtable.entry_count(), "flushing recovered entries");
                storage.flush(&memtable)?;
                memtable.clear();
            }
        }

        let wal = WalWriter::open_at(&wal_path, config.wal_sync_strategy, next_lsn)?;

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            txn_lock: RwLock::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.memtable.get(key) {
            Some(MemTableEntry::Value(value)) => Ok(Some(value)),
            Some(MemTableEntry::Tombstone) => Ok(None),
            None => self.storage.get(key),
        }
    }

    /// Every live key, sorted
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let mut live = Vec::new();
        let mut shadowed = HashSet::new();

        for (key, entry) in self.memtable.iter() {
            if matches!(entry, MemTableEntry::Value(_)) {
                live.push(key.clone());
            }
            shadowed.insert(key);
        }

        for (key, is_live) in self.storage.key_states(&shadowed)? {
            if is_live {
                live.push(key);
            }
        }

        live.sort_unstable();
        Ok(live)
    }

    /// Commit a batch atomically
    ///
    /// The whole batch becomes one WAL entry, so recovery either replays all
    /// of it or none of it. Returns the LSN of the commit (0 for an empty batch).
    pub fn write(&self, batch: WriteBatch, durability: Durability) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let _txn = self.txn_lock.write();
        let count = batch.len();
        let operation = Operation::Batch { ops: batch.ops };

        let lsn = {
            let mut wal = self.wal.lock().map_err(|e| {
                BenchError::LockPoisoned(format!("WAL lock poisoned: {}", e))
            })?;
            match durability {
                Durability::Strict => wal.append_durable(&operation)?,
                Durability::Relaxed => wal.append(&operation)?,
            }
        };

        Self::apply(&self.memtable, operation);
        tracing::trace!(lsn, ops = count, ?durability, "batch committed");

        if self.memtable.should_flush(self.config.memtable_size_limit) {
            self.flush_internal()?;
        }

        Ok(lsn)
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::with_capacity(1);
        batch.put(key, value);
        self.write(batch, Durability::Relaxed).map(|_| ())
    }

    /// Delete a key (writes a tombstone)
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::with_capacity(1);
        batch.delete(key);
        self.write(batch, Durability::Relaxed).map(|_| ())
    }

    /// Begin a read transaction; writers wait until it is dropped
    pub fn read_txn(&self) -> ReadTransaction<'_> {
        ReadTransaction {
            engine: self,
            _guard: self.txn_lock.read(),
        }
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _txn = self.txn_lock.write();
        self.flush_internal()
    }

    /// Internal flush implementation (called with the transaction lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();

        let mut wal = self.wal.lock().map_err(|e| {
            BenchError::LockPoisoned(format!("WAL lock poisoned: {}", e))
        })?;
        wal.truncate()
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(self) -> Result<()> {
        self.flush()?;

        let mut wal = self.wal.lock().map_err(|e| {
            BenchError::LockPoisoned(format!("WAL lock poisoned: {}", e))
        })?;
        wal.sync()
    }

    /// Delete everything an engine persisted under `data_dir`
    ///
    /// Succeeds when the directory was never created.
    pub fn destroy(data_dir: &Path) -> Result<()> {
        match fs::remove_dir_all(data_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn apply(memtable: &MemTable, operation: Operation) {
        match operation {
            Operation::Put { key, value } => {
                memtable.put(key, value);
            }
            Operation::Delete { key } => {
                memtable.delete(key);
            }
            Operation::Batch { ops } => {
                for op in ops {
                    Self::apply(memtable, op);
                }
            }
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// A consistent read view; no batch commits while it is alive
pub struct ReadTransaction<'a> {
    engine: &'a Engine,
    _guard: RwLockReadGuard<'a, ()>,
}

impl<'a> ReadTransaction<'a> {
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.engine.get(key)
    }

    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        self.engine.keys()
    }

    /// Live keys starting with `prefix`
    pub fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut keys = self.engine.keys()?;
        keys.retain(|k| k.starts_with(prefix));
        Ok(keys)
    }
}
