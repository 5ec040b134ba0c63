//! Configuration for filebench
//!
//! Centralized configuration with sensible defaults. One `Config` drives the
//! storage engine, the store adapters and the benchmark driver.

use std::path::PathBuf;

use crate::error::{BenchError, Result};

/// Default number of records committed per write transaction
pub const DEFAULT_BATCH_THRESHOLD: usize = 500;

/// Main configuration for a benchmark session
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory under which every store gets its own directory
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── filesDB/          (raw adapter)
    ///     │   ├── wal.log
    ///     │   └── sstables/
    ///     └── filesDB_idb/      (wrapped adapter, same layout)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy for writes that do not request strict durability
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Batching Configuration
    // -------------------------------------------------------------------------
    /// Max records committed within one write transaction
    pub batch_threshold: usize,

    /// Keys fetched per read transaction
    pub read_batch_size: usize,

    // -------------------------------------------------------------------------
    // Traversal Configuration
    // -------------------------------------------------------------------------
    /// Entries returned per directory listing page
    pub list_page_size: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Commit guarantee requested by a write transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// fsync the WAL before the commit returns
    Strict,

    /// Follow the configured `WalSyncStrategy`
    Relaxed,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./filebench_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            read_batch_size: DEFAULT_BATCH_THRESHOLD,
            list_page_size: 100,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the batching and traversal code cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.batch_threshold == 0 {
            return Err(BenchError::Config("batch_threshold must be at least 1".into()));
        }
        if self.read_batch_size == 0 {
            return Err(BenchError::Config("read_batch_size must be at least 1".into()));
        }
        if self.list_page_size == 0 {
            return Err(BenchError::Config("list_page_size must be at least 1".into()));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(BenchError::Config("WAL sync interval must be at least 1".into()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all stores)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the number of records per write transaction
    pub fn batch_threshold(mut self, count: usize) -> Self {
        self.config.batch_threshold = count;
        self
    }

    /// Set the number of keys per read transaction
    pub fn read_batch_size(mut self, count: usize) -> Self {
        self.config.read_batch_size = count;
        self
    }

    /// Set the directory listing page size
    pub fn list_page_size(mut self, count: usize) -> Self {
        self.config.list_page_size = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
