//! Store Module
//!
//! The key-value store adapters the benchmark drives.
//!
//! ## Responsibilities
//! - One contract (`FileStore`) for opening, batched writes, batched reads,
//!   key listing, closing and destroying a store
//! - Two interchangeable implementations over the same engine:
//!   - `RawStore`: explicit write batches and read transactions on `Engine`
//!   - `WrappedStore`: goes through the typed `Database` wrapper
//!
//! ## Layout
//! ```text
//!   {data_dir}/filesDB/       ← RawStore
//!   {data_dir}/filesDB_idb/   ← WrappedStore
//!        └── object store "files", schema version 1
//!              key:   "file-" + name
//!              value: StoredRecord { name, size, data }
//! ```

mod database;
mod raw;
mod record;
mod wrapped;

use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::error::{BenchError, Result};

pub use database::{Database, Upgrade};
pub use raw::RawStore;
pub use record::{is_record_key, record_key, StoredRecord, FILE_KEY_PREFIX};
pub use wrapped::WrappedStore;

/// Name of the object store holding file records
pub const FILES_STORE: &str = "files";

/// Schema version both adapters create
pub const SCHEMA_VERSION: u32 = 1;

/// Which adapter a benchmark runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Implementation {
    /// Raw transactional API over the engine
    Raw,
    /// Typed wrapper library over the same engine
    Wrapped,
}

impl Implementation {
    pub const ALL: [Implementation; 2] = [Implementation::Raw, Implementation::Wrapped];

    /// Directory name of the store under `Config::data_dir`
    pub fn store_name(&self) -> &'static str {
        match self {
            Implementation::Raw => "filesDB",
            Implementation::Wrapped => "filesDB_idb",
        }
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implementation::Raw => f.write_str("raw"),
            Implementation::Wrapped => f.write_str("wrapped"),
        }
    }
}

impl FromStr for Implementation {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Implementation::Raw),
            "wrapped" | "idb" => Ok(Implementation::Wrapped),
            other => Err(BenchError::Config(format!("unknown implementation: {}", other))),
        }
    }
}

/// A persistent store of file records
///
/// Every operation other than `open`, `close` and `destroy` fails with
/// `StoreClosed` while the store is not open.
pub trait FileStore: Send {
    fn implementation(&self) -> Implementation;

    /// Open the store, creating the `files` object store if absent.
    /// No-op when already open.
    fn open(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Max records per write transaction
    fn batch_threshold(&self) -> usize;

    /// Default keys per read transaction
    fn read_batch_size(&self) -> usize;

    /// Write records, at most `batch_threshold` per transaction, each
    /// transaction committed with strict durability.
    ///
    /// Returns the number of transactions committed.
    fn batch_put(&mut self, records: Vec<(String, StoredRecord)>) -> Result<usize>;

    /// Every key in the `files` object store, in no particular order
    fn list_keys(&self) -> Result<Vec<String>>;

    /// Fetch `keys` in consecutive chunks of `batch_size`, one read
    /// transaction per chunk. Keys that are not record keys or have no
    /// decodable value are skipped.
    fn batch_get(&self, keys: &[String], batch_size: usize) -> Result<Vec<StoredRecord>>;

    /// Release the store. No-op when already closed.
    fn close(&mut self) -> Result<()>;

    /// Close if open, then delete everything the store persisted
    fn destroy(&mut self) -> Result<()>;
}

/// Build an (unopened) store for the chosen implementation
pub fn new_store(implementation: Implementation, config: &Config) -> Box<dyn FileStore> {
    match implementation {
        Implementation::Raw => Box::new(RawStore::new(config.clone())),
        Implementation::Wrapped => Box::new(WrappedStore::new(config.clone())),
    }
}

/// Shared guard for the read chunk size
pub(crate) fn check_batch_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(BenchError::Config("read batch size must be at least 1".to_string()));
    }
    Ok(())
}
