//! Storage Module
//!
//! Persistent storage layer using an SSTable-like format. See
//! `sstable` for the on-disk layout.
//!
//! ## Responsibilities
//! - Persist flushed memtables to disk in sorted, checksummed files
//! - Point lookups newest → oldest
//! - Full scans for key enumeration

mod sstable;
mod manager;

pub use sstable::{SSTableBuilder, SSTableIterator, SSTableReader, TableSummary};
pub use manager::StorageManager;
