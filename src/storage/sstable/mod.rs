//! Sorted tables
//!
//! One file per memtable flush, written once and never modified. Keys are
//! strictly increasing; a table is either fully readable or rejected on open.
//!
//! ```text
//!   offset 0     "FBST" | version u16 | entry count u64
//!   offset 14    entries:  key_len u32 | val_len u32 | key | value
//!                          val_len == u32::MAX marks a deleted key
//!   index_off    index:    key_len u32 | entry offset u64 | key
//!   len - 16     index_off u64 | crc32(entries) u32 | 0u32
//! ```
//! All integers are little endian.

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

pub(crate) const MAGIC: &[u8; 4] = b"FBST";
pub(crate) const VERSION: u16 = 1;

/// magic + version + entry count
pub(crate) const HEADER_SIZE: u64 = 4 + 2 + 8;
/// index offset + data checksum + reserved
pub(crate) const FOOTER_SIZE: u64 = 8 + 4 + 4;

/// `val_len` of a deleted key
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

pub(crate) fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

pub(crate) fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

/// What `SSTableBuilder::finish` wrote
#[derive(Debug, Clone)]
pub struct TableSummary {
    pub path: PathBuf,
    /// Live entries and tombstones
    pub entry_count: u64,
    pub min_key: Vec<u8>,
    pub max_key: Vec<u8>,
    pub file_size: u64,
}

impl TableSummary {
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// False when `key` falls outside the table's key range
    pub fn might_contain(&self, key: &[u8]) -> bool {
        self.entry_count > 0 && self.min_key.as_slice() <= key && key <= self.max_key.as_slice()
    }
}
