//! Stored record definitions
//!
//! A file's raw bytes plus the metadata the store keeps next to them.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prefix every file key carries
pub const FILE_KEY_PREFIX: &str = "file-";

/// Key a file is stored under
///
/// Derived from the file name alone, so same-named files in different
/// directories share a key and the later write wins.
pub fn record_key(name: &str) -> String {
    format!("{}{}", FILE_KEY_PREFIX, name)
}

/// Whether a key has the shape `record_key` produces
pub fn is_record_key(key: &str) -> bool {
    key.len() > FILE_KEY_PREFIX.len() && key.starts_with(FILE_KEY_PREFIX)
}

/// A file as persisted in the `files` object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Original file name
    pub name: String,

    /// Size in bytes, as reported when the file was read
    pub size: u64,

    /// Raw file contents
    pub data: Bytes,
}

impl StoredRecord {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            data,
        }
    }

    pub fn key(&self) -> String {
        record_key(&self.name)
    }

    /// Pair the record with its derived key, ready for `FileStore::batch_put`
    pub fn into_entry(self) -> (String, StoredRecord) {
        (self.key(), self)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
