//! SSTable Reader
//!
//! Opens SSTable files, verifies them, and serves point lookups through an
//! in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{BenchError, Result};

use super::iterator::SSTableIterator;
use super::{le_u32, le_u64, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Index slot for one key
#[derive(Debug, Clone, Copy)]
struct Slot {
    /// File offset of the data entry
    offset: u64,
    /// False for a tombstone
    live: bool,
}

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    path: PathBuf,
    file: BufReader<File>,
    index: BTreeMap<Vec<u8>, Slot>,
    entry_count: u64,
    index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable, check header and data CRC, and load the index
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt(path, "file shorter than header and footer"));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        if &header[0..4] != MAGIC {
            return Err(corrupt(path, &format!("bad magic {:?}", &header[0..4])));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(corrupt(path, &format!("unsupported version {}", version)));
        }
        let entry_count = le_u64(&header[6..14]);

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        let index_offset = le_u64(&footer[0..8]);
        let expected_crc = le_u32(&footer[8..12]);

        let index_end = file_size - FOOTER_SIZE;
        if index_offset < HEADER_SIZE || index_offset > index_end {
            return Err(corrupt(path, &format!("index offset {} out of range", index_offset)));
        }

        // Data block checksum
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        let actual_crc = crc32fast::hash(&data);
        if actual_crc != expected_crc {
            return Err(corrupt(
                path,
                &format!("data CRC mismatch: expected {:#010x}, got {:#010x}", expected_crc, actual_crc),
            ));
        }

        let mut raw_index = vec![0u8; (index_end - index_offset) as usize];
        file.read_exact(&mut raw_index)?;
        let index = parse_index(path, &raw_index, &data)?;
        drop(data);

        if index.len() as u64 != entry_count {
            return Err(corrupt(
                path,
                &format!("header says {} entries, index has {}", entry_count, index.len()),
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Point lookup
    ///
    /// Returns:
    /// - `Ok(Some(value))`: live value
    /// - `Ok(None)`: tombstone
    /// - `Err(KeyNotFound)`: not in this table
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let slot = *self.index.get(key).ok_or(BenchError::KeyNotFound)?;
        if !slot.live {
            return Ok(None);
        }

        self.file.seek(SeekFrom::Start(slot.offset))?;
        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;
        let key_len = le_u32(&header[0..4]) as i64;
        let val_len = le_u32(&header[4..8]);

        if val_len == TOMBSTONE_MARKER {
            return Ok(None);
        }

        self.file.seek_relative(key_len)?;
        let mut value = vec![0u8; val_len as usize];
        self.file.read_exact(&mut value)?;
        Ok(Some(value))
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(Vec::as_slice)
    }

    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(Vec::as_slice)
    }

    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false,
        }
    }

    /// Every key in this table, tombstones included, in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.index.keys().map(Vec::as_slice)
    }

    /// Every key with `true` if live, `false` if deleted; served from the
    /// index without touching the file
    pub fn key_states(&self) -> impl Iterator<Item = (&[u8], bool)> {
        self.index.iter().map(|(key, slot)| (key.as_slice(), slot.live))
    }

    /// Sequential scan over all entries
    pub fn iter(&mut self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(&mut self.file, self.index_offset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse `[key_len(4)][offset(8)][key]` records, taking each entry's
/// tombstone flag from `data` (the data block, starting at `HEADER_SIZE`)
fn parse_index(path: &Path, raw: &[u8], data: &[u8]) -> Result<BTreeMap<Vec<u8>, Slot>> {
    let mut index = BTreeMap::new();
    let mut pos = 0;
    while pos < raw.len() {
        if pos + 12 > raw.len() {
            return Err(corrupt(path, "truncated index record"));
        }
        let key_len = le_u32(&raw[pos..]) as usize;
        let offset = le_u64(&raw[pos + 4..]);
        pos += 12;
        if pos + key_len > raw.len() {
            return Err(corrupt(path, "truncated index key"));
        }
        let live = entry_is_live(path, data, offset)?;
        index.insert(raw[pos..pos + key_len].to_vec(), Slot { offset, live });
        pos += key_len;
    }
    Ok(index)
}

fn entry_is_live(path: &Path, data: &[u8], offset: u64) -> Result<bool> {
    let start = offset
        .checked_sub(HEADER_SIZE)
        .map(|rel| rel as usize)
        .filter(|&rel| rel + 8 <= data.len())
        .ok_or_else(|| corrupt(path, &format!("index points outside data block: {}", offset)))?;
    Ok(le_u32(&data[start + 4..start + 8]) != TOMBSTONE_MARKER)
}

fn corrupt(path: &Path, reason: &str) -> BenchError {
    BenchError::Storage(format!("corrupt SSTable {}: {}", path.display(), reason))
}
