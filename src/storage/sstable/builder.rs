//! SSTable Builder
//!
//! Streams sorted entries into a new SSTable file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{BenchError, Result};

use super::{TableSummary, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder {
    path: PathBuf,
    writer: BufWriter<File>,
    entry_count: u64,
    /// Offset where the next data entry starts
    offset: u64,
    /// Key → data offset, written out as the index block
    index: Vec<(Vec<u8>, u64)>,
    data_crc: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Create the file and write a header with a placeholder count
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            entry_count: 0,
            offset: HEADER_SIZE,
            index: Vec::new(),
            data_crc: crc32fast::Hasher::new(),
        })
    }

    /// Add a key-value pair (strictly ascending key order)
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.push(key, Some(value))
    }

    /// Add a tombstone (strictly ascending key order)
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.push(key, None)
    }

    fn push(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some((last, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(BenchError::Storage(format!(
                    "SSTable keys out of order in {}",
                    self.path.display()
                )));
            }
        }

        let val_len = match value {
            Some(v) if v.len() >= TOMBSTONE_MARKER as usize => {
                return Err(BenchError::Storage(format!("value too large: {} bytes", v.len())));
            }
            Some(v) => v.len() as u32,
            None => TOMBSTONE_MARKER,
        };

        let mut record = Vec::with_capacity(8 + key.len() + value.map_or(0, <[u8]>::len));
        record.extend_from_slice(&(key.len() as u32).to_le_bytes());
        record.extend_from_slice(&val_len.to_le_bytes());
        record.extend_from_slice(key);
        if let Some(v) = value {
            record.extend_from_slice(v);
        }

        self.writer.write_all(&record)?;
        self.data_crc.update(&record);
        self.index.push((key.to_vec(), self.offset));
        self.offset += record.len() as u64;
        self.entry_count += 1;
        Ok(())
    }

    /// Write index and footer, patch the header count and fsync
    pub fn finish(mut self) -> Result<TableSummary> {
        let index_offset = self.offset;

        for (key, offset) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(key)?;
        }

        let data_crc = self.data_crc.clone().finalize();
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;
        self.writer.flush()?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| BenchError::Storage(format!("Failed to flush SSTable: {}", e)))?;
        file.seek(SeekFrom::Start(6))?;
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();
        let min_key = self.index.first().map(|(k, _)| k.clone()).unwrap_or_default();
        let max_key = self.index.last().map(|(k, _)| k.clone()).unwrap_or_default();

        Ok(TableSummary {
            path: self.path,
            entry_count: self.entry_count,
            min_key,
            max_key,
            file_size,
        })
    }
}
