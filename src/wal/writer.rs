//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::borrow::Borrow;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{BenchError, Result};

use super::entry::{encode_frame, now_millis};
use super::Operation;

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
}

impl WalWriter {
    /// Open or create a WAL file, starting at LSN 1
    ///
    /// Any existing content is discarded: callers recover the log before
    /// reopening it for writing.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        Self::open_at(path, sync_strategy, 1)
    }

    /// Open or create a WAL file, continuing the LSN sequence at `next_lsn`
    pub fn open_at(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_lsn: next_lsn.max(1),
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append an operation, syncing according to the configured strategy
    ///
    /// Returns the LSN assigned to the entry.
    pub fn append(&mut self, operation: impl Borrow<Operation>) -> Result<u64> {
        self.append_with(operation.borrow(), false)
    }

    /// Append an operation and fsync before returning
    pub fn append_durable(&mut self, operation: impl Borrow<Operation>) -> Result<u64> {
        self.append_with(operation.borrow(), true)
    }

    fn append_with(&mut self, operation: &Operation, force_sync: bool) -> Result<u64> {
        let lsn = self.next_lsn;
        let bytes = encode_frame(lsn, operation, now_millis())?;

        self.writer
            .write_all(&bytes)
            .and_then(|_| self.writer.flush())
            .map_err(|e| BenchError::WalWrite(format!("append lsn {}: {}", lsn, e)))?;

        self.next_lsn += 1;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if force_sync || due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every entry (they are durable elsewhere). LSNs keep increasing.
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
