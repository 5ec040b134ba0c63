//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::{BenchError, Result};

use super::{WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first torn or corrupted entry, or the first whose LSN
    ///    does not follow its predecessor (a batch is one entry, so a
    ///    half-written batch is dropped as a whole)
    /// 3. Truncate everything after the last good entry
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, mut result, good_len) = Self::scan(path)?;

        if result.entries_corrupted > 0 {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(good_len)?;
            file.sync_all()?;
            result.was_truncated = true;
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path)?;
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult, u64)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            let start = reader.position();
            match reader.next_entry() {
                Ok(Some(entry)) if result.entries_recovered > 0 && entry.lsn != result.last_lsn + 1 => {
                    tracing::warn!(
                        path = %path.display(),
                        offset = start,
                        expected = result.last_lsn + 1,
                        found = entry.lsn,
                        "WAL tail discarded: LSN sequence broken"
                    );
                    result.entries_corrupted += 1;
                    return Ok((entries, result, start));
                }
                Ok(Some(entry)) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    entries.push(entry);
                }
                Ok(None) => break,
                Err(BenchError::WalCorruption(reason)) | Err(BenchError::Serialization(reason)) => {
                    tracing::warn!(
                        path = %path.display(),
                        offset = reader.position(),
                        "WAL tail discarded: {}",
                        reason
                    );
                    result.entries_corrupted += 1;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((entries, result, reader.position()))
    }
}
