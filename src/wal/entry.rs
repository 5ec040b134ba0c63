//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their on-disk
//! framing: `[LSN (8)][CRC (4)][Len (4)][payload]`, all little endian.

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Header size: LSN (8) + CRC (4) + payload length (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Several operations committed as one unit
    Batch { ops: Vec<Operation> },
}

impl Operation {
    /// Number of key-level operations carried (a batch counts its members)
    pub fn op_count(&self) -> usize {
        match self {
            Operation::Batch { ops } => ops.iter().map(Operation::op_count).sum(),
            _ => 1,
        }
    }
}

/// Borrowed twin of `WalEntry`; encodes to the same bytes
#[derive(Serialize)]
struct WalEntryRef<'a> {
    lsn: u64,
    operation: &'a Operation,
    timestamp: u64,
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Frame an operation without taking ownership of it
pub(crate) fn encode_frame(lsn: u64, operation: &Operation, timestamp: u64) -> Result<Vec<u8>> {
    let payload = bincode::serialize(&WalEntryRef {
        lsn,
        operation,
        timestamp,
    })?;
    let len = u32::try_from(payload.len())
        .map_err(|_| BenchError::WalWrite(format!("entry too large: {} bytes", payload.len())))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&lsn.to_le_bytes());
    buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

impl WalEntry {
    /// Create an entry stamped with the current wall clock time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self {
            lsn,
            operation,
            timestamp: now_millis(),
        }
    }

    /// Encode as a framed record ready to append to the log
    pub fn serialize(&self) -> Result<Vec<u8>> {
        encode_frame(self.lsn, &self.operation, self.timestamp)
    }

    /// Decode a payload whose header has already been read and checked
    pub fn deserialize(header_lsn: u64, crc: u32, payload: &[u8]) -> Result<Self> {
        let actual = crc32fast::hash(payload);
        if actual != crc {
            return Err(BenchError::WalCorruption(format!(
                "CRC mismatch at lsn {}: expected {:#010x}, got {:#010x}",
                header_lsn, crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(payload)?;
        if entry.lsn != header_lsn {
            return Err(BenchError::WalCorruption(format!(
                "LSN mismatch: header {} vs payload {}",
                header_lsn, entry.lsn
            )));
        }
        Ok(entry)
    }
}
