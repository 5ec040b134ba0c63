//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{BenchError, Result};

use super::{WalEntry, HEADER_SIZE};

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset just past the last entry that decoded cleanly
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file. A torn header or payload,
    /// or a checksum mismatch, is reported as `WalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut header = [0u8; HEADER_SIZE];
        let filled = read_fully(&mut self.reader, &mut header)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < HEADER_SIZE {
            return Err(BenchError::WalCorruption(format!(
                "partial header at offset {} ({} of {} bytes)",
                self.position, filled, HEADER_SIZE
            )));
        }

        let mut lsn_bytes = [0u8; 8];
        let mut crc_bytes = [0u8; 4];
        let mut len_bytes = [0u8; 4];
        lsn_bytes.copy_from_slice(&header[0..8]);
        crc_bytes.copy_from_slice(&header[8..12]);
        len_bytes.copy_from_slice(&header[12..16]);

        let lsn = u64::from_le_bytes(lsn_bytes);
        let crc = u32::from_le_bytes(crc_bytes);
        let len = u32::from_le_bytes(len_bytes) as usize;

        let mut payload = vec![0u8; len];
        let filled = read_fully(&mut self.reader, &mut payload)?;
        if filled < len {
            return Err(BenchError::WalCorruption(format!(
                "partial payload for lsn {} ({} of {} bytes)",
                lsn, filled, len
            )));
        }

        let entry = WalEntry::deserialize(lsn, crc, &payload)?;
        self.position += (HEADER_SIZE + len) as u64;
        Ok(Some(entry))
    }

    /// Offset just past the last good entry
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries; stops after the first error
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read
fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
