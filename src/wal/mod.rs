//! Write-ahead log
//!
//! Every mutation reaches the log before the memtable. A whole write batch
//! is a single frame, so replay applies it completely or not at all.
//!
//! ```text
//!   frame := lsn u64 | crc32(payload) u32 | payload_len u32 | payload
//!   payload := bincode(Operation)
//! ```
//!
//! Frames carry consecutive LSNs starting at 1. Recovery stops at the first
//! frame that is torn, fails its checksum or breaks the LSN sequence, and
//! cuts the file back to the last good frame.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, HEADER_SIZE};
pub use reader::{WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
