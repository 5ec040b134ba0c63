//! Tests for the WAL entry format, writer and reader
//!
//! These tests verify:
//! - Frame layout and checksum validation
//! - LSN assignment, including continuation after a restart
//! - Batch entries carrying several operations
//! - Reader behaviour at clean and torn ends of file

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use filebench::config::WalSyncStrategy;
use filebench::wal::{Operation, WalEntry, WalReader, WalWriter, HEADER_SIZE};
use filebench::BenchError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

fn read_all(path: &PathBuf) -> Vec<WalEntry> {
    WalReader::open(path)
        .unwrap()
        .entries()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

// =============================================================================
// Entry Format Tests
// =============================================================================

#[test]
fn test_entry_frame_header() {
    let entry = WalEntry::new(7, put("k", "v"));
    let bytes = entry.serialize().unwrap();

    assert!(bytes.len() > HEADER_SIZE);
    assert_eq!(&bytes[0..8], &7u64.to_le_bytes());

    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
    assert_eq!(len, bytes.len() - HEADER_SIZE);

    let crc = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    assert_eq!(crc, crc32fast::hash(&bytes[HEADER_SIZE..]));
}

#[test]
fn test_entry_decode_matches_original() {
    let entry = WalEntry::new(3, Operation::Delete { key: b"gone".to_vec() });
    let bytes = entry.serialize().unwrap();
    let crc = u32::from_le_bytes(bytes[8..12].try_into().unwrap());

    let decoded = WalEntry::deserialize(3, crc, &bytes[HEADER_SIZE..]).unwrap();
    assert_eq!(decoded, entry);
}

#[test]
fn test_entry_decode_rejects_bad_crc() {
    let entry = WalEntry::new(1, put("k", "v"));
    let bytes = entry.serialize().unwrap();
    let crc = u32::from_le_bytes(bytes[8..12].try_into().unwrap());

    let result = WalEntry::deserialize(1, crc ^ 0xFFFF, &bytes[HEADER_SIZE..]);
    assert!(matches!(result, Err(BenchError::WalCorruption(_))));
}

#[test]
fn test_entry_decode_rejects_lsn_mismatch() {
    let entry = WalEntry::new(5, put("k", "v"));
    let bytes = entry.serialize().unwrap();
    let crc = u32::from_le_bytes(bytes[8..12].try_into().unwrap());

    let result = WalEntry::deserialize(6, crc, &bytes[HEADER_SIZE..]);
    assert!(matches!(result, Err(BenchError::WalCorruption(_))));
}

#[test]
fn test_batch_op_count() {
    let batch = Operation::Batch {
        ops: vec![
            put("a", "1"),
            Operation::Delete { key: b"b".to_vec() },
            Operation::Batch { ops: vec![put("c", "3"), put("d", "4")] },
        ],
    };
    assert_eq!(batch.op_count(), 4);
    assert_eq!(put("x", "y").op_count(), 1);
    assert_eq!(Operation::Batch { ops: vec![] }.op_count(), 0);
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_writer_assigns_sequential_lsns() {
    let (_temp, path) = setup_temp_wal();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.current_lsn(), 1);
    assert_eq!(writer.append(put("a", "1")).unwrap(), 1);
    assert_eq!(writer.append(put("b", "2")).unwrap(), 2);
    assert_eq!(writer.append_durable(put("c", "3")).unwrap(), 3);
    assert_eq!(writer.current_lsn(), 4);
}

#[test]
fn test_writer_open_at_continues_sequence() {
    let (_temp, path) = setup_temp_wal();
    let mut writer = WalWriter::open_at(&path, WalSyncStrategy::EveryWrite, 42).unwrap();

    assert_eq!(writer.append(put("a", "1")).unwrap(), 42);

    let entries = read_all(&path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 42);
}

#[test]
fn test_writer_open_at_zero_starts_at_one() {
    let (_temp, path) = setup_temp_wal();
    let writer = WalWriter::open_at(&path, WalSyncStrategy::EveryWrite, 0).unwrap();
    assert_eq!(writer.current_lsn(), 1);
}

#[test]
fn test_writer_accepts_borrowed_operation() {
    let (_temp, path) = setup_temp_wal();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();

    let op = Operation::Batch {
        ops: vec![put("a", "1"), put("b", "2")],
    };
    writer.append(&op).unwrap();

    let entries = read_all(&path);
    assert_eq!(entries[0].operation, op);
}

#[test]
fn test_writer_relaxed_strategy_entries_are_readable() {
    let (_temp, path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&path, WalSyncStrategy::EveryNEntries { count: 1000 }).unwrap();

    for i in 0..10 {
        writer.append(put(&format!("k{}", i), "v")).unwrap();
    }

    // Appends flush the buffer even when fsync is deferred
    assert_eq!(read_all(&path).len(), 10);
}

#[test]
fn test_writer_truncate_empties_file() {
    let (_temp, path) = setup_temp_wal();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();

    writer.append(put("a", "1")).unwrap();
    writer.append(put("b", "2")).unwrap();
    writer.truncate().unwrap();

    assert_eq!(fs::metadata(&path).unwrap().len(), 0);

    // LSNs keep counting after a truncate
    assert_eq!(writer.append(put("c", "3")).unwrap(), 3);
    let entries = read_all(&path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 3);
}

#[test]
fn test_writer_open_discards_previous_contents() {
    let (_temp, path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put("old", "1")).unwrap();
    }

    let _writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_writer_path() {
    let (_temp, path) = setup_temp_wal();
    let writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.path(), path.as_path());
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_empty_file() {
    let (_temp, path) = setup_temp_wal();
    fs::File::create(&path).unwrap();

    let mut reader = WalReader::open(&path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_reader_missing_file() {
    let (_temp, path) = setup_temp_wal();
    assert!(matches!(WalReader::open(&path), Err(BenchError::Io(_))));
}

#[test]
fn test_reader_reads_in_order_and_tracks_position() {
    let (_temp, path) = setup_temp_wal();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("a", "1")).unwrap();
    writer.append(Operation::Delete { key: b"a".to_vec() }).unwrap();
    drop(writer);

    let mut reader = WalReader::open(&path).unwrap();
    let first = reader.next_entry().unwrap().unwrap();
    let second = reader.next_entry().unwrap().unwrap();
    assert!(reader.next_entry().unwrap().is_none());

    assert_eq!(first.lsn, 1);
    assert_eq!(first.operation, put("a", "1"));
    assert_eq!(second.operation, Operation::Delete { key: b"a".to_vec() });
    assert_eq!(reader.position(), fs::metadata(&path).unwrap().len());
}

#[test]
fn test_reader_partial_header_is_corruption() {
    let (_temp, path) = setup_temp_wal();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("a", "1")).unwrap();
    drop(writer);

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[1, 2, 3]).unwrap();
    drop(file);

    let mut reader = WalReader::open(&path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(matches!(reader.next_entry(), Err(BenchError::WalCorruption(_))));
}

#[test]
fn test_reader_partial_payload_is_corruption() {
    let (_temp, path) = setup_temp_wal();
    let bytes = WalEntry::new(1, put("key", "a fairly long value")).serialize().unwrap();
    fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

    let mut reader = WalReader::open(&path).unwrap();
    assert!(matches!(reader.next_entry(), Err(BenchError::WalCorruption(_))));
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_entries_iterator_stops_after_error() {
    let (_temp, path) = setup_temp_wal();
    let mut bytes = WalEntry::new(1, put("a", "1")).serialize().unwrap();
    let mut second = WalEntry::new(2, put("b", "2")).serialize().unwrap();
    let last = second.len() - 1;
    second[last] ^= 0xFF;
    bytes.extend_from_slice(&second);
    bytes.extend_from_slice(&WalEntry::new(3, put("c", "3")).serialize().unwrap());
    fs::write(&path, &bytes).unwrap();

    let items: Vec<_> = WalReader::open(&path).unwrap().entries().collect();
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(items[1].is_err());
}
