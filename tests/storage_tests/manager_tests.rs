//! Tests for StorageManager
//!
//! These tests verify:
//! - SSTable discovery on open
//! - Flush from MemTable
//! - Newest-first lookups and tombstone shadowing
//! - Live key resolution across tables

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use filebench::memtable::MemTable;
use filebench::storage::StorageManager;
use filebench::BenchError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_storage() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sstables");
    (temp_dir, path)
}

fn memtable_with(entries: &[(&[u8], &[u8])]) -> MemTable {
    let memtable = MemTable::new();
    for (key, value) in entries {
        memtable.put(key.to_vec(), value.to_vec());
    }
    memtable
}

// =============================================================================
// Open
// =============================================================================

#[test]
fn test_open_empty_directory() {
    let (_temp, path) = setup_temp_storage();

    let manager = StorageManager::open(&path).unwrap();

    assert!(path.is_dir());
    assert_eq!(manager.sstable_count(), 0);
    assert_eq!(manager.next_sstable_id(), 1);
    assert_eq!(manager.data_dir(), path.as_path());
}

#[test]
fn test_reopen_discovers_tables() {
    let (_temp, path) = setup_temp_storage();
    {
        let manager = StorageManager::open(&path).unwrap();
        manager.flush(&memtable_with(&[(b"k1", b"v1")])).unwrap();
        manager.flush(&memtable_with(&[(b"k2", b"v2")])).unwrap();
    }

    let manager = StorageManager::open(&path).unwrap();

    assert_eq!(manager.sstable_count(), 2);
    assert_eq!(manager.next_sstable_id(), 3);
    assert_eq!(manager.get(b"k1").unwrap(), Some(b"v1".to_vec()));
}

#[test]
fn test_open_ignores_foreign_files() {
    let (_temp, path) = setup_temp_storage();
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join("notes.txt"), b"hello").unwrap();
    fs::write(path.join("sstable_000009.tmp"), b"partial").unwrap();

    let manager = StorageManager::open(&path).unwrap();

    assert_eq!(manager.sstable_count(), 0);
}

// =============================================================================
// Flush
// =============================================================================

#[test]
fn test_flush_writes_table() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();

    let memtable = memtable_with(&[(b"apple", b"red"), (b"banana", b"yellow")]);
    memtable.delete(b"cherry".to_vec());
    let metadata = manager.flush(&memtable).unwrap();

    assert_eq!(metadata.entry_count, 3);
    assert!(metadata.path.exists());
    assert_eq!(manager.sstable_count(), 1);
}

#[test]
fn test_flush_empty_memtable_fails() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();

    let result = manager.flush(&MemTable::new());

    assert!(matches!(result, Err(BenchError::Storage(_))));
    assert_eq!(manager.sstable_count(), 0);
}

// =============================================================================
// Get
// =============================================================================

#[test]
fn test_get_absent_key() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();
    manager.flush(&memtable_with(&[(b"k", b"v")])).unwrap();

    assert_eq!(manager.get(b"other").unwrap(), None);
}

#[test]
fn test_get_newer_overrides_older() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();

    manager.flush(&memtable_with(&[(b"key", b"old")])).unwrap();
    manager.flush(&memtable_with(&[(b"key", b"new")])).unwrap();

    assert_eq!(manager.get(b"key").unwrap(), Some(b"new".to_vec()));
}

#[test]
fn test_tombstone_hides_older_value() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();

    manager.flush(&memtable_with(&[(b"key", b"value")])).unwrap();
    let deletes = MemTable::new();
    deletes.delete(b"key".to_vec());
    manager.flush(&deletes).unwrap();

    assert_eq!(manager.get(b"key").unwrap(), None);
}

// =============================================================================
// Key States
// =============================================================================

#[test]
fn test_key_states_newest_wins() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();

    manager
        .flush(&memtable_with(&[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]))
        .unwrap();
    let newer = memtable_with(&[(b"d", b"4")]);
    newer.delete(b"b".to_vec());
    manager.flush(&newer).unwrap();

    let states = manager.key_states(&HashSet::new()).unwrap();

    let live: Vec<_> = states.iter().filter(|(_, &live)| live).map(|(k, _)| k.clone()).collect();
    assert_eq!(live, vec![b"a".to_vec(), b"c".to_vec(), b"d".to_vec()]);
    assert_eq!(states.get(&b"b".to_vec()), Some(&false));
}

#[test]
fn test_key_states_skips_shadowed_keys() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();
    manager.flush(&memtable_with(&[(b"a", b"1"), (b"b", b"2")])).unwrap();

    let shadowed: HashSet<Vec<u8>> = [b"a".to_vec()].into_iter().collect();
    let states = manager.key_states(&shadowed).unwrap();

    assert_eq!(states.len(), 1);
    assert!(states.contains_key(&b"b".to_vec()));
}

#[test]
fn test_key_states_come_from_index_only() {
    let (_temp, path) = setup_temp_storage();
    let manager = StorageManager::open(&path).unwrap();
    let memtable = memtable_with(&[(b"big", &[9u8; 4096]), (b"small", b"s")]);
    memtable.delete(b"gone".to_vec());
    let table = manager.flush(&memtable).unwrap();

    // Payloads are no longer on disk; only the loaded index can answer
    fs::OpenOptions::new()
        .write(true)
        .open(&table.path)
        .unwrap()
        .set_len(0)
        .unwrap();

    let states = manager.key_states(&HashSet::new()).unwrap();

    assert_eq!(states.get(&b"big".to_vec()), Some(&true));
    assert_eq!(states.get(&b"small".to_vec()), Some(&true));
    assert_eq!(states.get(&b"gone".to_vec()), Some(&false));
    assert!(manager.get(b"big").is_err());
}
