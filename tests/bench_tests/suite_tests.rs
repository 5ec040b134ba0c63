//! Tests for BenchmarkSuite
//!
//! These tests verify:
//! - Event order and report contents for a full session
//! - Only one run at a time
//! - A store that cannot be opened ends the session
//! - Fresh vs overwrite writes and keeping stores between sessions

use std::fs;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver};
use parking_lot::Mutex;

use filebench::bench::{BenchmarkKind, BenchmarkSuite, SuiteEvent, SuitePlan, WriteMode};
use filebench::config::{Config, WalSyncStrategy};
use filebench::store::Implementation;
use filebench::walker::{DirListing, DirNode, FileNode, MemoryTree, TreeSource};
use filebench::{BenchError, Result};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn suite_for(dir: &std::path::Path) -> BenchmarkSuite {
    BenchmarkSuite::new(
        Config::builder()
            .data_dir(dir)
            .wal_sync_strategy(WalSyncStrategy::EveryWrite)
            .batch_threshold(2)
            .read_batch_size(2)
            .build(),
    )
}

fn tree_of(names: &[&str]) -> MemoryTree {
    let mut tree = MemoryTree::new();
    for (i, name) in names.iter().enumerate() {
        tree.add_file(format!("docs/{}", name), vec![i as u8; 8]);
    }
    tree
}

fn drain(rx: &Receiver<SuiteEvent>) -> Vec<SuiteEvent> {
    rx.try_iter().collect()
}

fn keep_plan(write_mode: WriteMode) -> SuitePlan {
    SuitePlan {
        include_walk_only: false,
        implementations: vec![Implementation::Raw],
        write_mode,
        keep_stores: true,
    }
}

/// Runs a nested session from inside `read`, recording what it got back
struct ReentrantSource<'a> {
    tree: MemoryTree,
    suite: &'a BenchmarkSuite,
    nested: Mutex<Vec<(bool, bool)>>,
}

impl TreeSource for ReentrantSource<'_> {
    fn open_dir(&self, dir: &DirNode) -> Result<Box<dyn DirListing + '_>> {
        self.tree.open_dir(dir)
    }

    fn read(&self, file: &FileNode) -> Result<Bytes> {
        let (tx, _rx) = channel::unbounded();
        let nested = self.suite.run(&MemoryTree::new(), &[], &SuitePlan::default(), &tx);
        self.nested
            .lock()
            .push((self.suite.is_running(), matches!(nested, Err(BenchError::RunInProgress))));
        self.tree.read(file)
    }
}

// =============================================================================
// Full Session
// =============================================================================

#[test]
fn test_default_plan_event_order() {
    let temp = TempDir::new().unwrap();
    let suite = suite_for(temp.path());
    let tree = tree_of(&["a.txt", "b.txt", "c.txt"]);
    let (tx, rx) = channel::unbounded();

    let report = suite.run(&tree, &tree.roots(), &SuitePlan::default(), &tx).unwrap();

    let events = drain(&rx);
    let mut expected = vec![(BenchmarkKind::WalkOnly, None)];
    for implementation in Implementation::ALL {
        expected.push((BenchmarkKind::Write, Some(implementation)));
        expected.push((BenchmarkKind::Read, Some(implementation)));
    }

    assert_eq!(events.len(), expected.len() * 2 + 1);
    for (pair, (kind, implementation)) in events.chunks(2).zip(&expected) {
        match &pair[0] {
            SuiteEvent::Started { kind: k, implementation: i } => {
                assert_eq!((k, i), (kind, implementation));
            }
            other => panic!("expected Started, got {:?}", other),
        }
        match &pair[1] {
            SuiteEvent::Finished(entry) => {
                assert_eq!(entry.result.kind, *kind);
                assert!(entry.result.is_finished());
                assert!(entry.error.is_none());
            }
            other => panic!("expected Finished, got {:?}", other),
        }
    }
    assert!(matches!(events.last(), Some(SuiteEvent::Completed)));

    assert_eq!(report.entries.len(), 5);
    assert_eq!(report.failures().count(), 0);
    for implementation in Implementation::ALL {
        let read = report.result(BenchmarkKind::Read, Some(implementation)).unwrap();
        assert_eq!(read.file_count, 3);
        assert_eq!(read.total_size, 24);
    }
    assert_eq!(report.result(BenchmarkKind::WalkOnly, None).unwrap().dir_count, 1);
}

#[test]
fn test_stores_removed_unless_kept() {
    let temp = TempDir::new().unwrap();
    let suite = suite_for(temp.path());
    let tree = tree_of(&["a.txt"]);
    let (tx, _rx) = channel::unbounded();

    suite.run(&tree, &tree.roots(), &SuitePlan::default(), &tx).unwrap();

    for implementation in Implementation::ALL {
        assert!(!temp.path().join(implementation.store_name()).exists());
    }
    assert!(!suite.is_running());
}

#[test]
fn test_dropped_receiver_does_not_stop_run() {
    let temp = TempDir::new().unwrap();
    let suite = suite_for(temp.path());
    let tree = tree_of(&["a.txt", "b.txt"]);
    let (tx, rx) = channel::unbounded();
    drop(rx);

    let report = suite.run(&tree, &tree.roots(), &SuitePlan::default(), &tx).unwrap();

    assert_eq!(report.entries.len(), 5);
}

#[test]
fn test_partial_failures_are_reported_not_fatal() {
    let temp = TempDir::new().unwrap();
    let suite = suite_for(temp.path());
    let mut tree = tree_of(&["a.txt", "b.txt"]);
    tree.add_file("locked/x.txt", b"x".to_vec()).fail_listing("locked");
    let (tx, _rx) = channel::unbounded();

    let report = suite.run(&tree, &tree.roots(), &SuitePlan::default(), &tx).unwrap();

    let walk = report.result(BenchmarkKind::WalkOnly, None).unwrap();
    assert_eq!(walk.error_count, 1);
    assert_eq!(walk.file_count, 2);
    assert_eq!(report.failures().count(), 0);
}

// =============================================================================
// Run Exclusion
// =============================================================================

#[test]
fn test_overlapping_run_rejected() {
    let temp = TempDir::new().unwrap();
    let suite = suite_for(temp.path());
    let source = ReentrantSource {
        tree: tree_of(&["a.txt"]),
        suite: &suite,
        nested: Mutex::new(Vec::new()),
    };
    let plan = SuitePlan {
        include_walk_only: true,
        implementations: Vec::new(),
        ..SuitePlan::default()
    };
    let (tx, _rx) = channel::unbounded();

    suite.run(&source, &source.tree.roots(), &plan, &tx).unwrap();

    assert_eq!(*source.nested.lock(), vec![(true, true)]);
    assert!(!suite.is_running());

    // The flag is released: a later run goes through
    let tree = tree_of(&["b.txt"]);
    assert!(suite.run(&tree, &tree.roots(), &plan, &tx).is_ok());
}

#[test]
fn test_invalid_config_rejected_and_flag_released() {
    let temp = TempDir::new().unwrap();
    let suite = BenchmarkSuite::new(
        Config::builder()
            .data_dir(temp.path())
            .read_batch_size(0)
            .build(),
    );
    let tree = tree_of(&["a.txt"]);
    let (tx, rx) = channel::unbounded();

    let result = suite.run(&tree, &tree.roots(), &SuitePlan::default(), &tx);

    assert!(matches!(result, Err(BenchError::Config(_))));
    assert!(drain(&rx).is_empty());
    assert!(!suite.is_running());
}

// =============================================================================
// Open Failures
// =============================================================================

#[test]
fn test_open_failure_ends_session() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not-a-dir");
    fs::write(&blocker, b"occupied").unwrap();
    let suite = suite_for(&blocker);
    let tree = tree_of(&["a.txt"]);
    let (tx, rx) = channel::unbounded();

    let result = suite.run(&tree, &tree.roots(), &SuitePlan::default(), &tx);

    assert!(result.is_err());
    let events = drain(&rx);
    // walk-only ran; the first store never started writing
    let started: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SuiteEvent::Started { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![BenchmarkKind::WalkOnly]);
    assert!(matches!(events.last(), Some(SuiteEvent::Completed)));
    assert!(!suite.is_running());
}

// =============================================================================
// Write Modes
// =============================================================================

#[test]
fn test_overwrite_accumulates_and_fresh_clears() {
    let temp = TempDir::new().unwrap();
    let suite = suite_for(temp.path());
    let (tx, _rx) = channel::unbounded();

    let first = tree_of(&["a.txt", "b.txt", "c.txt"]);
    suite.run(&first, &first.roots(), &keep_plan(WriteMode::Fresh), &tx).unwrap();
    assert!(temp.path().join("filesDB").is_dir());

    // Overwrite keeps a, b, c; "c.txt" is rewritten, "d.txt" added
    let second = tree_of(&["c.txt", "d.txt"]);
    let report = suite
        .run(&second, &second.roots(), &keep_plan(WriteMode::Overwrite), &tx)
        .unwrap();
    let read = report.result(BenchmarkKind::Read, Some(Implementation::Raw)).unwrap();
    assert_eq!(read.file_count, 4);

    // Fresh starts over
    let report = suite
        .run(&second, &second.roots(), &keep_plan(WriteMode::Fresh), &tx)
        .unwrap();
    let read = report.result(BenchmarkKind::Read, Some(Implementation::Raw)).unwrap();
    assert_eq!(read.file_count, 2);
}

#[test]
fn test_suite_plan_defaults() {
    let plan = SuitePlan::default();

    assert!(plan.include_walk_only);
    assert_eq!(plan.implementations, Implementation::ALL.to_vec());
    assert_eq!(plan.write_mode, WriteMode::Fresh);
    assert!(!plan.keep_stores);
}
