//! Benchmark Driver
//!
//! Runs one benchmark at a time and returns a finalized `BenchmarkResult`.
//!
//! ## Write path
//! ```text
//!   TreeWalker ──File──► TreeSource::read ──ok──► pending batch
//!       │                      │                      │ len == threshold
//!       │                      └─err──► error_count   ▼
//!       ├─Directory──► dir_count              FileStore::batch_put
//!       └─Failed─────► dir_count, error_count
//! ```
//! Per-node failures are counted and the walk goes on; a failed store
//! transaction ends the run.

use crate::error::Result;
use crate::store::{FileStore, StoredRecord};
use crate::walker::{FsNode, TreeSource, TreeWalker, WalkEvent};

use super::result::{BenchmarkKind, BenchmarkResult, RunOutcome};

/// Drives write, read and walk-only benchmarks over a tree source
pub struct BenchmarkDriver<'a> {
    source: &'a dyn TreeSource,
}

impl<'a> BenchmarkDriver<'a> {
    pub fn new(source: &'a dyn TreeSource) -> Self {
        Self { source }
    }

    /// Traverse and read every file without touching a store
    pub fn walk_only(&self, roots: &[FsNode]) -> RunOutcome {
        let mut result = BenchmarkResult::start(BenchmarkKind::WalkOnly, None);
        let status = self.traverse(roots, &mut result, |_| Ok(()));
        RunOutcome::finalize(result, status)
    }

    /// Read every file and write it to `store` in batches of
    /// `store.batch_threshold()`
    pub fn write(&self, roots: &[FsNode], store: &mut dyn FileStore) -> RunOutcome {
        let mut result = BenchmarkResult::start(BenchmarkKind::Write, Some(store.implementation()));
        let status = self.write_batches(roots, store, &mut result);
        RunOutcome::finalize(result, status)
    }

    /// Read back everything in `store`, `store.read_batch_size()` keys per
    /// transaction
    pub fn read(&self, store: &dyn FileStore) -> RunOutcome {
        let mut result = BenchmarkResult::start(BenchmarkKind::Read, Some(store.implementation()));
        let status = Self::read_all(store, &mut result);
        if let Err(e) = &status {
            result.error_count += 1;
            tracing::error!(implementation = %store.implementation(), "read benchmark failed: {}", e);
        }
        RunOutcome::finalize(result, status)
    }

    fn write_batches(
        &self,
        roots: &[FsNode],
        store: &mut dyn FileStore,
        result: &mut BenchmarkResult,
    ) -> Result<()> {
        let threshold = store.batch_threshold().max(1);
        let mut pending: Vec<(String, StoredRecord)> = Vec::with_capacity(threshold);
        let mut committed = 0u64;

        let walked = self.traverse(roots, result, |record| {
            pending.push(record.into_entry());
            if pending.len() >= threshold {
                committed += store.batch_put(std::mem::take(&mut pending))? as u64;
            }
            Ok(())
        });
        result.transactions += committed;
        walked?;

        if !pending.is_empty() {
            result.transactions += store.batch_put(pending)? as u64;
        }
        Ok(())
    }

    fn read_all(store: &dyn FileStore, result: &mut BenchmarkResult) -> Result<()> {
        let keys = store.list_keys()?;
        let batch_size = store.read_batch_size();
        let records = store.batch_get(&keys, batch_size)?;

        result.transactions += keys.len().div_ceil(batch_size.max(1)) as u64;
        for record in records {
            result.file_count += 1;
            result.total_size += record.size;
        }
        Ok(())
    }

    /// Walk the roots, reading each file and handing it to `sink`
    ///
    /// Only an error from `sink` stops the walk.
    fn traverse<F>(&self, roots: &[FsNode], result: &mut BenchmarkResult, mut sink: F) -> Result<()>
    where
        F: FnMut(StoredRecord) -> Result<()>,
    {
        for event in TreeWalker::new(self.source, roots.iter().cloned()) {
            match event {
                WalkEvent::File(file) => match self.source.read(&file) {
                    Ok(data) => {
                        result.file_count += 1;
                        result.total_size += data.len() as u64;
                        sink(StoredRecord::new(file.name, data))?;
                    }
                    Err(error) => {
                        result.error_count += 1;
                        tracing::warn!(path = %file.path.display(), %error, "file read failed");
                    }
                },
                WalkEvent::Directory { .. } => {
                    result.dir_count += 1;
                }
                WalkEvent::Failed { .. } => {
                    result.dir_count += 1;
                    result.error_count += 1;
                }
            }
        }
        Ok(())
    }
}
