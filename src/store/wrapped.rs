//! Wrapped store adapter
//!
//! Same contract as `RawStore`, expressed through the typed `Database`
//! wrapper instead of raw engine batches.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{BenchError, Result};

use super::{
    check_batch_size, is_record_key, Database, FileStore, Implementation, StoredRecord,
    FILES_STORE, SCHEMA_VERSION,
};

/// Adapter over the `Database` wrapper
pub struct WrappedStore {
    config: Config,
    dir: PathBuf,
    db: Option<Database>,
}

impl WrappedStore {
    pub fn new(config: Config) -> Self {
        let dir = config.data_dir.join(Implementation::Wrapped.store_name());
        Self {
            config,
            dir,
            db: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn db(&self) -> Result<&Database> {
        self.db
            .as_ref()
            .ok_or_else(|| BenchError::StoreClosed(self.dir.display().to_string()))
    }
}

impl FileStore for WrappedStore {
    fn implementation(&self) -> Implementation {
        Implementation::Wrapped
    }

    fn open(&mut self) -> Result<()> {
        if self.db.is_some() {
            return Ok(());
        }

        let db = Database::open(&self.dir, &self.config, SCHEMA_VERSION, |upgrade| {
            if !upgrade.contains(FILES_STORE) {
                upgrade.create_object_store(FILES_STORE)?;
            }
            Ok(())
        })?;

        tracing::info!(store = %self.dir.display(), version = db.version(), "wrapped store opened");
        self.db = Some(db);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.db.is_some()
    }

    fn batch_threshold(&self) -> usize {
        self.config.batch_threshold
    }

    fn read_batch_size(&self) -> usize {
        self.config.read_batch_size
    }

    fn batch_put(&mut self, records: Vec<(String, StoredRecord)>) -> Result<usize> {
        let db = self.db()?;
        let mut committed = 0;

        for chunk in records.chunks(self.config.batch_threshold.max(1)) {
            let lsn = db.put_all(FILES_STORE, chunk)?;
            committed += 1;
            tracing::debug!(lsn, records = chunk.len(), "wrapped write transaction committed");
        }

        Ok(committed)
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        self.db()?.get_all_keys(FILES_STORE)
    }

    fn batch_get(&self, keys: &[String], batch_size: usize) -> Result<Vec<StoredRecord>> {
        check_batch_size(batch_size)?;
        let db = self.db()?;
        let mut records = Vec::with_capacity(keys.len());

        for chunk in keys.chunks(batch_size) {
            let valid: Vec<String> = chunk.iter().filter(|k| is_record_key(k)).cloned().collect();
            let found = db.get_many::<StoredRecord>(FILES_STORE, &valid)?;
            records.extend(found.into_iter().flatten());
            tracing::debug!(keys = chunk.len(), "wrapped read transaction complete");
        }

        Ok(records)
    }

    fn close(&mut self) -> Result<()> {
        match self.db.take() {
            Some(db) => {
                db.close()?;
                tracing::info!(store = %self.dir.display(), "wrapped store closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn destroy(&mut self) -> Result<()> {
        if let Err(e) = self.close() {
            tracing::warn!(store = %self.dir.display(), "close before destroy failed: {}", e);
        }
        Database::delete(&self.dir)?;
        tracing::info!(store = %self.dir.display(), "wrapped store destroyed");
        Ok(())
    }
}
