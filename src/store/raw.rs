//! Raw store adapter
//!
//! Talks to `Engine` directly: builds `WriteBatch`es by hand, opens read
//! transactions per chunk and keeps its own schema bookkeeping.

use std::path::{Path, PathBuf};

use crate::config::{Config, Durability};
use crate::engine::{Engine, WriteBatch};
use crate::error::{BenchError, Result};

use super::{
    check_batch_size, is_record_key, FileStore, Implementation, StoredRecord, FILES_STORE,
    SCHEMA_VERSION,
};

const VERSION_KEY: &[u8] = b"meta/version";

/// Raw transactional adapter over `Engine`
pub struct RawStore {
    config: Config,
    dir: PathBuf,
    engine: Option<Engine>,
}

impl RawStore {
    pub fn new(config: Config) -> Self {
        let dir = config.data_dir.join(Implementation::Raw.store_name());
        Self {
            config,
            dir,
            engine: None,
        }
    }

    /// Directory the engine lives in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn engine(&self) -> Result<&Engine> {
        self.engine
            .as_ref()
            .ok_or_else(|| BenchError::StoreClosed(self.dir.display().to_string()))
    }

    fn store_marker() -> Vec<u8> {
        format!("meta/store/{}", FILES_STORE).into_bytes()
    }

    fn data_key(key: &str) -> Vec<u8> {
        format!("{}/{}", FILES_STORE, key).into_bytes()
    }

    /// Create the object store at the current version, or check an existing one
    fn ensure_schema(engine: &Engine) -> Result<()> {
        match engine.get(VERSION_KEY)? {
            None => {
                let mut batch = WriteBatch::with_capacity(2);
                batch.put(VERSION_KEY, SCHEMA_VERSION.to_le_bytes().to_vec());
                batch.put(Self::store_marker(), Vec::new());
                engine.write(batch, Durability::Strict)?;
                tracing::info!(version = SCHEMA_VERSION, "created object store '{}'", FILES_STORE);
                Ok(())
            }
            Some(raw) => {
                let stored = <[u8; 4]>::try_from(raw.as_slice())
                    .map(u32::from_le_bytes)
                    .map_err(|_| BenchError::Schema(format!("unreadable version: {:?}", raw)))?;
                if stored != SCHEMA_VERSION {
                    return Err(BenchError::Schema(format!(
                        "store is at version {}, expected {}",
                        stored, SCHEMA_VERSION
                    )));
                }
                if engine.get(&Self::store_marker())?.is_none() {
                    return Err(BenchError::Schema(format!(
                        "object store '{}' missing",
                        FILES_STORE
                    )));
                }
                Ok(())
            }
        }
    }
}

impl FileStore for RawStore {
    fn implementation(&self) -> Implementation {
        Implementation::Raw
    }

    fn open(&mut self) -> Result<()> {
        if self.engine.is_some() {
            return Ok(());
        }

        let mut config = self.config.clone();
        config.data_dir = self.dir.clone();
        let engine = Engine::open(config)?;
        Self::ensure_schema(&engine)?;

        tracing::info!(store = %self.dir.display(), "raw store opened");
        self.engine = Some(engine);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.engine.is_some()
    }

    fn batch_threshold(&self) -> usize {
        self.config.batch_threshold
    }

    fn read_batch_size(&self) -> usize {
        self.config.read_batch_size
    }

    fn batch_put(&mut self, records: Vec<(String, StoredRecord)>) -> Result<usize> {
        let engine = self.engine()?;
        let threshold = self.config.batch_threshold.max(1);
        let mut committed = 0;

        for chunk in records.chunks(threshold) {
            let mut batch = WriteBatch::with_capacity(chunk.len());
            for (key, record) in chunk {
                batch.put(Self::data_key(key), record.encode()?);
            }
            let lsn = engine.write(batch, Durability::Strict)?;
            committed += 1;
            tracing::debug!(lsn, records = chunk.len(), "raw write transaction committed");
        }

        Ok(committed)
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        let engine = self.engine()?;
        let prefix = Self::data_key("");
        let txn = engine.read_txn();

        let keys = txn
            .keys_with_prefix(&prefix)?
            .into_iter()
            .filter_map(|k| String::from_utf8(k[prefix.len()..].to_vec()).ok())
            .collect();
        Ok(keys)
    }

    fn batch_get(&self, keys: &[String], batch_size: usize) -> Result<Vec<StoredRecord>> {
        check_batch_size(batch_size)?;
        let engine = self.engine()?;
        let mut records = Vec::with_capacity(keys.len());

        for chunk in keys.chunks(batch_size) {
            let txn = engine.read_txn();
            for key in chunk.iter().filter(|k| is_record_key(k)) {
                let Some(bytes) = txn.get(&Self::data_key(key))? else {
                    continue;
                };
                match StoredRecord::decode(&bytes) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!(key = %key, "skipping undecodable record: {}", e),
                }
            }
            drop(txn);
            tracing::debug!(keys = chunk.len(), "raw read transaction complete");
        }

        Ok(records)
    }

    fn close(&mut self) -> Result<()> {
        match self.engine.take() {
            Some(engine) => {
                engine.close()?;
                tracing::info!(store = %self.dir.display(), "raw store closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn destroy(&mut self) -> Result<()> {
        if let Err(e) = self.close() {
            tracing::warn!(store = %self.dir.display(), "close before destroy failed: {}", e);
        }
        Engine::destroy(&self.dir)?;
        tracing::info!(store = %self.dir.display(), "raw store destroyed");
        Ok(())
    }
}
