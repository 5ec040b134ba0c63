//! Typed database wrapper
//!
//! A small promise-free take on the "object store" model: a database has a
//! version and named object stores, an upgrade callback creates stores when
//! the version goes up, and values are typed (serde + bincode). Every call
//! runs in its own transaction.
//!
//! ```text
//!   key layout inside the engine
//!   ┌───────────────────────────┬──────────────────────────┐
//!   │ __db__:version            │ u32 (LE)                 │
//!   │ __db__:store:<name>       │ (empty marker)           │
//!   │ <store>:<key>             │ bincode(T)               │
//!   └───────────────────────────┴──────────────────────────┘
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{Config, Durability};
use crate::engine::{Engine, WriteBatch};
use crate::error::{BenchError, Result};

const VERSION_KEY: &str = "__db__:version";
const STORE_MARKER_PREFIX: &str = "__db__:store:";

/// Handed to the upgrade callback; changes land in the same commit as the
/// version bump
pub struct Upgrade<'a> {
    batch: WriteBatch,
    stores: &'a mut BTreeSet<String>,
    old_version: u32,
}

impl<'a> Upgrade<'a> {
    /// Version the database had before this upgrade (0 when new)
    pub fn old_version(&self) -> u32 {
        self.old_version
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains(name)
    }

    /// Names may not start with "__" or contain ':' so they never overlap
    /// the metadata keys
    pub fn create_object_store(&mut self, name: &str) -> Result<()> {
        if name.is_empty() || name.starts_with("__") || name.contains(':') {
            return Err(BenchError::Schema(format!("invalid object store name: {:?}", name)));
        }
        if !self.stores.insert(name.to_string()) {
            return Err(BenchError::Schema(format!("object store '{}' already exists", name)));
        }
        self.batch.put(format!("{}{}", STORE_MARKER_PREFIX, name), Vec::new());
        Ok(())
    }
}

/// A versioned collection of typed object stores
pub struct Database {
    engine: Engine,
    version: u32,
    stores: BTreeSet<String>,
}

impl Database {
    /// Open the database at `path`, upgrading it to `version` if needed
    ///
    /// The callback runs only when the stored version is lower than
    /// `version`. Opening with a lower version than stored fails.
    pub fn open<F>(path: &Path, config: &Config, version: u32, upgrade: F) -> Result<Self>
    where
        F: FnOnce(&mut Upgrade<'_>) -> Result<()>,
    {
        if version == 0 {
            return Err(BenchError::Schema("version must be at least 1".to_string()));
        }

        let mut engine_config = config.clone();
        engine_config.data_dir = path.to_path_buf();
        let engine = Engine::open(engine_config)?;

        let stored = match engine.get(VERSION_KEY.as_bytes())? {
            None => 0,
            Some(raw) => <[u8; 4]>::try_from(raw.as_slice())
                .map(u32::from_le_bytes)
                .map_err(|_| BenchError::Schema("unreadable database version".to_string()))?,
        };
        if stored > version {
            return Err(BenchError::Schema(format!(
                "database is at version {}, requested {}",
                stored, version
            )));
        }

        let mut stores = Self::load_store_names(&engine)?;

        if stored < version {
            let mut up = Upgrade {
                batch: WriteBatch::new(),
                stores: &mut stores,
                old_version: stored,
            };
            upgrade(&mut up)?;

            let mut batch = up.batch;
            batch.put(VERSION_KEY, version.to_le_bytes().to_vec());
            engine.write(batch, Durability::Strict)?;
            tracing::info!(path = %path.display(), from = stored, to = version, "database upgraded");
        }

        Ok(Self {
            engine,
            version,
            stores,
        })
    }

    fn load_store_names(engine: &Engine) -> Result<BTreeSet<String>> {
        let txn = engine.read_txn();
        let names = txn
            .keys_with_prefix(STORE_MARKER_PREFIX.as_bytes())?
            .into_iter()
            .filter_map(|k| String::from_utf8(k[STORE_MARKER_PREFIX.len()..].to_vec()).ok())
            .collect();
        Ok(names)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn object_store_names(&self) -> Vec<String> {
        self.stores.iter().cloned().collect()
    }

    fn store_prefix(&self, store: &str) -> Result<String> {
        if !self.stores.contains(store) {
            return Err(BenchError::Schema(format!("no object store named '{}'", store)));
        }
        Ok(format!("{}:", store))
    }

    /// Write every item in one strict-durability transaction
    pub fn put_all<T: Serialize>(&self, store: &str, items: &[(String, T)]) -> Result<u64> {
        let prefix = self.store_prefix(store)?;
        let mut batch = WriteBatch::with_capacity(items.len());
        for (key, value) in items {
            batch.put(format!("{}{}", prefix, key), bincode::serialize(value)?);
        }
        self.engine.write(batch, Durability::Strict)
    }

    pub fn put<T: Serialize>(&self, store: &str, key: &str, value: &T) -> Result<u64> {
        let prefix = self.store_prefix(store)?;
        let mut batch = WriteBatch::with_capacity(1);
        batch.put(format!("{}{}", prefix, key), bincode::serialize(value)?);
        self.engine.write(batch, Durability::Strict)
    }

    /// Fetch several keys inside one read transaction
    ///
    /// Missing keys and values that do not decode as `T` come back as `None`.
    pub fn get_many<T: DeserializeOwned>(&self, store: &str, keys: &[String]) -> Result<Vec<Option<T>>> {
        let prefix = self.store_prefix(store)?;
        let txn = self.engine.read_txn();

        keys.iter()
            .map(|key| {
                let raw = txn.get(format!("{}{}", prefix, key).as_bytes())?;
                Ok(raw.and_then(|bytes| match bincode::deserialize(&bytes) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!(store, key = %key, "value failed type check: {}", e);
                        None
                    }
                }))
            })
            .collect()
    }

    pub fn get<T: DeserializeOwned>(&self, store: &str, key: &str) -> Result<Option<T>> {
        let mut found = self.get_many(store, &[key.to_string()])?;
        Ok(found.pop().flatten())
    }

    pub fn get_all_keys(&self, store: &str) -> Result<Vec<String>> {
        let prefix = self.store_prefix(store)?;
        let txn = self.engine.read_txn();
        let keys = txn
            .keys_with_prefix(prefix.as_bytes())?
            .into_iter()
            .filter_map(|k| String::from_utf8(k[prefix.len()..].to_vec()).ok())
            .collect();
        Ok(keys)
    }

    pub fn close(self) -> Result<()> {
        self.engine.close()
    }

    /// Remove a database from disk; fine if it never existed
    pub fn delete(path: &Path) -> Result<()> {
        Engine::destroy(path)
    }
}
