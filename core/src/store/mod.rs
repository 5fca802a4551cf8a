//! Key-value store adapter.
//!
//! The engine sees its backing store as a flat, ordered namespace of
//! hashes (field → string value) addressed by composite string keys. No
//! multi-key transaction is assumed; only single-field increments are
//! atomic.

pub mod keys;
mod memory;
mod pattern;
mod sled_store;

pub use memory::MemoryStore;
pub use pattern::KeyPattern;
pub use sled_store::SledStore;

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::config::{Driver, EngineConfig};
use crate::{Result, SearchError};

/// Fields of one hash.
pub type Hash = BTreeMap<String, String>;

pub trait KvStore: Send + Sync {
    fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

    fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Atomically adds `delta` to an integer field (missing counts as 0) and
    /// returns the new value.
    fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// All fields of a hash; empty when the key does not exist.
    fn hgetall(&self, key: &str) -> Result<Hash>;

    /// Removes a key, returning whether it existed.
    fn del(&self, key: &str) -> Result<bool>;

    fn exists(&self, key: &str) -> Result<bool>;

    /// Keys matching a glob pattern (`*`, `?`), in ascending byte order.
    fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Fails with [`SearchError::StorageUnavailable`] when writes cannot succeed.
    fn check_writable(&self) -> Result<()>;

    /// Makes pending writes durable.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Reads an integer field, treating a missing field as 0.
pub fn hget_i64(store: &dyn KvStore, key: &str, field: &str) -> Result<i64> {
    match store.hget(key, field)? {
        Some(raw) => raw.parse().map_err(|_| SearchError::store("hget", key, format!("field `{field}` is not an integer: {raw}"))),
        None => Ok(0),
    }
}

/// Opens the store selected by `config.driver`.
pub fn connect(config: &EngineConfig) -> Result<Arc<dyn KvStore>> {
    match config.driver {
        Driver::Memory => Ok(Arc::new(MemoryStore::new())),
        Driver::Sled => {
            let path = config
                .storage
                .as_ref()
                .ok_or_else(|| SearchError::Configuration("the sled driver requires a storage path".into()))?;
            let store = SledStore::open(path)?;
            info!(path = %path.display(), "opened sled store");
            Ok(Arc::new(store))
        }
    }
}

/// Deletes every key of an index.
pub fn flush_index(store: &dyn KvStore, index_name: &str) -> Result<usize> {
    let doomed = store.keys(&keys::all(index_name))?;
    for key in &doomed {
        store.del(key)?;
    }
    Ok(doomed.len())
}
