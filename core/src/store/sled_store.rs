use std::path::{Path, PathBuf};

use super::{Hash, KeyPattern, KvStore};
use crate::{Result, SearchError};

const PROBE_KEY: &[u8] = b"\0probe";

/// Embedded on-disk store. Each hash is one sled entry holding the
/// bincode-encoded field map; field updates go through `update_and_fetch`
/// so concurrent increments on the same key never lose a write.
pub struct SledStore {
    db: sled::Db,
    path: PathBuf,
}

fn decode(key: &str, bytes: &[u8]) -> Result<Hash> {
    bincode::deserialize(bytes).map_err(|e| SearchError::store("decode", key, e))
}

fn encode(key: &str, hash: &Hash) -> Result<Vec<u8>> {
    bincode::serialize(hash).map_err(|e| SearchError::store("encode", key, e))
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path).map_err(|e| SearchError::StorageUnavailable {
            operation: "open",
            location: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-modify-write of one hash. `apply` returns `None` to delete the key.
    fn modify<T>(
        &self,
        operation: &'static str,
        key: &str,
        mut apply: impl FnMut(Hash) -> Result<(Option<Hash>, T)>,
    ) -> Result<T> {
        let mut outcome: Option<Result<T>> = None;
        self.db
            .update_and_fetch(key.as_bytes(), |old| {
                let current = match old.map(|bytes| decode(key, bytes)).transpose() {
                    Ok(hash) => hash.unwrap_or_default(),
                    Err(e) => {
                        outcome = Some(Err(e));
                        return old.map(|b| b.to_vec());
                    }
                };
                match apply(current).and_then(|(next, value)| Ok((next.map(|h| encode(key, &h)).transpose()?, value))) {
                    Ok((next, value)) => {
                        outcome = Some(Ok(value));
                        next
                    }
                    Err(e) => {
                        outcome = Some(Err(e));
                        old.map(|b| b.to_vec())
                    }
                }
            })
            .map_err(|e| SearchError::store(operation, key, e))?;
        outcome.unwrap_or_else(|| Err(SearchError::store(operation, key, "update did not run")))
    }
}

impl KvStore for SledStore {
    fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self.hgetall(key)?.remove(field))
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.modify("hset", key, |mut hash| {
            hash.insert(field.to_string(), value.to_string());
            Ok((Some(hash), ()))
        })
    }

    fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.modify("hincrby", key, |mut hash| {
            let current = match hash.get(field) {
                Some(raw) => raw
                    .parse::<i64>()
                    .map_err(|_| SearchError::store("hincrby", key, format!("field `{field}` is not an integer: {raw}")))?,
                None => 0,
            };
            let next = current
                .checked_add(delta)
                .ok_or_else(|| SearchError::store("hincrby", key, format!("field `{field}` would overflow: {current} + {delta}")))?;
            hash.insert(field.to_string(), next.to_string());
            Ok((Some(hash), next))
        })
    }

    fn hgetall(&self, key: &str) -> Result<Hash> {
        match self.db.get(key.as_bytes()).map_err(|e| SearchError::store("hgetall", key, e))? {
            Some(bytes) => decode(key, &bytes),
            None => Ok(Hash::new()),
        }
    }

    fn del(&self, key: &str) -> Result<bool> {
        let old = self.db.remove(key.as_bytes()).map_err(|e| SearchError::store("del", key, e))?;
        Ok(old.is_some())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        self.db.contains_key(key.as_bytes()).map_err(|e| SearchError::store("exists", key, e))
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let compiled = KeyPattern::new(pattern)?;
        let mut out = Vec::new();
        for entry in self.db.scan_prefix(compiled.prefix().as_bytes()) {
            let (raw, _) = entry.map_err(|e| SearchError::store("keys", pattern, e))?;
            let Ok(key) = std::str::from_utf8(&raw) else { continue };
            if raw.as_ref() != PROBE_KEY && compiled.matches(key) {
                out.push(key.to_string());
            }
        }
        Ok(out)
    }

    fn check_writable(&self) -> Result<()> {
        let unavailable = |e: sled::Error| SearchError::StorageUnavailable {
            operation: "write probe",
            location: self.path.clone(),
            reason: e.to_string(),
        };
        self.db.insert(PROBE_KEY, b"1".as_ref()).map_err(unavailable)?;
        self.db.remove(PROBE_KEY).map_err(unavailable)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().map_err(|e| SearchError::StorageUnavailable {
            operation: "flush",
            location: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}
