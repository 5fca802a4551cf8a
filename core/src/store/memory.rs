use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::{Hash, KeyPattern, KvStore};
use crate::{Result, SearchError};

/// In-process store. Every operation takes the lock once, so single-field
/// increments are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Hash>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy of the whole keyspace, for state comparisons.
    pub fn snapshot(&self) -> BTreeMap<String, Hash> {
        self.data.read().clone()
    }
}

impl KvStore for MemoryStore {
    fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self.data.read().get(key).and_then(|h| h.get(field).cloned()))
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.data.write().entry(key.to_string()).or_default().insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut data = self.data.write();
        let hash = data.entry(key.to_string()).or_default();
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
        Ok(next)
    }

    fn hgetall(&self, key: &str) -> Result<Hash> {
        Ok(self.data.read().get(key).cloned().unwrap_or_default())
    }

    fn del(&self, key: &str) -> Result<bool> {
        Ok(self.data.write().remove(key).is_some())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.data.read().contains_key(key))
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = KeyPattern::new(pattern)?;
        let data = self.data.read();
        Ok(data
            .range(pattern.prefix().to_string()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(pattern.prefix()))
            .filter(|k| pattern.matches(k))
            .cloned()
            .collect())
    }

    fn check_writable(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::conformance;

    #[test]
    fn hash_fields() {
        conformance::hash_fields(&MemoryStore::new());
    }

    #[test]
    fn increments() {
        conformance::increments(&MemoryStore::new());
    }

    #[test]
    fn pattern_scan() {
        conformance::pattern_scan(&MemoryStore::new());
    }
}
