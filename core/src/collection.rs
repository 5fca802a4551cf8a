use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Result, SearchError};

/// Insertion-ordered key/value container used to carry a document's fields
/// through the indexing pipeline.
///
/// Transformations return a new collection; the receiver is left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection<V> {
    items: Vec<(String, V)>,
}

impl<V> Default for Collection<V> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<V> Collection<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing value in place so the order is kept.
    pub fn with(mut self, key: impl Into<String>, value: V) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.items.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.items.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns a copy without `key`.
    pub fn forget(&self, key: &str) -> Self
    where
        V: Clone,
    {
        self.filter(|k, _| k != key)
    }

    /// Applies `f` to every value, keeping keys and order.
    pub fn map<U, F>(&self, mut f: F) -> Collection<U>
    where
        F: FnMut(&str, &V) -> U,
    {
        Collection { items: self.items.iter().map(|(k, v)| (k.clone(), f(k.as_str(), v))).collect() }
    }

    /// Keeps the entries for which `keep` returns true.
    pub fn filter<F>(&self, mut keep: F) -> Self
    where
        V: Clone,
        F: FnMut(&str, &V) -> bool,
    {
        Collection { items: self.items.iter().filter(|(k, v)| keep(k.as_str(), v)).cloned().collect() }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.items.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, V)> {
        self.items
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Collection<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut c = Collection::new();
        for (k, v) in iter {
            c.set(k, v);
        }
        c
    }
}

/// A single field value of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Null,
}

impl FieldValue {
    /// Interprets the value as a document id.
    pub fn as_doc_id(&self) -> Option<u64> {
        match self {
            FieldValue::Integer(n) => u64::try_from(*n).ok(),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Float(f) if f.fract() == 0.0 && *f >= 0.0 => Some(*f as u64),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Null => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Null => Ok(()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        i64::try_from(n).map(FieldValue::Integer).unwrap_or(FieldValue::Float(n as f64))
    }
}

/// A document: field name to value, one field being the primary key.
pub type Document = Collection<FieldValue>;

impl Document {
    /// Builds a document from a JSON object. Nested arrays and objects are
    /// kept as their JSON text.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(SearchError::invalid_document("row is not a JSON object"));
        };
        Ok(map
            .into_iter()
            .map(|(k, v)| {
                let field = match v {
                    serde_json::Value::Null => FieldValue::Null,
                    serde_json::Value::Bool(b) => FieldValue::Text(b.to_string()),
                    serde_json::Value::Number(n) => match n.as_i64() {
                        Some(i) => FieldValue::Integer(i),
                        None => FieldValue::Float(n.as_f64().unwrap_or_default()),
                    },
                    serde_json::Value::String(s) => FieldValue::Text(s),
                    other => FieldValue::Text(other.to_string()),
                };
                (k, field)
            })
            .collect())
    }
}
