use serde::{Deserialize, Serialize};

use crate::store::{keys, KvStore};
use crate::Result;

pub type DocId = u64;

pub(crate) const NUM_HITS: &str = "num_hits";
pub(crate) const NUM_DOCS: &str = "num_docs";
pub(crate) const TOTAL_DOCUMENTS: &str = "total_documents";
pub(crate) const STEMMER: &str = "stemmer";
pub(crate) const TOKENIZER: &str = "tokenizer";

/// Aggregate statistics of one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordlistEntry {
    pub term: String,
    pub num_hits: u64,
    pub num_docs: u64,
}

impl AsRef<str> for WordlistEntry {
    fn as_ref(&self) -> &str {
        &self.term
    }
}

/// A fuzzy candidate and its edit distance from the query term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyMatch {
    pub term: String,
    pub distance: usize,
    pub num_hits: u64,
    pub num_docs: u64,
}

impl From<FuzzyMatch> for WordlistEntry {
    fn from(m: FuzzyMatch) -> Self {
        WordlistEntry { term: m.term, num_hits: m.num_hits, num_docs: m.num_docs }
    }
}

/// Occurrences of `term` in document `doc_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub term: String,
    pub doc_id: DocId,
    pub hit_count: u64,
}

/// Contents of the info table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub total_documents: u64,
    pub stemmer: Option<String>,
    pub tokenizer: Option<String>,
}

impl IndexInfo {
    pub fn load(store: &dyn KvStore, index: &str) -> Result<Self> {
        let mut fields = store.hgetall(&keys::info(index))?;
        Ok(IndexInfo {
            total_documents: counter(&fields, TOTAL_DOCUMENTS),
            stemmer: fields.remove(STEMMER),
            tokenizer: fields.remove(TOKENIZER),
        })
    }
}

/// Parses a counter field; missing, malformed and negative values read as 0.
pub(crate) fn counter(fields: &crate::store::Hash, field: &str) -> u64 {
    fields.get(field).and_then(|raw| raw.parse::<i64>().ok()).map(|n| n.max(0) as u64).unwrap_or(0)
}
