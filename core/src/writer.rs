//! Index maintenance: insert, update and delete documents, and batch runs
//! over a [`DocumentSource`].
//!
//! Every counter change goes through the store's atomic increment. A
//! document touches several keys with no cross-key transaction, so each step
//! is ordered to be safe to re-run:
//!
//! - insert: wordlist counters, then doclist postings, then the info counter;
//! - delete: per term, the doclist posting is removed before the wordlist
//!   counters are decremented, so a retried delete never decrements twice.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analyzer::Analyzer;
use crate::collection::{Collection, Document};
use crate::config::{validate_index_name, EngineConfig};
use crate::index::{DocId, NUM_DOCS, NUM_HITS, STEMMER, TOKENIZER, TOTAL_DOCUMENTS};
use crate::source::{DocumentSource, SourceDocument};
use crate::stemmer::{stemmer_for, Stemmer};
use crate::store::{flush_index, hget_i64, keys, KvStore};
use crate::tokenizer::Tokenizer;
use crate::{Result, SearchError};

/// A document left out of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDocument {
    /// Zero-based position in the batch.
    pub position: usize,
    pub id: Option<DocId>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub indexed: usize,
    pub skipped: Vec<SkippedDocument>,
}

impl BatchReport {
    pub fn skipped_ids(&self) -> Vec<DocId> {
        self.skipped.iter().filter_map(|s| s.id).collect()
    }
}

pub struct IndexWriter {
    store: Arc<dyn KvStore>,
    name: String,
    analyzer: Analyzer,
    primary_key: String,
    include_primary_key: bool,
    steps: usize,
    page_size: usize,
    disable_output: bool,
}

impl IndexWriter {
    /// Creates (or recreates) an index: every existing key under `name` is
    /// removed and the info table is initialised.
    pub fn create(store: Arc<dyn KvStore>, name: &str, config: &EngineConfig) -> Result<Self> {
        let writer = Self::attach(store, name, config, Analyzer::from_config(config)?)?;
        let removed = flush_index(writer.store.as_ref(), name)?;
        if removed > 0 {
            info!(index = name, removed, "flushed existing index");
        }
        let info = keys::info(name);
        writer.store.hset(&info, TOTAL_DOCUMENTS, "0")?;
        writer.store.hset(&info, STEMMER, writer.analyzer.stemmer_name())?;
        writer.store.hset(&info, TOKENIZER, writer.analyzer.tokenizer_name())?;
        Ok(writer)
    }

    /// Attaches to an existing index, reusing the stemmer and tokenizer it
    /// was built with.
    pub fn open(store: Arc<dyn KvStore>, name: &str, config: &EngineConfig) -> Result<Self> {
        validate_index_name(name)?;
        let analyzer = Analyzer::for_index(store.as_ref(), name, config)?;
        Self::attach(store, name, config, analyzer)
    }

    fn attach(store: Arc<dyn KvStore>, name: &str, config: &EngineConfig, analyzer: Analyzer) -> Result<Self> {
        validate_index_name(name)?;
        config.validate()?;
        store.check_writable()?;
        Ok(Self {
            store,
            name: name.to_string(),
            analyzer,
            primary_key: config.primary_key.clone(),
            include_primary_key: config.include_primary_key,
            steps: config.steps,
            page_size: config.page_size,
            disable_output: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Records the stemmer's identifier in the info table. A stemmer the
    /// registry cannot resolve still works here, but a later
    /// [`IndexWriter::open`] falls back to the configured one.
    pub fn set_stemmer(&mut self, stemmer: Box<dyn Stemmer>) -> Result<()> {
        self.store.hset(&keys::info(&self.name), STEMMER, stemmer.name())?;
        self.analyzer.set_stemmer(stemmer);
        Ok(())
    }

    pub fn set_language(&mut self, language: &str) -> Result<()> {
        self.set_stemmer(stemmer_for(language)?)
    }

    pub fn set_tokenizer(&mut self, tokenizer: Box<dyn Tokenizer>) -> Result<()> {
        self.store.hset(&keys::info(&self.name), TOKENIZER, tokenizer.name())?;
        self.analyzer.set_tokenizer(tokenizer);
        Ok(())
    }

    pub fn set_primary_key(&mut self, primary_key: impl Into<String>) {
        self.primary_key = primary_key.into();
    }

    pub fn include_primary_key(&mut self, include: bool) {
        self.include_primary_key = include;
    }

    /// Demotes progress lines from `info` to `debug`.
    pub fn disable_output(&mut self, disable: bool) {
        self.disable_output = disable;
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    fn doc_id(&self, document: &Document) -> Result<DocId> {
        let value = document
            .get(&self.primary_key)
            .ok_or_else(|| SearchError::invalid_document(format!("missing primary key `{}`", self.primary_key)))?;
        value
            .as_doc_id()
            .ok_or_else(|| SearchError::invalid_document(format!("primary key `{}` is not an integer: {value}", self.primary_key)))
    }

    /// Stems every field of a document, leaving out the primary key unless
    /// it was opted back in. Blank fields yield no stems.
    fn stems(&self, document: &Document) -> Collection<Vec<String>> {
        let fields = if self.include_primary_key { document.clone() } else { document.forget(&self.primary_key) };
        fields.map(|_, value| if value.is_blank() { Vec::new() } else { self.analyzer.stem_text(&value.to_string()) })
    }

    /// Indexes one document and bumps `total_documents`. An id that is
    /// already indexed has its old postings removed first, so re-submitting
    /// a document replaces it.
    pub fn insert(&self, document: &Document) -> Result<DocId> {
        let doc_id = self.doc_id(document)?;
        if self.delete(doc_id)? {
            debug!(index = %self.name, doc_id, "replacing indexed document");
        }
        let stems = self.stems(document);
        self.save_to_index(&stems, doc_id)?;
        self.store.hincrby(&keys::info(&self.name), TOTAL_DOCUMENTS, 1)?;
        debug!(index = %self.name, doc_id, "inserted document");
        Ok(doc_id)
    }

    /// Delete followed by insert.
    pub fn update(&self, id: DocId, document: &Document) -> Result<DocId> {
        self.delete(id)?;
        self.insert(document)
    }

    /// Removes every posting of `id`. Returns false, without touching the
    /// store, when the id is not indexed.
    pub fn delete(&self, id: DocId) -> Result<bool> {
        let postings = self.store.keys(&keys::doclist_for_doc(&self.name, id))?;
        if postings.is_empty() {
            return Ok(false);
        }

        let mut hits_per_term: BTreeMap<String, i64> = BTreeMap::new();
        for key in &postings {
            let Some((term, _)) = keys::parse_doclist(&self.name, key) else {
                warn!(index = %self.name, key = %key, "ignoring malformed doclist key");
                continue;
            };
            let hits = hget_i64(self.store.as_ref(), key, NUM_HITS)?;
            hits_per_term.insert(term.to_string(), hits);
        }

        for (term, hits) in &hits_per_term {
            self.store.del(&keys::doclist(&self.name, term, id))?;
            let wordlist = keys::wordlist(&self.name, term);
            let docs_left = self.store.hincrby(&wordlist, NUM_DOCS, -1)?;
            self.store.hincrby(&wordlist, NUM_HITS, -hits)?;
            if docs_left <= 0 {
                self.store.del(&wordlist)?;
            }
        }

        self.store.hincrby(&keys::info(&self.name), TOTAL_DOCUMENTS, -1)?;
        debug!(index = %self.name, doc_id = id, terms = hits_per_term.len(), "deleted document");
        Ok(true)
    }

    fn save_to_index(&self, stems: &Collection<Vec<String>>, doc_id: DocId) -> Result<()> {
        let terms = self.save_wordlist(stems)?;
        self.save_doclist(&terms, doc_id)
    }

    /// Counts occurrences per term across all fields and merges them into
    /// the wordlist: `num_hits` grows by the count, `num_docs` by one.
    fn save_wordlist(&self, stems: &Collection<Vec<String>>) -> Result<BTreeMap<String, i64>> {
        let mut terms: BTreeMap<String, i64> = BTreeMap::new();
        for term in stems.values().flatten() {
            *terms.entry(term.clone()).or_insert(0) += 1;
        }
        for (term, hits) in &terms {
            let key = keys::wordlist(&self.name, term);
            self.store.hincrby(&key, NUM_HITS, *hits)?;
            self.store.hincrby(&key, NUM_DOCS, 1)?;
        }
        Ok(terms)
    }

    fn save_doclist(&self, terms: &BTreeMap<String, i64>, doc_id: DocId) -> Result<()> {
        for (term, hits) in terms {
            self.store.hset(&keys::doclist(&self.name, term, doc_id), NUM_HITS, &hits.to_string())?;
        }
        Ok(())
    }

    fn record_file(&self, doc_id: DocId, path: &Path) -> Result<()> {
        let key = keys::filemap(&self.name, doc_id);
        self.store.hset(&key, "id", &doc_id.to_string())?;
        self.store.hset(&key, "path", &path.to_string_lossy())
    }

    fn progress(&self, processed: usize) {
        if self.disable_output {
            debug!(index = %self.name, processed, "Processed {processed} rows");
        } else {
            info!(index = %self.name, processed, "Processed {processed} rows");
        }
    }

    /// Inserts every document of `source`, a page at a time. A document that
    /// cannot be read or indexed is skipped and reported; store failures
    /// abort the run.
    pub fn run(&self, source: &dyn DocumentSource) -> Result<BatchReport> {
        self.store.check_writable()?;
        let mut documents = source.documents()?;
        let mut report = BatchReport::default();
        let mut position = 0usize;
        loop {
            let page: Vec<Result<SourceDocument>> = documents.by_ref().take(self.page_size).collect();
            if page.is_empty() {
                break;
            }
            for item in page {
                self.index_one(position, item, &mut report)?;
                position += 1;
                if position % self.steps == 0 {
                    self.progress(position);
                }
            }
        }
        if position % self.steps != 0 {
            self.progress(position);
        }
        self.store.flush()?;
        info!(index = %self.name, indexed = report.indexed, skipped = report.skipped.len(), "Total rows {position}");
        Ok(report)
    }

    /// Batch insert of already materialised documents.
    pub fn insert_batch(&self, documents: &[Document]) -> Result<BatchReport> {
        self.store.check_writable()?;
        let mut report = BatchReport::default();
        for (position, document) in documents.iter().enumerate() {
            self.index_one(position, Ok(SourceDocument::row(document.clone())), &mut report)?;
        }
        Ok(report)
    }

    fn index_one(&self, position: usize, item: Result<SourceDocument>, report: &mut BatchReport) -> Result<()> {
        let (id, outcome) = match item {
            Ok(SourceDocument { document, origin }) => {
                let id = self.doc_id(&document).ok();
                let outcome = self.insert(&document).and_then(|doc_id| match origin {
                    Some(path) => self.record_file(doc_id, &path),
                    None => Ok(()),
                });
                (id, outcome)
            }
            Err(e) => (None, Err(e)),
        };
        match outcome {
            Ok(()) => report.indexed += 1,
            Err(e) if !e.is_fatal() => {
                warn!(index = %self.name, position, id = ?id, error = %e, "skipping document");
                report.skipped.push(SkippedDocument { position, id, reason: e.to_string() });
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}
