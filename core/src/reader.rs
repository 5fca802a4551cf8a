//! Query engine.
//!
//! Every query is a pure read of whatever the store holds at that moment.
//! A key that disappears between enumeration and read (a concurrent delete)
//! is treated as absent, never as an error.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::analyzer::Analyzer;
use crate::config::{validate_index_name, EngineConfig, QueryConfig};
use crate::fuzzy::{char_prefix, levenshtein};
use crate::index::{counter, DocId, FuzzyMatch, IndexInfo, Posting, WordlistEntry, NUM_DOCS, NUM_HITS};
use crate::store::{keys, KvStore};
use crate::Result;

/// A ranked document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredDocument {
    pub doc_id: DocId,
    /// Sum of the hit counts of every matched term.
    pub score: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub hits: Vec<ScoredDocument>,
    /// Matching documents before truncation to the requested limit.
    pub total_hits: usize,
    pub execution_time_ms: f64,
}

impl SearchResults {
    pub fn ids(&self) -> Vec<DocId> {
        self.hits.iter().map(|h| h.doc_id).collect()
    }

    /// Drops documents scoring below `min_score`.
    pub fn with_min_score(mut self, min_score: u64) -> Self {
        self.hits.retain(|h| h.score >= min_score);
        self
    }
}

pub struct IndexReader {
    store: Arc<dyn KvStore>,
    name: String,
    config: QueryConfig,
    analyzer: Analyzer,
}

impl IndexReader {
    /// Opens an index for querying with the pipeline recorded in its info
    /// table. Opening an index that does not exist is not an error; every
    /// query on it comes back empty.
    pub fn open(store: Arc<dyn KvStore>, name: &str, config: &EngineConfig) -> Result<Self> {
        let analyzer = Analyzer::for_index(store.as_ref(), name, config)?;
        Self::with_analyzer(store, name, config.query.clone(), analyzer)
    }

    pub fn with_analyzer(store: Arc<dyn KvStore>, name: &str, config: QueryConfig, analyzer: Analyzer) -> Result<Self> {
        validate_index_name(name)?;
        Ok(Self { store, name: name.to_string(), config, analyzer })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query_config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn fuzziness(&mut self, enabled: bool) {
        self.config.fuzziness = enabled;
    }

    pub fn as_you_type(&mut self, enabled: bool) {
        self.config.as_you_type = enabled;
    }

    pub fn fuzzy_prefix_length(&mut self, length: usize) {
        self.config.fuzzy_prefix_length = length;
    }

    pub fn fuzzy_distance(&mut self, distance: usize) {
        self.config.fuzzy_distance = distance;
    }

    pub fn max_docs(&mut self, max_docs: usize) {
        self.config.max_docs = max_docs;
    }

    pub fn stemmer_name(&self) -> &'static str {
        self.analyzer.stemmer_name()
    }

    pub fn tokenizer_name(&self) -> &'static str {
        self.analyzer.tokenizer_name()
    }

    pub fn info(&self) -> Result<IndexInfo> {
        IndexInfo::load(self.store.as_ref(), &self.name)
    }

    pub fn total_documents(&self) -> Result<u64> {
        Ok(self.info()?.total_documents)
    }

    fn entry(&self, term: &str) -> Result<Option<WordlistEntry>> {
        let fields = self.store.hgetall(&keys::wordlist(&self.name, term))?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(WordlistEntry {
            term: term.to_string(),
            num_hits: counter(&fields, NUM_HITS),
            num_docs: counter(&fields, NUM_DOCS),
        }))
    }

    /// Exact wordlist lookup after lowercasing.
    pub fn word_from_wordlist(&self, word: &str) -> Result<Option<WordlistEntry>> {
        self.entry(&word.to_lowercase())
    }

    pub fn count_word_in_wordlist(&self, word: &str) -> Result<u64> {
        Ok(self.word_from_wordlist(word)?.map(|e| e.num_hits).unwrap_or(0))
    }

    /// Resolves a query term against the wordlist.
    ///
    /// With as-you-type enabled and `is_last_word` set, the single best
    /// completion of `keyword` is returned instead of an exact match. When
    /// fuzziness is enabled, an empty result (or any request with
    /// `no_limit`) falls through to [`IndexReader::fuzzy_search`].
    pub fn lookup_term(&self, keyword: &str, is_last_word: bool, no_limit: bool) -> Result<Vec<WordlistEntry>> {
        let found = if self.config.as_you_type && is_last_word {
            self.best_completion(keyword)?
        } else {
            self.entry(keyword)?
        };

        if self.config.fuzziness && (found.is_none() || no_limit) {
            return Ok(self.fuzzy_search(keyword)?.into_iter().map(WordlistEntry::from).collect());
        }
        Ok(found.into_iter().collect())
    }

    /// Shortest, then most frequent, term starting with `prefix`.
    fn best_completion(&self, prefix: &str) -> Result<Option<WordlistEntry>> {
        let mut candidates = Vec::new();
        for key in self.store.keys(&keys::wordlist_prefix(&self.name, prefix))? {
            let Some(term) = keys::term_of_wordlist(&self.name, &key) else { continue };
            if let Some(entry) = self.entry(term)? {
                candidates.push(entry);
            }
        }
        Ok(candidates.into_iter().min_by(|a, b| {
            a.term
                .chars()
                .count()
                .cmp(&b.term.chars().count())
                .then(b.num_hits.cmp(&a.num_hits))
                .then_with(|| a.term.cmp(&b.term))
        }))
    }

    /// Wordlist terms within `fuzzy_distance` edits of `keyword`, among those
    /// sharing its first `fuzzy_prefix_length` characters. Ordered by
    /// distance, then by descending `num_hits`.
    pub fn fuzzy_search(&self, keyword: &str) -> Result<Vec<FuzzyMatch>> {
        let prefix = char_prefix(keyword, self.config.fuzzy_prefix_length);
        let mut matches = Vec::new();
        for key in self.store.keys(&keys::wordlist_prefix(&self.name, prefix))? {
            let Some(term) = keys::term_of_wordlist(&self.name, &key) else { continue };
            let distance = levenshtein(term, keyword);
            if distance > self.config.fuzzy_distance {
                continue;
            }
            if let Some(entry) = self.entry(term)? {
                matches.push(FuzzyMatch { term: entry.term, distance, num_hits: entry.num_hits, num_docs: entry.num_docs });
            }
        }
        matches.sort_by(|a, b| {
            a.distance.cmp(&b.distance).then(b.num_hits.cmp(&a.num_hits)).then_with(|| a.term.cmp(&b.term))
        });
        debug!(index = %self.name, keyword, prefix, candidates = matches.len(), "fuzzy search");
        Ok(matches)
    }

    /// Doclist postings of `term` in store scan order.
    fn postings(&self, term: &str) -> Result<Vec<Posting>> {
        let mut out = Vec::new();
        for key in self.store.keys(&keys::doclist_for_term(&self.name, term))? {
            let Some((_, doc_id)) = keys::parse_doclist(&self.name, &key) else { continue };
            if let Some(raw) = self.store.hget(&key, NUM_HITS)? {
                let hit_count = raw.parse::<i64>().map(|n| n.max(0) as u64).unwrap_or(0);
                out.push(Posting { term: term.to_string(), doc_id, hit_count });
            }
        }
        Ok(out)
    }

    /// Postings of one term. Sorted by document id and capped at `max_docs`
    /// unless `no_limit` asks for the raw, unbounded scan.
    pub fn documents_for_strict_keyword(&self, term: &str, no_limit: bool) -> Result<Vec<Posting>> {
        let mut postings = self.postings(term)?;
        if !no_limit {
            postings.sort_by_key(|p| p.doc_id);
            postings.truncate(self.config.max_docs);
        }
        Ok(postings)
    }

    /// Union of the postings of every term, capped at `max_docs` unless
    /// `no_limit` is set.
    pub fn documents_for_fuzzy_keyword<S: AsRef<str>>(&self, terms: &[S], no_limit: bool) -> Result<Vec<Posting>> {
        let mut postings = Vec::new();
        for term in terms {
            postings.extend(self.postings(term.as_ref())?);
        }
        if !no_limit {
            postings.truncate(self.config.max_docs);
        }
        Ok(postings)
    }

    /// Documents of this index that do not contain `keyword`.
    ///
    /// The candidate set is every posted document id (first `max_docs`
    /// distinct ids in scan order unless `no_limit`), minus the keyword's
    /// postings. A keyword the wordlist does not know yields no documents.
    pub fn documents_for_where_keyword_not(&self, keyword: &str, no_limit: bool) -> Result<Vec<DocId>> {
        if self.lookup_term(keyword, false, false)?.is_empty() {
            return Ok(Vec::new());
        }

        let excluded: HashSet<DocId> = self.postings(keyword)?.into_iter().map(|p| p.doc_id).collect();

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for key in self.store.keys(&keys::all_doclists(&self.name))? {
            let Some((_, doc_id)) = keys::parse_doclist(&self.name, &key) else { continue };
            if seen.insert(doc_id) {
                candidates.push(doc_id);
                if !no_limit && candidates.len() >= self.config.max_docs {
                    break;
                }
            }
        }
        candidates.retain(|id| !excluded.contains(id));
        Ok(candidates)
    }

    /// Resolves a filesystem-indexed document id to the file it came from.
    pub fn file_path(&self, doc_id: DocId) -> Result<Option<PathBuf>> {
        Ok(self.store.hget(&keys::filemap(&self.name, doc_id), "path")?.map(PathBuf::from))
    }

    /// Ranked keyword search.
    ///
    /// Words are analysed with the index's own pipeline and OR-ed together;
    /// a document scores the sum of the hit counts of the terms it matched.
    /// Words prefixed with `-` remove every document containing them. A
    /// query made only of negated words returns the documents lacking the
    /// first of them.
    pub fn search(&self, phrase: &str, limit: usize) -> Result<SearchResults> {
        let started = Instant::now();
        let mut positive: Vec<(String, String)> = Vec::new();
        let mut negative: Vec<String> = Vec::new();
        for word in phrase.split_whitespace() {
            match word.strip_prefix('-') {
                Some(rest) => negative.extend(self.analyzer.stem_text(rest)),
                None => positive.extend(self.analyzer.tokens(word).into_iter().map(|t| {
                    let stem = self.analyzer.stem(&t);
                    (t, stem)
                })),
            }
        }

        let mut excluded = HashSet::new();
        for term in &negative {
            excluded.extend(self.postings(term)?.into_iter().map(|p| p.doc_id));
        }

        let mut scores: HashMap<DocId, u64> = HashMap::new();
        if positive.is_empty() {
            if let Some(first) = negative.first() {
                for doc_id in self.documents_for_where_keyword_not(first, false)? {
                    scores.insert(doc_id, 0);
                }
            }
        }
        let last = positive.len().saturating_sub(1);
        for (i, (token, stem)) in positive.iter().enumerate() {
            let as_you_type = self.config.as_you_type && i == last;
            let mut matched = self.lookup_term(if as_you_type { token } else { stem }, as_you_type, false)?;
            // A finished inflected word has no completion of its own; complete its stem.
            if as_you_type && matched.is_empty() && token != stem {
                matched = self.lookup_term(stem, true, false)?;
            }
            let postings = match matched.as_slice() {
                [] => continue,
                [only] => self.documents_for_strict_keyword(&only.term, false)?,
                many => self.documents_for_fuzzy_keyword(many, false)?,
            };
            for p in postings {
                *scores.entry(p.doc_id).or_insert(0) += p.hit_count;
            }
        }

        let mut hits: Vec<ScoredDocument> = scores
            .into_iter()
            .filter(|(doc_id, _)| !excluded.contains(doc_id))
            .map(|(doc_id, score)| ScoredDocument { doc_id, score })
            .collect();
        hits.sort_by(|a, b| b.score.cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
        let total_hits = hits.len();
        hits.truncate(limit);

        let execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        debug!(index = %self.name, phrase, total_hits, execution_time_ms, "search");
        Ok(SearchResults { hits, total_hits, execution_time_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{Document, FieldValue};
    use crate::stemmer::NoStemmer;
    use crate::store::MemoryStore;
    use crate::tokenizer::DefaultTokenizer;
    use crate::writer::IndexWriter;

    fn setup(docs: &[(i64, &str)]) -> (Arc<MemoryStore>, IndexReader) {
        let store = Arc::new(MemoryStore::new());
        let config = EngineConfig { stemmer: "no".into(), ..EngineConfig::in_memory() };
        let writer = IndexWriter::create(store.clone(), "q", &config).unwrap();
        for (id, body) in docs {
            writer.insert(&Document::new().with("id", FieldValue::Integer(*id)).with("body", (*body).into())).unwrap();
        }
        let analyzer = Analyzer::new(Box::new(DefaultTokenizer), Box::new(NoStemmer));
        let reader = IndexReader::with_analyzer(store.clone(), "q", QueryConfig::default(), analyzer).unwrap();
        (store, reader)
    }

    #[test]
    fn exact_lookup() {
        let (_, reader) = setup(&[(1, "run run"), (2, "run")]);
        let found = reader.lookup_term("run", false, false).unwrap();
        assert_eq!(found, vec![WordlistEntry { term: "run".into(), num_hits: 3, num_docs: 2 }]);
        assert!(reader.lookup_term("walk", false, false).unwrap().is_empty());
        assert_eq!(reader.count_word_in_wordlist("RUN").unwrap(), 3);
    }

    #[test]
    fn unknown_term_falls_back_to_fuzzy() {
        let (_, mut reader) = setup(&[(1, "run"), (2, "dog")]);
        reader.fuzziness(true);
        // "ra" shares no prefix with "run".
        assert!(reader.lookup_term("ran", false, false).unwrap().is_empty());

        reader.fuzzy_prefix_length(1);
        let found = reader.lookup_term("ran", false, false).unwrap();
        assert_eq!(found.iter().map(|e| e.term.as_str()).collect::<Vec<_>>(), vec!["run"]);

        reader.fuzzy_prefix_length(0);
        let found = reader.fuzzy_search("ran").unwrap();
        assert_eq!(found.iter().map(|m| (m.term.as_str(), m.distance)).collect::<Vec<_>>(), vec![("run", 1)]);
    }

    #[test]
    fn fuzzy_orders_by_distance_then_hits() {
        let (_, reader) = setup(&[(1, "house houses"), (2, "houses hose"), (3, "hose hose hose horse"), (4, "mouse")]);
        let found = reader.fuzzy_search("house").unwrap();
        let terms: Vec<(&str, usize)> = found.iter().map(|m| (m.term.as_str(), m.distance)).collect();
        // Among distance 1, hose (4 hits) beats houses (3) and horse (1); mouse lacks the "ho" prefix.
        assert_eq!(terms, vec![("house", 0), ("hose", 1), ("houses", 1), ("horse", 1)]);
        assert!(found.iter().all(|m| m.distance <= 2));
    }

    #[test]
    fn fuzzy_misses_edits_inside_the_prefix() {
        let (_, reader) = setup(&[(1, "cat")]);
        assert!(reader.fuzzy_search("bat").unwrap().is_empty());
    }

    #[test]
    fn as_you_type_prefers_short_then_frequent() {
        let (_, mut reader) = setup(&[(1, "program programming programs programs"), (2, "progress")]);
        reader.as_you_type(true);
        let found = reader.lookup_term("prog", true, false).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].term, "program");

        // Not the last word: exact lookup only.
        assert!(reader.lookup_term("prog", false, false).unwrap().is_empty());
    }

    #[test]
    fn strict_postings_are_sorted_and_capped() {
        let docs: Vec<(i64, &str)> = (1..=12).rev().map(|i| (i, "x")).collect();
        let (store, reader) = setup(&docs);
        let ids: Vec<DocId> = reader.documents_for_strict_keyword("x", false).unwrap().iter().map(|p| p.doc_id).collect();
        assert_eq!(ids, (1..=12).collect::<Vec<_>>());

        let capped = IndexReader::with_analyzer(
            store,
            "q",
            QueryConfig { max_docs: 5, ..QueryConfig::default() },
            Analyzer::new(Box::new(DefaultTokenizer), Box::new(NoStemmer)),
        )
        .unwrap();
        assert_eq!(capped.documents_for_strict_keyword("x", false).unwrap().len(), 5);
        assert_eq!(capped.documents_for_strict_keyword("x", true).unwrap().len(), 12);
    }

    #[test]
    fn fuzzy_documents_union_every_term() {
        let (_, mut reader) = setup(&[(1, "run"), (2, "ran"), (3, "dog"), (4, "run ran")]);
        reader.fuzzy_prefix_length(1);
        let entries: Vec<WordlistEntry> = reader.fuzzy_search("run").unwrap().into_iter().map(WordlistEntry::from).collect();
        let postings = reader.documents_for_fuzzy_keyword(&entries, false).unwrap();
        let mut pairs: Vec<(&str, DocId)> = postings.iter().map(|p| (p.term.as_str(), p.doc_id)).collect();
        pairs.sort();
        assert_eq!(pairs, vec![("ran", 2), ("ran", 4), ("run", 1), ("run", 4)]);

        reader.max_docs(3);
        assert_eq!(reader.documents_for_fuzzy_keyword(&["run", "ran"], false).unwrap().len(), 3);
        assert_eq!(reader.documents_for_fuzzy_keyword(&["run", "ran"], true).unwrap().len(), 4);
    }

    #[test]
    fn not_query() {
        let (_, reader) = setup(&[(1, "run dog"), (2, "run"), (3, "cat")]);
        // Scan order: cat:3, dog:1, run:1, run:2.
        assert_eq!(reader.documents_for_where_keyword_not("dog", false).unwrap(), vec![3, 2]);
        // Unknown keyword: nothing to exclude from.
        assert!(reader.documents_for_where_keyword_not("bird", false).unwrap().is_empty());
    }

    #[test]
    fn not_query_caps_candidates_unless_unbounded() {
        let (_, mut reader) = setup(&[(1, "run dog"), (2, "run"), (3, "cat")]);
        reader.max_docs(2);
        // Candidates are the first two distinct ids in scan order, 3 and 1.
        assert_eq!(reader.documents_for_where_keyword_not("dog", false).unwrap(), vec![3]);
        assert_eq!(reader.documents_for_where_keyword_not("dog", true).unwrap(), vec![3, 2]);
    }

    #[test]
    fn fuzzy_not_query_on_unknown_term_keeps_every_document() {
        let (_, mut reader) = setup(&[(1, "run dog"), (2, "run"), (3, "cat")]);
        reader.fuzziness(true);
        reader.fuzzy_prefix_length(0);
        // "dogs" resolves to "dog" through fuzzy fallback but has no postings of its own.
        assert_eq!(reader.documents_for_where_keyword_not("dogs", false).unwrap(), vec![3, 1, 2]);
        // No neighbour within distance: still empty.
        assert!(reader.documents_for_where_keyword_not("elephant", false).unwrap().is_empty());
    }

    #[test]
    fn search_ranks_by_accumulated_hits() {
        let (_, reader) = setup(&[(1, "rust rust"), (2, "rust systems systems"), (3, "python")]);
        let results = reader.search("rust systems", 10).unwrap();
        assert_eq!(results.ids(), vec![2, 1]);
        assert_eq!(results.hits[0].score, 3);
        assert_eq!(results.total_hits, 2);

        assert_eq!(reader.search("rust -systems", 10).unwrap().ids(), vec![1]);
        assert_eq!(reader.search("-systems", 10).unwrap().ids(), vec![1, 3]);
        assert!(reader.search("", 10).unwrap().ids().is_empty());
        assert_eq!(reader.search("rust", 1).unwrap().ids(), vec![1]);
        assert_eq!(reader.search("rust", 10).unwrap().with_min_score(2).ids(), vec![1]);
    }

    #[test]
    fn as_you_type_search_completes_the_stem_of_finished_words() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let config = EngineConfig::in_memory();
        let writer = IndexWriter::create(store.clone(), "p", &config).unwrap();
        writer.insert(&Document::new().with("id", FieldValue::Integer(1)).with("body", "running dogs".into())).unwrap();

        let mut reader = IndexReader::open(store, "p", &config).unwrap();
        assert_eq!(reader.search("running", 10).unwrap().ids(), vec![1]);
        reader.as_you_type(true);
        assert_eq!(reader.search("running", 10).unwrap().ids(), vec![1]);
        assert_eq!(reader.search("dogs", 10).unwrap().ids(), vec![1]);
        assert_eq!(reader.search("ru", 10).unwrap().ids(), vec![1]);
        assert!(reader.search("cats", 10).unwrap().ids().is_empty());
    }

    #[test]
    fn empty_index_returns_nothing() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let reader = IndexReader::open(store, "missing", &EngineConfig::in_memory()).unwrap();
        assert_eq!(reader.total_documents().unwrap(), 0);
        assert_eq!(reader.stemmer_name(), "porter");
        assert!(reader.search("anything", 10).unwrap().hits.is_empty());
        assert!(reader.documents_for_strict_keyword("anything", false).unwrap().is_empty());
    }
}
