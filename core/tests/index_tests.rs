use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::sync::Arc;

use kvsearch::store::keys;
use kvsearch::tokenizer::DefaultTokenizer;
use kvsearch::{
    Analyzer, DocId, Document, EngineConfig, FieldValue, FileFilter, FileSystemSource, IndexReader, IndexWriter,
    KvStore, MemoryStore, QueryConfig, RowSource, SledStore, Stemmer,
};
use tempfile::tempdir;

/// Collapses the handful of inflections used below.
struct TestStemmer;

impl Stemmer for TestStemmer {
    fn name(&self) -> &'static str {
        "test"
    }

    fn stem(&self, token: &str) -> String {
        match token {
            "running" | "runner" => "run".to_string(),
            "dogs" => "dog".to_string(),
            other => other.to_string(),
        }
    }
}

fn analyzer() -> Analyzer {
    Analyzer::new(Box::new(DefaultTokenizer), Box::new(TestStemmer))
}

fn doc(id: i64, body: &str) -> Document {
    Document::new().with("id", FieldValue::Integer(id)).with("body", body.into())
}

fn writer(store: Arc<MemoryStore>) -> IndexWriter {
    let config = EngineConfig { stemmer: "no".into(), ..EngineConfig::in_memory() };
    let mut writer = IndexWriter::create(store, "posts", &config).unwrap();
    writer.set_stemmer(Box::new(TestStemmer)).unwrap();
    writer
}

fn reader(store: Arc<MemoryStore>, query: QueryConfig) -> IndexReader {
    IndexReader::with_analyzer(store, "posts", query, analyzer()).unwrap()
}

fn doc_ids(reader: &IndexReader, term: &str) -> Vec<DocId> {
    reader.documents_for_strict_keyword(term, false).unwrap().iter().map(|p| p.doc_id).collect()
}

/// Checks the wordlist and info counters against the doclist.
fn assert_counters_consistent(store: &MemoryStore, index: &str) {
    let mut docs_per_term: HashMap<String, BTreeSet<DocId>> = HashMap::new();
    let mut live_docs = BTreeSet::new();
    for key in store.keys(&keys::all_doclists(index)).unwrap() {
        let (term, doc_id) = keys::parse_doclist(index, &key).unwrap();
        docs_per_term.entry(term.to_string()).or_default().insert(doc_id);
        live_docs.insert(doc_id);
    }
    for key in store.keys(&keys::wordlist_prefix(index, "")).unwrap() {
        let term = keys::term_of_wordlist(index, &key).unwrap();
        let num_docs: usize = store.hget(&key, "num_docs").unwrap().unwrap().parse().unwrap();
        assert_eq!(num_docs, docs_per_term.get(term).map_or(0, |d| d.len()), "num_docs of {term}");
    }
    for term in docs_per_term.keys() {
        assert!(store.exists(&keys::wordlist(index, term)).unwrap(), "wordlist entry for {term}");
    }
    let total: usize = store.hget(&keys::info(index), "total_documents").unwrap().unwrap().parse().unwrap();
    assert_eq!(total, live_docs.len());
}

#[test]
fn insert_then_query_collapsed_terms() {
    let store = Arc::new(MemoryStore::new());
    let w = writer(store.clone());
    w.insert(&doc(1, "running dogs")).unwrap();
    w.insert(&doc(2, "runner dog")).unwrap();

    let r = reader(store.clone(), QueryConfig::default());
    let run = r.word_from_wordlist("run").unwrap().unwrap();
    assert_eq!((run.num_docs, run.num_hits), (2, 2));
    assert_eq!(doc_ids(&r, "run"), vec![1, 2]);
    assert_eq!(r.search("running", 10).unwrap().ids(), vec![1, 2]);
    assert_eq!(r.total_documents().unwrap(), 2);
}

#[test]
fn delete_updates_statistics() {
    let store = Arc::new(MemoryStore::new());
    let w = writer(store.clone());
    w.insert(&doc(1, "running dogs")).unwrap();
    w.insert(&doc(2, "runner dog")).unwrap();
    assert!(w.delete(1).unwrap());

    let r = reader(store.clone(), QueryConfig::default());
    let run = r.word_from_wordlist("run").unwrap().unwrap();
    assert_eq!((run.num_docs, run.num_hits), (1, 1));
    assert_eq!(doc_ids(&r, "run"), vec![2]);
    assert_counters_consistent(&store, "posts");
}

#[test]
fn fuzzy_lookup_stays_within_distance() {
    let store = Arc::new(MemoryStore::new());
    let w = writer(store.clone());
    w.insert(&doc(1, "running dogs")).unwrap();
    w.insert(&doc(2, "runner dog")).unwrap();

    let query = QueryConfig { fuzziness: true, fuzzy_prefix_length: 0, ..QueryConfig::default() };
    let r = reader(store, query);
    let matches = r.fuzzy_search("ran").unwrap();
    assert_eq!(matches.iter().map(|m| m.term.as_str()).collect::<Vec<_>>(), vec!["run"]);
    assert!(matches.iter().all(|m| m.distance <= 2));
    assert!(matches.windows(2).all(|w| (w[0].distance, std::cmp::Reverse(w[0].num_hits))
        <= (w[1].distance, std::cmp::Reverse(w[1].num_hits))));

    let found = r.lookup_term("ran", false, false).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].term, "run");
}

#[test]
fn not_query_excludes_every_holder() {
    let store = Arc::new(MemoryStore::new());
    let w = writer(store.clone());
    w.insert(&doc(1, "running dogs")).unwrap();
    w.insert(&doc(2, "runner dog")).unwrap();

    let r = reader(store, QueryConfig::default());
    assert!(r.documents_for_where_keyword_not("dog", false).unwrap().is_empty());
    assert!(r.documents_for_where_keyword_not("cat", false).unwrap().is_empty());
}

#[test]
fn insert_then_delete_restores_state() {
    let store = Arc::new(MemoryStore::new());
    let w = writer(store.clone());
    w.insert(&doc(1, "running dogs in the park")).unwrap();
    let before = store.snapshot();

    w.insert(&doc(2, "dogs running after other dogs")).unwrap();
    assert_ne!(store.snapshot(), before);
    assert!(w.delete(2).unwrap());
    assert_eq!(store.snapshot(), before);
}

#[test]
fn delete_twice_is_a_noop() {
    let store = Arc::new(MemoryStore::new());
    let w = writer(store.clone());
    w.insert(&doc(1, "running dogs")).unwrap();
    w.insert(&doc(2, "runner dog")).unwrap();

    assert!(w.delete(2).unwrap());
    let after_first = store.snapshot();
    assert!(!w.delete(2).unwrap());
    assert_eq!(store.snapshot(), after_first);
}

#[test]
fn counters_track_postings_through_mixed_operations() {
    let store = Arc::new(MemoryStore::new());
    let w = writer(store.clone());
    for (id, body) in [(1, "alpha beta"), (2, "beta gamma gamma"), (3, "alpha running"), (4, "dogs")] {
        w.insert(&doc(id, body)).unwrap();
    }
    assert_counters_consistent(&store, "posts");

    w.update(2, &doc(2, "delta")).unwrap();
    assert_counters_consistent(&store, "posts");

    w.delete(3).unwrap();
    w.delete(3).unwrap();
    assert_counters_consistent(&store, "posts");

    w.update(4, &doc(4, "alpha alpha")).unwrap();
    w.delete(1).unwrap();
    assert_counters_consistent(&store, "posts");
    assert!(!store.exists(&keys::wordlist("posts", "beta")).unwrap());
    assert!(!store.exists(&keys::wordlist("posts", "gamma")).unwrap());
}

#[test]
fn resubmitted_batch_replaces_documents() {
    let store = Arc::new(MemoryStore::new());
    let w = writer(store.clone());
    let batch = vec![doc(1, "alpha beta"), doc(2, "beta"), doc(1, "alpha")];
    assert_eq!(w.insert_batch(&batch).unwrap().indexed, 3);
    assert_counters_consistent(&store, "posts");
    assert!(!store.exists(&keys::doclist("posts", "beta", 1)).unwrap());

    w.insert_batch(&batch).unwrap();
    assert_counters_consistent(&store, "posts");

    w.delete(1).unwrap();
    assert_counters_consistent(&store, "posts");
    assert!(!store.exists(&keys::wordlist("posts", "alpha")).unwrap());
}

#[test]
fn index_with_custom_stemmer_reopens() {
    let store = Arc::new(MemoryStore::new());
    let w = writer(store.clone());
    w.insert(&doc(1, "running dogs")).unwrap();

    let config = EngineConfig { stemmer: "no".into(), ..EngineConfig::in_memory() };
    let r = IndexReader::open(store.clone(), "posts", &config).unwrap();
    assert_eq!(r.info().unwrap().stemmer.as_deref(), Some("test"));
    assert_eq!(r.stemmer_name(), "no");
    assert_eq!(r.search("run", 10).unwrap().ids(), vec![1]);

    let reopened = IndexWriter::open(store.clone(), "posts", &config).unwrap();
    assert_eq!(reopened.analyzer().stemmer_name(), "no");
}

#[test]
fn indexes_survive_reopening_sled() {
    let dir = tempdir().unwrap();
    let config = EngineConfig { storage: Some(dir.path().join("store")), ..EngineConfig::default() };
    {
        let store: Arc<dyn KvStore> = Arc::new(SledStore::open(dir.path().join("store")).unwrap());
        let w = IndexWriter::create(store.clone(), "articles", &config).unwrap();
        w.insert(&doc(1, "Running dogs")).unwrap();
        w.insert(&doc(2, "Sleeping cats")).unwrap();
        store.flush().unwrap();
    }

    let store = kvsearch::connect(&config).unwrap();
    let r = IndexReader::open(store, "articles", &config).unwrap();
    assert_eq!(r.total_documents().unwrap(), 2);
    assert_eq!(r.info().unwrap().stemmer.as_deref(), Some("porter"));
    assert_eq!(r.search("dog", 10).unwrap().ids(), vec![1]);
    assert_eq!(r.search("cat running", 10).unwrap().ids(), vec![1, 2]);
}

#[test]
fn runs_rows_and_reports_skips() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("rows.jsonl");
    fs::write(&input, "{\"id\":1,\"title\":\"first post\"}\n{\"title\":\"no id\"}\n{\"id\":3,\"title\":\"third post\"}\n").unwrap();

    let store = Arc::new(MemoryStore::new());
    let config = EngineConfig { stemmer: "no".into(), steps: 1, page_size: 2, ..EngineConfig::in_memory() };
    let w = IndexWriter::create(store.clone(), "rows", &config).unwrap();
    let report = w.run(&RowSource::from_path(&input).unwrap()).unwrap();
    assert_eq!(report.indexed, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].position, 1);

    let r = IndexReader::open(store, "rows", &config).unwrap();
    assert_eq!(r.total_documents().unwrap(), 2);
    assert_eq!(r.search("post", 10).unwrap().ids(), vec![1, 3]);
}

#[test]
fn filesystem_run_records_file_paths() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("docs");
    fs::create_dir_all(root.join("nested")).unwrap();
    fs::write(root.join("a.txt"), "tokio runtime").unwrap();
    fs::write(root.join("nested/b.txt"), "sled storage").unwrap();
    fs::write(root.join("notes.md"), "tokio notes").unwrap();

    let store = Arc::new(MemoryStore::new());
    let config = EngineConfig { stemmer: "no".into(), ..EngineConfig::in_memory() };
    let w = IndexWriter::create(store.clone(), "files", &config).unwrap();
    let source = FileSystemSource::new(&root, FileFilter::Extensions(vec!["txt".into()]));
    assert_eq!(w.run(&source).unwrap().indexed, 2);

    let r = IndexReader::open(store, "files", &config).unwrap();
    let hits = r.search("tokio", 10).unwrap();
    assert_eq!(hits.ids(), vec![1]);
    assert_eq!(r.file_path(1).unwrap(), Some(root.join("a.txt")));
    assert_eq!(r.file_path(2).unwrap(), Some(root.join("nested/b.txt")));
    assert_eq!(r.file_path(3).unwrap(), None);
}
