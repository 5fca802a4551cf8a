//! Full-text search over a hash-per-key store.
//!
//! Documents are analysed into stems and kept as three tables under an index
//! name: a wordlist of per-term statistics, a doclist of per-document
//! postings and an info table. [`IndexWriter`] maintains them incrementally;
//! [`IndexReader`] answers exact, fuzzy, as-you-type and negated queries.

pub mod analyzer;
pub mod collection;
pub mod config;
pub mod error;
pub mod fuzzy;
pub mod index;
pub mod reader;
pub mod source;
pub mod stemmer;
pub mod store;
pub mod tokenizer;
pub mod writer;

pub use analyzer::Analyzer;
pub use collection::{Collection, Document, FieldValue};
pub use config::{Driver, EngineConfig, ExtensionFilter, QueryConfig};
pub use error::{Result, SearchError};
pub use index::{DocId, FuzzyMatch, IndexInfo, Posting, WordlistEntry};
pub use reader::{IndexReader, ScoredDocument, SearchResults};
pub use source::{DocumentSource, FileFilter, FileSystemSource, RowSource, SourceDocument};
pub use stemmer::{stemmer_for, Stemmer};
pub use store::{connect, KvStore, MemoryStore, SledStore};
pub use tokenizer::{tokenizer_for, Tokenizer};
pub use writer::{BatchReport, IndexWriter, SkippedDocument};
