//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::stemmer::{stemmer_for, Stemmer};
use crate::tokenizer::{tokenizer_for, Tokenizer};
use crate::{Result, SearchError};

/// Backing store selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    Sled,
    Memory,
}

impl std::str::FromStr for Driver {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sled" => Ok(Driver::Sled),
            "memory" => Ok(Driver::Memory),
            other => Err(SearchError::Configuration(format!("unsupported driver [{other}]"))),
        }
    }
}

/// Which files a filesystem walk picks up: a list of extensions, or a
/// filename suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionFilter {
    List(Vec<String>),
    Suffix(String),
}

/// Query-time matching knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Fall back to edit-distance matching when a term is unknown.
    pub fuzziness: bool,
    /// Complete the last query word by prefix.
    pub as_you_type: bool,
    pub fuzzy_prefix_length: usize,
    pub fuzzy_distance: usize,
    /// Cap on documents returned by unbounded postings scans.
    pub max_docs: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { fuzziness: false, as_you_type: false, fuzzy_prefix_length: 2, fuzzy_distance: 2, max_docs: 500 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub driver: Driver,
    /// Store location; required by the sled driver.
    pub storage: Option<PathBuf>,
    pub stemmer: String,
    pub tokenizer: String,
    pub primary_key: String,
    /// Index the primary key field like any other field.
    pub include_primary_key: bool,
    /// Stop words; `@english` expands to the built-in list.
    pub stop_words: Vec<String>,
    pub decode_html_entities: bool,
    /// Progress is logged every `steps` documents.
    pub steps: usize,
    /// Documents pulled from a source per page.
    pub page_size: usize,
    /// Filesystem source only: directory to walk.
    pub location: Option<PathBuf>,
    /// Filesystem source only: paths, relative to the root, to skip.
    pub exclude: Vec<String>,
    /// Filesystem source only.
    pub extension: Option<ExtensionFilter>,
    pub query: QueryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            driver: Driver::default(),
            storage: None,
            stemmer: "porter".to_string(),
            tokenizer: "default".to_string(),
            primary_key: "id".to_string(),
            include_primary_key: false,
            stop_words: Vec::new(),
            decode_html_entities: false,
            steps: 1000,
            page_size: 500,
            location: None,
            exclude: Vec::new(),
            extension: None,
            query: QueryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn in_memory() -> Self {
        Self { driver: Driver::Memory, ..Self::default() }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Checks everything that can be checked without touching the store.
    pub fn validate(&self) -> Result<()> {
        if self.driver == Driver::Sled && self.storage.is_none() {
            return Err(SearchError::Configuration("the sled driver requires a storage path".into()));
        }
        if self.primary_key.trim().is_empty() {
            return Err(SearchError::Configuration("primary key must not be empty".into()));
        }
        if self.steps == 0 || self.page_size == 0 {
            return Err(SearchError::Configuration("steps and page_size must be positive".into()));
        }
        self.build_stemmer()?;
        self.build_tokenizer()?;
        Ok(())
    }

    pub fn build_stemmer(&self) -> Result<Box<dyn Stemmer>> {
        stemmer_for(&self.stemmer)
    }

    pub fn build_tokenizer(&self) -> Result<Box<dyn Tokenizer>> {
        tokenizer_for(&self.tokenizer)
    }
}

/// Index names become key prefixes, so they cannot contain the key
/// separator or glob characters.
pub fn validate_index_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(&[':', '*', '?'][..]) {
        return Err(SearchError::Configuration(format!("invalid index name `{name}`")));
    }
    Ok(())
}
