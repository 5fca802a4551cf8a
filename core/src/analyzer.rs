use std::collections::HashSet;
use tracing::warn;

use crate::config::EngineConfig;
use crate::index::IndexInfo;
use crate::stemmer::{stemmer_for, Stemmer};
use crate::store::KvStore;
use crate::tokenizer::{decode_html_entities, stop_word_set, tokenizer_for, Tokenizer};
use crate::{Result, SearchError};

/// Text to stems: optional HTML entity decoding, tokenization with stop-word
/// removal, then stemming. Shared by the writer and the query engine so both
/// sides of an index agree on terms.
pub struct Analyzer {
    tokenizer: Box<dyn Tokenizer>,
    stemmer: Box<dyn Stemmer>,
    stop_words: HashSet<String>,
    decode_html_entities: bool,
}

impl Analyzer {
    pub fn new(tokenizer: Box<dyn Tokenizer>, stemmer: Box<dyn Stemmer>) -> Self {
        Self { tokenizer, stemmer, stop_words: HashSet::new(), decode_html_entities: false }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(config.build_tokenizer()?, config.build_stemmer()?)
            .with_stop_words(stop_word_set(&config.stop_words))
            .with_html_entity_decoding(config.decode_html_entities))
    }

    /// Like [`Analyzer::from_config`], except that the stemmer and tokenizer
    /// recorded in the index's info table take precedence. A recorded
    /// identifier the registries do not know (a custom stemmer, say) leaves
    /// the configured stage in place.
    pub fn for_index(store: &dyn KvStore, index: &str, config: &EngineConfig) -> Result<Self> {
        let mut analyzer = Self::from_config(config)?;
        let info = IndexInfo::load(store, index)?;
        if let Some(recorded) = info.stemmer.filter(|s| *s != analyzer.stemmer.name()) {
            match stemmer_for(&recorded) {
                Ok(stemmer) => {
                    warn!(index, recorded = %recorded, configured = %config.stemmer, "using the stemmer recorded in the index");
                    analyzer.stemmer = stemmer;
                }
                Err(SearchError::UnsupportedLanguage(_)) => {
                    warn!(index, recorded = %recorded, configured = %config.stemmer, "recorded stemmer is not registered, keeping the configured one");
                }
                Err(e) => return Err(e),
            }
        }
        if let Some(recorded) = info.tokenizer.filter(|t| *t != analyzer.tokenizer.name()) {
            match tokenizer_for(&recorded) {
                Ok(tokenizer) => {
                    warn!(index, recorded = %recorded, configured = %config.tokenizer, "using the tokenizer recorded in the index");
                    analyzer.tokenizer = tokenizer;
                }
                Err(SearchError::UnsupportedTokenizer(_)) => {
                    warn!(index, recorded = %recorded, configured = %config.tokenizer, "recorded tokenizer is not registered, keeping the configured one");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(analyzer)
    }

    pub fn with_stop_words(mut self, stop_words: HashSet<String>) -> Self {
        self.stop_words = stop_words;
        self
    }

    pub fn with_html_entity_decoding(mut self, enabled: bool) -> Self {
        self.decode_html_entities = enabled;
        self
    }

    pub fn set_stemmer(&mut self, stemmer: Box<dyn Stemmer>) {
        self.stemmer = stemmer;
    }

    pub fn set_tokenizer(&mut self, tokenizer: Box<dyn Tokenizer>) {
        self.tokenizer = tokenizer;
    }

    pub fn stemmer_name(&self) -> &'static str {
        self.stemmer.name()
    }

    pub fn tokenizer_name(&self) -> &'static str {
        self.tokenizer.name()
    }

    /// Tokens before stemming.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        if self.decode_html_entities {
            self.tokenizer.tokenize(&decode_html_entities(text), &self.stop_words)
        } else {
            self.tokenizer.tokenize(text, &self.stop_words)
        }
    }

    pub fn stem(&self, token: &str) -> String {
        self.stemmer.stem(token)
    }

    pub fn stem_text(&self, text: &str) -> Vec<String> {
        self.tokens(text).iter().map(|t| self.stem(t)).collect()
    }
}
