//! Language stemmers.
//!
//! A stemmer is a pure function from a lowercase token to its stem. Every
//! implementation returns the token unchanged when it does not recognise the
//! script, so foreign words pass through the pipeline untouched.

mod ukrainian;

pub use ukrainian::UkrainianStemmer;

use rust_stemmers::Algorithm;

use crate::{Result, SearchError};

pub trait Stemmer: Send + Sync {
    /// Registry identifier, recorded in the index info table.
    fn name(&self) -> &'static str;

    fn stem(&self, token: &str) -> String;
}

/// Identity stemmer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStemmer;

impl Stemmer for NoStemmer {
    fn name(&self) -> &'static str {
        "no"
    }

    fn stem(&self, token: &str) -> String {
        token.to_string()
    }
}

/// Snowball stemmer for one of the languages bundled with `rust-stemmers`.
pub struct SnowballStemmer {
    name: &'static str,
    inner: rust_stemmers::Stemmer,
}

impl SnowballStemmer {
    pub fn new(name: &'static str, algorithm: Algorithm) -> Self {
        Self { name, inner: rust_stemmers::Stemmer::create(algorithm) }
    }
}

impl Stemmer for SnowballStemmer {
    fn name(&self) -> &'static str {
        self.name
    }

    fn stem(&self, token: &str) -> String {
        self.inner.stem(token).into_owned()
    }
}

const SNOWBALL: &[(&str, Algorithm)] = &[
    ("porter", Algorithm::English),
    ("arabic", Algorithm::Arabic),
    ("danish", Algorithm::Danish),
    ("dutch", Algorithm::Dutch),
    ("finnish", Algorithm::Finnish),
    ("french", Algorithm::French),
    ("german", Algorithm::German),
    ("greek", Algorithm::Greek),
    ("hungarian", Algorithm::Hungarian),
    ("italian", Algorithm::Italian),
    ("norwegian", Algorithm::Norwegian),
    ("portuguese", Algorithm::Portuguese),
    ("romanian", Algorithm::Romanian),
    ("russian", Algorithm::Russian),
    ("spanish", Algorithm::Spanish),
    ("swedish", Algorithm::Swedish),
    ("tamil", Algorithm::Tamil),
    ("turkish", Algorithm::Turkish),
];

/// Resolves a stemmer identifier (case-insensitive).
pub fn stemmer_for(language: &str) -> Result<Box<dyn Stemmer>> {
    let key = language.trim().to_lowercase();
    let key = match key.as_str() {
        "english" => "porter",
        other => other,
    };
    match key {
        "no" | "none" => Ok(Box::new(NoStemmer)),
        "ukrainian" => Ok(Box::new(UkrainianStemmer)),
        _ => SNOWBALL
            .iter()
            .find(|(name, _)| *name == key)
            .map(|&(name, algorithm)| Box::new(SnowballStemmer::new(name, algorithm)) as Box<dyn Stemmer>)
            .ok_or_else(|| SearchError::UnsupportedLanguage(language.to_string())),
    }
}
