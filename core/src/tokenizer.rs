use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

use crate::{Result, SearchError};

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*|\p{N}+").expect("valid regex");
    static ref ENGLISH_STOP_WORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Marker accepted in a configured stop-word list to pull in the built-in
/// English list.
pub const ENGLISH_STOP_WORDS_MARKER: &str = "@english";

/// Built-in English stop words.
pub fn english_stop_words() -> HashSet<String> {
    ENGLISH_STOP_WORDS.iter().map(|w| w.to_string()).collect()
}

/// Expands a configured stop-word list into a lowercase set.
pub fn stop_word_set(configured: &[String]) -> HashSet<String> {
    let mut set = HashSet::new();
    for word in configured {
        if word == ENGLISH_STOP_WORDS_MARKER {
            set.extend(english_stop_words());
        } else {
            set.insert(word.to_lowercase());
        }
    }
    set
}

/// Splits raw text into normalized tokens.
pub trait Tokenizer: Send + Sync {
    /// Registry identifier, recorded in the index info table.
    fn name(&self) -> &'static str;

    fn tokenize(&self, text: &str, stop_words: &HashSet<String>) -> Vec<String>;
}

/// Word tokenizer: NFKC normalization, lowercase, unicode word boundaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTokenizer;

impl Tokenizer for DefaultTokenizer {
    fn name(&self) -> &'static str {
        "default"
    }

    fn tokenize(&self, text: &str, stop_words: &HashSet<String>) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        WORD_RE
            .find_iter(&normalized)
            .map(|m| m.as_str())
            .filter(|token| !stop_words.contains(*token))
            .map(str::to_string)
            .collect()
    }
}

/// Character n-gram tokenizer over the words produced by [`DefaultTokenizer`].
/// Words shorter than `n` are kept whole.
#[derive(Debug, Clone, Copy)]
pub struct NGramTokenizer {
    pub n: usize,
}

impl Default for NGramTokenizer {
    fn default() -> Self {
        Self { n: 3 }
    }
}

impl Tokenizer for NGramTokenizer {
    /// `ngram` for the default width, `ngram<n>` otherwise. Widths outside
    /// 1..=5 have no registry entry.
    fn name(&self) -> &'static str {
        match self.n {
            1 => "ngram1",
            2 => "ngram2",
            3 => "ngram",
            4 => "ngram4",
            5 => "ngram5",
            _ => "ngram-custom",
        }
    }

    fn tokenize(&self, text: &str, stop_words: &HashSet<String>) -> Vec<String> {
        let n = self.n.max(1);
        let mut grams = Vec::new();
        for word in DefaultTokenizer.tokenize(text, stop_words) {
            let chars: Vec<char> = word.chars().collect();
            if chars.len() <= n {
                grams.push(word);
                continue;
            }
            grams.extend(chars.windows(n).map(|w| w.iter().collect::<String>()));
        }
        grams
    }
}

/// Resolves a tokenizer identifier.
pub fn tokenizer_for(name: &str) -> Result<Box<dyn Tokenizer>> {
    match name.trim().to_lowercase().as_str() {
        "" | "default" => Ok(Box::new(DefaultTokenizer)),
        "ngram" | "ngram3" => Ok(Box::new(NGramTokenizer::default())),
        "ngram1" => Ok(Box::new(NGramTokenizer { n: 1 })),
        "ngram2" => Ok(Box::new(NGramTokenizer { n: 2 })),
        "ngram4" => Ok(Box::new(NGramTokenizer { n: 4 })),
        "ngram5" => Ok(Box::new(NGramTokenizer { n: 5 })),
        _ => Err(SearchError::UnsupportedTokenizer(name.to_string())),
    }
}

/// Decodes HTML entities (`&amp;`, `&#233;`, ...) ahead of tokenization.
pub fn decode_html_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}
