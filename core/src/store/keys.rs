//! Composite key layout.
//!
//! ```text
//! <index>:info                      total_documents, stemmer, tokenizer
//! <index>:wordlist:<term>           num_hits, num_docs
//! <index>:doclist:<term>:<doc_id>   num_hits
//! <index>:filemap:<doc_id>          id, path
//! ```

use crate::DocId;

pub fn info(index: &str) -> String {
    format!("{index}:info")
}

pub fn wordlist(index: &str, term: &str) -> String {
    format!("{index}:wordlist:{term}")
}

pub fn wordlist_prefix(index: &str, prefix: &str) -> String {
    format!("{index}:wordlist:{prefix}*")
}

pub fn doclist(index: &str, term: &str, doc_id: DocId) -> String {
    format!("{index}:doclist:{term}:{doc_id}")
}

pub fn doclist_for_term(index: &str, term: &str) -> String {
    format!("{index}:doclist:{term}:*")
}

pub fn doclist_for_doc(index: &str, doc_id: DocId) -> String {
    format!("{index}:doclist:*:{doc_id}")
}

pub fn all_doclists(index: &str) -> String {
    format!("{index}:doclist:*")
}

pub fn filemap(index: &str, doc_id: DocId) -> String {
    format!("{index}:filemap:{doc_id}")
}

pub fn all(index: &str) -> String {
    format!("{index}:*")
}

/// Term of a wordlist key.
pub fn term_of_wordlist<'a>(index: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(index)?.strip_prefix(":wordlist:")
}

/// `(term, doc_id)` of a doclist key.
pub fn parse_doclist<'a>(index: &str, key: &'a str) -> Option<(&'a str, DocId)> {
    let rest = key.strip_prefix(index)?.strip_prefix(":doclist:")?;
    let (term, id) = rest.rsplit_once(':')?;
    Some((term, id.parse().ok()?))
}
