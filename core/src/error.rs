use std::path::PathBuf;

/// Errors raised by the indexing and query engine.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Missing or invalid driver, connection parameters or index name.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backing store cannot be opened or written.
    #[error("storage unavailable during {operation} at {}: {reason}", location.display())]
    StorageUnavailable {
        operation: &'static str,
        location: PathBuf,
        reason: String,
    },

    #[error("language stemmer for [{0}] does not exist")]
    UnsupportedLanguage(String),

    #[error("tokenizer [{0}] does not exist")]
    UnsupportedTokenizer(String),

    /// A single document could not be turned into postings.
    #[error("invalid document: {reason}")]
    InvalidDocument { reason: String },

    /// A store operation failed on a specific key.
    #[error("store error during {operation} on key `{key}`: {reason}")]
    Store {
        operation: &'static str,
        key: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SearchError {
    pub(crate) fn store(operation: &'static str, key: &str, reason: impl ToString) -> Self {
        SearchError::Store { operation, key: key.to_string(), reason: reason.to_string() }
    }

    pub(crate) fn invalid_document(reason: impl Into<String>) -> Self {
        SearchError::InvalidDocument { reason: reason.into() }
    }

    /// Whether the error aborts a whole batch rather than a single document.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SearchError::InvalidDocument { .. } | SearchError::Json(_))
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = SearchError::store("hincrby", "idx:wordlist:run", "not an integer");
        let msg = err.to_string();
        assert!(msg.contains("hincrby"));
        assert!(msg.contains("idx:wordlist:run"));

        let err = SearchError::StorageUnavailable {
            operation: "open",
            location: PathBuf::from("/nowhere"),
            reason: "permission denied".into(),
        };
        assert!(err.to_string().contains("/nowhere"));
    }

    #[test]
    fn document_errors_are_not_fatal() {
        assert!(!SearchError::invalid_document("missing id").is_fatal());
        assert!(SearchError::Configuration("driver".into()).is_fatal());
        assert!(SearchError::UnsupportedLanguage("klingon".into()).is_fatal());
    }
}
