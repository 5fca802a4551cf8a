use regex::Regex;

use crate::{Result, SearchError};

/// Compiled glob over store keys. `*` matches any run of characters, `?`
/// exactly one; everything else is literal.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    prefix: String,
    re: Regex,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let prefix: String = pattern.chars().take_while(|c| *c != '*' && *c != '?').collect();
        let mut src = String::with_capacity(pattern.len() + 8);
        src.push('^');
        let mut literal = String::new();
        for c in pattern.chars() {
            match c {
                '*' | '?' => {
                    src.push_str(&regex::escape(&literal));
                    literal.clear();
                    src.push_str(if c == '*' { "(?s:.*)" } else { "(?s:.)" });
                }
                _ => literal.push(c),
            }
        }
        src.push_str(&regex::escape(&literal));
        src.push('$');
        let re = Regex::new(&src).map_err(|e| SearchError::store("keys", pattern, e))?;
        Ok(Self { prefix, re })
    }

    /// Literal text every matching key starts with; bounds the scan.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, key: &str) -> bool {
        key.starts_with(&self.prefix) && self.re.is_match(key)
    }
}
