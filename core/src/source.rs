//! Document sources.
//!
//! A source is a restartable, finite sequence of documents. Row sources read
//! JSON objects (one per row of a result set); the filesystem source walks a
//! directory and turns every selected file into `{id, name, content}`.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use walkdir::WalkDir;

use crate::collection::{Document, FieldValue};
use crate::config::{EngineConfig, ExtensionFilter};
use crate::{Result, SearchError};

/// One document pulled from a source.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub document: Document,
    /// File the document was read from, when it came from a filesystem walk.
    pub origin: Option<PathBuf>,
}

impl SourceDocument {
    pub fn row(document: Document) -> Self {
        Self { document, origin: None }
    }
}

pub type Documents<'a> = Box<dyn Iterator<Item = Result<SourceDocument>> + 'a>;

pub trait DocumentSource {
    /// Starts a fresh pass over the source.
    fn documents(&self) -> Result<Documents<'_>>;
}

enum Rows {
    Files(Vec<PathBuf>),
    Inline(Vec<Document>),
    Values(Vec<serde_json::Value>),
}

/// JSON array or JSON Lines input; a directory is searched for `.json` and
/// `.jsonl` files.
pub struct RowSource {
    rows: Rows,
}

impl RowSource {
    pub fn from_path<P: AsRef<Path>>(input: P) -> Result<Self> {
        let input = input.as_ref();
        let mut files = Vec::new();
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
                let p = entry.path();
                if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                    files.push(p.to_path_buf());
                }
            }
        } else if input.is_file() {
            files.push(input.to_path_buf());
        } else {
            return Err(SearchError::Configuration(format!("input {} does not exist", input.display())));
        }
        Ok(Self { rows: Rows::Files(files) })
    }

    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { rows: Rows::Inline(documents) }
    }

    /// Rows already parsed from JSON; a row that is not an object fails on
    /// its own.
    pub fn from_values(values: Vec<serde_json::Value>) -> Self {
        Self { rows: Rows::Values(values) }
    }
}

fn read_rows(path: &Path) -> Documents<'static> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => return Box::new(std::iter::once(Err(e.into()))),
    };
    if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        return Box::new(
            BufReader::new(file)
                .lines()
                .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
                .map(|line| -> Result<SourceDocument> {
                    let value: serde_json::Value = serde_json::from_str(&line?)?;
                    Document::from_json(value).map(SourceDocument::row)
                }),
        );
    }
    match serde_json::from_reader::<_, serde_json::Value>(BufReader::new(file)) {
        Ok(serde_json::Value::Array(rows)) => {
            Box::new(rows.into_iter().map(|v| Document::from_json(v).map(SourceDocument::row)))
        }
        Ok(value) => Box::new(std::iter::once(Document::from_json(value).map(SourceDocument::row))),
        Err(e) => Box::new(std::iter::once(Err(e.into()))),
    }
}

impl DocumentSource for RowSource {
    fn documents(&self) -> Result<Documents<'_>> {
        match &self.rows {
            Rows::Files(files) => Ok(Box::new(files.iter().flat_map(|f| read_rows(f)))),
            Rows::Inline(docs) => Ok(Box::new(docs.iter().cloned().map(|d| Ok(SourceDocument::row(d))))),
            Rows::Values(values) => {
                Ok(Box::new(values.iter().cloned().map(|v| Document::from_json(v).map(SourceDocument::row))))
            }
        }
    }
}

pub type FieldPredicate = Arc<dyn Fn(&str, &FieldValue) -> bool + Send + Sync>;
pub type FieldMapper = Arc<dyn Fn(&str, &FieldValue) -> FieldValue + Send + Sync>;

/// Decides whether a file is indexed.
#[derive(Clone)]
pub enum FileFilter {
    /// Extension without the dot, e.g. `txt`.
    Extensions(Vec<String>),
    /// Suffix of the path relative to the root.
    Suffix(String),
    Predicate(Arc<dyn Fn(&Path) -> bool + Send + Sync>),
}

impl FileFilter {
    fn accepts(&self, path: &Path, name: &str) -> bool {
        match self {
            FileFilter::Extensions(exts) => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| exts.iter().any(|x| x.trim_start_matches('.') == ext)),
            FileFilter::Suffix(suffix) => name.ends_with(suffix.as_str()),
            FileFilter::Predicate(f) => f(path),
        }
    }
}

impl From<&ExtensionFilter> for FileFilter {
    fn from(filter: &ExtensionFilter) -> Self {
        match filter {
            ExtensionFilter::List(exts) => FileFilter::Extensions(exts.clone()),
            ExtensionFilter::Suffix(s) => FileFilter::Suffix(s.clone()),
        }
    }
}

/// Recursive directory walk. Ids are assigned in walk order starting at 1,
/// and the walk is sorted by file name so they are stable across runs.
pub struct FileSystemSource {
    root: PathBuf,
    filter: FileFilter,
    exclude: HashSet<String>,
    field_filter: Option<FieldPredicate>,
    field_map: Option<FieldMapper>,
}

impl FileSystemSource {
    pub fn new<P: AsRef<Path>>(root: P, filter: FileFilter) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            filter,
            exclude: HashSet::new(),
            field_filter: None,
            field_map: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let root = config
            .location
            .as_ref()
            .ok_or_else(|| SearchError::Configuration("filesystem indexing requires a location".into()))?;
        let filter = config
            .extension
            .as_ref()
            .map(FileFilter::from)
            .ok_or_else(|| SearchError::Configuration("filesystem indexing requires an extension filter".into()))?;
        Ok(Self::new(root, filter).exclude(config.exclude.iter().cloned()))
    }

    pub fn exclude<I: IntoIterator<Item = String>>(mut self, paths: I) -> Self {
        self.exclude.extend(paths);
        self
    }

    /// Drops fields of every file document for which `keep` returns false.
    pub fn with_field_filter(mut self, keep: FieldPredicate) -> Self {
        self.field_filter = Some(keep);
        self
    }

    /// Rewrites every field value of every file document.
    pub fn with_field_map(mut self, map: FieldMapper) -> Self {
        self.field_map = Some(map);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative_name(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
    }

    fn load(&self, id: u64, name: String, path: &Path) -> Result<SourceDocument> {
        let bytes = std::fs::read(path)
            .map_err(|e| SearchError::invalid_document(format!("cannot read {}: {e}", path.display())))?;
        let mut document = Document::new()
            .with("id", FieldValue::from(id))
            .with("name", FieldValue::Text(name))
            .with("content", FieldValue::Text(String::from_utf8_lossy(&bytes).into_owned()));
        if let Some(keep) = &self.field_filter {
            document = document.filter(|k, v| keep(k, v));
        }
        if let Some(map) = &self.field_map {
            document = document.map(|k, v| map(k, v));
        }
        Ok(SourceDocument { document, origin: Some(path.to_path_buf()) })
    }
}

impl DocumentSource for FileSystemSource {
    fn documents(&self) -> Result<Documents<'_>> {
        if !self.root.is_dir() {
            return Err(SearchError::Configuration(format!("location {} is not a directory", self.root.display())));
        }
        let walk = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let name = self.relative_name(e.path());
                (self.filter.accepts(e.path(), &name) && !self.exclude.contains(&name)).then(|| (e, name))
            })
            .zip(1u64..)
            .map(|((entry, name), id)| self.load(id, name, entry.path()));
        Ok(Box::new(walk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn ids(source: &dyn DocumentSource) -> Vec<(u64, String)> {
        source
            .documents()
            .unwrap()
            .map(|d| {
                let d = d.unwrap().document;
                (d.get("id").and_then(|v| v.as_doc_id()).unwrap(), d.get("name").map(|v| v.to_string()).unwrap())
            })
            .collect()
    }

    #[test]
    fn walks_filters_and_excludes() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("b.md"), "beta").unwrap();
        fs::write(dir.path().join("sub/c.txt"), "gamma").unwrap();
        fs::write(dir.path().join("sub/d.txt"), "delta").unwrap();

        let source = FileSystemSource::new(dir.path(), FileFilter::Extensions(vec!["txt".into()]))
            .exclude(["sub/d.txt".to_string()]);
        assert_eq!(ids(&source), vec![(1, "a.txt".to_string()), (2, "sub/c.txt".to_string())]);
        // Restartable.
        assert_eq!(ids(&source).len(), 2);

        let by_suffix = FileSystemSource::new(dir.path(), FileFilter::Suffix(".md".into()));
        assert_eq!(ids(&by_suffix), vec![(1, "b.md".to_string())]);
    }

    #[test]
    fn field_callbacks() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "Alpha").unwrap();
        let source = FileSystemSource::new(dir.path(), FileFilter::Predicate(Arc::new(|_| true)))
            .with_field_filter(Arc::new(|k, _| k != "name"))
            .with_field_map(Arc::new(|_, v| match v {
                FieldValue::Text(s) => FieldValue::Text(s.to_uppercase()),
                other => other.clone(),
            }));
        let doc = source.documents().unwrap().next().unwrap().unwrap();
        assert!(doc.document.get("name").is_none());
        assert_eq!(doc.document.get("content"), Some(&FieldValue::Text("ALPHA".into())));
        assert_eq!(doc.origin, Some(dir.path().join("a.txt")));
    }

    #[test]
    fn missing_root_is_a_configuration_error() {
        let source = FileSystemSource::new("/definitely/not/here", FileFilter::Suffix(".txt".into()));
        assert!(matches!(source.documents().map(|_| ()), Err(SearchError::Configuration(_))));
    }

    #[test]
    fn reads_json_and_jsonl_rows() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"[{"id":1,"body":"one"},{"id":2,"body":"two"}]"#).unwrap();
        fs::write(dir.path().join("b.jsonl"), "{\"id\":3,\"body\":\"three\"}\n\nnot json\n[1]\n").unwrap();
        let source = RowSource::from_path(dir.path()).unwrap();
        let rows: Vec<_> = source.documents().unwrap().collect();
        assert_eq!(rows.len(), 5);
        assert!(rows[..3].iter().all(|r| r.is_ok()));
        assert!(matches!(rows[3], Err(SearchError::Json(_))));
        assert!(matches!(rows[4], Err(SearchError::InvalidDocument { .. })));
    }

    #[test]
    fn parsed_values_fail_per_row() {
        let source = RowSource::from_values(vec![serde_json::json!({"id": 1}), serde_json::json!("text")]);
        let rows: Vec<_> = source.documents().unwrap().collect();
        assert!(rows[0].is_ok());
        assert!(matches!(rows[1], Err(SearchError::InvalidDocument { .. })));
    }
}
