use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::document::PATH_KEY;
use super::source::load_file;
use super::{DictsError, Document};

/// Field holding the disabled flag unless configured otherwise.
pub const DISABLED_KEY: &str = "disabled";

/// Where a [`Dicts`] collection takes its documents from.
#[derive(Debug, Default)]
enum DictsSource {
    #[default]
    None,
    Path(PathBuf),
    Documents(Vec<Document>),
}

/// Builder for a [`Dicts`] collection.
///
/// Only one source is used: a later call to [`with_path`](Self::with_path) or
/// [`with_documents`](Self::with_documents) replaces the earlier one.
///
/// ## Example
///
/// ```no_run
/// use revlibs::Dicts;
///
/// let dicts = Dicts::builder()
///     .with_path("/etc/connections")
///     .skip_errors(true)
///     .build()?;
/// let by_name = dicts.map_by("name", "_")?;
/// # Ok::<(), revlibs::DictsError>(())
/// ```
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct DictsBuilder {
    source: DictsSource,
    skip_errors: bool,
    load_disabled: bool,
    disabled_key: String,
}

impl Default for DictsBuilder {
    fn default() -> Self {
        Self {
            source: DictsSource::None,
            skip_errors: false,
            load_disabled: false,
            disabled_key: DISABLED_KEY.to_string(),
        }
    }
}

impl DictsBuilder {
    /// Loads documents from a single file or from every file in a directory.
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.source = DictsSource::Path(path.as_ref().to_path_buf());
        self
    }

    /// Uses the given documents instead of reading from disk.
    pub fn with_documents<I, D>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Document>,
    {
        self.source = DictsSource::Documents(documents.into_iter().map(Into::into).collect());
        self
    }

    /// Logs and skips files that fail to load instead of aborting.
    pub fn skip_errors(mut self, skip: bool) -> Self {
        self.skip_errors = skip;
        self
    }

    /// Keeps documents flagged as disabled.
    pub fn load_disabled(mut self, load: bool) -> Self {
        self.load_disabled = load;
        self
    }

    pub fn disabled_key(mut self, key: impl Into<String>) -> Self {
        self.disabled_key = key.into();
        self
    }

    /// Loads the documents and applies disabled filtering.
    pub fn build(self) -> Result<Dicts, DictsError> {
        let items = match self.source {
            DictsSource::None => {
                tracing::debug!("no path or documents supplied");
                Vec::new()
            }
            DictsSource::Path(path) => load_path(&path, self.skip_errors)?,
            DictsSource::Documents(documents) => {
                tracing::debug!(count = documents.len(), "loading supplied documents");
                documents
            }
        };

        if items.is_empty() {
            tracing::warn!("no documents found to load");
            return Err(DictsError::NoData);
        }

        let items = if self.load_disabled {
            tracing::debug!("keeping disabled documents");
            items
        } else {
            remove_disabled(items, &self.disabled_key)
        };

        Ok(Dicts { items })
    }
}

fn load_path(path: &Path, skip_errors: bool) -> Result<Vec<Document>, DictsError> {
    let path = match std::fs::canonicalize(path) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot resolve path, skipping");
            return Ok(Vec::new());
        }
    };

    let files = if path.is_file() {
        tracing::debug!(path = %path.display(), "loading documents from file");
        vec![path]
    } else if path.is_dir() {
        tracing::debug!(path = %path.display(), "loading documents from directory");
        list_files(&path)?
    } else {
        tracing::warn!(path = %path.display(), "path is neither a file nor a directory");
        Vec::new()
    };

    let mut items = Vec::new();
    for file in files {
        match load_file(&file) {
            Ok(documents) => items.extend(documents),
            Err(e) if skip_errors => {
                tracing::warn!(path = %file.display(), error = %e, "could not load file, skipping");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(items)
}

/// Immediate regular files of `dir`, canonicalized and sorted.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, DictsError> {
    let read_error = |e| DictsError::Read {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let path = match std::fs::canonicalize(entry.path()) {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!(path = %entry.path().display(), error = %e, "cannot resolve entry");
                continue;
            }
        };
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "not a file, skipping");
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

fn remove_disabled(items: Vec<Document>, disabled_key: &str) -> Vec<Document> {
    let total = items.len();
    let enabled: Vec<Document> = items
        .into_iter()
        .filter(|doc| !doc.is_flagged(disabled_key))
        .collect();
    tracing::info!(
        enabled = enabled.len(),
        total,
        "{} out of {} documents are enabled",
        enabled.len(),
        total
    );
    enabled
}

/// An immutable, ordered collection of [`Document`]s.
///
/// Filtering and transforming return new collections; the receiver is never
/// modified.
#[derive(Debug, Clone, PartialEq)]
pub struct Dicts {
    items: Vec<Document>,
}

impl Dicts {
    pub fn builder() -> DictsBuilder {
        DictsBuilder::default()
    }

    /// Loads from a file or directory with default options.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DictsError> {
        Self::builder().with_path(path).build()
    }

    /// Builds a collection from explicit documents with default options.
    pub fn from_documents<I, D>(documents: I) -> Result<Self, DictsError>
    where
        I: IntoIterator<Item = D>,
        D: Into<Document>,
    {
        Self::builder().with_documents(documents).build()
    }

    pub fn items(&self) -> &[Document] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<Document> {
        self.items
    }

    pub fn filter<P>(&self, mut predicate: P) -> Dicts
    where
        P: FnMut(&Document) -> bool,
    {
        Dicts {
            items: self.items.iter().filter(|&d| predicate(d)).cloned().collect(),
        }
    }

    /// Maps every document through `f`.
    ///
    /// A result that has no provenance key inherits the one of its source.
    pub fn transform<F>(&self, mut f: F) -> Dicts
    where
        F: FnMut(&Document) -> Map<String, Value>,
    {
        let items = self
            .items
            .iter()
            .map(|doc| {
                let mut fields = f(doc);
                if !fields.contains_key(PATH_KEY) {
                    fields.insert(PATH_KEY.to_string(), Value::String(doc.path().to_string()));
                }
                Document::new(fields)
            })
            .collect();
        Dicts { items }
    }

    /// Converts every document with a fallible function.
    pub fn cast<T, E, F>(&self, f: F) -> Result<Vec<T>, E>
    where
        F: FnMut(&Document) -> Result<T, E>,
    {
        self.items.iter().map(f).collect()
    }

    /// Deserializes every document into `T`.
    pub fn cast_as<T: DeserializeOwned>(&self) -> Result<Vec<T>, DictsError> {
        self.cast(Document::cast)
    }

    /// Groups documents by the key `key_fn` returns.
    ///
    /// Documents are stably sorted by key before partitioning, so each key
    /// appears once and members keep their load order. With `strict` set, any
    /// key shared by more than one document is a [`DictsError::DuplicateKey`].
    pub fn group_by<K, F>(
        &self,
        mut key_fn: F,
        strict: bool,
    ) -> Result<BTreeMap<K, Vec<Document>>, DictsError>
    where
        K: Ord + Display,
        F: FnMut(&Document) -> K,
    {
        let mut keyed: Vec<(K, &Document)> = self.items.iter().map(|d| (key_fn(d), d)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        let mut groups = BTreeMap::new();
        let mut keyed = keyed.into_iter().peekable();
        while let Some((key, first)) = keyed.next() {
            let mut members = vec![first.clone()];
            while let Some((_, doc)) = keyed.next_if(|(next, _)| *next == key) {
                members.push(doc.clone());
            }

            if members.len() > 1 {
                let paths: Vec<String> = members.iter().map(|d| d.path().to_string()).collect();
                if strict {
                    let err = DictsError::DuplicateKey {
                        key: key.to_string(),
                        count: members.len(),
                        paths,
                    };
                    tracing::error!("{err}");
                    return Err(err);
                }
                tracing::info!(
                    key = %key,
                    count = members.len(),
                    paths = %paths.join(", "),
                    "group has more than one document"
                );
            }
            groups.insert(key, members);
        }
        Ok(groups)
    }

    /// Groups documents by the value of `field`, using `default` when it is absent.
    pub fn group_by_field(
        &self,
        field: &str,
        default: &str,
        strict: bool,
    ) -> Result<BTreeMap<String, Vec<Document>>, DictsError> {
        self.group_by(|doc| field_key(doc, field, default), strict)
    }

    /// Maps each distinct value of `field` to its single document.
    pub fn map_by(&self, field: &str, default: &str) -> Result<BTreeMap<String, Document>, DictsError> {
        self.map_by_key(|doc| field_key(doc, field, default))
    }

    /// Like [`map_by`](Self::map_by) with an arbitrary key function.
    pub fn map_by_key<K, F>(&self, key_fn: F) -> Result<BTreeMap<K, Document>, DictsError>
    where
        K: Ord + Display,
        F: FnMut(&Document) -> K,
    {
        let groups = self.group_by(key_fn, true)?;
        Ok(groups
            .into_iter()
            .filter_map(|(key, members)| members.into_iter().next().map(|doc| (key, doc)))
            .collect())
    }

    /// Groups documents by the file they were loaded from.
    pub fn group_by_path(&self) -> BTreeMap<String, Vec<Document>> {
        let mut groups: BTreeMap<String, Vec<Document>> = BTreeMap::new();
        for doc in &self.items {
            groups.entry(doc.path().to_string()).or_default().push(doc.clone());
        }
        groups
    }
}

impl<'a> IntoIterator for &'a Dicts {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// String form of a field used as a grouping key.
fn field_key(doc: &Document, field: &str, default: &str) -> String {
    match doc.get(field) {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
