//! Term Store - the curated, read-only in-memory dataset
//!
//! Terms are loaded once at startup from the YAML files embedded in the
//! binary (`data/terms/`) and, optionally, from an extra directory of YAML
//! term lists. Lookups are pure map reads and never fail.

use miette::{IntoDiagnostic, Result};
use rust_embed::RustEmbed;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::identity::TermId;
use crate::core::term::Term;

/// Curated term files compiled into the binary
#[derive(RustEmbed)]
#[folder = "data/terms/"]
struct BuiltinTerms;

/// Read-only term → metadata mapping consumed by the resolver
pub trait TermStore: Send + Sync {
    /// Look up a term by ID; the namespace selects the sub-table
    fn lookup_local(&self, id: &TermId) -> Option<&Term>;

    /// Every materialized term, in a stable order
    fn terms(&self) -> Box<dyn Iterator<Item = &Term> + '_>;

    /// Number of terms held
    fn len(&self) -> usize {
        self.terms().count()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Local search: exact ID first, then exact names, then substring
    /// matches over names and synonyms
    fn search(&self, query: &str, namespace: Option<&str>, limit: usize) -> Vec<Term> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        let namespace = namespace.map(str::to_ascii_uppercase);

        let in_scope = |term: &&Term| {
            namespace
                .as_deref()
                .is_none_or(|ns| term.id().namespace() == ns)
        };

        let mut results: Vec<Term> = Vec::new();
        if let Ok(id) = TermId::parse(query) {
            if let Some(term) = self.lookup_local(&id).filter(in_scope) {
                results.push(term.clone());
            }
        }

        let mut exact = Vec::new();
        let mut partial = Vec::new();
        for term in self.terms().filter(in_scope) {
            if results.iter().any(|r| r.id() == term.id()) {
                continue;
            }
            if term.name().to_lowercase() == needle {
                exact.push(term.clone());
            } else if term.matches_text(&needle) {
                partial.push(term.clone());
            }
        }

        results.extend(exact);
        results.extend(partial);
        results.truncate(limit);
        results
    }
}

/// Term store backed by one ordered map per namespace
#[derive(Debug, Default)]
pub struct InMemoryTermStore {
    tables: BTreeMap<String, BTreeMap<TermId, Term>>,
}

impl InMemoryTermStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store populated from the embedded curated dataset
    pub fn builtin() -> Self {
        let mut store = Self::new();
        for file in BuiltinTerms::iter() {
            let Some(content) = BuiltinTerms::get(&file) else {
                continue;
            };
            let text = String::from_utf8_lossy(&content.data);
            match serde_yml::from_str::<Vec<Term>>(&text) {
                Ok(terms) => {
                    debug!(file = %file, count = terms.len(), "loaded builtin terms");
                    store.extend(terms);
                }
                Err(e) => warn!(file = %file, error = %e, "skipping malformed builtin term file"),
            }
        }
        store
    }

    /// Build a store from an explicit list of terms
    pub fn from_terms<I: IntoIterator<Item = Term>>(terms: I) -> Self {
        let mut store = Self::new();
        store.extend(terms);
        store
    }

    /// Load every `.yaml`/`.yml` term list below `dir`
    ///
    /// Files that fail to parse are skipped with a warning. Later files
    /// override earlier ones for the same ID.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            return Ok(0);
        }

        let mut loaded = 0;
        for entry in WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|e| e == "yaml" || e == "yml");
            if !entry.file_type().is_file() || !is_yaml {
                continue;
            }

            let content = fs::read_to_string(path).into_diagnostic()?;
            match serde_yml::from_str::<Vec<Term>>(&content) {
                Ok(terms) => {
                    loaded += terms.len();
                    self.extend(terms);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed term file")
                }
            }
        }

        debug!(dir = %dir.display(), count = loaded, "loaded term directory");
        Ok(loaded)
    }

    /// Insert or replace a single term
    pub fn insert(&mut self, term: Term) {
        self.tables
            .entry(term.id().namespace().to_string())
            .or_default()
            .insert(term.id().clone(), term);
    }
}

impl Extend<Term> for InMemoryTermStore {
    fn extend<I: IntoIterator<Item = Term>>(&mut self, iter: I) {
        for term in iter {
            self.insert(term);
        }
    }
}

impl TermStore for InMemoryTermStore {
    fn lookup_local(&self, id: &TermId) -> Option<&Term> {
        self.tables.get(id.namespace())?.get(id)
    }

    fn terms(&self) -> Box<dyn Iterator<Item = &Term> + '_> {
        Box::new(self.tables.values().flat_map(|table| table.values()))
    }

    fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }
}
