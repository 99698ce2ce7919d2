//! Term value object - immutable ontology concept metadata

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::core::identity::{Ontology, TermId};

/// An ontology term with its hierarchy edges
///
/// Terms are immutable once built. They carry no back-references into the
/// store or cache they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TermRecord")]
pub struct Term {
    id: TermId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    definition: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    synonyms: Vec<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    parents: BTreeSet<TermId>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    part_of: BTreeSet<TermId>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    xrefs: BTreeSet<String>,
}

/// Raw on-disk shape of a term, validated into [`Term`]
#[derive(Debug, Deserialize)]
struct TermRecord {
    id: TermId,
    name: String,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    synonyms: Vec<String>,
    #[serde(default)]
    parents: Vec<TermId>,
    #[serde(default)]
    part_of: Vec<TermId>,
    #[serde(default)]
    xrefs: Vec<String>,
}

impl TryFrom<TermRecord> for Term {
    type Error = TermError;

    fn try_from(record: TermRecord) -> Result<Self, Self::Error> {
        Ok(Term::builder(record.id, record.name)?
            .definition(record.definition)
            .synonyms(record.synonyms)
            .parents(record.parents)
            .part_of(record.part_of)
            .xrefs(record.xrefs)
            .build())
    }
}

/// Errors raised while constructing a term
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TermError {
    #[error("term {0} has an empty name")]
    EmptyName(String),
}

impl Term {
    /// Start building a term; the display name must be non-empty
    pub fn builder(id: TermId, name: impl Into<String>) -> Result<TermBuilder, TermError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(TermError::EmptyName(id.to_string()));
        }
        Ok(TermBuilder {
            term: Term {
                id,
                name,
                definition: None,
                synonyms: Vec::new(),
                parents: BTreeSet::new(),
                part_of: BTreeSet::new(),
                xrefs: BTreeSet::new(),
            },
        })
    }

    pub fn id(&self) -> &TermId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    pub fn synonyms(&self) -> &[String] {
        &self.synonyms
    }

    /// Is-a edges to more general terms
    pub fn parents(&self) -> &BTreeSet<TermId> {
        &self.parents
    }

    /// Part-of edges to the wholes this term belongs to
    pub fn part_of(&self) -> &BTreeSet<TermId> {
        &self.part_of
    }

    pub fn xrefs(&self) -> &BTreeSet<String> {
        &self.xrefs
    }

    /// Source ontology, derived from the ID prefix
    pub fn ontology(&self) -> Ontology {
        self.id.ontology()
    }

    /// Case-insensitive match against the name and synonyms
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self
                .synonyms
                .iter()
                .any(|s| s.to_lowercase().contains(needle_lower))
    }
}

/// Builder used by the store loader, cache rows and remote payloads
#[derive(Debug)]
pub struct TermBuilder {
    term: Term,
}

impl TermBuilder {
    pub fn definition(mut self, definition: Option<String>) -> Self {
        self.term.definition = definition
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self
    }

    /// Synonyms keep their order; blanks and duplicates are dropped
    pub fn synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for synonym in synonyms {
            let synonym = synonym.into().trim().to_string();
            if !synonym.is_empty() && !self.term.synonyms.contains(&synonym) {
                self.term.synonyms.push(synonym);
            }
        }
        self
    }

    /// Is-a parents; a self-edge is ignored
    pub fn parents<I: IntoIterator<Item = TermId>>(mut self, parents: I) -> Self {
        let own = self.term.id.clone();
        self.term
            .parents
            .extend(parents.into_iter().filter(|p| *p != own));
        self
    }

    pub fn part_of<I: IntoIterator<Item = TermId>>(mut self, wholes: I) -> Self {
        let own = self.term.id.clone();
        self.term
            .part_of
            .extend(wholes.into_iter().filter(|p| *p != own));
        self
    }

    pub fn xrefs<I, S>(mut self, xrefs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.term.xrefs.extend(
            xrefs
                .into_iter()
                .map(Into::into)
                .filter(|x: &String| !x.is_empty()),
        );
        self
    }

    pub fn build(self) -> Term {
        self.term
    }
}
