//! Term identity: namespace-qualified ontology codes (`UBERON:0002481`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between the namespace prefix and the local code
pub const NAMESPACE_SEPARATOR: char = ':';

/// Base IRI used by OBO Foundry ontologies
pub const OBO_IRI_BASE: &str = "http://purl.obolibrary.org/obo/";

/// Ontologies known to the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ontology {
    /// Uber-anatomy ontology
    Uberon,
    /// Cell Ontology
    Cl,
    /// Chemical Entities of Biological Interest
    Chebi,
    /// Gene Ontology
    Go,
    /// BRENDA Tissue Ontology
    Bto,
    /// Human Disease Ontology
    Doid,
    /// Mondo Disease Ontology
    Mondo,
    /// NCI Thesaurus
    Ncit,
    /// Experimental Factor Ontology
    Efo,
    /// Ontology for Biomedical Investigations
    Obi,
    /// Phenotype And Trait Ontology
    Pato,
    /// Any namespace without a dedicated variant
    Unknown,
}

impl Ontology {
    /// Lowercase acronym as used by ontology lookup services
    pub fn as_str(&self) -> &'static str {
        match self {
            Ontology::Uberon => "uberon",
            Ontology::Cl => "cl",
            Ontology::Chebi => "chebi",
            Ontology::Go => "go",
            Ontology::Bto => "bto",
            Ontology::Doid => "doid",
            Ontology::Mondo => "mondo",
            Ontology::Ncit => "ncit",
            Ontology::Efo => "efo",
            Ontology::Obi => "obi",
            Ontology::Pato => "pato",
            Ontology::Unknown => "unknown",
        }
    }

    /// Human-readable ontology title
    pub fn title(&self) -> &'static str {
        match self {
            Ontology::Uberon => "Uberon multi-species anatomy ontology",
            Ontology::Cl => "Cell Ontology",
            Ontology::Chebi => "Chemical Entities of Biological Interest",
            Ontology::Go => "Gene Ontology",
            Ontology::Bto => "BRENDA Tissue Ontology",
            Ontology::Doid => "Human Disease Ontology",
            Ontology::Mondo => "Mondo Disease Ontology",
            Ontology::Ncit => "NCI Thesaurus",
            Ontology::Efo => "Experimental Factor Ontology",
            Ontology::Obi => "Ontology for Biomedical Investigations",
            Ontology::Pato => "Phenotype And Trait Ontology",
            Ontology::Unknown => "Unknown ontology",
        }
    }

    /// Map a namespace prefix to its ontology (case-insensitive)
    pub fn from_namespace(namespace: &str) -> Self {
        match namespace.to_ascii_uppercase().as_str() {
            "UBERON" => Ontology::Uberon,
            "CL" => Ontology::Cl,
            "CHEBI" => Ontology::Chebi,
            "GO" => Ontology::Go,
            "BTO" => Ontology::Bto,
            "DOID" => Ontology::Doid,
            "MONDO" => Ontology::Mondo,
            "NCIT" => Ontology::Ncit,
            "EFO" => Ontology::Efo,
            "OBI" => Ontology::Obi,
            "PATO" => Ontology::Pato,
            _ => Ontology::Unknown,
        }
    }
}

impl fmt::Display for Ontology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A qualified term identifier: namespace prefix plus local code
///
/// The namespace is normalized to uppercase so that `uberon:0002481` and
/// `UBERON:0002481` name the same term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId {
    namespace: String,
    local: String,
}

impl TermId {
    /// Build an ID from already-split parts
    pub fn new(namespace: &str, local: &str) -> Result<Self, IdParseError> {
        let namespace = namespace.trim();
        let local = local.trim();
        if namespace.is_empty() {
            return Err(IdParseError::EmptyNamespace(format!(
                "{}{}{}",
                namespace, NAMESPACE_SEPARATOR, local
            )));
        }
        if local.is_empty() {
            return Err(IdParseError::EmptyLocalCode(format!(
                "{}{}{}",
                namespace, NAMESPACE_SEPARATOR, local
            )));
        }
        Ok(Self {
            namespace: namespace.to_ascii_uppercase(),
            local: local.to_string(),
        })
    }

    /// Parse a `NAMESPACE:CODE` string
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }

    /// Parse an OBO PURL such as `http://purl.obolibrary.org/obo/CL_0000062`
    pub fn from_iri(iri: &str) -> Option<Self> {
        let tail = iri.rsplit('/').next()?;
        let (namespace, local) = tail.split_once('_')?;
        Self::new(namespace, local).ok()
    }

    /// Uppercase namespace prefix
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Local code within the namespace
    pub fn local(&self) -> &str {
        &self.local
    }

    /// Source ontology, derived from the namespace prefix
    pub fn ontology(&self) -> Ontology {
        Ontology::from_namespace(&self.namespace)
    }

    /// Normalized OBO IRI for remote lookups
    pub fn to_iri(&self) -> String {
        format!("{}{}_{}", OBO_IRI_BASE, self.namespace, self.local)
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, NAMESPACE_SEPARATOR, self.local)
    }
}

impl FromStr for TermId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, local) = s
            .split_once(NAMESPACE_SEPARATOR)
            .ok_or_else(|| IdParseError::MissingSeparator(s.to_string()))?;
        Self::new(namespace, local)
    }
}

impl Serialize for TermId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TermId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when parsing term IDs
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("missing ':' separator in term ID: '{0}'")]
    MissingSeparator(String),

    #[error("empty namespace in term ID: '{0}'")]
    EmptyNamespace(String),

    #[error("empty local code in term ID: '{0}'")]
    EmptyLocalCode(String),
}
