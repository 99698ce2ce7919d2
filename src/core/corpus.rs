//! Corpus annotation frequencies for information content
//!
//! Loaded from a two-column CSV with a header row:
//!
//! ```text
//! id,count
//! UBERON:0002481,120
//! CL:0000062,45
//! ```

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use miette::{IntoDiagnostic, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::identity::TermId;

#[derive(Debug, Deserialize)]
struct FrequencyRow {
    id: String,
    count: u64,
}

/// Per-term annotation counts plus the corpus size
#[derive(Debug, Clone, Default)]
pub struct CorpusFrequencies {
    counts: HashMap<TermId, u64>,
    total: u64,
}

impl CorpusFrequencies {
    /// Load from a CSV file; the total is the sum of all counts
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).into_diagnostic()?;
        let corpus = Self::from_reader(file)?;
        debug!(path = %path.display(), terms = corpus.len(), total = corpus.total, "loaded corpus frequencies");
        Ok(corpus)
    }

    /// Parse CSV from any reader; rows with malformed IDs are skipped
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut corpus = Self::default();
        for row in csv_reader.deserialize::<FrequencyRow>() {
            let row = row.into_diagnostic()?;
            match TermId::parse(&row.id) {
                Ok(id) => corpus.insert(id, row.count),
                Err(e) => warn!(id = %row.id, error = %e, "skipping corpus row with malformed ID"),
            }
        }
        Ok(corpus)
    }

    /// Add to a term's count (and the corpus total)
    pub fn insert(&mut self, id: TermId, count: u64) {
        *self.counts.entry(id).or_insert(0) += count;
        self.total += count;
    }

    /// Override the corpus size instead of using the sum of counts
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn frequency(&self, id: &TermId) -> Option<u64> {
        self.counts.get(id).copied()
    }

    /// `frequency / total`, or `None` when the term has no usable count
    pub fn probability(&self, id: &TermId) -> Option<f64> {
        let count = self.frequency(id).filter(|c| *c > 0)?;
        if self.total == 0 {
            return None;
        }
        Some((count as f64 / self.total as f64).min(1.0))
    }
}

impl FromIterator<(TermId, u64)> for CorpusFrequencies {
    fn from_iter<I: IntoIterator<Item = (TermId, u64)>>(iter: I) -> Self {
        let mut corpus = Self::default();
        for (id, count) in iter {
            corpus.insert(id, count);
        }
        corpus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TermId {
        TermId::parse(s).unwrap()
    }

    #[test]
    fn test_from_reader_sums_total() {
        let csv = "id,count\nUBERON:0002481, 30\nCL:0000062,10\nnot-an-id,5\n";
        let corpus = CorpusFrequencies::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.total(), 40);
        assert_eq!(corpus.frequency(&id("UBERON:0002481")), Some(30));
        assert_eq!(corpus.probability(&id("CL:0000062")), Some(0.25));
    }

    #[test]
    fn test_explicit_total() {
        let corpus: CorpusFrequencies = [(id("GO:0001503"), 5)].into_iter().collect();
        let corpus = corpus.with_total(1000);
        assert_eq!(corpus.probability(&id("GO:0001503")), Some(0.005));
    }

    #[test]
    fn test_zero_counts_are_unusable() {
        let corpus: CorpusFrequencies = [(id("GO:0001503"), 0), (id("GO:0001525"), 4)]
            .into_iter()
            .collect();
        assert_eq!(corpus.probability(&id("GO:0001503")), None);
        assert_eq!(corpus.probability(&id("GO:9999999")), None);
        assert_eq!(corpus.probability(&id("GO:0001525")), Some(1.0));
    }

    #[test]
    fn test_bad_count_is_error() {
        let csv = "id,count\nUBERON:0002481,many\n";
        assert!(CorpusFrequencies::from_reader(csv.as_bytes()).is_err());
    }
}
