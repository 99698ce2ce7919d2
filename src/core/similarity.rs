//! Ontology similarity: lowest common ancestor, depth, information content,
//! and the Wu-Palmer, Resnik and Lin measures
//!
//! Every call is independent; ancestor sets are recomputed per call and
//! bounded by the engine's `max_depth`.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::core::corpus::CorpusFrequencies;
use crate::core::identity::TermId;
use crate::core::traversal::{Traversal, DEFAULT_MAX_DEPTH};

/// Lower clamp for the structural probability estimate
pub const MIN_PROBABILITY: f64 = 1e-10;

/// Upper clamp for the structural probability estimate
pub const MAX_PROBABILITY: f64 = 0.99;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimilarityError {
    #[error("unknown similarity method '{0}' (expected wu_palmer, resnik or lin)")]
    InvalidMethod(String),
}

/// Supported similarity measures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMethod {
    /// `2·depth(lca) / (depth(a) + depth(b))`
    #[default]
    WuPalmer,
    /// `IC(lca)`
    Resnik,
    /// `2·IC(lca) / (IC(a) + IC(b))`
    Lin,
}

impl SimilarityMethod {
    pub const ALL: [SimilarityMethod; 3] = [
        SimilarityMethod::WuPalmer,
        SimilarityMethod::Resnik,
        SimilarityMethod::Lin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMethod::WuPalmer => "wu_palmer",
            SimilarityMethod::Resnik => "resnik",
            SimilarityMethod::Lin => "lin",
        }
    }
}

impl fmt::Display for SimilarityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SimilarityMethod {
    type Err = SimilarityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "wu_palmer" | "wupalmer" | "wp" => Ok(SimilarityMethod::WuPalmer),
            "resnik" => Ok(SimilarityMethod::Resnik),
            "lin" => Ok(SimilarityMethod::Lin),
            _ => Err(SimilarityError::InvalidMethod(s.to_string())),
        }
    }
}

/// Pairwise similarity over resolved hierarchy data
#[derive(Clone)]
pub struct SimilarityEngine {
    traversal: Traversal,
    corpus: Option<CorpusFrequencies>,
    max_depth: usize,
}

impl SimilarityEngine {
    pub fn new(traversal: Traversal) -> Self {
        Self {
            traversal,
            corpus: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Use corpus frequencies for IC where a term has a count
    pub fn with_corpus(mut self, corpus: CorpusFrequencies) -> Self {
        self.corpus = Some(corpus);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn traversal(&self) -> &Traversal {
        &self.traversal
    }

    /// `id` plus its bounded ancestor set
    fn closure(&self, id: &TermId) -> BTreeSet<TermId> {
        let mut closure: BTreeSet<TermId> = self
            .traversal
            .ancestors(id, self.max_depth)
            .into_iter()
            .map(|t| t.id().clone())
            .collect();
        closure.insert(id.clone());
        closure
    }

    /// Deepest shared member of both closures
    ///
    /// Ties at equal depth go to the lexicographically smallest ID.
    pub fn lowest_common_ancestor(&self, a: &TermId, b: &TermId) -> Option<TermId> {
        let left = self.closure(a);
        let right = self.closure(b);

        let mut best: Option<(TermId, usize)> = None;
        for candidate in left.intersection(&right) {
            let depth = self.depth(candidate);
            if best.as_ref().is_none_or(|(_, d)| depth > *d) {
                best = Some((candidate.clone(), depth));
            }
        }

        debug!(a = %a, b = %b, lca = ?best, "computed lowest common ancestor");
        best.map(|(id, _)| id)
    }

    /// Number of distinct ancestors within the depth bound (roots are 0)
    ///
    /// With several root paths of different lengths this counts every
    /// ancestor reached, not the shortest path.
    pub fn depth(&self, id: &TermId) -> usize {
        self.traversal.ancestors(id, self.max_depth).len()
    }

    pub fn descendant_count(&self, id: &TermId) -> usize {
        self.traversal.descendant_count(id, self.max_depth)
    }

    /// `-ln P(id)`, from corpus counts when available, else estimated
    /// from depth and descendant count
    pub fn information_content(&self, id: &TermId) -> f64 {
        if let Some(p) = self.corpus.as_ref().and_then(|c| c.probability(id)) {
            return -p.ln();
        }

        let depth = self.depth(id) as f64;
        let descendants = self.descendant_count(id) as f64;
        let estimate = (1.0 / (depth + 1.0)) * (descendants / 100.0 + 0.01);
        -estimate.clamp(MIN_PROBABILITY, MAX_PROBABILITY).ln()
    }

    /// Similarity of two terms; identical IDs score 1.0 without any lookup
    pub fn similarity(&self, a: &TermId, b: &TermId, method: SimilarityMethod) -> f64 {
        if a == b {
            return 1.0;
        }
        let Some(lca) = self.lowest_common_ancestor(a, b) else {
            return 0.0;
        };

        match method {
            SimilarityMethod::WuPalmer => {
                let denominator = (self.depth(a) + self.depth(b)) as f64;
                if denominator == 0.0 {
                    return 0.0;
                }
                2.0 * self.depth(&lca) as f64 / denominator
            }
            SimilarityMethod::Resnik => self.information_content(&lca),
            SimilarityMethod::Lin => {
                let denominator = self.information_content(a) + self.information_content(b);
                if denominator == 0.0 {
                    return 0.0;
                }
                2.0 * self.information_content(&lca) / denominator
            }
        }
    }

    /// Score every candidate against `id`, best first, at most `top_k`
    ///
    /// `id` itself is skipped. Equal scores keep their input order.
    pub fn find_similar(
        &self,
        id: &TermId,
        candidates: &[TermId],
        method: SimilarityMethod,
        top_k: usize,
    ) -> Vec<(TermId, f64)> {
        let mut scored: Vec<(TermId, f64)> = candidates
            .iter()
            .filter(|c| *c != id)
            .map(|c| (c.clone(), self.similarity(id, c, method)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::tests::term;
    use crate::core::resolver::Resolver;
    use crate::core::stats::ResolverStats;
    use crate::core::store::InMemoryTermStore;
    use crate::core::term::Term;
    use std::sync::Arc;

    fn id(s: &str) -> TermId {
        TermId::parse(s).unwrap()
    }

    fn engine(terms: Vec<Term>) -> SimilarityEngine {
        let resolver = Resolver::new(
            Arc::new(InMemoryTermStore::from_terms(terms)),
            Arc::new(ResolverStats::new()),
        );
        SimilarityEngine::new(Traversal::new(Arc::new(resolver)))
    }

    fn bones() -> SimilarityEngine {
        engine(vec![
            term("X:BONE", "bone", &[]),
            term("X:LONG_BONE", "long bone", &["X:BONE"]),
            term("X:FEMUR", "femur", &["X:LONG_BONE"]),
            term("X:TIBIA", "tibia", &["X:LONG_BONE"]),
            term("Y:ROOT", "unrelated root", &[]),
            term("Y:LEAF", "unrelated leaf", &["Y:ROOT"]),
        ])
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("wu_palmer".parse(), Ok(SimilarityMethod::WuPalmer));
        assert_eq!("Wu-Palmer".parse(), Ok(SimilarityMethod::WuPalmer));
        assert_eq!("LIN".parse(), Ok(SimilarityMethod::Lin));
        assert_eq!(
            "cosine".parse::<SimilarityMethod>(),
            Err(SimilarityError::InvalidMethod("cosine".to_string()))
        );
    }

    #[test]
    fn test_depth_counts_ancestors() {
        let e = bones();
        assert_eq!(e.depth(&id("X:BONE")), 0);
        assert_eq!(e.depth(&id("X:LONG_BONE")), 1);
        assert_eq!(e.depth(&id("X:FEMUR")), 2);
    }

    #[test]
    fn test_lca_and_wu_palmer_example() {
        let e = bones();
        assert_eq!(
            e.lowest_common_ancestor(&id("X:FEMUR"), &id("X:TIBIA")),
            Some(id("X:LONG_BONE"))
        );
        let score = e.similarity(&id("X:FEMUR"), &id("X:TIBIA"), SimilarityMethod::WuPalmer);
        assert!((score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_lca_includes_the_terms_themselves() {
        let e = bones();
        assert_eq!(
            e.lowest_common_ancestor(&id("X:FEMUR"), &id("X:LONG_BONE")),
            Some(id("X:LONG_BONE"))
        );
    }

    #[test]
    fn test_lca_tie_break_is_lexicographic() {
        let e = engine(vec![
            term("Z:ROOT", "root", &[]),
            term("Z:M", "m", &["Z:ROOT"]),
            term("Z:N", "n", &["Z:ROOT"]),
            term("Z:LEFT", "left", &["Z:M", "Z:N"]),
            term("Z:RIGHT", "right", &["Z:M", "Z:N"]),
        ]);
        assert_eq!(
            e.lowest_common_ancestor(&id("Z:LEFT"), &id("Z:RIGHT")),
            Some(id("Z:M"))
        );
    }

    #[test]
    fn test_same_id_is_one_even_when_unknown() {
        let e = bones();
        for method in SimilarityMethod::ALL {
            assert_eq!(e.similarity(&id("Q:NOWHERE"), &id("Q:NOWHERE"), method), 1.0);
            assert_eq!(e.similarity(&id("X:FEMUR"), &id("X:FEMUR"), method), 1.0);
        }
    }

    #[test]
    fn test_disjoint_hierarchies_score_zero() {
        let e = bones();
        for method in SimilarityMethod::ALL {
            assert_eq!(e.similarity(&id("X:FEMUR"), &id("Y:LEAF"), method), 0.0);
            assert_eq!(e.similarity(&id("X:FEMUR"), &id("Q:UNKNOWN"), method), 0.0);
        }
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let e = bones();
        for method in SimilarityMethod::ALL {
            let ab = e.similarity(&id("X:FEMUR"), &id("X:LONG_BONE"), method);
            let ba = e.similarity(&id("X:LONG_BONE"), &id("X:FEMUR"), method);
            assert_eq!(ab, ba);
        }
    }

    #[test]
    fn test_structural_ic_orders_specific_above_generic() {
        let e = bones();
        let root = e.information_content(&id("X:BONE"));
        let mid = e.information_content(&id("X:LONG_BONE"));
        let leaf = e.information_content(&id("X:FEMUR"));
        assert!(root >= 0.0);
        assert!(root < mid && mid < leaf);
    }

    #[test]
    fn test_structural_ic_is_clamped() {
        let mut terms = vec![term("W:ROOT", "root", &[])];
        for i in 0..200 {
            terms.push(term(&format!("W:{i}"), "child", &["W:ROOT"]));
        }
        let e = engine(terms);
        // 200 descendants pushes the estimate above 0.99
        let ic = e.information_content(&id("W:ROOT"));
        assert!((ic - -MAX_PROBABILITY.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_corpus_ic_takes_precedence() {
        let corpus: CorpusFrequencies = [(id("X:LONG_BONE"), 25), (id("X:FEMUR"), 75)]
            .into_iter()
            .collect();
        let e = bones().with_corpus(corpus);
        assert!((e.information_content(&id("X:LONG_BONE")) - 4f64.ln()).abs() < 1e-12);

        let resnik = e.similarity(&id("X:FEMUR"), &id("X:TIBIA"), SimilarityMethod::Resnik);
        assert!((resnik - 4f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_lin_is_bounded() {
        let e = bones();
        let lin = e.similarity(&id("X:FEMUR"), &id("X:TIBIA"), SimilarityMethod::Lin);
        assert!(lin > 0.0 && lin < 1.0);
    }

    #[test]
    fn test_find_similar_excludes_self_and_keeps_order_on_ties() {
        let e = bones();
        let candidates = vec![
            id("Y:LEAF"),
            id("X:FEMUR"),
            id("X:TIBIA"),
            id("Q:UNKNOWN"),
            id("X:LONG_BONE"),
        ];
        let ranked = e.find_similar(&id("X:FEMUR"), &candidates, SimilarityMethod::WuPalmer, 10);

        assert_eq!(ranked.len(), 4);
        assert!(ranked.iter().all(|(c, _)| c != &id("X:FEMUR")));
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
        // LONG_BONE: 2*1/(2+1); TIBIA: 0.5; the two zero scores keep input order
        assert_eq!(ranked[0].0, id("X:LONG_BONE"));
        assert_eq!(ranked[1].0, id("X:TIBIA"));
        assert_eq!(ranked[2].0, id("Y:LEAF"));
        assert_eq!(ranked[3].0, id("Q:UNKNOWN"));

        let top = e.find_similar(&id("X:FEMUR"), &candidates, SimilarityMethod::WuPalmer, 1);
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn test_builtin_osteoblast_chondrocyte() {
        let resolver = Resolver::new(
            Arc::new(InMemoryTermStore::builtin()),
            Arc::new(ResolverStats::new()),
        );
        let e = SimilarityEngine::new(Traversal::new(Arc::new(resolver)));
        let score = e.similarity(&id("CL:0000062"), &id("CL:0000138"), SimilarityMethod::WuPalmer);
        assert!(score > 0.0 && score < 1.0);
    }
}
