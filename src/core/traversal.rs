//! Bounded ancestor/descendant traversal over the is-a and part-of graph
//!
//! Both directions are breadth-first with a visited set, so a cyclic
//! hierarchy terminates. Results never go beyond `max_depth` hops.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::core::cache::RelationKind;
use crate::core::identity::TermId;
use crate::core::resolver::Resolver;
use crate::core::term::Term;

/// Default hop bound for traversal
pub const DEFAULT_MAX_DEPTH: usize = 15;

/// Graph walks that materialize nodes through the resolver
#[derive(Clone)]
pub struct Traversal {
    resolver: Arc<Resolver>,
}

impl Traversal {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Is-a ancestors of `id`, nearest first, excluding `id` itself
    pub fn ancestors(&self, id: &TermId, max_depth: usize) -> Vec<Term> {
        self.ancestors_via(id, max_depth, RelationKind::IsA)
    }

    /// Ancestors along one relation kind
    ///
    /// Nodes found at exactly `max_depth` are included but not expanded.
    /// Nodes that cannot be resolved are skipped along with everything
    /// reachable only through them.
    pub fn ancestors_via(&self, id: &TermId, max_depth: usize, kind: RelationKind) -> Vec<Term> {
        let mut visited: HashSet<TermId> = HashSet::from([id.clone()]);
        let mut queue: VecDeque<(TermId, usize)> = VecDeque::from([(id.clone(), 0)]);
        let mut found = Vec::new();

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for next in self.resolver.related(&node, kind) {
                if !visited.insert(next.clone()) {
                    continue;
                }
                match self.resolver.resolve_id(&next) {
                    Some(term) => {
                        found.push(term);
                        queue.push_back((next, depth + 1));
                    }
                    None => debug!(id = %next, from = %node, "skipping unresolvable ancestor"),
                }
            }
        }

        found
    }

    /// Is-a descendants of `id` known to the Term Store
    ///
    /// The remote tier has no reverse lookup, so terms that exist only
    /// remotely are never reported.
    pub fn descendants(&self, id: &TermId, max_depth: usize) -> Vec<Term> {
        let store = self.resolver.store();
        let mut visited: HashSet<TermId> = HashSet::from([id.clone()]);
        let mut frontier: HashSet<TermId> = HashSet::from([id.clone()]);
        let mut found = Vec::new();

        for _ in 0..max_depth {
            let mut next_frontier = HashSet::new();
            for term in store.terms() {
                if visited.contains(term.id()) {
                    continue;
                }
                if term.parents().iter().any(|p| frontier.contains(p)) {
                    visited.insert(term.id().clone());
                    next_frontier.insert(term.id().clone());
                    found.push(term.clone());
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        found
    }

    /// Number of store-known descendants within `max_depth`
    pub fn descendant_count(&self, id: &TermId, max_depth: usize) -> usize {
        self.descendants(id, max_depth).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::tests::{term, PanicRemote};
    use crate::core::stats::ResolverStats;
    use crate::core::store::{InMemoryTermStore, TermStore};

    fn id(s: &str) -> TermId {
        TermId::parse(s).unwrap()
    }

    fn traversal(terms: Vec<Term>) -> Traversal {
        let resolver = Resolver::new(
            Arc::new(InMemoryTermStore::from_terms(terms)),
            Arc::new(ResolverStats::new()),
        );
        Traversal::new(Arc::new(resolver))
    }

    fn chain() -> Vec<Term> {
        vec![
            term("T:ROOT", "root", &[]),
            term("T:1", "one", &["T:ROOT"]),
            term("T:2", "two", &["T:1"]),
            term("T:3", "three", &["T:2"]),
            term("T:4", "four", &["T:3"]),
        ]
    }

    fn names(terms: &[Term]) -> Vec<&str> {
        terms.iter().map(Term::name).collect()
    }

    #[test]
    fn test_ancestors_nearest_first_and_exclude_start() {
        let t = traversal(chain());
        let found = t.ancestors(&id("T:4"), DEFAULT_MAX_DEPTH);
        assert_eq!(names(&found), vec!["three", "two", "one", "root"]);
    }

    #[test]
    fn test_ancestors_respects_depth_bound() {
        let t = traversal(chain());
        assert_eq!(names(&t.ancestors(&id("T:4"), 2)), vec!["three", "two"]);
        assert_eq!(names(&t.ancestors(&id("T:4"), 1)), vec!["three"]);
        assert!(t.ancestors(&id("T:4"), 0).is_empty());
    }

    #[test]
    fn test_ancestors_terminate_on_cycle() {
        let t = traversal(vec![
            term("T:A", "a", &["T:B"]),
            term("T:B", "b", &["T:A"]),
        ]);
        let found = t.ancestors(&id("T:A"), 50);
        assert_eq!(names(&found), vec!["b"]);
    }

    #[test]
    fn test_ancestors_multiple_paths_counted_once() {
        let t = traversal(vec![
            term("T:ROOT", "root", &[]),
            term("T:L", "left", &["T:ROOT"]),
            term("T:R", "right", &["T:ROOT"]),
            term("T:LEAF", "leaf", &["T:L", "T:R"]),
        ]);
        let found = t.ancestors(&id("T:LEAF"), 10);
        assert_eq!(found.len(), 3);
        assert_eq!(found.last().unwrap().name(), "root");
    }

    #[test]
    fn test_ancestors_skip_unresolvable_parent() {
        let t = traversal(vec![term("T:X", "x", &["T:MISSING"])]);
        assert!(t.ancestors(&id("T:X"), 5).is_empty());
        assert!(t.ancestors(&id("T:UNKNOWN"), 5).is_empty());
    }

    #[test]
    fn test_part_of_ancestors() {
        let store = InMemoryTermStore::builtin();
        let resolver = Resolver::new(Arc::new(store), Arc::new(ResolverStats::new()))
            .with_remote(Arc::new(PanicRemote));
        let t = Traversal::new(Arc::new(resolver));

        let wholes = t.ancestors_via(&id("CL:0000182"), 5, RelationKind::PartOf);
        assert_eq!(names(&wholes), vec!["liver"]);
    }

    #[test]
    fn test_descendants_breadth_first_within_store() {
        let t = traversal(chain());
        let found = t.descendants(&id("T:1"), DEFAULT_MAX_DEPTH);
        assert_eq!(names(&found), vec!["two", "three", "four"]);
        assert_eq!(t.descendant_count(&id("T:1"), 1), 1);
        assert_eq!(t.descendant_count(&id("T:4"), 5), 0);
    }

    #[test]
    fn test_descendants_terminate_on_cycle() {
        let t = traversal(vec![
            term("T:A", "a", &["T:B"]),
            term("T:B", "b", &["T:A"]),
        ]);
        assert_eq!(names(&t.descendants(&id("T:A"), 10)), vec!["b"]);
    }

    #[test]
    fn test_builtin_femur_lineage() {
        let t = traversal(InMemoryTermStore::builtin().terms().cloned().collect());
        let found = t.ancestors(&id("UBERON:0000981"), DEFAULT_MAX_DEPTH);
        assert_eq!(found[0].name(), "long bone");
        assert!(found.iter().any(|t| t.id() == &id("UBERON:0000061")));
    }
}
