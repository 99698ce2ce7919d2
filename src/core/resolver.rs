//! Tiered term resolver
//!
//! Resolution order is strict and stops at the first hit:
//! 1. Term Store (in-memory, cannot fail)
//! 2. Persistent cache (entries past the TTL count as misses)
//! 3. Remote lookup, when enabled; hits are written back to the cache
//!
//! Remote failures are counted per class in [`ResolverStats`] and
//! reported to the caller as plain absence.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::cache::{Provenance, RelationKind, TermCache};
use crate::core::identity::TermId;
use crate::core::remote::{RemoteError, RemoteLookup};
use crate::core::stats::{ResolverStats, StatsSnapshot};
use crate::core::store::TermStore;
use crate::core::term::Term;

/// Default number of concurrent remote fetches in a batch
pub const DEFAULT_BATCH_SIZE: usize = 8;

/// Orchestrates the store, cache and remote tiers
pub struct Resolver {
    store: Arc<dyn TermStore>,
    cache: Option<Arc<TermCache>>,
    remote: Option<Arc<dyn RemoteLookup>>,
    stats: Arc<ResolverStats>,
    batch_size: usize,
}

impl Resolver {
    /// Resolver over the Term Store alone; add tiers with the `with_*` methods
    pub fn new(store: Arc<dyn TermStore>, stats: Arc<ResolverStats>) -> Self {
        Self {
            store,
            cache: None,
            remote: None,
            stats,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_cache(mut self, cache: Arc<TermCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteLookup>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Concurrent remote fetches per batch chunk (at least 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &dyn TermStore {
        self.store.as_ref()
    }

    pub fn cache(&self) -> Option<&TermCache> {
        self.cache.as_deref()
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolve a raw ID string; malformed IDs are simply not found
    pub fn resolve(&self, raw: &str) -> Option<Term> {
        match TermId::parse(raw) {
            Ok(id) => self.resolve_id(&id),
            Err(e) => {
                debug!(id = raw, error = %e, "rejecting malformed term ID");
                self.stats.record_invalid_id();
                None
            }
        }
    }

    /// Resolve a parsed ID through all tiers
    pub fn resolve_id(&self, id: &TermId) -> Option<Term> {
        self.resolve_local(id).or_else(|| self.resolve_remote(id))
    }

    /// Resolve many IDs, touching the remote tier only for true misses
    ///
    /// The result has one entry per distinct input string.
    pub fn batch_resolve<S: AsRef<str>>(&self, ids: &[S]) -> HashMap<String, Option<Term>> {
        let mut results: HashMap<String, Option<Term>> = HashMap::with_capacity(ids.len());
        let mut seen = HashSet::new();
        let mut pending: Vec<(String, TermId)> = Vec::new();

        for raw in ids {
            let raw = raw.as_ref();
            if !seen.insert(raw.to_string()) {
                continue;
            }
            match TermId::parse(raw) {
                Ok(id) => match self.resolve_local(&id) {
                    Some(term) => {
                        results.insert(raw.to_string(), Some(term));
                    }
                    None => pending.push((raw.to_string(), id)),
                },
                Err(e) => {
                    debug!(id = raw, error = %e, "rejecting malformed term ID");
                    self.stats.record_invalid_id();
                    results.insert(raw.to_string(), None);
                }
            }
        }

        if pending.is_empty() {
            return results;
        }
        if self.remote.is_none() {
            for (raw, _) in pending {
                self.stats.record_miss();
                results.insert(raw, None);
            }
            return results;
        }

        info!(
            requested = ids.len(),
            remote = pending.len(),
            "resolving batch misses remotely"
        );
        for chunk in pending.chunks(self.batch_size) {
            let fetched: Vec<(String, Option<Term>)> = std::thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|(raw, id)| (raw, scope.spawn(move || self.resolve_remote(id))))
                    .collect();
                handles
                    .into_iter()
                    .map(|(raw, handle)| {
                        let term = handle.join().unwrap_or_else(|_| {
                            warn!(id = %raw, "remote fetch worker panicked");
                            None
                        });
                        (raw.clone(), term)
                    })
                    .collect()
            });
            results.extend(fetched);
        }
        results
    }

    /// Search the store first; fill the remainder from the cache or remote
    ///
    /// Results are deduplicated by ID before truncation to `limit`.
    pub fn search(&self, query: &str, namespace: Option<&str>, limit: usize) -> Vec<Term> {
        let mut results = self.store.search(query, namespace, limit);
        if results.len() >= limit || query.trim().is_empty() {
            return results;
        }

        let extra = match self.cache.as_ref().and_then(|c| c.get_search(query, namespace, limit)) {
            Some(hit) => {
                debug!(query, count = hit.len(), "search cache hit");
                self.stats.record_search_cache_hit();
                hit
            }
            None => self.search_remote(query, namespace, limit),
        };

        for term in extra {
            if results.len() >= limit {
                break;
            }
            if !results.iter().any(|r| r.id() == term.id()) {
                results.push(term);
            }
        }
        results
    }

    /// Related IDs of one kind: store edges, then cached lists, then a full resolve
    pub fn related(&self, id: &TermId, kind: RelationKind) -> Vec<TermId> {
        if let Some(term) = self.store.lookup_local(id) {
            return kind.edges(term).cloned().collect();
        }
        if let Some(related) = self.cache.as_ref().and_then(|c| c.get_relations(id, kind)) {
            return related;
        }
        self.resolve_id(id)
            .map(|term| kind.edges(&term).cloned().collect())
            .unwrap_or_default()
    }

    /// Tiers 1 and 2
    fn resolve_local(&self, id: &TermId) -> Option<Term> {
        if let Some(term) = self.store.lookup_local(id) {
            debug!(id = %id, "term store hit");
            self.stats.record_store_hit();
            return Some(term.clone());
        }

        let cached = self.cache.as_ref()?.get_term(id)?;
        debug!(id = %id, provenance = cached.provenance.as_str(), "cache hit");
        self.stats.record_cache_hit();
        Some(cached.term)
    }

    /// Tier 3; every failure is counted and collapsed to `None`
    fn resolve_remote(&self, id: &TermId) -> Option<Term> {
        let Some(remote) = self.remote.as_ref() else {
            self.stats.record_miss();
            return None;
        };

        self.stats.record_remote_call();
        let fetched = remote.fetch(id).and_then(|term| {
            if term.id() == id {
                Ok(term)
            } else {
                Err(RemoteError::Parse {
                    target: id.to_string(),
                    message: format!("payload describes {} instead", term.id()),
                })
            }
        });

        match fetched {
            Ok(term) => {
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.put_term(&term, Provenance::Remote) {
                        warn!(id = %id, error = %e, "failed to cache remote term");
                    }
                }
                info!(id = %id, "resolved term remotely");
                self.stats.record_remote_hit();
                Some(term)
            }
            Err(e) => {
                warn!(id = %id, class = e.class().as_str(), error = %e, "remote lookup failed");
                self.stats.record_remote_error(e.class());
                self.stats.record_miss();
                None
            }
        }
    }

    fn search_remote(&self, query: &str, namespace: Option<&str>, limit: usize) -> Vec<Term> {
        let Some(remote) = self.remote.as_ref() else {
            return Vec::new();
        };

        self.stats.record_remote_search();
        match remote.search(query, namespace, limit) {
            Ok(found) => {
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.put_search(query, namespace, limit, &found) {
                        warn!(query, error = %e, "failed to cache search results");
                    }
                }
                found
            }
            Err(e) => {
                warn!(query, class = e.class().as_str(), error = %e, "remote search failed");
                self.stats.record_remote_error(e.class());
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::store::InMemoryTermStore;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn id(s: &str) -> TermId {
        TermId::parse(s).unwrap()
    }

    pub(crate) fn term(raw: &str, name: &str, parents: &[&str]) -> Term {
        Term::builder(id(raw), name)
            .unwrap()
            .parents(parents.iter().map(|p| id(p)))
            .build()
    }

    /// Remote tier that fails the test if it is ever called
    pub(crate) struct PanicRemote;

    impl RemoteLookup for PanicRemote {
        fn fetch(&self, id: &TermId) -> Result<Term, RemoteError> {
            panic!("unexpected remote fetch for {}", id);
        }

        fn search(&self, query: &str, _: Option<&str>, _: usize) -> Result<Vec<Term>, RemoteError> {
            panic!("unexpected remote search for {}", query);
        }
    }

    /// Remote tier serving a fixed set of terms and counting calls
    #[derive(Default)]
    pub(crate) struct FakeRemote {
        terms: HashMap<TermId, Term>,
        fetches: AtomicUsize,
        searches: AtomicUsize,
        failure: Mutex<Option<RemoteError>>,
    }

    impl FakeRemote {
        pub(crate) fn with_terms<I: IntoIterator<Item = Term>>(terms: I) -> Self {
            Self {
                terms: terms.into_iter().map(|t| (t.id().clone(), t)).collect(),
                ..Self::default()
            }
        }

        pub(crate) fn fail_with(&self, error: RemoteError) {
            *self.failure.lock().unwrap() = Some(error);
        }

        pub(crate) fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl RemoteLookup for FakeRemote {
        fn fetch(&self, id: &TermId) -> Result<Term, RemoteError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.failure.lock().unwrap().clone() {
                return Err(error);
            }
            self.terms.get(id).cloned().ok_or(RemoteError::NotFound {
                target: id.to_string(),
                status: Some(404),
            })
        }

        fn search(&self, query: &str, _: Option<&str>, limit: usize) -> Result<Vec<Term>, RemoteError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            let needle = query.to_lowercase();
            let mut found: Vec<Term> = self
                .terms
                .values()
                .filter(|t| t.matches_text(&needle))
                .cloned()
                .collect();
            found.sort_by(|a, b| a.id().cmp(b.id()));
            found.truncate(limit);
            Ok(found)
        }
    }

    struct Fixture {
        resolver: Resolver,
        remote: Arc<FakeRemote>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let store = InMemoryTermStore::from_terms([
            term("TEST:A", "alpha", &[]),
            term("TEST:A2", "alpha child", &["TEST:A"]),
        ]);
        let remote = Arc::new(FakeRemote::with_terms([
            term("TEST:B", "beta", &["TEST:A"]),
            term("TEST:C", "gamma", &["TEST:B"]),
            term("TEST:D", "alpha remote", &[]),
        ]));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ));
        let cache = TermCache::open_in_memory(30, clock.clone()).unwrap();
        let resolver = Resolver::new(Arc::new(store), Arc::new(ResolverStats::new()))
            .with_cache(Arc::new(cache))
            .with_remote(remote.clone())
            .with_batch_size(2);
        Fixture {
            resolver,
            remote,
            clock,
        }
    }

    #[test]
    fn test_store_hit_never_calls_remote() {
        let store = InMemoryTermStore::builtin();
        let resolver = Resolver::new(Arc::new(store), Arc::new(ResolverStats::new()))
            .with_remote(Arc::new(PanicRemote));

        let femur = resolver.resolve("UBERON:0000981").unwrap();
        assert_eq!(femur.name(), "femur");
        assert_eq!(resolver.stats().store_hits, 1);
        assert_eq!(resolver.stats().remote_calls, 0);
    }

    #[test]
    fn test_malformed_id_is_not_found() {
        let resolver = Resolver::new(
            Arc::new(InMemoryTermStore::new()),
            Arc::new(ResolverStats::new()),
        )
        .with_remote(Arc::new(PanicRemote));

        assert!(resolver.resolve("no-separator").is_none());
        assert!(resolver.resolve(":0001").is_none());
        let stats = resolver.stats();
        assert_eq!(stats.invalid_ids, 2);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_remote_hit_is_cached_within_ttl() {
        let f = fixture();

        assert_eq!(f.resolver.resolve("TEST:B").unwrap().name(), "beta");
        assert_eq!(f.remote.fetches(), 1);

        f.clock.advance(Duration::days(29));
        assert_eq!(f.resolver.resolve("TEST:B").unwrap().name(), "beta");
        assert_eq!(f.remote.fetches(), 1);

        let stats = f.resolver.stats();
        assert_eq!(stats.remote_hits, 1);
        assert_eq!(stats.cache_hits, 1);
    }

    #[test]
    fn test_expired_entry_goes_remote_again() {
        let f = fixture();

        f.resolver.resolve("TEST:B").unwrap();
        f.clock.advance(Duration::days(31));
        f.resolver.resolve("TEST:B").unwrap();
        assert_eq!(f.remote.fetches(), 2);
    }

    #[test]
    fn test_remote_failure_is_counted_and_collapsed() {
        let f = fixture();
        f.remote.fail_with(RemoteError::Timeout {
            target: "TEST:B".to_string(),
            timeout_secs: 1,
        });

        assert!(f.resolver.resolve("TEST:B").is_none());
        let stats = f.resolver.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.remote_errors["timeout"], 1);
        assert_eq!(stats.total_remote_errors(), 1);
    }

    #[test]
    fn test_unknown_remote_term_is_not_found() {
        let f = fixture();
        assert!(f.resolver.resolve("TEST:ZZZ").is_none());
        assert_eq!(f.resolver.stats().remote_errors["not_found"], 1);
    }

    #[test]
    fn test_offline_resolver_degrades_to_local_tiers() {
        let resolver = Resolver::new(
            Arc::new(InMemoryTermStore::builtin()),
            Arc::new(ResolverStats::new()),
        );
        assert!(!resolver.remote_enabled());
        assert!(resolver.resolve("UBERON:0000948").is_some());
        assert!(resolver.resolve("UBERON:9999999").is_none());
        assert_eq!(resolver.stats().misses, 1);
    }

    #[test]
    fn test_batch_resolve_fetches_only_true_misses() {
        let f = fixture();
        // Put B in the cache, then reset the fetch counter baseline
        f.resolver.resolve("TEST:B").unwrap();
        let before = f.remote.fetches();

        let results = f.resolver.batch_resolve(&["TEST:A", "TEST:B", "TEST:C"]);
        assert_eq!(results.len(), 3);
        assert_eq!(f.remote.fetches() - before, 1);
        assert!(results.values().all(Option::is_some));
        assert_eq!(results["TEST:C"].as_ref().unwrap().name(), "gamma");
    }

    #[test]
    fn test_batch_resolve_chunks_and_misses() {
        let f = fixture();
        let ids = ["TEST:B", "TEST:C", "TEST:D", "TEST:X", "bad", "TEST:B"];
        let results = f.resolver.batch_resolve(&ids);

        assert_eq!(results.len(), 5);
        assert_eq!(f.remote.fetches(), 4);
        assert!(results["TEST:X"].is_none());
        assert!(results["bad"].is_none());
        assert!(results["TEST:D"].is_some());
    }

    #[test]
    fn test_search_fills_from_remote_and_dedups() {
        let f = fixture();
        let results = f.resolver.search("alpha", None, 10);
        let ids: Vec<String> = results.iter().map(|t| t.id().to_string()).collect();
        assert_eq!(ids, vec!["TEST:A", "TEST:A2", "TEST:D"]);

        // Second search is answered by the search cache
        let again = f.resolver.search("alpha", None, 10);
        assert_eq!(again.len(), 3);
        assert_eq!(f.resolver.stats().search_cache_hits, 1);
        assert_eq!(f.remote.searches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_search_local_results_satisfy_limit() {
        let f = fixture();
        let results = f.resolver.search("alpha", None, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(f.remote.searches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_related_uses_cached_relationships() {
        let f = fixture();
        f.resolver.resolve("TEST:C").unwrap();
        let fetches = f.remote.fetches();

        let parents = f.resolver.related(&id("TEST:C"), RelationKind::IsA);
        assert_eq!(parents, vec![id("TEST:B")]);
        assert_eq!(f.remote.fetches(), fetches);
    }

    /// Remote tier that answers every fetch with a different term
    struct RenamingRemote {
        fetches: AtomicUsize,
    }

    impl RemoteLookup for RenamingRemote {
        fn fetch(&self, _: &TermId) -> Result<Term, RemoteError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(term("R:NEW", "replacement", &[]))
        }

        fn search(&self, _: &str, _: Option<&str>, _: usize) -> Result<Vec<Term>, RemoteError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_remote_payload_for_other_id_is_rejected() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ));
        let cache = Arc::new(TermCache::open_in_memory(30, clock).unwrap());
        let remote = Arc::new(RenamingRemote {
            fetches: AtomicUsize::new(0),
        });
        let resolver = Resolver::new(
            Arc::new(InMemoryTermStore::new()),
            Arc::new(ResolverStats::new()),
        )
        .with_cache(cache.clone())
        .with_remote(remote.clone());

        assert!(resolver.resolve("R:OLD").is_none());
        assert!(cache.get_term(&id("R:NEW")).is_none());
        let stats = resolver.stats();
        assert_eq!(stats.remote_errors["parse_error"], 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_larger_search_limit_refetches_remote() {
        let remote = Arc::new(FakeRemote::with_terms([
            term("TEST:M1", "marrow one", &[]),
            term("TEST:M2", "marrow two", &[]),
            term("TEST:M3", "marrow three", &[]),
            term("TEST:M4", "marrow four", &[]),
        ]));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ));
        let resolver = Resolver::new(
            Arc::new(InMemoryTermStore::new()),
            Arc::new(ResolverStats::new()),
        )
        .with_cache(Arc::new(TermCache::open_in_memory(30, clock).unwrap()))
        .with_remote(remote.clone());

        assert_eq!(resolver.search("marrow", None, 1).len(), 1);
        assert_eq!(resolver.search("marrow", None, 4).len(), 4);
        assert_eq!(remote.searches.load(Ordering::SeqCst), 2);

        // The larger entry now answers smaller requests from the cache
        assert_eq!(resolver.search("marrow", None, 2).len(), 2);
        assert_eq!(remote.searches.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.stats().search_cache_hits, 1);
    }
}
