//! Resolution counters shared by every in-flight request
//!
//! Counters are plain atomics; a [`StatsSnapshot`] is a point-in-time copy
//! suitable for display or serialization.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::remote::RemoteErrorClass;

/// Live counters for the tiered resolver
#[derive(Debug, Default)]
pub struct ResolverStats {
    store_hits: AtomicU64,
    cache_hits: AtomicU64,
    remote_hits: AtomicU64,
    misses: AtomicU64,
    invalid_ids: AtomicU64,
    remote_calls: AtomicU64,
    remote_timeouts: AtomicU64,
    remote_not_found: AtomicU64,
    remote_transport_errors: AtomicU64,
    remote_parse_errors: AtomicU64,
    search_cache_hits: AtomicU64,
    remote_searches: AtomicU64,
}

/// Point-in-time copy of [`ResolverStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub store_hits: u64,
    pub cache_hits: u64,
    pub remote_hits: u64,
    pub misses: u64,
    pub invalid_ids: u64,
    pub remote_calls: u64,
    pub search_cache_hits: u64,
    pub remote_searches: u64,
    /// Remote failures keyed by failure class
    pub remote_errors: BTreeMap<String, u64>,
}

impl StatsSnapshot {
    /// Total remote failures across all classes
    pub fn total_remote_errors(&self) -> u64 {
        self.remote_errors.values().sum()
    }

    /// Fraction of resolutions answered without the remote tier
    pub fn local_hit_rate(&self) -> f64 {
        let total = self.store_hits + self.cache_hits + self.remote_hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        (self.store_hits + self.cache_hits) as f64 / total as f64
    }
}

impl ResolverStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_store_hit(&self) {
        self.store_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_hit(&self) {
        self.remote_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_id(&self) {
        self.invalid_ids.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// One logical remote fetch; retries inside the client are not counted
    pub fn record_remote_call(&self) {
        self.remote_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_search_cache_hit(&self) {
        self.search_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_search(&self) {
        self.remote_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_error(&self, class: RemoteErrorClass) {
        let counter = match class {
            RemoteErrorClass::Timeout => &self.remote_timeouts,
            RemoteErrorClass::NotFound => &self.remote_not_found,
            RemoteErrorClass::Transport => &self.remote_transport_errors,
            RemoteErrorClass::Parse => &self.remote_parse_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remote_calls(&self) -> u64 {
        self.remote_calls.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let remote_errors = [
            (RemoteErrorClass::Timeout, &self.remote_timeouts),
            (RemoteErrorClass::NotFound, &self.remote_not_found),
            (RemoteErrorClass::Transport, &self.remote_transport_errors),
            (RemoteErrorClass::Parse, &self.remote_parse_errors),
        ]
        .into_iter()
        .map(|(class, counter)| (class.as_str().to_string(), load(counter)))
        .collect();

        StatsSnapshot {
            store_hits: load(&self.store_hits),
            cache_hits: load(&self.cache_hits),
            remote_hits: load(&self.remote_hits),
            misses: load(&self.misses),
            invalid_ids: load(&self.invalid_ids),
            remote_calls: load(&self.remote_calls),
            search_cache_hits: load(&self.search_cache_hits),
            remote_searches: load(&self.remote_searches),
            remote_errors,
        }
    }
}
