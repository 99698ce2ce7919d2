//! Explicit runtime context: `init` → use → `shutdown`
//!
//! Everything the resolver needs is built here once, from a validated
//! [`Config`], and handed to components through their constructors.

use std::sync::Arc;

use tracing::{debug, info};

use crate::core::cache::{ClearStats, TermCache};
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::{Config, ConfigError};
use crate::core::corpus::CorpusFrequencies;
use crate::core::remote::{OlsClient, RemoteLookup};
use crate::core::resolver::Resolver;
use crate::core::similarity::SimilarityEngine;
use crate::core::stats::{ResolverStats, StatsSnapshot};
use crate::core::store::{InMemoryTermStore, TermStore};
use crate::core::traversal::Traversal;

/// Wired-up resolver, cache and statistics for one process
pub struct Context {
    config: Config,
    cache: Arc<TermCache>,
    stats: Arc<ResolverStats>,
    resolver: Arc<Resolver>,
    corpus: Option<CorpusFrequencies>,
}

impl Context {
    /// Build every component from `config` using the system clock
    pub fn init(config: Config) -> Result<Self, ConfigError> {
        Self::init_with_clock(config, Arc::new(SystemClock))
    }

    /// Build every component with an explicit clock
    pub fn init_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let remote: Option<Arc<dyn RemoteLookup>> = if config.offline {
            None
        } else {
            let client = OlsClient::new(config.remote_settings()).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "remote_url".to_string(),
                    message: e.to_string(),
                }
            })?;
            Some(Arc::new(client))
        };
        Self::init_with(config, clock, remote)
    }

    /// Build every component around a caller-supplied remote tier
    pub fn init_with(
        config: Config,
        clock: Arc<dyn Clock>,
        remote: Option<Arc<dyn RemoteLookup>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let cache_path = config.cache_file();
        let cache = TermCache::open(&cache_path, config.cache_ttl_days, clock).map_err(|e| {
            ConfigError::CacheLocation {
                path: cache_path.clone(),
                message: e.to_string(),
            }
        })?;
        let cache = Arc::new(cache);

        let mut store = InMemoryTermStore::builtin();
        if let Some(dir) = &config.terms_dir {
            store.load_dir(dir).map_err(|e| ConfigError::InvalidValue {
                key: "terms_dir".to_string(),
                message: e.to_string(),
            })?;
        }

        let corpus = match &config.corpus_path {
            Some(path) => Some(CorpusFrequencies::from_path(path).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "corpus_path".to_string(),
                    message: e.to_string(),
                }
            })?),
            None => None,
        };

        let stats = Arc::new(ResolverStats::new());
        let mut resolver = Resolver::new(Arc::new(store), stats.clone())
            .with_cache(cache.clone())
            .with_batch_size(config.batch_size);
        if let Some(remote) = remote {
            resolver = resolver.with_remote(remote);
        }

        info!(
            terms = resolver.store().len(),
            cache = %cache_path.display(),
            offline = !resolver.remote_enabled(),
            "resolver ready"
        );

        Ok(Self {
            config,
            cache,
            stats,
            resolver: Arc::new(resolver),
            corpus,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn cache(&self) -> &TermCache {
        &self.cache
    }

    pub fn traversal(&self) -> Traversal {
        Traversal::new(self.resolver.clone())
    }

    /// Similarity engine sharing this context's resolver and corpus
    pub fn similarity(&self) -> SimilarityEngine {
        let engine = SimilarityEngine::new(self.traversal()).with_max_depth(self.config.max_depth);
        match &self.corpus {
            Some(corpus) => engine.with_corpus(corpus.clone()),
            None => engine,
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Drop expired cache rows, compact, and log the final counters
    pub fn shutdown(self) -> miette::Result<ClearStats> {
        let cleared = self.cache.clear(false)?;
        let stats = self.stats.snapshot();
        if cleared.total() > 0 {
            info!(removed = cleared.total(), "expired cache entries removed");
        }
        debug!(
            store_hits = stats.store_hits,
            cache_hits = stats.cache_hits,
            remote_hits = stats.remote_hits,
            misses = stats.misses,
            remote_calls = stats.remote_calls,
            remote_errors = stats.total_remote_errors(),
            "resolver shutdown"
        );
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::resolver::tests::{term, FakeRemote};
    use chrono::{Duration, TimeZone, Utc};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn offline_config(dir: &std::path::Path) -> Config {
        Config {
            offline: true,
            cache_path: Some(dir.join("terms.db")),
            ..Config::default()
        }
    }

    #[test]
    fn test_init_offline_uses_local_tiers() {
        let tmp = tempdir().unwrap();
        let ctx = Context::init(offline_config(tmp.path())).unwrap();

        assert!(!ctx.resolver().remote_enabled());
        assert!(ctx.resolver().resolve("CL:0000062").is_some());
        assert!(ctx.resolver().resolve("CL:9999999").is_none());
        assert_eq!(ctx.stats().store_hits, 1);
        assert!(tmp.path().join("terms.db").exists());
        ctx.shutdown().unwrap();
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let tmp = tempdir().unwrap();
        let config = Config {
            batch_size: 0,
            ..offline_config(tmp.path())
        };
        assert!(matches!(
            Context::init(config),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unusable_cache_location_is_fatal() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let config = Config {
            cache_path: Some(blocker.join("terms.db")),
            ..offline_config(tmp.path())
        };
        assert!(matches!(
            Context::init(config),
            Err(ConfigError::CacheLocation { .. })
        ));
    }

    #[test]
    fn test_terms_dir_and_corpus_are_loaded() {
        let tmp = tempdir().unwrap();
        let terms = tmp.path().join("terms");
        std::fs::create_dir(&terms).unwrap();
        std::fs::write(
            terms.join("lab.yaml"),
            "- id: LAB:1\n  name: custom scaffold\n  parents: [UBERON:0000479]\n",
        )
        .unwrap();
        let corpus = tmp.path().join("corpus.csv");
        std::fs::write(&corpus, "id,count\nUBERON:0000479,10\nLAB:1,90\n").unwrap();

        let config = Config {
            terms_dir: Some(terms),
            corpus_path: Some(corpus),
            ..offline_config(tmp.path())
        };
        let ctx = Context::init(config).unwrap();
        assert!(ctx.resolver().resolve("LAB:1").is_some());

        let ic = ctx
            .similarity()
            .information_content(&"UBERON:0000479".parse().unwrap());
        assert!((ic - 10f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_missing_corpus_is_fatal() {
        let tmp = tempdir().unwrap();
        let config = Config {
            corpus_path: Some(PathBuf::from("/nonexistent/corpus.csv")),
            ..offline_config(tmp.path())
        };
        assert!(Context::init(config).is_err());
    }

    #[test]
    fn test_cache_survives_restart_and_shutdown_expires() {
        let tmp = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
        ));
        let remote = Arc::new(FakeRemote::with_terms([term("EXT:1", "external", &[])]));
        let config = Config {
            offline: false,
            ..offline_config(tmp.path())
        };

        let ctx = Context::init_with(config.clone(), clock.clone(), Some(remote.clone())).unwrap();
        assert!(ctx.resolver().resolve("EXT:1").is_some());
        ctx.shutdown().unwrap();

        // Reopened without a remote tier, the cache still answers
        let ctx = Context::init_with(config.clone(), clock.clone(), None).unwrap();
        assert!(ctx.resolver().resolve("EXT:1").is_some());
        assert_eq!(ctx.stats().cache_hits, 1);

        clock.advance(Duration::days(31));
        let cleared = ctx.shutdown().unwrap();
        assert_eq!(cleared.terms_removed, 1);
        assert_eq!(remote.fetches(), 1);
    }
}
