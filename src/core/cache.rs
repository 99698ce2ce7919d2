//! SQLite-backed persistent term cache
//!
//! This module provides a durable local cache that:
//! - Stores terms fetched from the remote tier, keyed by term ID
//! - Stores search results keyed by a hash of query + namespace filter
//! - Stores relationship lists (term ID + relation type -> related IDs)
//! - Treats rows older than the TTL as absent until a cleanup pass removes them
//!
//! Every write is an upsert, so concurrent writers converge on the last
//! write. The connection is guarded by a mutex; each statement is atomic
//! per key.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, TimeZone, Utc};
use miette::{IntoDiagnostic, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::core::clock::Clock;
use crate::core::identity::TermId;
use crate::core::term::Term;

/// Default cache file name inside the cache directory
pub const CACHE_FILE: &str = "terms.db";

/// Schema version recorded in every cache database
const SCHEMA_VERSION: i32 = 1;

/// Separator for list-valued columns
const LIST_SEPARATOR: char = '|';

/// Relation types stored in the relationships table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    IsA,    // Term is a subclass of the related term
    PartOf, // Term is a component of the related term
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::IsA => "is_a",
            RelationKind::PartOf => "part_of",
        }
    }

    /// Edges of this kind carried by a term
    pub fn edges<'a>(&self, term: &'a Term) -> impl Iterator<Item = &'a TermId> {
        match self {
            RelationKind::IsA => term.parents().iter(),
            RelationKind::PartOf => term.part_of().iter(),
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a cached row originally came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Fetched from the remote lookup service (evictable by `clear --all`)
    Remote,
    /// Written from any other origin (imports, manual seeding)
    Local,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Remote => "remote",
            Provenance::Local => "local",
        }
    }

    fn from_db(s: &str) -> Self {
        match s {
            "remote" => Provenance::Remote,
            _ => Provenance::Local,
        }
    }
}

/// A cached term together with its bookkeeping columns
#[derive(Debug, Clone)]
pub struct CachedTerm {
    pub term: Term,
    pub cached_at: DateTime<Utc>,
    pub provenance: Provenance,
}

/// Row summary handed to eviction predicates
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub id: String,
    pub namespace: String,
    pub cached_at: DateTime<Utc>,
    pub provenance: Provenance,
    pub expired: bool,
}

/// Rows removed by a cleanup pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClearStats {
    pub terms_removed: usize,
    pub searches_removed: usize,
    pub relations_removed: usize,
}

impl ClearStats {
    pub fn total(&self) -> usize {
        self.terms_removed + self.searches_removed + self.relations_removed
    }
}

/// Cache statistics (descriptive only; size is not enforced)
#[derive(Debug, Default)]
pub struct CacheStats {
    pub total_terms: usize,
    pub remote_terms: usize,
    pub expired_terms: usize,
    pub total_searches: usize,
    pub total_relations: usize,
    pub by_namespace: HashMap<String, usize>,
    pub db_size_bytes: u64,
    pub ttl_days: i64,
}

/// The term cache backed by SQLite
pub struct TermCache {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TermCache {
    /// Open or create the cache database at `path`
    pub fn open(path: &Path, ttl_days: i64, clock: Arc<dyn Clock>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).into_diagnostic()?;
        }

        let conn = Connection::open(path).into_diagnostic()?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .into_diagnostic()?;

        let cache = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
            ttl: ttl_duration(ttl_days)?,
            clock,
        };

        cache.init_schema()?;

        debug!(path = %path.display(), ttl_days, "opened term cache");
        Ok(cache)
    }

    /// Open a private in-memory cache (tests, offline tooling)
    pub fn open_in_memory(ttl_days: i64, clock: Arc<dyn Clock>) -> Result<Self> {
        let conn = Connection::open_in_memory().into_diagnostic()?;
        let cache = Self {
            conn: Mutex::new(conn),
            path: None,
            ttl: ttl_duration(ttl_days)?,
            clock,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    /// Location of the database file, if file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| miette::miette!("term cache connection lock poisoned"))
    }

    /// Create missing tables and check the recorded schema version
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            -- Schema version of this database
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Resolved terms
            CREATE TABLE IF NOT EXISTS terms (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                definition TEXT,
                synonyms TEXT,              -- pipe-separated
                parents TEXT,               -- pipe-separated term IDs
                part_of TEXT,               -- pipe-separated term IDs
                xrefs TEXT,                 -- pipe-separated
                namespace TEXT NOT NULL,
                cached_at INTEGER NOT NULL, -- unix seconds
                provenance TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_terms_namespace ON terms(namespace);
            CREATE INDEX IF NOT EXISTS idx_terms_cached_at ON terms(cached_at);
            CREATE INDEX IF NOT EXISTS idx_terms_provenance ON terms(provenance);

            -- Search results keyed by hash of query + namespace filter
            CREATE TABLE IF NOT EXISTS search_results (
                key TEXT PRIMARY KEY,
                query TEXT NOT NULL,
                namespace TEXT,
                results TEXT NOT NULL,      -- JSON array of terms
                rows INTEGER NOT NULL,      -- row count requested from the remote
                cached_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_search_cached_at ON search_results(cached_at);

            -- Relationship lists
            CREATE TABLE IF NOT EXISTS relationships (
                term_id TEXT NOT NULL,
                relation TEXT NOT NULL,
                related TEXT NOT NULL,      -- pipe-separated term IDs
                cached_at INTEGER NOT NULL,
                PRIMARY KEY (term_id, relation)
            );
            CREATE INDEX IF NOT EXISTS idx_relationships_cached_at ON relationships(cached_at);
            "#,
        )
        .into_diagnostic()?;

        let stored: Option<i32> = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .into_diagnostic()?;
        match stored {
            Some(version) if version != SCHEMA_VERSION => miette::bail!(
                "term cache schema version {} is not supported (expected {}); delete the cache file",
                version,
                SCHEMA_VERSION
            ),
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    params![SCHEMA_VERSION],
                )
                .into_diagnostic()?;
            }
        }

        Ok(())
    }

    fn now_secs(&self) -> i64 {
        self.clock.now().timestamp()
    }

    /// Oldest timestamp still considered valid (exclusive)
    fn expiry_cutoff(&self) -> i64 {
        self.now_secs() - self.ttl.num_seconds()
    }

    /// An entry is valid only while `now - cached_at < ttl`
    pub fn is_expired(&self, cached_at: DateTime<Utc>) -> bool {
        self.clock.now() - cached_at >= self.ttl
    }

    /// Get a term if present and within the TTL window
    ///
    /// Storage failures are logged and reported as a miss.
    pub fn get_term(&self, id: &TermId) -> Option<CachedTerm> {
        let conn = self.conn().ok()?;
        let row = conn
            .query_row(
                "SELECT id, name, definition, synonyms, parents, part_of, xrefs, cached_at, provenance
                 FROM terms WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, i64>(7)?,
                        row.get::<_, String>(8)?,
                    ))
                },
            )
            .optional();
        drop(conn);

        let (raw_id, name, definition, synonyms, parents, part_of, xrefs, cached_at, provenance) =
            match row {
                Ok(Some(row)) => row,
                Ok(None) => return None,
                Err(e) => {
                    warn!(id = %id, error = %e, "term cache read failed");
                    return None;
                }
            };

        let cached_at = from_unix(cached_at);
        if self.is_expired(cached_at) {
            debug!(id = %id, "cached term expired");
            return None;
        }

        let term_id = match TermId::parse(&raw_id) {
            Ok(term_id) => term_id,
            Err(e) => {
                warn!(id = %raw_id, error = %e, "discarding cache row with malformed ID");
                return None;
            }
        };

        let term = Term::builder(term_id, name)
            .ok()?
            .definition(definition)
            .synonyms(split_list(synonyms.as_deref()))
            .parents(parse_ids(parents.as_deref()))
            .part_of(parse_ids(part_of.as_deref()))
            .xrefs(split_list(xrefs.as_deref()))
            .build();

        Some(CachedTerm {
            term,
            cached_at,
            provenance: Provenance::from_db(&provenance),
        })
    }

    /// Upsert a term and its relationship lists in one transaction
    ///
    /// The timestamp is refreshed on every write.
    pub fn put_term(&self, term: &Term, provenance: Provenance) -> Result<()> {
        let now = self.now_secs();
        let mut conn = self.conn()?;
        let tx = conn.transaction().into_diagnostic()?;
        tx.execute(
            "INSERT OR REPLACE INTO terms
                (id, name, definition, synonyms, parents, part_of, xrefs, namespace, cached_at, provenance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                term.id().to_string(),
                term.name(),
                term.definition(),
                join_list(term.synonyms().iter()),
                join_list(term.parents().iter()),
                join_list(term.part_of().iter()),
                join_list(term.xrefs().iter()),
                term.id().namespace(),
                now,
                provenance.as_str(),
            ],
        )
        .into_diagnostic()?;

        for kind in [RelationKind::IsA, RelationKind::PartOf] {
            tx.execute(
                "INSERT OR REPLACE INTO relationships (term_id, relation, related, cached_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    term.id().to_string(),
                    kind.as_str(),
                    join_list(kind.edges(term)),
                    now,
                ],
            )
            .into_diagnostic()?;
        }

        tx.commit().into_diagnostic()?;
        Ok(())
    }

    /// Get a cached relationship list if within the TTL window
    pub fn get_relations(&self, id: &TermId, kind: RelationKind) -> Option<Vec<TermId>> {
        let conn = self.conn().ok()?;
        let row = conn
            .query_row(
                "SELECT related, cached_at FROM relationships WHERE term_id = ?1 AND relation = ?2",
                params![id.to_string(), kind.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .ok()
            .flatten()?;

        if self.is_expired(from_unix(row.1)) {
            return None;
        }
        Some(parse_ids(Some(&row.0)))
    }

    /// Upsert a relationship list
    pub fn put_relations(&self, id: &TermId, kind: RelationKind, related: &[TermId]) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO relationships (term_id, relation, related, cached_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    id.to_string(),
                    kind.as_str(),
                    join_list(related.iter()),
                    self.now_secs()
                ],
            )
            .into_diagnostic()?;
        Ok(())
    }

    /// Get cached search results if within the TTL window
    ///
    /// An entry fetched with fewer than `wanted` rows that also came back
    /// short of `wanted` is a miss, so a larger request reaches the remote.
    pub fn get_search(&self, query: &str, namespace: Option<&str>, wanted: usize) -> Option<Vec<Term>> {
        let key = search_key(query, namespace);
        let conn = self.conn().ok()?;
        let row = conn
            .query_row(
                "SELECT results, rows, cached_at FROM search_results WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()
            .ok()
            .flatten()?;
        drop(conn);

        let (json, rows, cached_at) = row;
        if self.is_expired(from_unix(cached_at)) {
            return None;
        }

        let terms = match serde_json::from_str::<Vec<Term>>(&json) {
            Ok(terms) => terms,
            Err(e) => {
                warn!(query, error = %e, "discarding unreadable cached search");
                return None;
            }
        };

        let requested = usize::try_from(rows).unwrap_or(0);
        if terms.len() < wanted && requested < wanted {
            debug!(query, cached = terms.len(), requested, wanted, "cached search too small");
            return None;
        }
        Some(terms)
    }

    /// Upsert search results fetched with a `rows` limit
    pub fn put_search(
        &self,
        query: &str,
        namespace: Option<&str>,
        rows: usize,
        results: &[Term],
    ) -> Result<()> {
        let json = serde_json::to_string(results).into_diagnostic()?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO search_results (key, query, namespace, results, rows, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    search_key(query, namespace),
                    query,
                    namespace.map(str::to_ascii_uppercase),
                    json,
                    i64::try_from(rows).unwrap_or(i64::MAX),
                    self.now_secs()
                ],
            )
            .into_diagnostic()?;
        Ok(())
    }

    /// Remove every term row matching `predicate`, with its relationship lists
    pub fn evict<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&EntryInfo) -> bool,
    {
        let entries = self.entries()?;
        let doomed: Vec<&EntryInfo> = entries.iter().filter(|e| predicate(e)).collect();

        let mut conn = self.conn()?;
        let tx = conn.transaction().into_diagnostic()?;
        for entry in &doomed {
            tx.execute("DELETE FROM terms WHERE id = ?1", params![entry.id])
                .into_diagnostic()?;
            tx.execute(
                "DELETE FROM relationships WHERE term_id = ?1",
                params![entry.id],
            )
            .into_diagnostic()?;
        }
        tx.commit().into_diagnostic()?;

        Ok(doomed.len())
    }

    /// Summaries of all term rows
    fn entries(&self) -> Result<Vec<EntryInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, namespace, cached_at, provenance FROM terms")
            .into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .into_diagnostic()?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, namespace, cached_at, provenance) = row.into_diagnostic()?;
            let cached_at = from_unix(cached_at);
            entries.push(EntryInfo {
                id,
                namespace,
                cached_at,
                provenance: Provenance::from_db(&provenance),
                expired: self.is_expired(cached_at),
            });
        }
        Ok(entries)
    }

    /// Cleanup pass followed by compaction
    ///
    /// Without `all`, only rows past the TTL are removed. With `all`, every
    /// remote-sourced term plus all search results and relationship lists go.
    pub fn clear(&self, all: bool) -> Result<ClearStats> {
        let mut stats = ClearStats::default();
        {
            let conn = self.conn()?;
            if all {
                stats.terms_removed = conn
                    .execute(
                        "DELETE FROM terms WHERE provenance = ?1",
                        params![Provenance::Remote.as_str()],
                    )
                    .into_diagnostic()?;
                stats.searches_removed = conn
                    .execute("DELETE FROM search_results", [])
                    .into_diagnostic()?;
                stats.relations_removed = conn
                    .execute("DELETE FROM relationships", [])
                    .into_diagnostic()?;
            } else {
                let cutoff = self.expiry_cutoff();
                stats.terms_removed = conn
                    .execute("DELETE FROM terms WHERE cached_at <= ?1", params![cutoff])
                    .into_diagnostic()?;
                stats.searches_removed = conn
                    .execute(
                        "DELETE FROM search_results WHERE cached_at <= ?1",
                        params![cutoff],
                    )
                    .into_diagnostic()?;
                stats.relations_removed = conn
                    .execute(
                        "DELETE FROM relationships WHERE cached_at <= ?1",
                        params![cutoff],
                    )
                    .into_diagnostic()?;
            }
        }

        self.compact()?;
        info!(
            all,
            terms = stats.terms_removed,
            searches = stats.searches_removed,
            relations = stats.relations_removed,
            "cleared term cache"
        );
        Ok(stats)
    }

    /// Reclaim space left by deleted rows
    pub fn compact(&self) -> Result<()> {
        self.conn()?.execute_batch("VACUUM;").into_diagnostic()?;
        Ok(())
    }

    /// Get cache statistics
    pub fn statistics(&self) -> Result<CacheStats> {
        let cutoff = self.expiry_cutoff();
        let conn = self.conn()?;

        let count = |sql: &str| -> Result<usize> {
            conn.query_row(sql, [], |row| row.get::<_, usize>(0))
                .into_diagnostic()
        };
        let total_terms = count("SELECT COUNT(*) FROM terms")?;
        let total_searches = count("SELECT COUNT(*) FROM search_results")?;
        let total_relations = count("SELECT COUNT(*) FROM relationships")?;

        let remote_terms: usize = conn
            .query_row(
                "SELECT COUNT(*) FROM terms WHERE provenance = ?1",
                params![Provenance::Remote.as_str()],
                |row| row.get(0),
            )
            .into_diagnostic()?;
        let expired_terms: usize = conn
            .query_row(
                "SELECT COUNT(*) FROM terms WHERE cached_at <= ?1",
                params![cutoff],
                |row| row.get(0),
            )
            .into_diagnostic()?;

        let mut by_namespace = HashMap::new();
        {
            let mut stmt = conn
                .prepare("SELECT namespace, COUNT(*) FROM terms GROUP BY namespace")
                .into_diagnostic()?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?)))
                .into_diagnostic()?;

            for row in rows {
                let (namespace, count) = row.into_diagnostic()?;
                by_namespace.insert(namespace, count);
            }
        }

        let db_size_bytes = self
            .path
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(CacheStats {
            total_terms,
            remote_terms,
            expired_terms,
            total_searches,
            total_relations,
            by_namespace,
            db_size_bytes,
            ttl_days: self.ttl.num_days(),
        })
    }
}

/// Cache key for a search: SHA256 of the normalized query and namespace
fn search_key(query: &str, namespace: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.trim().to_lowercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(
        namespace
            .map(str::to_ascii_uppercase)
            .unwrap_or_default()
            .as_bytes(),
    );
    format!("{:x}", hasher.finalize())
}

fn join_list<I, T>(items: I) -> String
where
    I: Iterator<Item = T>,
    T: std::fmt::Display,
{
    items
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(&LIST_SEPARATOR.to_string())
}

fn split_list(s: Option<&str>) -> Vec<String> {
    s.map(|s| {
        s.split(LIST_SEPARATOR)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_ids(s: Option<&str>) -> Vec<TermId> {
    split_list(s)
        .iter()
        .filter_map(|raw| TermId::parse(raw).ok())
        .collect()
}

fn ttl_duration(ttl_days: i64) -> Result<Duration> {
    Duration::try_days(ttl_days)
        .ok_or_else(|| miette::miette!("cache TTL of {} days is out of range", ttl_days))
}

/// Unix seconds to DateTime<Utc>
fn from_unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
