//! Remote Lookup Client - fetches term metadata from an OLS-style service
//!
//! Talks to the Ontology Lookup Service REST API with a blocking HTTP
//! client. Every request is bounded by a timeout. Failures are classified
//! into four classes so callers and counters can tell "nothing there" from
//! "service degraded":
//!
//! - `timeout`: the request did not complete in time
//! - `not_found`: non-success status or empty body
//! - `transport_error`: connection-level failure
//! - `parse_error`: the payload could not be understood
//!
//! Transient failures (timeouts, transport errors and 5xx responses) are
//! resubmitted up to `max_retries` times with a short jittered pause.

use rand::Rng;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::identity::TermId;
use crate::core::term::Term;

/// Public EBI OLS4 API
pub const DEFAULT_REMOTE_URL: &str = "https://www.ebi.ac.uk/ols4/api";

/// Base pause between retries; attempt N waits N times this plus jitter
const RETRY_BASE_DELAY_MS: u64 = 200;

/// Failure classes reported by the remote tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorClass {
    Timeout,
    NotFound,
    Transport,
    Parse,
}

impl RemoteErrorClass {
    /// Stable name used as the counter key
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteErrorClass::Timeout => "timeout",
            RemoteErrorClass::NotFound => "not_found",
            RemoteErrorClass::Transport => "transport_error",
            RemoteErrorClass::Parse => "parse_error",
        }
    }
}

impl fmt::Display for RemoteErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during remote lookups
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("request for {target} timed out after {timeout_secs}s")]
    Timeout { target: String, timeout_secs: u64 },

    #[error("{target} not found{}", status_suffix(.status))]
    NotFound { target: String, status: Option<u16> },

    #[error("transport error for {target}: {message}")]
    Transport { target: String, message: String },

    #[error("malformed payload for {target}: {message}")]
    Parse { target: String, message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl RemoteError {
    pub fn class(&self) -> RemoteErrorClass {
        match self {
            RemoteError::Timeout { .. } => RemoteErrorClass::Timeout,
            RemoteError::NotFound { .. } => RemoteErrorClass::NotFound,
            RemoteError::Transport { .. } => RemoteErrorClass::Transport,
            RemoteError::Parse { .. } => RemoteErrorClass::Parse,
        }
    }

    /// Whether resubmitting the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Timeout { .. } | RemoteError::Transport { .. } => true,
            RemoteError::NotFound { status, .. } => status.is_some_and(|s| s >= 500),
            RemoteError::Parse { .. } => false,
        }
    }
}

/// Fallback term source consulted after the store and cache miss
pub trait RemoteLookup: Send + Sync {
    /// Fetch one term by ID
    fn fetch(&self, id: &TermId) -> Result<Term, RemoteError>;

    /// Free-text search, optionally restricted to one namespace
    fn search(
        &self,
        query: &str,
        namespace: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Term>, RemoteError>;
}

/// Settings for [`OlsClient`]
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REMOTE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

/// OLS REST client
pub struct OlsClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

impl OlsClient {
    /// Create a new client; fails only if the HTTP stack cannot initialize
    pub fn new(settings: RemoteSettings) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout)
            .user_agent(concat!("ontoresolve/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Transport {
                target: settings.base_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            timeout: settings.timeout,
            max_retries: settings.max_retries,
        })
    }

    /// Term endpoint: the OBO IRI is URL-encoded twice, as OLS requires
    pub fn term_url(&self, id: &TermId) -> String {
        let iri = id.to_iri();
        let once = urlencoding::encode(&iri);
        let twice = urlencoding::encode(&once);
        format!(
            "{}/ontologies/{}/terms/{}",
            self.base_url,
            id.namespace().to_ascii_lowercase(),
            twice
        )
    }

    pub fn search_url(&self, query: &str, namespace: Option<&str>, limit: usize) -> String {
        let mut url = format!(
            "{}/search?q={}&rows={}&fieldList=iri,obo_id,label,description,synonym,ontology_name",
            self.base_url,
            urlencoding::encode(query),
            limit
        );
        if let Some(ns) = namespace {
            url.push_str("&ontology=");
            url.push_str(&urlencoding::encode(&ns.to_ascii_lowercase()));
        }
        url
    }

    /// GET a URL, retrying transient failures
    fn get_with_retry(&self, url: &str, what: &str) -> Result<String, RemoteError> {
        let mut attempt = 0;
        loop {
            match self.get_once(url, what) {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let jitter = rand::rng().random_range(0..100);
                    let pause = RETRY_BASE_DELAY_MS * u64::from(attempt) + jitter;
                    info!(request = what, attempt, error = %e, pause_ms = pause, "retrying remote lookup");
                    std::thread::sleep(Duration::from_millis(pause));
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn get_once(&self, url: &str, target: &str) -> Result<String, RemoteError> {
        debug!(url, "remote GET");
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| self.classify(e, target))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::NotFound {
                target: target.to_string(),
                status: Some(status.as_u16()),
            });
        }

        let body = response.text().map_err(|e| self.classify(e, target))?;
        if body.trim().is_empty() {
            return Err(RemoteError::NotFound {
                target: target.to_string(),
                status: None,
            });
        }
        Ok(body)
    }

    fn classify(&self, error: reqwest::Error, target: &str) -> RemoteError {
        if error.is_timeout() {
            RemoteError::Timeout {
                target: target.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else if error.is_decode() {
            RemoteError::Parse {
                target: target.to_string(),
                message: error.to_string(),
            }
        } else {
            RemoteError::Transport {
                target: target.to_string(),
                message: error.to_string(),
            }
        }
    }

    /// Is-a parents of a term; failures degrade to no parents
    fn fetch_parents(&self, id: &TermId) -> Vec<TermId> {
        let url = format!("{}/parents", self.term_url(id));
        let target = format!("{} parents", id);
        match self
            .get_with_retry(&url, &target)
            .and_then(|body| parse_parents(&body, &target))
        {
            Ok(parents) => parents,
            Err(RemoteError::NotFound { .. }) => Vec::new(),
            Err(e) => {
                warn!(id = %id, error = %e, "parent lookup failed; continuing without parents");
                Vec::new()
            }
        }
    }
}

impl RemoteLookup for OlsClient {
    fn fetch(&self, id: &TermId) -> Result<Term, RemoteError> {
        let target = id.to_string();
        let body = self.get_with_retry(&self.term_url(id), &target)?;
        let payload = parse_payload(&body, &target)?;
        let parents = self.fetch_parents(id);
        payload.into_term(id, parents)
    }

    fn search(
        &self,
        query: &str,
        namespace: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Term>, RemoteError> {
        let target = format!("search '{}'", query);
        let body = self.get_with_retry(&self.search_url(query, namespace, limit), &target)?;
        parse_search(&body, &target)
    }
}

/// Term payload shared by the term and search endpoints
#[derive(Debug, Deserialize)]
struct TermPayload {
    #[serde(default)]
    iri: Option<String>,
    #[serde(default)]
    obo_id: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Vec<String>,
    #[serde(default, alias = "synonym")]
    synonyms: Vec<String>,
    #[serde(default)]
    annotation: Option<Annotation>,
}

#[derive(Debug, Default, Deserialize)]
struct Annotation {
    #[serde(default)]
    database_cross_reference: Vec<String>,
}

impl TermPayload {
    /// Identity carried by the payload itself, if any
    fn own_id(&self) -> Option<TermId> {
        self.obo_id
            .as_deref()
            .and_then(|s| TermId::parse(s).ok())
            .or_else(|| self.iri.as_deref().and_then(TermId::from_iri))
    }

    fn into_term(self, requested: &TermId, parents: Vec<TermId>) -> Result<Term, RemoteError> {
        let id = self.own_id().unwrap_or_else(|| requested.clone());
        let label = self.label.unwrap_or_default();
        let xrefs = self
            .annotation
            .map(|a| a.database_cross_reference)
            .unwrap_or_default();

        Term::builder(id, label)
            .map(|b| {
                b.definition(self.description.into_iter().next())
                    .synonyms(self.synonyms)
                    .parents(parents)
                    .xrefs(xrefs)
                    .build()
            })
            .map_err(|e| RemoteError::Parse {
                target: requested.to_string(),
                message: e.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddedTerms {
    #[serde(rename = "_embedded", default)]
    embedded: Option<TermList>,
}

#[derive(Debug, Deserialize)]
struct TermList {
    #[serde(default)]
    terms: Vec<TermPayload>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchResponse,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<TermPayload>,
}

fn parse_payload(body: &str, target: &str) -> Result<TermPayload, RemoteError> {
    serde_json::from_str(body).map_err(|e| RemoteError::Parse {
        target: target.to_string(),
        message: e.to_string(),
    })
}

fn parse_parents(body: &str, target: &str) -> Result<Vec<TermId>, RemoteError> {
    let envelope: EmbeddedTerms = serde_json::from_str(body).map_err(|e| RemoteError::Parse {
        target: target.to_string(),
        message: e.to_string(),
    })?;

    Ok(envelope
        .embedded
        .map(|list| list.terms)
        .unwrap_or_default()
        .iter()
        .filter_map(TermPayload::own_id)
        .collect())
}

/// Search hits without a resolvable ID or label are skipped
fn parse_search(body: &str, target: &str) -> Result<Vec<Term>, RemoteError> {
    let envelope: SearchEnvelope = serde_json::from_str(body).map_err(|e| RemoteError::Parse {
        target: target.to_string(),
        message: e.to_string(),
    })?;

    Ok(envelope
        .response
        .docs
        .into_iter()
        .filter_map(|doc| {
            let id = doc.own_id()?;
            doc.into_term(&id, Vec::new()).ok()
        })
        .collect())
}
