//! Configuration management with layered hierarchy
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. Global user config (`<config dir>/ontoresolve/config.yaml`)
//! 3. An explicit file (`--config`)
//! 4. `ONTO_*` environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::cache::CACHE_FILE;
use crate::core::remote::{RemoteSettings, DEFAULT_REMOTE_URL};

/// Upper bound for `cache_ttl_days` (a century)
pub const MAX_CACHE_TTL_DAYS: i64 = 36_500;

/// Errors that make the configuration unusable (fatal at startup)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("invalid config file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("cache location {path} is not usable: {message}")]
    CacheLocation { path: PathBuf, message: String },
}

/// Resolver configuration; every field is optional in files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the remote ontology lookup service
    pub remote_url: String,

    /// SQLite cache file
    pub cache_path: Option<PathBuf>,

    /// Days before a cached entry expires
    pub cache_ttl_days: i64,

    /// Per-request timeout for remote lookups
    pub timeout_secs: u64,

    /// Resubmissions of a transient remote failure
    pub max_retries: u32,

    /// Concurrent remote fetches per batch
    pub batch_size: usize,

    /// Disable the remote tier entirely
    pub offline: bool,

    /// Depth bound for ancestor/descendant traversal
    pub max_depth: usize,

    /// Extra directory of YAML term files for the Term Store
    pub terms_dir: Option<PathBuf>,

    /// CSV of corpus annotation frequencies (`id,count`)
    pub corpus_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            cache_path: None,
            cache_ttl_days: 30,
            timeout_secs: 30,
            max_retries: 2,
            batch_size: 8,
            offline: false,
            max_depth: 15,
            terms_dir: None,
            corpus_path: None,
        }
    }
}

/// Partial config as read from a file; only present keys override
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigLayer {
    remote_url: Option<String>,
    cache_path: Option<PathBuf>,
    cache_ttl_days: Option<i64>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    batch_size: Option<usize>,
    offline: Option<bool>,
    max_depth: Option<usize>,
    terms_dir: Option<PathBuf>,
    corpus_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Global user config is optional; a broken one is still an error
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                config.merge(Self::read_layer(&global_path)?);
            }
        }

        if let Some(path) = explicit {
            config.merge(Self::read_layer(path)?);
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ontoresolve")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Default cache location in the platform cache directory
    pub fn default_cache_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "ontoresolve")
            .map(|dirs| dirs.cache_dir().join(CACHE_FILE))
            .unwrap_or_else(|| PathBuf::from(".ontoresolve").join(CACHE_FILE))
    }

    /// Effective cache file
    pub fn cache_file(&self) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(Self::default_cache_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Settings for the remote lookup client
    pub fn remote_settings(&self) -> RemoteSettings {
        RemoteSettings {
            base_url: self.remote_url.clone(),
            timeout: self.timeout(),
            max_retries: self.max_retries,
        }
    }

    fn read_layer(path: &Path) -> Result<ConfigLayer, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if contents.trim().is_empty() {
            return Ok(ConfigLayer::default());
        }
        serde_yml::from_str(&contents).map_err(|e| ConfigError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Merge a file layer into this config (layer takes precedence)
    fn merge(&mut self, layer: ConfigLayer) {
        if let Some(v) = layer.remote_url {
            self.remote_url = v;
        }
        if layer.cache_path.is_some() {
            self.cache_path = layer.cache_path;
        }
        if let Some(v) = layer.cache_ttl_days {
            self.cache_ttl_days = v;
        }
        if let Some(v) = layer.timeout_secs {
            self.timeout_secs = v;
        }
        if let Some(v) = layer.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = layer.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = layer.offline {
            self.offline = v;
        }
        if let Some(v) = layer.max_depth {
            self.max_depth = v;
        }
        if layer.terms_dir.is_some() {
            self.terms_dir = layer.terms_dir;
        }
        if layer.corpus_path.is_some() {
            self.corpus_path = layer.corpus_path;
        }
    }

    /// Apply `ONTO_*` overrides from an environment lookup
    fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("ONTO_REMOTE_URL") {
            self.remote_url = url;
        }
        if let Some(path) = var("ONTO_CACHE_PATH") {
            self.cache_path = Some(PathBuf::from(path));
        }
        if let Some(path) = var("ONTO_TERMS_DIR") {
            self.terms_dir = Some(PathBuf::from(path));
        }
        if let Some(path) = var("ONTO_CORPUS") {
            self.corpus_path = Some(PathBuf::from(path));
        }
        if let Some(v) = var("ONTO_CACHE_TTL_DAYS") {
            self.cache_ttl_days = parse_env("ONTO_CACHE_TTL_DAYS", &v)?;
        }
        if let Some(v) = var("ONTO_TIMEOUT_SECS") {
            self.timeout_secs = parse_env("ONTO_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("ONTO_MAX_RETRIES") {
            self.max_retries = parse_env("ONTO_MAX_RETRIES", &v)?;
        }
        if let Some(v) = var("ONTO_BATCH_SIZE") {
            self.batch_size = parse_env("ONTO_BATCH_SIZE", &v)?;
        }
        if let Some(v) = var("ONTO_OFFLINE") {
            self.offline = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        Ok(())
    }

    /// Reject values the resolver cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "must be at least 1"));
        }
        if self.max_depth == 0 {
            return Err(invalid("max_depth", "must be at least 1"));
        }
        if self.cache_ttl_days < 0 {
            return Err(invalid("cache_ttl_days", "must not be negative"));
        }
        if self.cache_ttl_days > MAX_CACHE_TTL_DAYS {
            return Err(invalid(
                "cache_ttl_days",
                &format!("must be at most {}", MAX_CACHE_TTL_DAYS),
            ));
        }
        if !self.offline && reqwest::Url::parse(&self.remote_url).is_err() {
            return Err(invalid("remote_url", "not a valid URL"));
        }
        Ok(())
    }

    /// Config as YAML, for `onto config show`
    pub fn to_yaml(&self) -> String {
        serde_yml::to_string(self).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_ttl_days, 30);
        assert_eq!(config.max_depth, 15);
        assert!(!config.offline);
    }

    #[test]
    fn test_file_layer_overrides_only_present_keys() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "batch_size: 4\noffline: true\n").unwrap();

        let mut config = Config::default();
        config.merge(Config::read_layer(&path).unwrap());
        assert_eq!(config.batch_size, 4);
        assert!(config.offline);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "batch_size: [oops\n").unwrap();
        assert!(matches!(
            Config::read_layer(&path),
            Err(ConfigError::Malformed { .. })
        ));

        std::fs::write(&path, "unknown_key: 1\n").unwrap();
        assert!(matches!(
            Config::read_layer(&path),
            Err(ConfigError::Malformed { .. })
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/onto.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("ONTO_OFFLINE", "yes"),
                ("ONTO_BATCH_SIZE", "16"),
                ("ONTO_CACHE_PATH", "/tmp/onto.db"),
            ]))
            .unwrap();
        assert!(config.offline);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.cache_file(), PathBuf::from("/tmp/onto.db"));
    }

    #[test]
    fn test_env_bad_number_is_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("ONTO_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ONTO_TIMEOUT_SECS"));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            remote_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_cache_ttl() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("ONTO_CACHE_TTL_DAYS", "9223372036854775807")]))
            .unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "cache_ttl_days"));

        config.cache_ttl_days = MAX_CACHE_TTL_DAYS;
        assert!(config.validate().is_ok());
    }
}
