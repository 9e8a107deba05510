//! Configuration loading and validation.
//!
//! Settings come from an optional TOML file and are then overlaid with the
//! `ES_*` / `REDIS_*` environment variables, so a deployment that only sets
//! environment variables (the usual MCP client setup) needs no file at all.
//!
//! ```toml
//! [elasticsearch]
//! url = "https://localhost:9200"
//! api_key = "..."
//!
//! [cache]
//! url = "redis://127.0.0.1:6379"
//!
//! [permissions]
//! placement = "must"
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::compose::FilterPlacement;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub permissions: PermissionsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Path to a PEM-encoded CA certificate for TLS.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            username: None,
            password: None,
            ca_cert: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Full connection URL. Takes precedence over host/port/password.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_cache_host")]
    pub host: String,
    #[serde(default = "default_cache_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_cache_host(),
            port: default_cache_port(),
            password: None,
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_cache_host() -> String {
    "localhost".to_string()
}
fn default_cache_port() -> u16 {
    6379
}
fn default_key_prefix() -> String {
    "GLOBAL_SEARCH_INDEX_ID_MAPPING".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PermissionsConfig {
    /// Which `bool` array receives the permission clause.
    #[serde(default)]
    pub placement: FilterPlacement,
    /// Id value that matches no document; used to express deny-all.
    #[serde(default = "default_deny_sentinel")]
    pub deny_sentinel: String,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            placement: FilterPlacement::default(),
            deny_sentinel: default_deny_sentinel(),
        }
    }
}

fn default_deny_sentinel() -> String {
    "__none__".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay environment values onto this config.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a closure over
    /// a fixed map. Empty values count as unset; a `REDIS_PORT` that is
    /// not a port number is an error.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("ES_URL") {
            self.elasticsearch.url = url;
        }
        if let Some(key) = get("ES_API_KEY") {
            self.elasticsearch.api_key = Some(key);
        }
        if let Some(user) = get("ES_USERNAME") {
            self.elasticsearch.username = Some(user);
        }
        if let Some(pass) = get("ES_PASSWORD") {
            self.elasticsearch.password = Some(pass);
        }
        if let Some(cert) = get("ES_CA_CERT") {
            self.elasticsearch.ca_cert = Some(PathBuf::from(cert));
        }
        if let Some(url) = get("REDIS_URL") {
            self.cache.url = Some(url);
        }
        if let Some(host) = get("REDIS_HOST") {
            self.cache.host = host;
        }
        if let Some(port) = get("REDIS_PORT") {
            self.cache.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid REDIS_PORT: {}", port))?;
        }
        if let Some(pass) = get("REDIS_PASSWORD") {
            self.cache.password = Some(pass);
        }

        Ok(())
    }

    /// Check cross-field constraints. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        let es = &self.elasticsearch;
        let url = es.url.trim();
        if url.is_empty() {
            bail!("Elasticsearch URL cannot be empty (set ES_URL or elasticsearch.url)");
        }
        let parsed = reqwest::Url::parse(url)
            .with_context(|| format!("Invalid Elasticsearch URL format: {}", url))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            bail!("Invalid Elasticsearch URL format: {}", url);
        }

        let has_user = es.username.as_deref().is_some_and(|u| !u.is_empty());
        let has_pass = es.password.as_deref().is_some_and(|p| !p.is_empty());
        if has_user != has_pass {
            bail!(
                "Either ES_API_KEY or both ES_USERNAME and ES_PASSWORD must be provided, \
                 or no auth for local development"
            );
        }

        if self.cache.port == 0 {
            bail!("cache.port must be > 0");
        }
        if self.cache.key_prefix.trim().is_empty() {
            bail!("cache.key_prefix must not be empty");
        }
        if self.permissions.deny_sentinel.is_empty() {
            bail!("permissions.deny_sentinel must not be empty");
        }

        Ok(())
    }
}

/// Load configuration from an optional TOML file, overlay the environment,
/// and validate.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        None => Config::default(),
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;

    Ok(config)
}
