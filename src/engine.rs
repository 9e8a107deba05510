//! Search engine access.
//!
//! [`SearchEngine`] is the seam between the permission pipeline and the
//! cluster. [`ElasticsearchClient`] implements it over the Elasticsearch
//! REST API with `reqwest`; tests substitute an in-memory engine.
//!
//! # Authentication
//!
//! | Config | Header |
//! |--------|--------|
//! | `api_key` | `Authorization: ApiKey <key>` |
//! | `username` + `password` | HTTP basic auth |
//! | neither | none (local development) |
//!
//! An API key wins when both are configured.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::ElasticsearchConfig;
use crate::models::{IndexSummary, ShardSummary};

/// Operations the tools need from the search engine.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Indices matching `pattern` (`_cat/indices`).
    async fn list_indices(&self, pattern: &str) -> Result<Vec<IndexSummary>>;

    /// The `mappings` object for `index`, or `{}` when the index has none.
    async fn get_mappings(&self, index: &str) -> Result<Value>;

    /// Execute `body` against `index` and return the raw response.
    async fn search(&self, index: &str, body: &Map<String, Value>) -> Result<Value>;

    /// Shard allocation, optionally restricted to `index` (`_cat/shards`).
    async fn list_shards(&self, index: Option<&str>) -> Result<Vec<ShardSummary>>;
}

enum Auth {
    None,
    ApiKey(String),
    Basic { username: String, password: String },
}

/// REST client for an Elasticsearch cluster.
pub struct ElasticsearchClient {
    http: Client,
    base: Url,
    auth: Auth,
}

impl ElasticsearchClient {
    /// Build a client from configuration.
    ///
    /// A CA certificate that cannot be read or parsed is logged and
    /// skipped; the client then relies on the system trust roots.
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let base = Url::parse(config.url.trim())
            .with_context(|| format!("Invalid Elasticsearch URL format: {}", config.url))?;

        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        if let Some(path) = &config.ca_cert {
            match load_certificate(path) {
                Ok(cert) => {
                    builder = builder.add_root_certificate(cert);
                    tracing::debug!(path = %path.display(), "loaded CA certificate");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read certificate file");
                }
            }
        }

        let auth = match (&config.api_key, &config.username, &config.password) {
            (Some(key), _, _) if !key.is_empty() => Auth::ApiKey(key.clone()),
            (_, Some(username), Some(password)) if !username.is_empty() => Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Auth::None,
        };

        Ok(Self {
            http: builder.build()?,
            base,
            auth,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Elasticsearch URL cannot be a base: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::None => request,
            Auth::ApiKey(key) => request.header("Authorization", format!("ApiKey {}", key)),
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self
            .authorize(request)
            .send()
            .await
            .with_context(|| format!("{}: request failed", what))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{}: Elasticsearch returned {}: {}", what, status, error_reason(&body));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("{}: invalid response body", what))
    }
}

fn load_certificate(path: &std::path::Path) -> Result<reqwest::Certificate> {
    let pem = std::fs::read(path)
        .with_context(|| format!("Failed to read certificate file: {}", path.display()))?;
    reqwest::Certificate::from_pem(&pem)
        .with_context(|| format!("Invalid PEM certificate: {}", path.display()))
}

/// Pull `error.reason` out of an Elasticsearch error body, falling back to
/// the raw text.
fn error_reason(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/reason")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Pick the mappings for `index` out of a `GET /<index>/_mapping` response.
///
/// When `index` is an alias the response is keyed by the concrete index;
/// a single entry is used as-is.
pub fn extract_mappings(response: &Value, index: &str) -> Value {
    let entry = response.get(index).or_else(|| {
        response
            .as_object()
            .filter(|m| m.len() == 1)
            .and_then(|m| m.values().next())
    });
    entry
        .and_then(|e| e.get("mappings"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

#[async_trait]
impl SearchEngine for ElasticsearchClient {
    async fn list_indices(&self, pattern: &str) -> Result<Vec<IndexSummary>> {
        let url = self.url(&["_cat", "indices", pattern])?;
        self.send(
            self.http.get(url).query(&[("format", "json")]),
            "list indices",
        )
        .await
    }

    async fn get_mappings(&self, index: &str) -> Result<Value> {
        let url = self.url(&[index, "_mapping"])?;
        let response: Value = self.send(self.http.get(url), "get mappings").await?;
        Ok(extract_mappings(&response, index))
    }

    async fn search(&self, index: &str, body: &Map<String, Value>) -> Result<Value> {
        let url = self.url(&[index, "_search"])?;
        self.send(self.http.post(url).json(body), "search").await
    }

    async fn list_shards(&self, index: Option<&str>) -> Result<Vec<ShardSummary>> {
        let url = match index {
            Some(index) => self.url(&["_cat", "shards", index])?,
            None => self.url(&["_cat", "shards"])?,
        };
        self.send(
            self.http.get(url).query(&[("format", "json")]),
            "list shards",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(url: &str) -> ElasticsearchClient {
        ElasticsearchClient::new(&ElasticsearchConfig {
            url: url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_building() {
        let c = client("http://localhost:9200");
        assert_eq!(
            c.url(&["cdc_line_items", "_search"]).unwrap().as_str(),
            "http://localhost:9200/cdc_line_items/_search"
        );

        let c = client("https://es.example.com/proxy/");
        assert_eq!(
            c.url(&["_cat", "indices", "cdc_*"]).unwrap().as_str(),
            "https://es.example.com/proxy/_cat/indices/cdc_*"
        );
    }

    #[test]
    fn test_url_segments_escaped() {
        let c = client("http://localhost:9200");
        let url = c.url(&["a/b", "_mapping"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/a%2Fb/_mapping");
    }

    #[test]
    fn test_auth_selection() {
        let c = ElasticsearchClient::new(&ElasticsearchConfig {
            url: "http://localhost:9200".into(),
            api_key: Some("k".into()),
            username: Some("u".into()),
            password: Some("p".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(c.auth, Auth::ApiKey(ref k) if k == "k"));

        let c = ElasticsearchClient::new(&ElasticsearchConfig {
            url: "http://localhost:9200".into(),
            username: Some("u".into()),
            password: Some("p".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(c.auth, Auth::Basic { .. }));

        assert!(matches!(client("http://localhost:9200").auth, Auth::None));
    }

    #[test]
    fn test_missing_ca_cert_is_not_fatal() {
        let c = ElasticsearchClient::new(&ElasticsearchConfig {
            url: "http://localhost:9200".into(),
            ca_cert: Some("/nonexistent/ca.pem".into()),
            ..Default::default()
        });
        assert!(c.is_ok());
    }

    #[test]
    fn test_extract_mappings() {
        let response = json!({
            "cdc_clauses_data": { "mappings": { "properties": { "TEXT": { "type": "text" } } } }
        });
        assert_eq!(
            extract_mappings(&response, "cdc_clauses_data"),
            json!({ "properties": { "TEXT": { "type": "text" } } })
        );
        // alias resolves to the single concrete index
        assert_eq!(
            extract_mappings(&response, "clauses"),
            json!({ "properties": { "TEXT": { "type": "text" } } })
        );
        assert_eq!(extract_mappings(&json!({}), "x"), json!({}));
    }

    #[test]
    fn test_error_reason() {
        let body = r#"{"error":{"type":"index_not_found_exception","reason":"no such index [x]"},"status":404}"#;
        assert_eq!(error_reason(body), "no such index [x]");
        assert_eq!(error_reason("gateway timeout"), "gateway timeout");
    }
}
