//! Permission scope lookup and normalization.
//!
//! A caller's scope lives in the key-value cache under
//! `<prefix>:<callerId>` as a JSON object of six id arrays. This module
//! turns whatever is stored there (or nothing) into a complete
//! [`PermissionScope`]. Missing or malformed data never errors here: it
//! narrows the scope, and an empty scope denies everything downstream.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::PermissionScope;

/// Source of raw scope documents, keyed by cache key.
///
/// Connection errors are returned as `Err`; a missing key is `Ok(None)`.
#[async_trait]
pub trait ScopeStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
}

/// Cache key holding the scope for `caller_id`.
pub fn scope_key(prefix: &str, caller_id: &str) -> String {
    format!("{}:{}", prefix, caller_id)
}

impl PermissionScope {
    /// Normalize a raw cached value into a scope with all six buckets.
    ///
    /// Absent values, invalid JSON, and non-object documents yield the
    /// empty scope. Within an object, each bucket is read independently:
    /// a missing or non-array bucket is empty, and non-string entries are
    /// dropped.
    pub fn from_cached(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };

        let doc: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable permission scope, denying all");
                return Self::default();
            }
        };

        let Some(obj) = doc.as_object() else {
            tracing::warn!("permission scope is not a JSON object, denying all");
            return Self::default();
        };

        let bucket = |name: &str| read_bucket(obj.get(name), name);

        Self {
            header_section_ids: bucket("header_section_doc_ids"),
            line_item_section_ids: bucket("line_item_section_doc_ids"),
            header_clause_ids: bucket("header_clause_doc_ids"),
            line_item_clause_ids: bucket("line_item_clause_doc_ids"),
            attachment_ids: bucket("attachment_doc_ids"),
            meta_ids: bucket("meta_doc_ids"),
        }
    }
}

fn read_bucket(value: Option<&Value>, name: &str) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => {
            let ids: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            if ids.len() != items.len() {
                tracing::warn!(
                    bucket = name,
                    dropped = items.len() - ids.len(),
                    "dropped non-string ids from permission scope"
                );
            }
            ids
        }
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            tracing::warn!(bucket = name, "permission bucket is not an array, treating as empty");
            Vec::new()
        }
    }
}

/// Fetch and normalize the scope for `caller_id`.
///
/// Store errors propagate so the invocation fails without searching.
pub async fn fetch_scope(
    store: &dyn ScopeStore,
    prefix: &str,
    caller_id: &str,
) -> Result<PermissionScope> {
    let key = scope_key(prefix, caller_id);
    let raw = store.get(&key).await?;
    if raw.is_none() {
        tracing::warn!(key = %key, "no permission scope cached for caller");
    }
    Ok(PermissionScope::from_cached(raw.as_deref()))
}

/// In-process [`ScopeStore`] for tests and offline runs.
#[derive(Default)]
pub struct MemoryScopeStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryScopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.into(), value.into());
        }
    }
}

#[async_trait]
impl ScopeStore for MemoryScopeStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("scope store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }
}
