//! Permission-scoped search, end to end.
//!
//! [`ScopedSearch`] runs one invocation through the fixed sequence:
//!
//! ```text
//! scope store ──▶ normalize ──▶ build_filter ──▶ inject ──┐
//!                                                         ▼
//!        reduce ◀── search ◀── apply_highlight ◀── get_mappings
//! ```
//!
//! The caller's body is copied before composition, and the search is only
//! issued after the permission clause is in place. Any failing step aborts
//! the invocation with an error; nothing is retried.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::compose::{inject_with, FilterPlacement};
use crate::config::Config;
use crate::engine::SearchEngine;
use crate::filter::build_filter_with_sentinel;
use crate::highlight::apply_highlight;
use crate::reduce::reduce_response;
use crate::scope::{fetch_scope, ScopeStore};

/// Composed request ready to send, as printed by the `compose` command.
#[derive(Debug, Clone, Serialize)]
pub struct ComposedRequest {
    pub index: String,
    pub body: Map<String, Value>,
}

/// Permission policy knobs taken from `[cache]` and `[permissions]`.
#[derive(Debug, Clone)]
pub struct ScopePolicy {
    pub key_prefix: String,
    pub placement: FilterPlacement,
    pub deny_sentinel: String,
}

impl ScopePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            key_prefix: config.cache.key_prefix.clone(),
            placement: config.permissions.placement,
            deny_sentinel: config.permissions.deny_sentinel.clone(),
        }
    }
}

impl Default for ScopePolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct ScopedSearch {
    scopes: Arc<dyn ScopeStore>,
    engine: Arc<dyn SearchEngine>,
    policy: ScopePolicy,
}

impl ScopedSearch {
    pub fn new(
        scopes: Arc<dyn ScopeStore>,
        engine: Arc<dyn SearchEngine>,
        policy: ScopePolicy,
    ) -> Self {
        Self {
            scopes,
            engine,
            policy,
        }
    }

    pub fn engine(&self) -> &dyn SearchEngine {
        self.engine.as_ref()
    }

    /// Resolve the caller's scope and merge its filter into a copy of `body`.
    pub async fn compose(
        &self,
        index: &str,
        body: &Map<String, Value>,
        caller_id: &str,
    ) -> Result<ComposedRequest> {
        let scope = fetch_scope(self.scopes.as_ref(), &self.policy.key_prefix, caller_id).await?;
        let filter = build_filter_with_sentinel(index, &scope, &self.policy.deny_sentinel);

        let mut composed = body.clone();
        inject_with(&mut composed, filter, self.policy.placement);

        let logged = Value::Object(composed.clone());
        tracing::debug!(index, body = %logged, "composed permission-scoped query");

        Ok(ComposedRequest {
            index: index.to_string(),
            body: composed,
        })
    }

    /// Compose, highlight, execute, and reduce one search.
    ///
    /// Returns the text fragments: aggregations, metadata line, then hits.
    pub async fn search(
        &self,
        index: &str,
        body: &Map<String, Value>,
        caller_id: &str,
    ) -> Result<Vec<String>> {
        let ComposedRequest { index, mut body } = self.compose(index, body, caller_id).await?;

        let mappings = self.engine.get_mappings(&index).await?;
        apply_highlight(&mut body, &mappings);

        let response = self.engine.search(&index, &body).await?;

        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0);
        Ok(reduce_response(&response, from))
    }
}
