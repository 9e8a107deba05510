//! Tool trait, built-in tools, and the registry the transports dispatch to.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                ToolRegistry                  │
//! │  list_indices  get_mappings  search  shards  │
//! └──────────────┬───────────────────┬───────────┘
//!                ▼                   ▼
//!        mcp::McpBridge      server (HTTP /tools)
//! ```
//!
//! Every tool receives a [`ToolContext`] carrying the shared
//! [`ScopedSearch`] handle; tools never open their own connections.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::Instrument;

use crate::gateway::ScopedSearch;
use crate::models::ToolOutput;

/// A tool callers can discover and invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores, e.g. `"list_indices"`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Run the tool with parameters already checked by [`validate_params`].
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput>;
}

/// Handles shared by every tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    search: Arc<ScopedSearch>,
}

impl ToolContext {
    pub fn new(search: Arc<ScopedSearch>) -> Self {
        Self { search }
    }

    pub fn search(&self) -> &ScopedSearch {
        &self.search
    }
}

/// Descriptor returned by tool listings.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        }
    }
}

fn str_param<'a>(params: &'a Value, name: &str) -> &'a str {
    params[name].as_str().unwrap_or("").trim()
}

fn pretty(value: &impl Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in tools
// ═══════════════════════════════════════════════════════════════════════

pub struct ListIndicesTool;

#[async_trait]
impl Tool for ListIndicesTool {
    fn name(&self) -> &str {
        "list_indices"
    }

    fn description(&self) -> &str {
        "List all available Elasticsearch indices"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "indexPattern": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Index pattern of Elasticsearch indices to list"
                }
            },
            "required": ["indexPattern"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let pattern = str_param(&params, "indexPattern");
        if pattern.is_empty() {
            bail!("Index pattern is required");
        }

        let indices = ctx.search().engine().list_indices(pattern).await?;
        Ok(ToolOutput::new(vec![
            format!("Found {} indices", indices.len()),
            pretty(&indices)?,
        ]))
    }
}

pub struct GetMappingsTool;

#[async_trait]
impl Tool for GetMappingsTool {
    fn name(&self) -> &str {
        "get_mappings"
    }

    fn description(&self) -> &str {
        "Get field mappings for a specific Elasticsearch index"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "index": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Name of the Elasticsearch index to get mappings for"
                }
            },
            "required": ["index"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let index = str_param(&params, "index");
        if index.is_empty() {
            bail!("Index name is required");
        }

        let mappings = ctx.search().engine().get_mappings(index).await?;
        Ok(ToolOutput::new(vec![
            format!("Mappings for index: {}", index),
            format!("Mappings for index {}: {}", index, pretty(&mappings)?),
        ]))
    }
}

pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Perform an Elasticsearch search with the provided query DSL. \
         Results are restricted to documents the user may see. Highlights are always enabled."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "index": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Name of the Elasticsearch index to search"
                },
                "queryBody": {
                    "type": "object",
                    "description": "Complete Elasticsearch query DSL object that can include query, size, from, sort, etc."
                },
                "userId": {
                    "type": "string",
                    "minLength": 1,
                    "description": "User ID for permission filtering"
                }
            },
            "required": ["index", "queryBody", "userId"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let index = str_param(&params, "index");
        if index.is_empty() {
            bail!("Index name is required");
        }
        let user_id = str_param(&params, "userId");
        if user_id.is_empty() {
            bail!("userId must not be empty");
        }
        let Some(body) = params["queryBody"].as_object() else {
            bail!("queryBody must be a valid Elasticsearch query DSL object");
        };

        let fragments = ctx.search().search(index, body, user_id).await?;
        Ok(ToolOutput::new(fragments))
    }
}

pub struct GetShardsTool;

#[async_trait]
impl Tool for GetShardsTool {
    fn name(&self) -> &str {
        "get_shards"
    }

    fn description(&self) -> &str {
        "Get shard information for all or specific indices"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "index": {
                    "type": "string",
                    "description": "Optional index name to get shard information for"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let index = Some(str_param(&params, "index")).filter(|i| !i.is_empty());

        let shards = ctx.search().engine().list_shards(index).await?;
        let heading = match index {
            Some(index) => format!("Found {} shards for index {}", shards.len(), index),
            None => format!("Found {} shards", shards.len()),
        };
        Ok(ToolOutput::new(vec![heading, pretty(&shards)?]))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter validation
// ═══════════════════════════════════════════════════════════════════════

/// Check `params` against a tool's parameter schema.
///
/// Enforces `required`, the JSON `type` of each declared property, and
/// `minLength` on (trimmed) strings. Injects `default` values for absent
/// properties. Undeclared properties pass through.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!("parameters must be an object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for req_field in &required {
        if !params_obj.contains_key(*req_field) {
            bail!("missing required parameter: {}", req_field);
        }
    }

    let mut result = params_obj.clone();

    for (prop_name, prop_schema) in &properties {
        let Some(value) = params_obj.get(prop_name) else {
            if let Some(default) = prop_schema.get("default") {
                result.insert(prop_name.clone(), default.clone());
            }
            continue;
        };

        if let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected_type {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                bail!(
                    "invalid parameter '{}': must be of type '{}', got {}",
                    prop_name,
                    expected_type,
                    json_type_name(value)
                );
            }
        }

        if let (Some(min), Some(s)) = (
            prop_schema.get("minLength").and_then(|m| m.as_u64()),
            value.as_str(),
        ) {
            if (s.trim().chars().count() as u64) < min {
                bail!("invalid parameter '{}': must not be empty", prop_name);
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Ordered collection of tools.
///
/// ```rust
/// use scoped_search::tools::ToolRegistry;
///
/// let tools = ToolRegistry::with_builtins();
/// assert_eq!(tools.len(), 4);
/// assert!(tools.find("search").is_some());
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with `list_indices`, `get_mappings`, `search`, `get_shards`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ListIndicesTool));
        registry.register(Box::new(GetMappingsTool));
        registry.register(Box::new(SearchTool));
        registry.register(Box::new(GetShardsTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Validate `params` and run the named tool.
    ///
    /// Each call runs in its own span tagged with a fresh request id.
    pub async fn call(&self, name: &str, params: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let Some(tool) = self.find(name) else {
            bail!("tool not found: {}", name);
        };

        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("tool", name, %request_id);

        async move {
            let params = validate_params(&tool.parameters_schema(), &params)?;
            tracing::info!("tool called");

            let result = tool.execute(params, ctx).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "tool failed");
            }
            result
        }
        .instrument(span)
        .await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
