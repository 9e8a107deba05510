//! Data types shared across the permission pipeline and the tool surface.

use serde::{Deserialize, Serialize};

/// The caller's authorized document-id scope.
///
/// Six ordered id lists, one per permission bucket. After normalization
/// every bucket is present (possibly empty); see
/// [`PermissionScope::from_cached`](crate::scope).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionScope {
    #[serde(rename = "header_section_doc_ids", default)]
    pub header_section_ids: Vec<String>,
    #[serde(rename = "line_item_section_doc_ids", default)]
    pub line_item_section_ids: Vec<String>,
    #[serde(rename = "header_clause_doc_ids", default)]
    pub header_clause_ids: Vec<String>,
    #[serde(rename = "line_item_clause_doc_ids", default)]
    pub line_item_clause_ids: Vec<String>,
    #[serde(rename = "attachment_doc_ids", default)]
    pub attachment_ids: Vec<String>,
    #[serde(rename = "meta_doc_ids", default)]
    pub meta_ids: Vec<String>,
}

impl PermissionScope {
    /// Concatenation of all six buckets, in declaration order.
    pub fn all_ids(&self) -> Vec<String> {
        self.header_section_ids
            .iter()
            .chain(&self.line_item_section_ids)
            .chain(&self.header_clause_ids)
            .chain(&self.line_item_clause_ids)
            .chain(&self.attachment_ids)
            .chain(&self.meta_ids)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.header_section_ids.is_empty()
            && self.line_item_section_ids.is_empty()
            && self.header_clause_ids.is_empty()
            && self.line_item_clause_ids.is_empty()
            && self.attachment_ids.is_empty()
            && self.meta_ids.is_empty()
    }
}

/// One row of `_cat/indices?format=json`, reduced to what the tool reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub index: Option<String>,
    pub health: Option<String>,
    pub status: Option<String>,
    #[serde(rename(deserialize = "docs.count", serialize = "docsCount"))]
    pub docs_count: Option<String>,
}

/// One row of `_cat/shards?format=json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardSummary {
    pub index: Option<String>,
    pub shard: Option<String>,
    pub prirep: Option<String>,
    pub state: Option<String>,
    pub docs: Option<String>,
    pub store: Option<String>,
    pub ip: Option<String>,
    pub node: Option<String>,
}

/// Result of a tool call: ordered plain-text fragments.
///
/// The MCP bridge maps each fragment to one text content item; the HTTP
/// API returns them as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolOutput {
    pub content: Vec<String>,
}

impl ToolOutput {
    pub fn new(content: Vec<String>) -> Self {
        Self { content }
    }

    pub fn text(&self) -> String {
        self.content.join("\n\n")
    }
}
