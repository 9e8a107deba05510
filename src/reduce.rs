//! Flattening a search response into readable text fragments.
//!
//! A response reduces to, in order:
//!
//! 1. one fragment with every aggregation line (only if there are any),
//! 2. a metadata line: `Total results: N, showing M from position F`,
//! 3. one fragment per hit, in the engine's order.
//!
//! Shapes the reducer cannot interpret are skipped with a warning rather
//! than failing the whole response.

use serde_json::{Map, Value};

/// Separator between highlight fragments of one field.
pub const FRAGMENT_SEPARATOR: &str = " ... ";

/// Statistic keys that mark a multi-value metric aggregation.
const STAT_KEYS: [&str; 6] = ["values", "avg", "sum", "min", "max", "count"];

/// Shape of one node in an aggregation result tree.
#[derive(Debug, PartialEq)]
pub enum AggNode<'a> {
    /// Bucketing aggregation (`terms`, `histogram`, ...).
    Buckets(&'a [Value]),
    /// Single-value metric (`avg`, `cardinality`, ...).
    Metric(&'a Value),
    /// Multi-value metric (`stats`, `percentiles`, ...).
    Stats(&'a Map<String, Value>),
    /// Single-bucket wrapper (`filter`, `nested`, ...) holding sub-aggregations.
    Container(&'a Map<String, Value>),
    /// Not an object; nothing to report.
    Unrecognized,
}

impl<'a> AggNode<'a> {
    pub fn classify(node: &'a Value) -> Self {
        let Some(obj) = node.as_object() else {
            return AggNode::Unrecognized;
        };
        if let Some(buckets) = obj.get("buckets").and_then(Value::as_array) {
            return AggNode::Buckets(buckets);
        }
        if let Some(value) = obj.get("value") {
            return AggNode::Metric(value);
        }
        if STAT_KEYS.iter().any(|k| obj.contains_key(*k)) {
            return AggNode::Stats(obj);
        }
        AggNode::Container(obj)
    }
}

/// Whether a child field of a bucket or container is itself an aggregation.
fn is_aggregation(value: &Value) -> bool {
    value.as_object().is_some_and(|obj| {
        obj.get("buckets").is_some_and(Value::is_array) || obj.contains_key("value")
    })
}

/// Render a JSON scalar the way it reads in prose: strings unquoted.
fn scalar_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "null".to_string(),
    }
}

/// Flatten an `aggregations` object into indented lines.
pub fn format_aggs(aggs: &Map<String, Value>) -> Vec<String> {
    let mut lines = Vec::new();
    for (name, node) in aggs {
        format_node(name, node, "", &mut lines);
    }
    lines
}

fn format_node(name: &str, node: &Value, prefix: &str, lines: &mut Vec<String>) {
    match AggNode::classify(node) {
        AggNode::Buckets(buckets) => {
            lines.push(format!("{}Aggregation \"{}\" (buckets):", prefix, name));
            if buckets.is_empty() {
                lines.push(format!("{}  (no buckets)", prefix));
            }
            let nested_prefix = format!("{}    ", prefix);
            for bucket in buckets {
                let Some(fields) = bucket.as_object() else {
                    tracing::warn!(aggregation = name, "skipping non-object bucket");
                    continue;
                };
                lines.push(format!(
                    "{}  {}: {}",
                    prefix,
                    scalar_text(fields.get("key")),
                    scalar_text(fields.get("doc_count"))
                ));
                for (child, value) in fields {
                    if is_aggregation(value) {
                        format_node(child, value, &nested_prefix, lines);
                    }
                }
            }
        }
        AggNode::Metric(value) => {
            lines.push(format!(
                "{}Aggregation \"{}\": {}",
                prefix,
                name,
                scalar_text(Some(value))
            ));
        }
        AggNode::Stats(stats) => {
            let rendered = serde_json::to_string(stats).unwrap_or_default();
            lines.push(format!("{}Aggregation \"{}\": {}", prefix, name, rendered));
        }
        AggNode::Container(children) => {
            let nested_prefix = format!("{}  ", prefix);
            let mut found = false;
            for (child, value) in children {
                if is_aggregation(value) {
                    found = true;
                    format_node(child, value, &nested_prefix, lines);
                }
            }
            if !found {
                tracing::warn!(aggregation = name, "aggregation has no reportable content");
            }
        }
        AggNode::Unrecognized => {
            tracing::warn!(aggregation = name, "unrecognized aggregation shape");
        }
    }
}

/// Render one hit: highlighted fields first, then remaining source fields.
pub fn render_hit(hit: &Value) -> String {
    let empty = Map::new();
    let highlight = hit
        .get("highlight")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let source = hit
        .get("_source")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut out = String::new();

    for (field, fragments) in highlight {
        let Some(fragments) = fragments.as_array().filter(|f| !f.is_empty()) else {
            continue;
        };
        let joined: Vec<String> = fragments.iter().map(|f| scalar_text(Some(f))).collect();
        out.push_str(&format!(
            "{} (highlighted): {}\n",
            field,
            joined.join(FRAGMENT_SEPARATOR)
        ));
    }

    for (field, value) in source {
        if !highlight.contains_key(field) {
            out.push_str(&format!("{}: {}\n", field, value));
        }
    }

    out.trim_end().to_string()
}

/// Total match count, whether reported as an integer or `{ "value": n }`.
pub fn total_hits(response: &Value) -> u64 {
    let total = &response["hits"]["total"];
    total
        .as_u64()
        .or_else(|| total.get("value").and_then(Value::as_u64))
        .unwrap_or(0)
}

pub fn metadata_line(total: u64, shown: usize, from: u64) -> String {
    format!(
        "Total results: {}, showing {} from position {}",
        total, shown, from
    )
}

/// Reduce a raw `_search` response into ordered text fragments.
///
/// `from` is the offset the caller requested (0 when absent).
pub fn reduce_response(response: &Value, from: u64) -> Vec<String> {
    let mut fragments = Vec::new();

    if let Some(aggs) = response.get("aggregations").and_then(Value::as_object) {
        let lines = format_aggs(aggs);
        if !lines.is_empty() {
            fragments.push(lines.join("\n"));
        }
    }

    let hits: &[Value] = response["hits"]["hits"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    fragments.push(metadata_line(total_hits(response), hits.len(), from));
    fragments.extend(hits.iter().map(render_hit));

    fragments
}
