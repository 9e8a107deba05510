//! Merging the access-control clause into a caller-supplied request body.
//!
//! The caller's body may carry no `query`, a `bool` query, or any other
//! query node. In every case the result evaluates to
//! `(original query) AND (permission clause)`, and all other top-level
//! fields (`sort`, `size`, `from`, `aggs`, `_source`, ...) are left alone.
//!
//! Injection is not idempotent: injecting twice appends the clause twice.

use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Which array of the top-level `bool` receives the permission clause.
///
/// `Must` puts the clause in query context (it participates in scoring);
/// `Filter` puts it in filter context (no scoring, cacheable). Both
/// restrict the result set identically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPlacement {
    #[default]
    Must,
    Filter,
}

impl FilterPlacement {
    fn key(self) -> &'static str {
        match self {
            FilterPlacement::Must => "must",
            FilterPlacement::Filter => "filter",
        }
    }
}

/// Merge `filter` into `body` using `must` placement.
pub fn inject(body: &mut Map<String, Value>, filter: Value) {
    inject_with(body, filter, FilterPlacement::Must)
}

/// Merge `filter` into `body`.
///
/// 1. No `query` (or `query: null`): `query = { bool: { <placement>: [filter] } }`.
/// 2. `query.bool` is an object: append `filter` to `query.bool.<placement>`,
///    creating the array if absent and promoting a single-clause object to
///    an array. `should`, `must_not` and the other array are untouched.
/// 3. Anything else: wrap the original query alongside the filter.
pub fn inject_with(body: &mut Map<String, Value>, filter: Value, placement: FilterPlacement) {
    let key = placement.key();

    // Rewritten in place so `query` keeps its position among the body's keys.
    let slot = body.entry("query").or_insert(Value::Null);
    *slot = match std::mem::take(slot) {
        Value::Null => json!({ "bool": { key: [filter] } }),
        query => match try_append(query, filter, key) {
            Ok(merged) => merged,
            Err((original, filter)) => wrap(original, filter, placement),
        },
    };
}

/// Append into an existing `bool` node, or hand both values back when the
/// query is not a well-formed `bool`.
fn try_append(mut query: Value, filter: Value, key: &str) -> Result<Value, (Value, Value)> {
    let scalar_clauses = match query.get("bool").and_then(Value::as_object) {
        None => true,
        Some(clauses) => matches!(
            clauses.get(key),
            Some(Value::Bool(_) | Value::Number(_) | Value::String(_))
        ),
    };
    if scalar_clauses {
        return Err((query, filter));
    }

    if let Some(clauses) = query.get_mut("bool").and_then(Value::as_object_mut) {
        let slot = clauses.entry(key).or_insert(Value::Null);
        *slot = match std::mem::take(slot) {
            Value::Array(mut existing) => {
                existing.push(filter);
                Value::Array(existing)
            }
            single @ Value::Object(_) => Value::Array(vec![single, filter]),
            _ => Value::Array(vec![filter]),
        };
    }

    Ok(query)
}

fn wrap(original: Value, filter: Value, placement: FilterPlacement) -> Value {
    match placement {
        FilterPlacement::Must => json!({ "bool": { "must": [original, filter] } }),
        FilterPlacement::Filter => json!({ "bool": { "must": [original], "filter": [filter] } }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn perm() -> Value {
        json!({ "terms": { "AGREEMENT_ID.keyword": ["A_1"] } })
    }

    #[test]
    fn test_no_query_creates_bool_must() {
        let mut b = body(json!({ "sort": [{ "CREATED_ON": "desc" }], "size": 20 }));
        inject(&mut b, perm());
        assert_eq!(b["query"], json!({ "bool": { "must": [perm()] } }));
        assert_eq!(b["sort"], json!([{ "CREATED_ON": "desc" }]));
        assert_eq!(b["size"], json!(20));
    }

    #[test]
    fn test_null_query_treated_as_absent() {
        let mut b = body(json!({ "query": null }));
        inject(&mut b, perm());
        assert_eq!(b["query"], json!({ "bool": { "must": [perm()] } }));
    }

    #[test]
    fn test_bool_query_appends_to_must() {
        let mut b = body(json!({
            "query": { "bool": {
                "must": [{ "match": { "DESCRIPTION": "renewal" } }],
                "should": [{ "match": { "CATEGORY": "Supply" } }],
                "must_not": [{ "term": { "IS_ARCHIVED": true } }],
                "filter": [{ "term": { "IS_APPROVED": true } }],
                "minimum_should_match": 1
            } },
            "from": 10
        }));
        inject(&mut b, perm());

        let bool_q = &b["query"]["bool"];
        assert_eq!(
            bool_q["must"],
            json!([{ "match": { "DESCRIPTION": "renewal" } }, perm()])
        );
        assert_eq!(bool_q["should"], json!([{ "match": { "CATEGORY": "Supply" } }]));
        assert_eq!(bool_q["must_not"], json!([{ "term": { "IS_ARCHIVED": true } }]));
        assert_eq!(bool_q["filter"], json!([{ "term": { "IS_APPROVED": true } }]));
        assert_eq!(bool_q["minimum_should_match"], json!(1));
        assert_eq!(b["from"], json!(10));
    }

    #[test]
    fn test_bool_without_must_creates_array() {
        let mut b = body(json!({ "query": { "bool": { "should": [{ "match_all": {} }] } } }));
        inject(&mut b, perm());
        assert_eq!(b["query"]["bool"]["must"], json!([perm()]));
        assert_eq!(b["query"]["bool"]["should"], json!([{ "match_all": {} }]));
    }

    #[test]
    fn test_single_object_must_promoted() {
        let mut b = body(json!({ "query": { "bool": { "must": { "match": { "A": "b" } } } } }));
        inject(&mut b, perm());
        assert_eq!(
            b["query"]["bool"]["must"],
            json!([{ "match": { "A": "b" } }, perm()])
        );
    }

    #[test]
    fn test_leaf_query_wrapped() {
        let original = json!({ "match": { "AGREEMENT_NAME": "Acme" } });
        let mut b = body(json!({ "query": original.clone() }));
        inject(&mut b, perm());
        assert_eq!(b["query"], json!({ "bool": { "must": [original, perm()] } }));
    }

    #[test]
    fn test_malformed_bool_wrapped() {
        let original = json!({ "bool": "nonsense" });
        let mut b = body(json!({ "query": original.clone() }));
        inject(&mut b, perm());
        assert_eq!(b["query"], json!({ "bool": { "must": [original, perm()] } }));

        let original = json!({ "bool": { "must": 5 } });
        let mut b = body(json!({ "query": original.clone() }));
        inject(&mut b, perm());
        assert_eq!(b["query"], json!({ "bool": { "must": [original, perm()] } }));
    }

    #[test]
    fn test_scalar_query_wrapped() {
        let mut b = body(json!({ "query": "Acme" }));
        inject(&mut b, perm());
        assert_eq!(b["query"], json!({ "bool": { "must": ["Acme", perm()] } }));
    }

    #[test]
    fn test_not_idempotent() {
        let mut b = body(json!({}));
        inject(&mut b, perm());
        inject(&mut b, perm());
        assert_eq!(b["query"]["bool"]["must"], json!([perm(), perm()]));
    }

    #[test]
    fn test_filter_placement() {
        let mut b = body(json!({ "size": 3 }));
        inject_with(&mut b, perm(), FilterPlacement::Filter);
        assert_eq!(b["query"], json!({ "bool": { "filter": [perm()] } }));

        let mut b = body(json!({ "query": { "bool": {
            "must": [{ "match_all": {} }],
            "filter": [{ "term": { "X": 1 } }]
        } } }));
        inject_with(&mut b, perm(), FilterPlacement::Filter);
        assert_eq!(b["query"]["bool"]["must"], json!([{ "match_all": {} }]));
        assert_eq!(b["query"]["bool"]["filter"], json!([{ "term": { "X": 1 } }, perm()]));

        let leaf = json!({ "fuzzy": { "OWNER_NAME": { "value": "johnsen" } } });
        let mut b = body(json!({ "query": leaf.clone() }));
        inject_with(&mut b, perm(), FilterPlacement::Filter);
        assert_eq!(
            b["query"],
            json!({ "bool": { "must": [leaf], "filter": [perm()] } })
        );
    }

    #[test]
    fn test_query_keeps_key_position() {
        let mut b = body(json!({
            "size": 10,
            "query": { "bool": { "must": [] } },
            "sort": ["_score"]
        }));
        inject(&mut b, perm());
        let keys: Vec<&str> = b.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["size", "query", "sort"]);
    }

    #[test]
    fn test_other_fields_untouched() {
        let original = json!({
            "query": { "term": { "STATUS": "ACTIVE" } },
            "aggs": { "by_status": { "terms": { "field": "STATUS.keyword" } } },
            "_source": ["AGREEMENT_ID"],
            "highlight": { "fields": { "OWNER_NAME": {} } }
        });
        let mut b = body(original.clone());
        inject(&mut b, perm());
        for key in ["aggs", "_source", "highlight"] {
            assert_eq!(b[key], original[key], "field {} changed", key);
        }
    }
}
