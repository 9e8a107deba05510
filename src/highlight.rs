//! Highlight directives derived from an index mapping.
//!
//! Every search gets a `highlight` section covering all free-text and
//! dense-vector fields of the target index, regardless of what the caller
//! asked for.

use serde_json::{json, Map, Value};

pub const PRE_TAG: &str = "<em>";
pub const POST_TAG: &str = "</em>";

/// Highlightable field paths in `mappings` (the `mappings` object of one
/// index, with a top-level `properties`).
///
/// Object fields are walked and reported with dotted paths; `nested`
/// fields are skipped since they need a nested query to highlight.
pub fn highlight_fields(mappings: &Value) -> Vec<String> {
    let mut fields = Vec::new();
    if let Some(props) = mappings.get("properties").and_then(Value::as_object) {
        collect(props, "", &mut fields);
    }
    fields
}

fn collect(props: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
    for (name, def) in props {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        let field_type = def.get("type").and_then(Value::as_str);
        if field_type == Some("text")
            || field_type == Some("dense_vector")
            || def.get("dense_vector").is_some()
        {
            out.push(path);
            continue;
        }

        if matches!(field_type, None | Some("object")) {
            if let Some(children) = def.get("properties").and_then(Value::as_object) {
                collect(children, &path, out);
            }
        }
    }
}

/// The `highlight` section for `fields`.
pub fn highlight_directive(fields: &[String]) -> Value {
    let fields: Map<String, Value> = fields
        .iter()
        .map(|f| (f.clone(), json!({})))
        .collect();
    json!({
        "fields": fields,
        "pre_tags": [PRE_TAG],
        "post_tags": [POST_TAG],
    })
}

/// Replace `body.highlight` with a directive for the mapping's text fields.
///
/// Any mapping that declares fields gets a directive, even one with no
/// highlightable field (the caller's highlight is still discarded). Returns
/// `false` and leaves the body untouched when no fields are declared.
pub fn apply_highlight(body: &mut Map<String, Value>, mappings: &Value) -> bool {
    let declared = mappings
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|props| !props.is_empty());
    if !declared {
        return false;
    }
    body.insert(
        "highlight".to_string(),
        highlight_directive(&highlight_fields(mappings)),
    );
    true
}
