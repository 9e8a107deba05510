//! Access-control filter construction.
//!
//! Every searchable index belongs to one [`IndexClass`]. The class decides
//! which bucket of the caller's [`PermissionScope`] drives the filter and
//! what each permitted id turns into:
//!
//! | Class | Index | Bucket | Per-id clause |
//! |-------|-------|--------|---------------|
//! | `Meta` | `cdc_agreement_list` | `meta_doc_ids` | terms lookup in `permitted_agreement_for_meta` |
//! | `Attachment` | `cms_documents` | `attachment_doc_ids` | terms lookup in `permitted_agreement_for_attachment` |
//! | `LineItem` | `cdc_line_items` | `line_item_section_doc_ids` | agreement + section lookups in `permitted_line_item_section` |
//! | `HeaderSection` | `cdc_field_data_agreements` | `header_section_doc_ids` | agreement + section lookups in `permitted_header_section` |
//! | `Clause` | `cdc_clauses_data` | `header_clause_doc_ids` | terms lookup in `permitted_agreement_for_clause` |
//! | `Other` | anything else | union of all buckets | one `terms` on `AGREEMENT_ID.keyword` |
//!
//! An empty driving id list always produces [`deny_all`], never an empty
//! `should` (which some engines evaluate as match-all).

use serde_json::{json, Value};

use crate::models::PermissionScope;

/// Field every index uses for the owning agreement.
pub const AGREEMENT_ID_FIELD: &str = "AGREEMENT_ID.keyword";

/// Id value that no document carries.
pub const DENY_SENTINEL: &str = "__none__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexClass {
    Meta,
    Attachment,
    LineItem,
    HeaderSection,
    Clause,
    Other,
}

/// How a class turns one permitted id into a clause.
enum Lookup {
    /// One terms lookup projecting `agreement_ids`.
    Agreements { index: &'static str },
    /// Agreement and section lookups that must both hold.
    Sections {
        index: &'static str,
        section_field: &'static str,
    },
}

impl IndexClass {
    /// Classify a target index by exact name.
    pub fn from_index(index: &str) -> Self {
        match index {
            "cdc_agreement_list" => IndexClass::Meta,
            "cms_documents" => IndexClass::Attachment,
            "cdc_line_items" => IndexClass::LineItem,
            "cdc_field_data_agreements" => IndexClass::HeaderSection,
            "cdc_clauses_data" => IndexClass::Clause,
            _ => IndexClass::Other,
        }
    }

    /// Ids that drive the filter for this class.
    pub fn driving_ids(&self, scope: &PermissionScope) -> Vec<String> {
        match self {
            IndexClass::Meta => scope.meta_ids.clone(),
            IndexClass::Attachment => scope.attachment_ids.clone(),
            IndexClass::LineItem => scope.line_item_section_ids.clone(),
            IndexClass::HeaderSection => scope.header_section_ids.clone(),
            IndexClass::Clause => scope.header_clause_ids.clone(),
            IndexClass::Other => dedup(scope.all_ids()),
        }
    }

    fn lookup(&self) -> Option<Lookup> {
        match self {
            IndexClass::Meta => Some(Lookup::Agreements {
                index: "permitted_agreement_for_meta",
            }),
            IndexClass::Attachment => Some(Lookup::Agreements {
                index: "permitted_agreement_for_attachment",
            }),
            IndexClass::Clause => Some(Lookup::Agreements {
                index: "permitted_agreement_for_clause",
            }),
            IndexClass::LineItem => Some(Lookup::Sections {
                index: "permitted_line_item_section",
                section_field: "AGREEMENT_SECTION_ID.keyword",
            }),
            IndexClass::HeaderSection => Some(Lookup::Sections {
                index: "permitted_header_section",
                section_field: "SECTION_ID.keyword",
            }),
            IndexClass::Other => None,
        }
    }
}

impl Lookup {
    fn clause_for(&self, id: &str) -> Value {
        match self {
            Lookup::Agreements { index } => {
                terms_lookup(AGREEMENT_ID_FIELD, index, id, "agreement_ids")
            }
            Lookup::Sections {
                index,
                section_field,
            } => json!({
                "bool": {
                    "must": [
                        terms_lookup(AGREEMENT_ID_FIELD, index, id, "sections.agreement_id"),
                        terms_lookup(section_field, index, id, "sections.section_id"),
                    ]
                }
            }),
        }
    }
}

/// Terms query whose values are fetched from `path` of document `id` in `index`.
fn terms_lookup(field: &str, index: &str, id: &str, path: &str) -> Value {
    json!({
        "terms": {
            field: {
                "index": index,
                "id": id,
                "path": path,
            }
        }
    })
}

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// A clause that matches no document.
pub fn deny_all(sentinel: &str) -> Value {
    json!({ "terms": { AGREEMENT_ID_FIELD: [sentinel] } })
}

/// Build the access-control clause for `target_index`, using the default
/// deny sentinel.
pub fn build_filter(target_index: &str, scope: &PermissionScope) -> Value {
    build_filter_with_sentinel(target_index, scope, DENY_SENTINEL)
}

/// Build the access-control clause for `target_index`.
pub fn build_filter_with_sentinel(
    target_index: &str,
    scope: &PermissionScope,
    sentinel: &str,
) -> Value {
    let class = IndexClass::from_index(target_index);
    let ids = class.driving_ids(scope);

    if ids.is_empty() {
        return deny_all(sentinel);
    }

    match class.lookup() {
        Some(lookup) => {
            let should: Vec<Value> = ids.iter().map(|id| lookup.clause_for(id)).collect();
            json!({
                "bool": {
                    "should": should,
                    "minimum_should_match": 1,
                }
            })
        }
        None => json!({ "terms": { AGREEMENT_ID_FIELD: ids } }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_INDICES: [&str; 6] = [
        "cdc_agreement_list",
        "cms_documents",
        "cdc_line_items",
        "cdc_field_data_agreements",
        "cdc_clauses_data",
        "agreements",
    ];

    fn scope() -> PermissionScope {
        PermissionScope {
            header_section_ids: vec!["h1".into()],
            line_item_section_ids: vec!["l1".into(), "l2".into()],
            header_clause_ids: vec!["c1".into()],
            line_item_clause_ids: vec!["lc1".into()],
            attachment_ids: vec!["a1".into()],
            meta_ids: vec!["m1".into(), "m2".into()],
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(IndexClass::from_index("cdc_agreement_list"), IndexClass::Meta);
        assert_eq!(IndexClass::from_index("cms_documents"), IndexClass::Attachment);
        assert_eq!(IndexClass::from_index("cdc_line_items"), IndexClass::LineItem);
        assert_eq!(
            IndexClass::from_index("cdc_field_data_agreements"),
            IndexClass::HeaderSection
        );
        assert_eq!(IndexClass::from_index("cdc_clauses_data"), IndexClass::Clause);
        assert_eq!(IndexClass::from_index("CDC_AGREEMENT_LIST"), IndexClass::Other);
        assert_eq!(IndexClass::from_index("cdc_agreement_list*"), IndexClass::Other);
    }

    #[test]
    fn test_empty_scope_denies_every_class() {
        let empty = PermissionScope::default();
        for index in ALL_INDICES {
            assert_eq!(
                build_filter(index, &empty),
                json!({ "terms": { "AGREEMENT_ID.keyword": ["__none__"] } }),
                "index {} did not deny all",
                index
            );
        }
    }

    #[test]
    fn test_empty_driving_bucket_denies_even_with_other_buckets() {
        let mut s = scope();
        s.meta_ids.clear();
        assert_eq!(build_filter("cdc_agreement_list", &s), deny_all(DENY_SENTINEL));
    }

    #[test]
    fn test_custom_sentinel() {
        let filter = build_filter_with_sentinel("x", &PermissionScope::default(), "NOPE");
        assert_eq!(filter, json!({ "terms": { "AGREEMENT_ID.keyword": ["NOPE"] } }));
    }

    #[test]
    fn test_meta_lookup() {
        let filter = build_filter("cdc_agreement_list", &scope());
        assert_eq!(
            filter,
            json!({
                "bool": {
                    "should": [
                        { "terms": { "AGREEMENT_ID.keyword": {
                            "index": "permitted_agreement_for_meta", "id": "m1", "path": "agreement_ids" } } },
                        { "terms": { "AGREEMENT_ID.keyword": {
                            "index": "permitted_agreement_for_meta", "id": "m2", "path": "agreement_ids" } } }
                    ],
                    "minimum_should_match": 1
                }
            })
        );
    }

    #[test]
    fn test_attachment_lookup() {
        let filter = build_filter("cms_documents", &scope());
        let should = filter["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 1);
        assert_eq!(
            should[0]["terms"]["AGREEMENT_ID.keyword"]["index"],
            "permitted_agreement_for_attachment"
        );
        assert_eq!(should[0]["terms"]["AGREEMENT_ID.keyword"]["id"], "a1");
    }

    #[test]
    fn test_clause_lookup_uses_header_clause_bucket() {
        let filter = build_filter("cdc_clauses_data", &scope());
        let should = filter["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 1);
        let lookup = &should[0]["terms"]["AGREEMENT_ID.keyword"];
        assert_eq!(lookup["index"], "permitted_agreement_for_clause");
        assert_eq!(lookup["id"], "c1");
        assert_eq!(lookup["path"], "agreement_ids");
    }

    #[test]
    fn test_line_item_paired_lookup() {
        let filter = build_filter("cdc_line_items", &scope());
        let should = filter["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 2);
        assert_eq!(
            should[1],
            json!({
                "bool": {
                    "must": [
                        { "terms": { "AGREEMENT_ID.keyword": {
                            "index": "permitted_line_item_section", "id": "l2", "path": "sections.agreement_id" } } },
                        { "terms": { "AGREEMENT_SECTION_ID.keyword": {
                            "index": "permitted_line_item_section", "id": "l2", "path": "sections.section_id" } } }
                    ]
                }
            })
        );
    }

    #[test]
    fn test_header_section_paired_lookup() {
        let filter = build_filter("cdc_field_data_agreements", &scope());
        let should = filter["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 1);
        let must = should[0]["bool"]["must"].as_array().unwrap();
        assert_eq!(must[0]["terms"]["AGREEMENT_ID.keyword"]["index"], "permitted_header_section");
        assert_eq!(must[1]["terms"]["SECTION_ID.keyword"]["path"], "sections.section_id");
        assert_eq!(must[1]["terms"]["SECTION_ID.keyword"]["id"], "h1");
    }

    #[test]
    fn test_default_union() {
        let filter = build_filter("agreements", &scope());
        assert_eq!(
            filter,
            json!({ "terms": { "AGREEMENT_ID.keyword": ["h1", "l1", "l2", "c1", "lc1", "a1", "m1", "m2"] } })
        );
    }

    #[test]
    fn test_default_union_dedups_in_order() {
        let s = PermissionScope {
            header_section_ids: vec!["A_1".into(), "A_2".into()],
            line_item_section_ids: vec!["A_1".into()],
            meta_ids: vec!["A_3".into(), "A_2".into()],
            ..Default::default()
        };
        assert_eq!(
            build_filter("agreements", &s),
            json!({ "terms": { "AGREEMENT_ID.keyword": ["A_1", "A_2", "A_3"] } })
        );
    }
}
