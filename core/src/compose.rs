//! Logical Composer — combines the Field Encoder's per-field fragments,
//! `searchphrase`, and `datefrom`/`dateto` into one filter tree.
//!
//! `searchphrase` and the date range are always ANDed in at the top level,
//! regardless of `logicalOp`: `logicalOp` only governs how the open field
//! parameters combine with each other.

use crate::classify::ClassifiedParams;
use crate::encode::encode_field;
use crate::model::Filter;

const DATE_RANGE_FIELD: &str = "timestamp";

fn strip_quotes(value: &str) -> (String, bool) {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        (trimmed[1..trimmed.len() - 1].to_string(), true)
    } else {
        (value.to_string(), false)
    }
}

/// Build the top-level filter tree from a classified parameter set.
///
/// `logical_op` is `Some("OR")`/`Some("AND")` (case-insensitive) when the
/// request supplied one, `None` when it defaults to AND.
pub fn compose(classified: &ClassifiedParams, logical_op: Option<&str>) -> Option<Filter> {
    let field_filters: Vec<Filter> = classified.fields.iter().map(encode_field).collect();

    let combined_fields = if logical_op.is_some_and(|op| op.eq_ignore_ascii_case("OR")) {
        Filter::or(field_filters)
    } else {
        Filter::and(field_filters)
    };

    let mut top_level = Vec::new();
    if let Some(filter) = combined_fields {
        top_level.push(filter);
    }

    if let Some(entry) = classified.control.iter().find(|e| e.name == "searchphrase") {
        let (phrase, quoted) = strip_quotes(&entry.value);
        top_level.push(Filter::TextSearch { phrase, quoted });
    }

    let datefrom = classified.control.iter().find(|e| e.name == "datefrom").map(|e| e.value.clone());
    let dateto = classified.control.iter().find(|e| e.name == "dateto").map(|e| e.value.clone());
    if datefrom.is_some() || dateto.is_some() {
        top_level.push(Filter::DateRange { field: DATE_RANGE_FIELD.to_string(), gte: datefrom, lt: dateto });
    }

    Filter::and(top_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamEntry;

    fn field(name: &str, value: &str) -> ParamEntry {
        ParamEntry { name: name.to_string(), value: value.to_string(), raw: value.to_string() }
    }

    #[test]
    fn no_params_yields_no_filter() {
        let classified = ClassifiedParams::default();
        assert!(compose(&classified, None).is_none());
    }

    #[test]
    fn default_combines_fields_with_and() {
        let classified = ClassifiedParams { control: vec![], fields: vec![field("title", "a"), field("@type", "b")] };
        match compose(&classified, None) {
            Some(Filter::And(children)) => assert_eq!(children.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn logical_op_or_combines_fields_with_or() {
        let classified = ClassifiedParams { control: vec![], fields: vec![field("title", "a"), field("@type", "b")] };
        match compose(&classified, Some("or")) {
            Some(Filter::Or(children)) => assert_eq!(children.len(), 2),
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn searchphrase_is_anded_in_even_under_or_logical_op() {
        let classified = ClassifiedParams {
            control: vec![field("searchphrase", "chemistry")],
            fields: vec![field("topic.tag", "Chemistry,Physics")],
        };
        let filter = compose(&classified, Some("OR")).expect("some filter");
        match filter {
            Filter::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(children.iter().any(|c| matches!(c, Filter::TextSearch { .. })));
                assert!(children.iter().any(|c| matches!(c, Filter::Or(_))));
            }
            other => panic!("expected top-level And, got {other:?}"),
        }
    }

    #[test]
    fn single_field_collapses_without_wrapper_node() {
        let classified = ClassifiedParams { control: vec![], fields: vec![field("ediid", "abc")] };
        match compose(&classified, None) {
            Some(Filter::Leaf { field, .. }) => assert_eq!(field, "ediid"),
            other => panic!("expected bare leaf, got {other:?}"),
        }
    }

    #[test]
    fn date_range_present_only_when_requested() {
        let classified =
            ClassifiedParams { control: vec![field("datefrom", "2020-01-01")], fields: vec![] };
        match compose(&classified, None) {
            Some(Filter::DateRange { field, gte, lt }) => {
                assert_eq!(field, "timestamp");
                assert_eq!(gte.as_deref(), Some("2020-01-01"));
                assert_eq!(lt, None);
            }
            other => panic!("expected DateRange, got {other:?}"),
        }
    }

    #[test]
    fn quoted_searchphrase_is_marked_quoted() {
        let classified =
            ClassifiedParams { control: vec![field("searchphrase", "\"climate change\"")], fields: vec![] };
        match compose(&classified, None) {
            Some(Filter::TextSearch { phrase, quoted }) => {
                assert_eq!(phrase, "climate change");
                assert!(quoted);
            }
            other => panic!("expected TextSearch, got {other:?}"),
        }
    }
}
