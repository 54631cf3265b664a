//! Field Encoder — turns each open (non-control) query parameter into a
//! [`Filter`] fragment for one field.
//!
//! Shape is resolved by field name, in priority order: `topic.tag` is a
//! direct partial match despite looking like an array-of-object path;
//! `components.*`, `references.*`, `topic.*`, `authors.*` are array-of-object
//! paths matched with `ElemMatch`; `@type` and any other dotted path fall
//! back to a plain partial match; everything else is an exact match.

use crate::model::{FieldMatcher, Filter};
use crate::params::ParamEntry;

const ELEM_MATCH_PREFIXES: [&str; 4] = ["components.", "references.", "topic.", "authors."];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Partial,
    ElemMatch,
    Exact,
}

fn shape_for(field: &str) -> Shape {
    if field == "topic.tag" {
        return Shape::Partial;
    }
    if ELEM_MATCH_PREFIXES.iter().any(|prefix| field.starts_with(prefix)) {
        return Shape::ElemMatch;
    }
    if field == "@type" || field.contains('.') {
        return Shape::Partial;
    }
    Shape::Exact
}

fn matcher_for(field: &str, value: &str, shape: Shape) -> FieldMatcher {
    match shape {
        Shape::Partial => FieldMatcher::partial(value),
        Shape::Exact => FieldMatcher::exact(value),
        Shape::ElemMatch => {
            let (base, sub) = field.split_once('.').expect("ElemMatch shape implies a dotted path");
            let _ = base;
            FieldMatcher::ElemMatch {
                field: sub.to_string(),
                inner: Box::new(FieldMatcher::partial(value)),
            }
        }
    }
}

fn elem_match_base(field: &str) -> &str {
    field.split_once('.').map(|(base, _)| base).unwrap_or(field)
}

/// Split a field value into its alternatives. A value wrapped in matching
/// double quotes is always a single literal, commas included; the quotes
/// themselves are stripped. An unquoted value splits on `,`.
fn split_values(raw: &str) -> (Vec<String>, bool) {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        return (vec![trimmed[1..trimmed.len() - 1].to_string()], true);
    }
    if raw.contains(',') {
        (raw.split(',').map(|s| s.to_string()).collect(), false)
    } else {
        (vec![raw.to_string()], false)
    }
}

/// Encode one field-parameter entry into a filter fragment.
pub fn encode_field(entry: &ParamEntry) -> Filter {
    let shape = shape_for(&entry.name);
    let (values, quoted) = split_values(&entry.value);

    if values.len() == 1 || quoted {
        let value = &values[0];
        return leaf_for(&entry.name, value, shape);
    }

    match shape {
        Shape::Exact => {
            Filter::Leaf { field: entry.name.clone(), matcher: FieldMatcher::In(values) }
        }
        Shape::Partial | Shape::ElemMatch => {
            let alternatives: Vec<Filter> =
                values.iter().map(|value| leaf_for(&entry.name, value, shape)).collect();
            Filter::or(alternatives).expect("split_values never returns an empty list")
        }
    }
}

fn leaf_for(field: &str, value: &str, shape: Shape) -> Filter {
    match shape {
        Shape::ElemMatch => {
            Filter::Leaf { field: elem_match_base(field).to_string(), matcher: matcher_for(field, value, shape) }
        }
        _ => Filter::Leaf { field: field.to_string(), matcher: matcher_for(field, value, shape) },
    }
}
