//! `CollectionStore` — the opaque document-store interface the Envelope
//! Executor queries against, plus `MemoryStore`, an in-process reference
//! implementation backed by `dashmap`.
//!
//! No corpus example wires up a real document database here; `MemoryStore`
//! exists so the gateway runs and is testable without one, evaluating the
//! same [`Filter`] tree the Envelope Executor hands to any other backend.

use async_trait::async_trait;
use chrono::DateTime;
use dashmap::DashMap;
use regex::RegexBuilder;
use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::model::{FieldMatcher, Filter, Projection, QueryPlan, SortDirection};

/// A document store keyed by collection name. Every method is async to
/// leave room for a networked backend; `MemoryStore` resolves instantly.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn collection_names(&self) -> Vec<String>;
    async fn is_empty(&self, collection: &str) -> Result<bool>;
    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<u64>;
    async fn find(&self, collection: &str, plan: &QueryPlan) -> Result<Vec<Value>>;

    /// Single-document lookup by one of several candidate identifier
    /// fields, falling back to a case-insensitive suffix match when no
    /// field matches `id` exactly.
    async fn find_by_id(&self, collection: &str, id_fields: &[&str], id: &str) -> Result<Option<Value>>;

    async fn get(&self, collection: &str, key_field: &str, key_value: &str) -> Result<Option<Value>>;
    async fn put(&self, collection: &str, key_field: &str, document: Value) -> Result<()>;
}

/// In-memory reference `CollectionStore`. Documents are plain
/// `serde_json::Value` objects; no schema is enforced beyond "is an
/// object" for `put`.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection wholesale, e.g. from a fixture file at startup.
    pub fn seed(&self, collection: &str, documents: Vec<Value>) {
        self.collections.insert(collection.to_string(), documents);
    }

    fn with_collection<T>(&self, name: &str, f: impl FnOnce(&[Value]) -> T) -> T {
        match self.collections.get(name) {
            Some(docs) => f(&docs),
            None => f(&[]),
        }
    }
}

fn field_path<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in field.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn matches_matcher(value: &Value, matcher: &FieldMatcher) -> bool {
    match matcher {
        FieldMatcher::Regex { pattern, case_insensitive, anchored } => {
            let pattern = if *anchored { format!("^{pattern}$") } else { pattern.clone() };
            let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(*case_insensitive).build() else {
                return false;
            };
            match value {
                Value::Array(items) => items.iter().filter_map(value_as_text).any(|t| re.is_match(&t)),
                other => value_as_text(other).map(|t| re.is_match(&t)).unwrap_or(false),
            }
        }
        FieldMatcher::Equals(expected) => {
            let Ok(re) = RegexBuilder::new(&format!("^{}$", regex::escape(expected)))
                .case_insensitive(true)
                .build()
            else {
                return false;
            };
            match value {
                Value::Array(items) => items.iter().filter_map(value_as_text).any(|t| re.is_match(&t)),
                other => value_as_text(other).map(|t| re.is_match(&t)).unwrap_or(false),
            }
        }
        FieldMatcher::In(values) => values.iter().any(|v| matches_matcher(value, &FieldMatcher::Equals(v.clone()))),
        FieldMatcher::ElemMatch { field, inner } => match value {
            Value::Array(items) => items.iter().any(|item| {
                field_path(item, field).map(|sub| matches_matcher(sub, inner)).unwrap_or(false)
            }),
            _ => false,
        },
    }
}

fn matches_leaf(doc: &Value, field: &str, matcher: &FieldMatcher) -> bool {
    match field_path(doc, field) {
        Some(value) => matches_matcher(value, matcher),
        None => false,
    }
}

fn matches_text_search(doc: &Value, phrase: &str) -> bool {
    let haystack = doc.to_string().to_lowercase();
    haystack.contains(&phrase.to_lowercase())
}

fn matches_date_range(doc: &Value, field: &str, gte: Option<&str>, lt: Option<&str>) -> bool {
    let Some(value) = field_path(doc, field).and_then(value_as_text) else { return false };
    let Ok(ts) = DateTime::parse_from_rfc3339(&value) else { return false };

    if let Some(gte) = gte {
        let Ok(bound) = DateTime::parse_from_rfc3339(gte) else { return false };
        if ts < bound {
            return false;
        }
    }
    if let Some(lt) = lt {
        let Ok(bound) = DateTime::parse_from_rfc3339(lt) else { return false };
        if ts > bound {
            return false;
        }
    }
    true
}

fn matches_filter(doc: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Leaf { field, matcher } => matches_leaf(doc, field, matcher),
        Filter::And(children) => children.iter().all(|c| matches_filter(doc, c)),
        Filter::Or(children) => children.iter().any(|c| matches_filter(doc, c)),
        Filter::TextSearch { phrase, .. } => matches_text_search(doc, phrase),
        Filter::DateRange { field, gte, lt } => matches_date_range(doc, field, gte.as_deref(), lt.as_deref()),
    }
}

fn apply_projection(doc: &Value, projection: &Projection) -> Value {
    let Value::Object(map) = doc else { return doc.clone() };
    match projection {
        Projection::None => doc.clone(),
        Projection::Include(fields) => {
            let mut out = serde_json::Map::new();
            for field in fields {
                if let Some(v) = map.get(field) {
                    out.insert(field.clone(), v.clone());
                }
            }
            Value::Object(out)
        }
        Projection::Exclude(fields) => {
            let mut out = map.clone();
            for field in fields {
                out.remove(field);
            }
            Value::Object(out)
        }
    }
}

fn sort_key_text(doc: &Value, field: &str) -> Option<String> {
    field_path(doc, field).and_then(value_as_text)
}

fn apply_sort(mut docs: Vec<Value>, plan: &QueryPlan) -> Vec<Value> {
    if plan.sort.is_empty() {
        return docs;
    }
    docs.sort_by(|a, b| {
        for key in &plan.sort {
            let av = sort_key_text(a, &key.field);
            let bv = sort_key_text(b, &key.field);
            let ordering = match (av, bv) {
                (None, None) => std::cmp::Ordering::Equal,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (Some(_), None) => std::cmp::Ordering::Less,
                (Some(a), Some(b)) => {
                    let cmp = a.cmp(&b);
                    match key.direction {
                        SortDirection::Asc => cmp,
                        SortDirection::Desc => cmp.reverse(),
                    }
                }
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
    docs
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn collection_names(&self) -> Vec<String> {
        self.collections.iter().map(|e| e.key().clone()).collect()
    }

    async fn is_empty(&self, collection: &str) -> Result<bool> {
        Ok(self.with_collection(collection, |docs| docs.is_empty()))
    }

    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<u64> {
        Ok(self.with_collection(collection, |docs| {
            docs.iter().filter(|d| filter.map(|f| matches_filter(d, f)).unwrap_or(true)).count() as u64
        }))
    }

    async fn find(&self, collection: &str, plan: &QueryPlan) -> Result<Vec<Value>> {
        let filtered: Vec<Value> = self.with_collection(collection, |docs| {
            docs.iter().filter(|d| plan.filter.as_ref().map(|f| matches_filter(d, f)).unwrap_or(true)).cloned().collect()
        });
        let sorted = apply_sort(filtered, plan);
        let take = if plan.limit == 0 { usize::MAX } else { plan.limit as usize };
        let page: Vec<Value> = sorted
            .into_iter()
            .skip(plan.skip as usize)
            .take(take)
            .map(|d| apply_projection(&d, &plan.projection))
            .collect();
        Ok(page)
    }

    async fn find_by_id(&self, collection: &str, id_fields: &[&str], id: &str) -> Result<Option<Value>> {
        let exact = self.with_collection(collection, |docs| {
            docs.iter()
                .find(|d| id_fields.iter().any(|f| field_path(d, f).and_then(value_as_text).as_deref() == Some(id)))
                .cloned()
        });
        if exact.is_some() {
            return Ok(exact);
        }
        let suffix = self.with_collection(collection, |docs| {
            docs.iter()
                .find(|d| {
                    id_fields.iter().any(|f| {
                        field_path(d, f)
                            .and_then(value_as_text)
                            .map(|v| v.to_lowercase().ends_with(&id.to_lowercase()))
                            .unwrap_or(false)
                    })
                })
                .cloned()
        });
        Ok(suffix)
    }

    async fn get(&self, collection: &str, key_field: &str, key_value: &str) -> Result<Option<Value>> {
        Ok(self.with_collection(collection, |docs| {
            docs.iter().find(|d| field_path(d, key_field).and_then(value_as_text).as_deref() == Some(key_value)).cloned()
        }))
    }

    async fn put(&self, collection: &str, key_field: &str, mut document: Value) -> Result<()> {
        if !document.is_object() {
            return Err(GatewayError::Internal);
        }
        let key_value = field_path(&document, key_field).and_then(value_as_text);
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if let Some(key_value) = key_value {
            if let Some(slot) = docs.iter_mut().find(|d| field_path(d, key_field).and_then(value_as_text).as_deref() == Some(key_value.as_str())) {
                *slot = document;
                return Ok(());
            }
        }
        // A real driver assigns an opaque primary key on insert; synthesize
        // one here so the executor's "convert opaque identifiers to
        // strings" step has something to convert.
        if let Value::Object(map) = &mut document {
            map.entry("_id").or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        }
        docs.push(document);
        Ok(())
    }
}
