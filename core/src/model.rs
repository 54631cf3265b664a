//! Shared data model: `FieldMatcher`, `Filter`, `QueryPlan`, `ResultEnvelope`,
//! `ErrorInfo`.

use serde::{Deserialize, Serialize};

/// How a single field's value is matched against a stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatcher {
    /// Case-insensitive regex match. `anchored` distinguishes a partial
    /// (substring) match from an exact `^value$` match without needing a
    /// separate variant for the anchored form.
    Regex { pattern: String, case_insensitive: bool, anchored: bool },
    /// Array-of-sub-object match: `field` names the array, `inner` is the
    /// matcher applied to one element's sub-field.
    ElemMatch { field: String, inner: Box<FieldMatcher> },
    /// Equivalent to an OR of exact matches, kept as one matcher so the
    /// store driver can translate it into a native `$in`-style operator
    /// instead of an explicit OR tree.
    In(Vec<String>),
    /// Anchored case-insensitive exact match against a single value.
    Equals(String),
}

impl FieldMatcher {
    pub fn partial(value: &str) -> Self {
        FieldMatcher::Regex { pattern: regex::escape(value), case_insensitive: true, anchored: false }
    }

    pub fn exact(value: &str) -> Self {
        FieldMatcher::Equals(value.to_string())
    }

    pub fn elem_match(field: impl Into<String>, inner: FieldMatcher) -> Self {
        FieldMatcher::ElemMatch { field: field.into(), inner: Box::new(inner) }
    }
}

/// A node in the filter tree. Built by the Logical Composer from the
/// per-field matchers the Field Encoder produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Leaf { field: String, matcher: FieldMatcher },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    TextSearch { phrase: String, quoted: bool },
    DateRange { field: String, gte: Option<String>, lt: Option<String> },
}

impl Filter {
    /// Combine `filters` with `And`, eliding empty nodes and collapsing a
    /// single child to itself — the filter tree never has an empty And/Or
    /// node.
    pub fn and(filters: Vec<Filter>) -> Option<Filter> {
        Self::combine(filters, Filter::And)
    }

    pub fn or(filters: Vec<Filter>) -> Option<Filter> {
        Self::combine(filters, Filter::Or)
    }

    fn combine(filters: Vec<Filter>, wrap: fn(Vec<Filter>) -> Filter) -> Option<Filter> {
        let mut filters = filters;
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(wrap(filters)),
        }
    }
}

/// Ascending or descending sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key, in the order it appeared across `sort.asc`/`sort.desc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
    /// Request nulls sort after non-null values regardless of direction.
    pub nulls_last: bool,
}

/// Inclusion-only or exclusion-only field projection. `_id:0` may coexist
/// with an inclusion projection as a special case.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    None,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

/// Locale-aware collation settings, applied whenever any sort key is
/// present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collation {
    pub locale: String,
    pub case_sensitive: bool,
    pub numeric_ordering: bool,
}

impl Default for Collation {
    fn default() -> Self {
        Collation { locale: "en".to_string(), case_sensitive: true, numeric_ordering: true }
    }
}

/// The fully built query, ready for the Envelope Executor. Consumed once.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub filter: Option<Filter>,
    pub projection: Projection,
    pub sort: Vec<SortKey>,
    pub collation: Option<Collation>,
    pub skip: u64,
    pub limit: u64,
}

impl QueryPlan {
    pub fn empty() -> Self {
        QueryPlan {
            filter: None,
            projection: Projection::None,
            sort: Vec::new(),
            collation: None,
            skip: 0,
            limit: 0,
        }
    }
}

/// Response envelope shape shared by every search/list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope {
    #[serde(rename = "ResultCount")]
    pub result_count: u64,
    #[serde(rename = "ResultData")]
    pub result_data: Vec<serde_json::Value>,
    #[serde(rename = "PageSize")]
    pub page_size: u64,
    #[serde(rename = "Metrics")]
    pub metrics: EnvelopeMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeMetrics {
    #[serde(rename = "ElapsedTime")]
    pub elapsed_time: f64,
}

/// `GET /usagemetrics/records` response shape — `ResultEnvelope`'s fields
/// under the `DataSetMetrics*` names spec.md §6 calls out by name instead of
/// the generic `ResultData`/`ResultCount`.
#[derive(Debug, Clone, Serialize)]
pub struct DataSetMetricsEnvelope {
    #[serde(rename = "DataSetMetricsCount")]
    pub count: u64,
    #[serde(rename = "DataSetMetrics")]
    pub data: Vec<serde_json::Value>,
    #[serde(rename = "PageSize")]
    pub page_size: u64,
    #[serde(rename = "Metrics")]
    pub metrics: EnvelopeMetrics,
}

/// `GET /usagemetrics/files` response shape, under the `FilesMetrics*` names.
#[derive(Debug, Clone, Serialize)]
pub struct FilesMetricsEnvelope {
    #[serde(rename = "FilesMetricsCount")]
    pub count: u64,
    #[serde(rename = "FilesMetrics")]
    pub data: Vec<serde_json::Value>,
    #[serde(rename = "PageSize")]
    pub page_size: u64,
    #[serde(rename = "Metrics")]
    pub metrics: EnvelopeMetrics,
}

/// `GET /usagemetrics/repo` response shape, under the `RepoMetrics*` names.
#[derive(Debug, Clone, Serialize)]
pub struct RepoMetricsEnvelope {
    #[serde(rename = "RepoMetricsCount")]
    pub count: u64,
    #[serde(rename = "RepoMetrics")]
    pub data: Vec<serde_json::Value>,
    #[serde(rename = "PageSize")]
    pub page_size: u64,
    #[serde(rename = "Metrics")]
    pub metrics: EnvelopeMetrics,
}

impl From<ResultEnvelope> for DataSetMetricsEnvelope {
    fn from(envelope: ResultEnvelope) -> Self {
        DataSetMetricsEnvelope {
            count: envelope.result_count,
            data: envelope.result_data,
            page_size: envelope.page_size,
            metrics: envelope.metrics,
        }
    }
}

impl From<ResultEnvelope> for FilesMetricsEnvelope {
    fn from(envelope: ResultEnvelope) -> Self {
        FilesMetricsEnvelope {
            count: envelope.result_count,
            data: envelope.result_data,
            page_size: envelope.page_size,
            metrics: envelope.metrics,
        }
    }
}

impl From<ResultEnvelope> for RepoMetricsEnvelope {
    fn from(envelope: ResultEnvelope) -> Self {
        RepoMetricsEnvelope {
            count: envelope.result_count,
            data: envelope.result_data,
            page_size: envelope.page_size,
            metrics: envelope.metrics,
        }
    }
}

/// Error response shape shared by every failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub url: String,
    pub message: String,
    #[serde(rename = "httpStatus")]
    pub http_status: String,
}
