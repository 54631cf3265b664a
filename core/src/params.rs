//! `RequestParams` — the ordered, read-only view of a request's query string.
//!
//! Order matters: the `searchphrase`-must-be-first and
//! `searchphrase`-not-followed-by-`logicalOp` validator rules both depend on
//! parameter position, which a `HashMap` would discard and which repeated
//! keys would complicate if collapsed eagerly.

/// One `name=value` pair from the URL. `value` is percent-decoded; `raw`
/// keeps the wire form so the Validator can catch a raw `%00` or `..%2f`
/// before decoding turns it into something that looks innocuous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamEntry {
    pub name: String,
    pub value: String,
    pub raw: String,
}

/// Ordered, possibly-repeated-key view over a request's query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    entries: Vec<ParamEntry>,
}

impl RequestParams {
    pub fn new(entries: Vec<ParamEntry>) -> Self {
        Self { entries }
    }

    /// Build from already-decoded `(name, value)` pairs. `raw` is set equal
    /// to `value` — use [`RequestParams::from_query_string`] when the raw
    /// wire form must be preserved for pre-decode validation.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(name, value)| ParamEntry { name: name.clone(), value: value.clone(), raw: value })
            .collect();
        Self { entries }
    }

    /// Parse a raw URL query string (`a=1&b=2`), percent-decoding each
    /// value while keeping the original wire-form bytes available.
    pub fn from_query_string(query: &str) -> Self {
        let mut entries = Vec::new();
        if query.is_empty() {
            return Self { entries };
        }
        for pair in query.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (raw_name, raw_value) = match pair.split_once('=') {
                Some((k, v)) => (k, v),
                None => (pair, ""),
            };
            let name = urlencoding::decode(raw_name).map(|c| c.into_owned()).unwrap_or_else(|_| raw_name.to_string());
            let value =
                urlencoding::decode(raw_value).map(|c| c.into_owned()).unwrap_or_else(|_| raw_value.to_string());
            entries.push(ParamEntry { name, value, raw: raw_value.to_string() });
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[ParamEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Index of `name`'s first occurrence, if present.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// First value bound to `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.value.as_str())
    }

    /// All values bound to `name`, in order (repeated keys in the URL).
    pub fn all(&self, name: &str) -> Vec<&str> {
        self.entries.iter().filter(|e| e.name == name).map(|e| e.value.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Count of occurrences of `name`.
    pub fn count(&self, name: &str) -> usize {
        self.entries.iter().filter(|e| e.name == name).count()
    }

    /// Names in the order keys were first seen, deduplicated.
    pub fn names_in_order(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for e in &self.entries {
            if seen.insert(e.name.as_str()) {
                out.push(e.name.as_str());
            }
        }
        out
    }
}
