//! Param Classifier — splits validated `RequestParams` into the closed
//! control set and the open field set.

use crate::params::{ParamEntry, RequestParams};

/// The fixed, closed set of control parameter names.
pub const CONTROL_PARAMS: [&str; 12] = [
    "searchphrase",
    "exclude",
    "include",
    "skip",
    "limit",
    "size",
    "page",
    "sort.desc",
    "sort.asc",
    "datefrom",
    "dateto",
    "logicalOp",
];

pub fn is_control_param(name: &str) -> bool {
    CONTROL_PARAMS.contains(&name)
}

/// Partitioned view over a validated parameter list.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedParams {
    pub control: Vec<ParamEntry>,
    pub fields: Vec<ParamEntry>,
}

pub fn classify(params: &RequestParams) -> ClassifiedParams {
    let mut control = Vec::new();
    let mut fields = Vec::new();
    for entry in params.entries() {
        if entry.value.is_empty() {
            continue;
        }
        if is_control_param(&entry.name) {
            control.push(entry.clone());
        } else {
            fields.push(entry.clone());
        }
    }
    ClassifiedParams { control, fields }
}
