//! Parameter Validator — rejects unsafe or malformed input before anything
//! downstream touches it.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{GatewayError, Result};
use crate::params::RequestParams;

/// Control parameters restricted to `[A-Za-z0-9.,@_]`.
const CHARSET_RESTRICTED: [&str; 4] = ["include", "exclude", "sort.desc", "sort.asc"];

/// Parameters that must parse as integers, with their lower bound.
const INT_PARAMS: [(&str, i64); 4] = [("skip", 0), ("limit", 0), ("size", 1), ("page", 1)];

fn restricted_chars_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9.,@_]").expect("static pattern compiles"))
}

/// Validate `params` in place, returning them unchanged on success.
///
/// Enforces: at most one `searchphrase`, positioned first; `logicalOp` may
/// not immediately follow `searchphrase`; `logicalOp` values restricted to
/// `AND`/`OR` case-insensitively; charset restriction on the four control
/// parameters named in [`CHARSET_RESTRICTED`]; integer parsing + bounds on
/// `skip`/`limit`/`size`/`page`; no NUL byte or path-traversal substring in
/// any raw or decoded value.
pub fn validate(params: RequestParams) -> Result<RequestParams> {
    match validate_inner(&params) {
        Ok(()) => Ok(params),
        Err(err) => {
            // Never log the raw query string here — a rejected param may be
            // carrying an injection payload we don't want echoed into logs.
            tracing::warn!(param = %rejected_param(&err), "validator rejected request");
            Err(err)
        }
    }
}

fn rejected_param(err: &GatewayError) -> String {
    match err {
        GatewayError::InvalidArgument(name) => name.clone(),
        other => other.to_string(),
    }
}

fn validate_inner(params: &RequestParams) -> Result<()> {
    check_searchphrase_position(params)?;
    check_logical_op_values(params)?;
    check_charset_restrictions(params)?;
    check_integer_params(params)?;
    check_injection(params)?;
    Ok(())
}

fn check_searchphrase_position(params: &RequestParams) -> Result<()> {
    let count = params.count("searchphrase");
    if count > 1 {
        return Err(GatewayError::invalid_argument("searchphrase"));
    }
    if count == 1 {
        match params.position("searchphrase") {
            Some(0) => {}
            _ => return Err(GatewayError::invalid_argument("searchphrase")),
        }
        if let Some(second) = params.entries().get(1) {
            if second.name.eq_ignore_ascii_case("logicalOp") {
                return Err(GatewayError::invalid_argument("logicalOp"));
            }
        }
    }
    Ok(())
}

fn check_logical_op_values(params: &RequestParams) -> Result<()> {
    if let Some(value) = params.first("logicalOp") {
        if !value.eq_ignore_ascii_case("AND") && !value.eq_ignore_ascii_case("OR") {
            return Err(GatewayError::invalid_argument("logicalOp"));
        }
    }
    Ok(())
}

fn check_charset_restrictions(params: &RequestParams) -> Result<()> {
    let restricted = restricted_chars_pattern();
    for entry in params.entries() {
        if entry.value.is_empty() {
            continue;
        }
        if CHARSET_RESTRICTED.contains(&entry.name.as_str()) && restricted.is_match(&entry.value) {
            return Err(GatewayError::invalid_argument(entry.name.clone()));
        }
    }
    Ok(())
}

fn check_integer_params(params: &RequestParams) -> Result<()> {
    for (name, min) in INT_PARAMS {
        if let Some(value) = params.first(name) {
            if value.is_empty() {
                continue;
            }
            let parsed: i64 =
                value.parse().map_err(|_| GatewayError::invalid_argument(name.to_string()))?;
            if parsed < min {
                return Err(GatewayError::invalid_argument(name.to_string()));
            }
        }
    }
    Ok(())
}

const TRAVERSAL_NEEDLE: &str = "../";
const TRAVERSAL_NEEDLE_ENCODED: &str = "..%2f";

fn check_injection(params: &RequestParams) -> Result<()> {
    for entry in params.entries() {
        let raw_lower = entry.raw.to_lowercase();
        if entry.raw.contains('\0')
            || raw_lower.contains("%00")
            || raw_lower.contains(TRAVERSAL_NEEDLE_ENCODED)
            || entry.raw.contains(TRAVERSAL_NEEDLE)
        {
            return Err(GatewayError::invalid_argument(entry.name.clone()));
        }
        if entry.value.contains('\0') || entry.value.contains(TRAVERSAL_NEEDLE) {
            return Err(GatewayError::invalid_argument(entry.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> RequestParams {
        RequestParams::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn searchphrase_must_be_first() {
        let p = params(&[("title", "x"), ("searchphrase", "chemistry")]);
        assert!(validate(p).is_err());
    }

    #[test]
    fn searchphrase_first_is_ok() {
        let p = params(&[("searchphrase", "chemistry"), ("title", "x")]);
        assert!(validate(p).is_ok());
    }

    #[test]
    fn searchphrase_then_logical_op_rejected() {
        let p = params(&[("searchphrase", "chemistry"), ("logicalOp", "OR")]);
        assert!(validate(p).is_err());
    }

    #[test]
    fn duplicate_searchphrase_rejected() {
        let p = params(&[("searchphrase", "a"), ("searchphrase", "b")]);
        assert!(validate(p).is_err());
    }

    #[test]
    fn logical_op_case_insensitive() {
        for v in ["AND", "and", "OR", "or"] {
            let p = params(&[("logicalOp", v)]);
            assert!(validate(p).is_ok(), "{v} should be valid");
        }
        let p = params(&[("logicalOp", "XOR")]);
        assert!(validate(p).is_err());
    }

    #[test]
    fn charset_restricted_params_reject_bad_chars() {
        let p = params(&[("include", "title;DROP")]);
        assert!(validate(p).is_err());
        let p = params(&[("include", "title,description.keyword,@type")]);
        assert!(validate(p).is_ok());
    }

    #[test]
    fn integer_params_bounds() {
        assert!(validate(params(&[("skip", "-1")])).is_err());
        assert!(validate(params(&[("limit", "-1")])).is_err());
        assert!(validate(params(&[("size", "0")])).is_err());
        assert!(validate(params(&[("page", "0")])).is_err());
        assert!(validate(params(&[("page", "abc")])).is_err());
        assert!(validate(params(&[("skip", "0"), ("limit", "0"), ("size", "1"), ("page", "1")])).is_ok());
    }

    #[test]
    fn raw_percent_encoded_null_byte_rejected() {
        let p = RequestParams::from_query_string("title=test%00malicious");
        assert!(validate(p).is_err());
    }

    #[test]
    fn decoded_path_traversal_rejected() {
        let p = RequestParams::from_query_string("title=..%2Fetc%2Fpasswd");
        assert!(validate(p).is_err());
    }

    #[test]
    fn raw_literal_null_byte_rejected() {
        let p = params(&[("title", "test\0malicious")]);
        assert!(validate(p).is_err());
    }
}
