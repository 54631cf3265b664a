//! Query Plan Builder — turns the composed filter tree plus the remaining
//! control parameters (`include`/`exclude`, `sort.asc`/`sort.desc`,
//! `skip`/`limit`/`size`/`page`) into a [`QueryPlan`].

use crate::classify::ClassifiedParams;
use crate::compose::compose;
use crate::error::{GatewayError, Result};
use crate::model::{Collation, Projection, QueryPlan, SortDirection, SortKey};

/// Page size used when the request names a `page` but no `size`.
const DEFAULT_PAGE_ONLY_SIZE: u64 = 10;

fn split_csv(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn build_projection(classified: &ClassifiedParams) -> Result<Projection> {
    let include = classified.control.iter().find(|e| e.name == "include").map(|e| split_csv(&e.value));
    let exclude = classified.control.iter().find(|e| e.name == "exclude").map(|e| split_csv(&e.value));

    match (include, exclude) {
        (None, None) => Ok(Projection::None),
        (Some(fields), None) => Ok(Projection::Include(fields)),
        (None, Some(fields)) => Ok(Projection::Exclude(fields)),
        // `_id` is the one field MongoDB lets you exclude alongside an
        // inclusion projection; any other combination is ambiguous.
        (Some(fields), Some(exclude)) if exclude == ["_id".to_string()] => {
            let mut fields = fields;
            fields.retain(|f| f != "_id");
            Ok(Projection::Include(fields))
        }
        _ => Err(GatewayError::invalid_argument("include")),
    }
}

fn build_sort(classified: &ClassifiedParams) -> Vec<SortKey> {
    let mut keys = Vec::new();
    for entry in &classified.control {
        let direction = match entry.name.as_str() {
            "sort.asc" => SortDirection::Asc,
            "sort.desc" => SortDirection::Desc,
            _ => continue,
        };
        for field in split_csv(&entry.value) {
            keys.push(SortKey { field, direction, nulls_last: true });
        }
    }
    keys
}

fn parse_u64(classified: &ClassifiedParams, name: &str) -> Option<u64> {
    classified.control.iter().find(|e| e.name == name).and_then(|e| e.value.parse::<u64>().ok())
}

/// Resolve `skip`/`limit` from whichever of `skip`/`limit`/`size`/`page` the
/// request supplied, following the five ordered rules: neither page nor
/// size/limit leaves the result unbounded; `page` alone defaults the page
/// size to 10; `size`/`limit` alone starts from an explicit `skip` (default
/// 0); both `page` and `size` compute `skip` from `page`, which an explicit
/// `skip` does not override — `page` already expresses skip at a higher
/// level than a raw offset.
fn build_pagination(classified: &ClassifiedParams) -> (u64, u64) {
    let skip = parse_u64(classified, "skip");
    let limit = parse_u64(classified, "limit");
    let size = parse_u64(classified, "size").or(limit);
    let page = parse_u64(classified, "page");

    match (page, size) {
        (Some(page), Some(size)) => ((page.saturating_sub(1)) * size, size),
        (Some(page), None) => ((page.saturating_sub(1)) * DEFAULT_PAGE_ONLY_SIZE, DEFAULT_PAGE_ONLY_SIZE),
        (None, Some(size)) => (skip.unwrap_or(0), size),
        (None, None) => (skip.unwrap_or(0), 0),
    }
}

/// Build the full plan: compose the filter, then layer on projection, sort,
/// and pagination from the remaining control parameters.
pub fn build_plan(classified: &ClassifiedParams, logical_op: Option<&str>) -> Result<QueryPlan> {
    let filter = compose(classified, logical_op);
    let projection = build_projection(classified)?;
    let sort = build_sort(classified);
    let collation = if sort.is_empty() { None } else { Some(Collation::default()) };
    let (skip, limit) = build_pagination(classified);

    Ok(QueryPlan { filter, projection, sort, collation, skip, limit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamEntry;

    fn control(name: &str, value: &str) -> ParamEntry {
        ParamEntry { name: name.to_string(), value: value.to_string(), raw: value.to_string() }
    }

    #[test]
    fn no_pagination_params_is_unbounded() {
        let classified = ClassifiedParams::default();
        let plan = build_plan(&classified, None).unwrap();
        assert_eq!(plan.skip, 0);
        assert_eq!(plan.limit, 0);
    }

    #[test]
    fn page_and_size_compute_skip() {
        let classified = ClassifiedParams { control: vec![control("page", "3"), control("size", "20")], fields: vec![] };
        let plan = build_plan(&classified, None).unwrap();
        assert_eq!(plan.skip, 40);
        assert_eq!(plan.limit, 20);
    }

    #[test]
    fn page_alone_uses_default_size_of_ten() {
        let classified = ClassifiedParams { control: vec![control("page", "2")], fields: vec![] };
        let plan = build_plan(&classified, None).unwrap();
        assert_eq!(plan.skip, DEFAULT_PAGE_ONLY_SIZE);
        assert_eq!(plan.limit, DEFAULT_PAGE_ONLY_SIZE);
    }

    #[test]
    fn limit_alone_behaves_like_size_alone() {
        let classified = ClassifiedParams { control: vec![control("limit", "7")], fields: vec![] };
        let plan = build_plan(&classified, None).unwrap();
        assert_eq!(plan.skip, 0);
        assert_eq!(plan.limit, 7);
    }

    #[test]
    fn size_alone_combines_with_explicit_skip() {
        let classified = ClassifiedParams { control: vec![control("skip", "5"), control("size", "10")], fields: vec![] };
        let plan = build_plan(&classified, None).unwrap();
        assert_eq!(plan.skip, 5);
        assert_eq!(plan.limit, 10);
    }

    #[test]
    fn skip_and_limit_used_directly() {
        let classified = ClassifiedParams { control: vec![control("skip", "5"), control("limit", "15")], fields: vec![] };
        let plan = build_plan(&classified, None).unwrap();
        assert_eq!(plan.skip, 5);
        assert_eq!(plan.limit, 15);
    }

    #[test]
    fn sort_keys_preserve_param_order_across_asc_and_desc() {
        let classified = ClassifiedParams {
            control: vec![control("sort.desc", "modified"), control("sort.asc", "title,ediid")],
            fields: vec![],
        };
        let plan = build_plan(&classified, None).unwrap();
        assert_eq!(plan.sort.len(), 3);
        assert_eq!(plan.sort[0].field, "modified");
        assert_eq!(plan.sort[0].direction, SortDirection::Desc);
        assert_eq!(plan.sort[1].field, "title");
        assert_eq!(plan.sort[2].field, "ediid");
        assert!(plan.collation.is_some());
    }

    #[test]
    fn no_sort_means_no_collation() {
        let classified = ClassifiedParams::default();
        let plan = build_plan(&classified, None).unwrap();
        assert!(plan.collation.is_none());
    }

    #[test]
    fn include_and_exclude_id_together_is_allowed() {
        let classified = ClassifiedParams {
            control: vec![control("include", "title,ediid"), control("exclude", "_id")],
            fields: vec![],
        };
        let plan = build_plan(&classified, None).unwrap();
        match plan.projection {
            Projection::Include(fields) => assert_eq!(fields, vec!["title".to_string(), "ediid".to_string()]),
            other => panic!("expected Include, got {other:?}"),
        }
    }

    #[test]
    fn include_and_exclude_other_fields_together_is_rejected() {
        let classified = ClassifiedParams {
            control: vec![control("include", "title"), control("exclude", "ediid")],
            fields: vec![],
        };
        assert!(build_plan(&classified, None).is_err());
    }
}
