//! Property tests for the quantified invariants the pipeline promises:
//! comma-list order doesn't affect the resulting filter set, an omitted
//! `logicalOp` behaves exactly like an explicit `AND`, a NUL byte or path
//! traversal substring is rejected no matter which parameter carries it,
//! and running a plan twice against the same store is deterministic once
//! `ElapsedTime` is set aside.

use proptest::prelude::*;

use crate::classify::classify;
use crate::executor::execute_search;
use crate::model::Filter;
use crate::params::RequestParams;
use crate::plan::build_plan;
use crate::store::MemoryStore;
use crate::validate::validate;

fn arb_token() -> impl Strategy<Value = String> {
    "[a-zA-Z]{1,8}"
}

fn arb_field_name() -> impl Strategy<Value = String> {
    prop_oneof![Just("title".to_string()), Just("ediid".to_string()), Just("topic.tag".to_string())]
}

/// Canonical string form of a filter that ignores `Or`/`And` child order,
/// so two filters built from differently-ordered comma-lists compare equal.
fn canonical(filter: &Filter) -> String {
    match filter {
        Filter::Leaf { field, matcher } => format!("Leaf({field},{matcher:?})"),
        Filter::TextSearch { phrase, quoted } => format!("TextSearch({phrase},{quoted})"),
        Filter::DateRange { field, gte, lt } => format!("DateRange({field},{gte:?},{lt:?})"),
        Filter::And(children) => {
            let mut parts: Vec<String> = children.iter().map(canonical).collect();
            parts.sort();
            format!("And[{}]", parts.join(";"))
        }
        Filter::Or(children) => {
            let mut parts: Vec<String> = children.iter().map(canonical).collect();
            parts.sort();
            format!("Or[{}]", parts.join(";"))
        }
    }
}

proptest! {
    #[test]
    fn comma_list_order_does_not_affect_resulting_filter(
        field in arb_field_name(),
        a in arb_token(),
        b in arb_token(),
        c in arb_token(),
    ) {
        prop_assume!(a != b && b != c && a != c);

        let forward = RequestParams::from_pairs(vec![(field.clone(), format!("{a},{b},{c}"))]);
        let backward = RequestParams::from_pairs(vec![(field.clone(), format!("{c},{b},{a}"))]);

        let forward_classified = classify(&validate(forward).unwrap());
        let backward_classified = classify(&validate(backward).unwrap());

        let forward_plan = build_plan(&forward_classified, None).unwrap();
        let backward_plan = build_plan(&backward_classified, None).unwrap();

        prop_assert_eq!(
            forward_plan.filter.as_ref().map(canonical),
            backward_plan.filter.as_ref().map(canonical)
        );
    }

    #[test]
    fn omitted_logical_op_matches_explicit_and(
        field_a in arb_field_name(),
        field_b in arb_field_name(),
        value_a in arb_token(),
        value_b in arb_token(),
    ) {
        prop_assume!(field_a != field_b);

        let params = RequestParams::from_pairs(vec![(field_a, value_a), (field_b, value_b)]);
        let classified = classify(&validate(params).unwrap());

        let implicit = build_plan(&classified, None).unwrap();
        let explicit = build_plan(&classified, Some("AND")).unwrap();

        prop_assert_eq!(
            implicit.filter.as_ref().map(canonical),
            explicit.filter.as_ref().map(canonical)
        );
    }

    #[test]
    fn nul_byte_is_rejected_regardless_of_which_param_carries_it(
        name in arb_field_name(),
        prefix in arb_token(),
        suffix in arb_token(),
    ) {
        let tainted = format!("{prefix}\0{suffix}");
        let params = RequestParams::from_pairs(vec![(name, tainted)]);
        prop_assert!(validate(params).is_err());
    }

    #[test]
    fn path_traversal_is_rejected_regardless_of_which_param_carries_it(
        name in arb_field_name(),
        prefix in arb_token(),
    ) {
        let tainted = format!("{prefix}../etc/passwd");
        let params = RequestParams::from_pairs(vec![(name, tainted)]);
        prop_assert!(validate(params).is_err());
    }
}

#[tokio::test]
async fn repeated_execution_is_deterministic_modulo_elapsed_time() {
    let store = MemoryStore::new();
    store.seed(
        "records",
        vec![
            serde_json::json!({"ediid": "a", "title": "Chemistry"}),
            serde_json::json!({"ediid": "b", "title": "Physics"}),
        ],
    );
    let plan = crate::model::QueryPlan::empty();
    let plan = crate::model::QueryPlan { limit: 100, ..plan };

    let first = execute_search(&store, "records", &plan).await.unwrap();
    let second = execute_search(&store, "records", &plan).await.unwrap();

    assert_eq!(first.result_count, second.result_count);
    assert_eq!(first.result_data, second.result_data);
    assert_eq!(first.page_size, second.page_size);
}
