//! End-to-end HTTP tests driven directly against the router, no TCP socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rmmgate_core::{CollectionStore, MemoryStore};
use rmmgate_server::AppContext;
use serde_json::{json, Value};
use tower::ServiceExt;

fn seeded_context() -> (AppContext, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.seed(
        "records",
        vec![
            json!({
                "ediid": "ark:/88434/mds2-1001",
                "title": "Chemistry Reference Dataset",
                "topic": [{"tag": "Chemistry"}],
                "@type": ["nrdp:PublicDataResource"],
            }),
            json!({
                "ediid": "ark:/88434/mds2-1002",
                "title": "Physics Reference Dataset",
                "topic": [{"tag": "Physics"}],
                "@type": ["nrdp:PublicDataResource"],
            }),
        ],
    );
    let ctx = AppContext { store: store.clone() as Arc<dyn rmmgate_core::CollectionStore>, start_time: std::time::Instant::now() };
    (ctx, store)
}

async fn get(ctx: AppContext, uri: &str) -> (StatusCode, Value) {
    let app = rmmgate_server::build_router().with_state(ctx);
    let response = app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_collection_count() {
    let (ctx, _store) = seeded_context();
    let (status, body) = get(ctx, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["collections"], 1);
}

#[tokio::test]
async fn search_by_topic_tag_and_searchphrase_narrows_to_one_record() {
    let (ctx, _store) = seeded_context();
    let (status, body) = get(ctx, "/records?searchphrase=chemistry&topic.tag=Chemistry").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ResultCount"], 1);
    assert_eq!(body["ResultData"][0]["ediid"], "ark:/88434/mds2-1001");
}

#[tokio::test]
async fn search_comma_list_is_or_across_alternatives() {
    let (ctx, _store) = seeded_context();
    let (status, body) = get(ctx, "/records?topic.tag=Chemistry,Physics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ResultCount"], 2);
}

#[tokio::test]
async fn lookup_by_suffix_of_ediid_succeeds() {
    let (ctx, _store) = seeded_context();
    let (status, body) = get(ctx, "/records/mds2-1001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ResultCount"], 1);
    assert_eq!(body["PageSize"], 1);
    assert_eq!(body["ResultData"][0]["ediid"], "ark:/88434/mds2-1001");
}

#[tokio::test]
async fn lookup_missing_id_is_404_with_error_envelope() {
    let (ctx, _store) = seeded_context();
    let (status, body) = get(ctx, "/records/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["httpStatus"], "404 Not Found");
}

#[tokio::test]
async fn search_on_empty_collection_is_404() {
    let store = Arc::new(MemoryStore::new());
    let ctx = AppContext { store, start_time: std::time::Instant::now() };
    let (status, _body) = get(ctx, "/fields").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_query_parameter_is_400() {
    let (ctx, _store) = seeded_context();
    let (status, body) = get(ctx, "/records?page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["httpStatus"], "400 Bad Request");
}

#[tokio::test]
async fn totalusers_returns_bare_integer_not_an_envelope() {
    let (ctx, _store) = seeded_context();
    let (status, body) = get(ctx, "/usagemetrics/totalusers").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_number());
}

#[tokio::test]
async fn pagination_page_and_size_slice_results() {
    let (ctx, _store) = seeded_context();
    let (status, body) = get(ctx, "/records?page=1&size=1&sort.asc=ediid").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ResultData"].as_array().unwrap().len(), 1);
    assert_eq!(body["ResultData"][0]["ediid"], "ark:/88434/mds2-1001");
}

#[tokio::test]
async fn record_lookup_records_a_download_event() {
    let (ctx, store) = seeded_context();
    let (status, _body) = get(ctx, "/records/mds2-1001").await;
    assert_eq!(status, StatusCode::OK);
    let recorded = store.get("record_metrics", "ediid", "ark:/88434/mds2-1001").await.unwrap();
    assert!(recorded.is_some(), "expected a record_metrics upsert after a successful lookup");
    assert_eq!(recorded.unwrap()["success_get"], 1);
}

#[tokio::test]
async fn unbounded_search_returns_every_match() {
    let (ctx, _store) = seeded_context();
    let (status, body) = get(ctx, "/records").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ResultCount"], 2);
    assert_eq!(body["ResultData"].as_array().unwrap().len(), 2);
    assert_eq!(body["PageSize"], 0);
}

#[tokio::test]
async fn usagemetrics_record_lookup_truncates_ark_path_extras() {
    let (ctx, _store) = seeded_context();
    ctx.store
        .put(
            "record_metrics",
            "ediid",
            json!({"ediid": "ark:/88434/mds2-1001", "success_get": 3, "failure_get": 0, "number_users": 2,
                   "first_time_logged": "2024-01-01T00:00:00Z", "last_time_logged": "2024-02-01T00:00:00Z"}),
        )
        .await
        .unwrap();
    let (status, body) =
        get(ctx, "/usagemetrics/records/ark:/88434/mds2-1001/cite-this").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["DataSetMetricsCount"], 1);
    assert_eq!(body["DataSetMetrics"][0]["ediid"], "ark:/88434/mds2-1001");
}
