//! Resource Router — one generic handler mounted over each of the nine
//! document collections, plus the `/usagemetrics/*` family and `/health`.

use axum::extract::{Path, RawQuery, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, MethodRouter};
use axum::Router;

use rmmgate_core::metrics::{now_rfc3339, total_unique_users};
use rmmgate_core::model::{DataSetMetricsEnvelope, FilesMetricsEnvelope, RepoMetricsEnvelope};
use rmmgate_core::{build_query_plan, executor, CollectionStore};

use crate::types::{error_response, AppContext, ID_FIELDS, RESOURCE_COLLECTIONS};

/// Best-effort caller identity for the usage-metrics event the single-record
/// lookup records. `x-forwarded-for`'s first hop, when present; otherwise a
/// placeholder, since the in-process reference store never sees a real
/// peer address without a TCP listener in front of it.
fn client_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "anonymous".to_string())
}

async fn search_collection(ctx: &AppContext, collection: &str, query: Option<String>) -> Response {
    let outcome = async {
        let plan = build_query_plan(query.as_deref().unwrap_or(""))?;
        executor::execute_search(ctx.store.as_ref(), collection, &plan).await
    }
    .await;

    match outcome {
        Ok(envelope) => Json(envelope).into_response(),
        Err(err) => error_response(err, &format!("/{collection}")),
    }
}

/// Like [`search_collection`], but renders the envelope under one of the
/// `DataSetMetrics*`/`FilesMetrics*`/`RepoMetrics*` names spec.md §6 calls
/// for on the `/usagemetrics/*` list endpoints instead of the generic
/// `ResultData`/`ResultCount` shape.
async fn search_metrics_collection<E>(ctx: &AppContext, collection: &str, path: &str, query: Option<String>) -> Response
where
    E: From<rmmgate_core::ResultEnvelope> + serde::Serialize,
{
    let outcome = async {
        let plan = build_query_plan(query.as_deref().unwrap_or(""))?;
        executor::execute_search(ctx.store.as_ref(), collection, &plan).await
    }
    .await;

    match outcome {
        Ok(envelope) => Json(E::from(envelope)).into_response(),
        Err(err) => error_response(err, path),
    }
}

async fn lookup_in_collection(ctx: &AppContext, collection: &str, id: &str) -> Response {
    match executor::execute_lookup(ctx.store.as_ref(), collection, &ID_FIELDS, id).await {
        Ok(envelope) => Json(envelope).into_response(),
        Err(err) => error_response(err, &format!("/{collection}/{id}")),
    }
}

/// Like [`lookup_in_collection`], but renders the envelope under a
/// `DataSetMetrics*`/`FilesMetrics*` name instead of the generic shape.
async fn lookup_metrics_in_collection<E>(
    ctx: &AppContext,
    collection: &str,
    id_fields: &[&str],
    id: &str,
    path: &str,
) -> Response
where
    E: From<rmmgate_core::ResultEnvelope> + serde::Serialize,
{
    match executor::execute_lookup(ctx.store.as_ref(), collection, id_fields, id).await {
        Ok(envelope) => Json(E::from(envelope)).into_response(),
        Err(err) => error_response(err, path),
    }
}

/// Single-record lookup that doubles as the download-event observer: a
/// successful match on `records` is the one read path the usage-metrics
/// collections are derived from.
async fn lookup_record(ctx: &AppContext, headers: &HeaderMap, id: &str) -> Response {
    let client_id = client_id_from_headers(headers);
    let now = now_rfc3339();
    match executor::execute_record_lookup(ctx.store.as_ref(), &ID_FIELDS, id, &client_id, &now).await {
        Ok(envelope) => Json(envelope).into_response(),
        Err(err) => error_response(err, &format!("/records/{id}")),
    }
}

/// Build the `GET /{collection}` and `GET /{collection}/{id}` pair for one
/// resource kind. `collection` is `'static` because it's always one of
/// [`RESOURCE_COLLECTIONS`].
fn resource_route(collection: &'static str) -> (String, MethodRouter<AppContext>) {
    let list = get(move |State(ctx): State<AppContext>, RawQuery(query): RawQuery| async move {
        search_collection(&ctx, collection, query).await
    });
    (format!("/{collection}"), list)
}

fn resource_item_route(collection: &'static str) -> (String, MethodRouter<AppContext>) {
    let item = get(move |State(ctx): State<AppContext>, Path(id): Path<String>, headers: HeaderMap| async move {
        if collection == "records" {
            lookup_record(&ctx, &headers, &id).await
        } else {
            lookup_in_collection(&ctx, collection, &id).await
        }
    });
    (format!("/{collection}/{{id}}"), item)
}

async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    let collections = ctx.store.collection_names().await.len();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "collections": collections,
        "uptimeSeconds": ctx.start_time.elapsed().as_secs(),
    }))
}

/// An ARK-shaped path (`ark:/NAAN/name/extra...`) carries more segments
/// than the identifier itself once it's embedded in a usage-metrics path
/// parameter; truncate down to the first three `/`-separated segments so
/// trailing junk doesn't become part of the lookup key.
fn truncate_ark_path(raw: &str) -> String {
    if !raw.contains("ark:") {
        return raw.to_string();
    }
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() >= 3 {
        parts[..3].join("/")
    } else {
        raw.to_string()
    }
}

async fn usage_metrics_records(State(ctx): State<AppContext>, RawQuery(query): RawQuery) -> Response {
    search_metrics_collection::<DataSetMetricsEnvelope>(&ctx, "record_metrics", "/usagemetrics/records", query).await
}

async fn usage_metrics_record_by_id(State(ctx): State<AppContext>, Path(id): Path<String>) -> Response {
    let id = truncate_ark_path(&id);
    let path = format!("/usagemetrics/records/{id}");
    lookup_metrics_in_collection::<DataSetMetricsEnvelope>(&ctx, "record_metrics", &ID_FIELDS, &id, &path).await
}

async fn usage_metrics_files(State(ctx): State<AppContext>, RawQuery(query): RawQuery) -> Response {
    search_metrics_collection::<FilesMetricsEnvelope>(&ctx, "file_metrics", "/usagemetrics/files", query).await
}

async fn usage_metrics_file_by_path(State(ctx): State<AppContext>, Path(path): Path<String>) -> Response {
    let path = truncate_ark_path(&path);
    let route = format!("/usagemetrics/files/{path}");
    lookup_metrics_in_collection::<FilesMetricsEnvelope>(&ctx, "file_metrics", &["filepath"], &path, &route).await
}

async fn usage_metrics_repo(State(ctx): State<AppContext>, RawQuery(query): RawQuery) -> Response {
    search_metrics_collection::<RepoMetricsEnvelope>(&ctx, "repo_metrics", "/usagemetrics/repo", query).await
}

/// Returns a bare integer, not the usual envelope — the one place the
/// gateway departs from the shared response shape.
async fn usage_metrics_total_users(State(ctx): State<AppContext>) -> Response {
    match total_unique_users(ctx.store.as_ref()).await {
        Ok(count) => Json(count).into_response(),
        Err(err) => error_response(err, "/usagemetrics/totalusers"),
    }
}

pub fn build_router() -> Router<AppContext> {
    let mut router = Router::new().route("/health", get(health));

    for collection in RESOURCE_COLLECTIONS {
        let (path, method_router) = resource_route(collection);
        router = router.route(&path, method_router);
        let (path, method_router) = resource_item_route(collection);
        router = router.route(&path, method_router);
    }

    router
        .route("/usagemetrics/records", get(usage_metrics_records))
        .route("/usagemetrics/records/{*id}", get(usage_metrics_record_by_id))
        .route("/usagemetrics/files", get(usage_metrics_files))
        .route("/usagemetrics/files/{*path}", get(usage_metrics_file_by_path))
        .route("/usagemetrics/repo", get(usage_metrics_repo))
        .route("/usagemetrics/totalusers", get(usage_metrics_total_users))
}
