//! Envelope Executor — runs a [`QueryPlan`] against a [`CollectionStore`]
//! and wraps the result in the response envelope shape.

use std::time::Instant;

use crate::error::{GatewayError, Result};
use crate::metrics::{self, DownloadEvent};
use crate::model::{EnvelopeMetrics, QueryPlan, ResultEnvelope};
use crate::store::CollectionStore;

/// Run a search plan against `collection`.
///
/// An empty *collection* is a [`GatewayError::ResourceEmpty`] — the caller
/// asked for a resource kind the store has nothing of. A filter that
/// matches zero documents in a non-empty collection is not an error: it's
/// an envelope with `ResultCount: 0` and an empty `ResultData`.
pub async fn execute_search(
    store: &dyn CollectionStore,
    collection: &str,
    plan: &QueryPlan,
) -> Result<ResultEnvelope> {
    let start = Instant::now();

    if store.is_empty(collection).await? {
        return Err(GatewayError::ResourceEmpty(collection.to_string()));
    }

    let result_count = store.count(collection, plan.filter.as_ref()).await?;
    let result_data = store.find(collection, plan).await?;

    Ok(ResultEnvelope {
        result_count,
        result_data,
        page_size: plan.limit,
        metrics: EnvelopeMetrics { elapsed_time: start.elapsed().as_secs_f64() },
    })
}

/// Single-document lookup by identifier, trying each of `id_fields` in turn
/// (exact match first, then suffix match — see [`CollectionStore::find_by_id`]).
///
/// Wraps the matched document in the same [`ResultEnvelope`] shape every
/// other successful response uses, per spec.md §4.6/§6: `ResultCount: 1`,
/// `ResultData: [doc]`, `PageSize: 1`.
pub async fn execute_lookup(
    store: &dyn CollectionStore,
    collection: &str,
    id_fields: &[&str],
    id: &str,
) -> Result<ResultEnvelope> {
    let start = Instant::now();
    let doc = store
        .find_by_id(collection, id_fields, id)
        .await?
        .ok_or_else(|| GatewayError::ResourceNotFound(id.to_string()))?;
    Ok(ResultEnvelope {
        result_count: 1,
        result_data: vec![doc],
        page_size: 1,
        metrics: EnvelopeMetrics { elapsed_time: start.elapsed().as_secs_f64() },
    })
}

/// Single-record lookup that also records the access as a download event.
///
/// Replaces the source's passive request-observing middleware: rather than
/// re-reading an already-consumed response body to learn its size, the
/// executor that already holds the matched document records the event
/// itself, right before returning it.
pub async fn execute_record_lookup(
    store: &dyn CollectionStore,
    id_fields: &[&str],
    id: &str,
    client_id: &str,
    now: &str,
) -> Result<ResultEnvelope> {
    let envelope = execute_lookup(store, "records", id_fields, id).await?;
    let doc = &envelope.result_data[0];
    let ediid = doc.get("ediid").and_then(|v| v.as_str()).unwrap_or(id).to_string();
    let size = serde_json::to_vec(doc).map(|bytes| bytes.len() as f64).unwrap_or(0.0);
    let event = DownloadEvent::client_access(ediid, "", client_id, size, now, true);
    metrics::record_download_event(store, &event).await?;
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Projection;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn plan() -> QueryPlan {
        QueryPlan { filter: None, projection: Projection::None, sort: vec![], collation: None, skip: 0, limit: 100 }
    }

    #[tokio::test]
    async fn empty_collection_is_resource_empty_error() {
        let store = MemoryStore::new();
        let err = execute_search(&store, "records", &plan()).await.unwrap_err();
        assert!(matches!(err, GatewayError::ResourceEmpty(_)));
    }

    #[tokio::test]
    async fn no_matches_in_nonempty_collection_is_not_an_error() {
        let store = MemoryStore::new();
        store.seed("records", vec![json!({"ediid": "1"})]);
        let mut p = plan();
        p.filter = Some(crate::model::Filter::Leaf {
            field: "ediid".to_string(),
            matcher: crate::model::FieldMatcher::exact("nope"),
        });
        let envelope = execute_search(&store, "records", &p).await.unwrap();
        assert_eq!(envelope.result_count, 0);
        assert!(envelope.result_data.is_empty());
    }

    #[tokio::test]
    async fn lookup_missing_document_is_not_found() {
        let store = MemoryStore::new();
        store.seed("records", vec![json!({"ediid": "1"})]);
        let err = execute_lookup(&store, "records", &["ediid"], "missing").await.unwrap_err();
        assert!(matches!(err, GatewayError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn lookup_found_document_returns_it_wrapped_in_an_envelope() {
        let store = MemoryStore::new();
        store.seed("records", vec![json!({"ediid": "1"})]);
        let envelope = execute_lookup(&store, "records", &["ediid"], "1").await.unwrap();
        assert_eq!(envelope.result_count, 1);
        assert_eq!(envelope.page_size, 1);
        assert_eq!(envelope.result_data[0]["ediid"], "1");
    }

    #[tokio::test]
    async fn record_lookup_upserts_a_download_event() {
        let store = MemoryStore::new();
        store.seed("records", vec![json!({"ediid": "ark:/1"})]);
        execute_record_lookup(&store, &["ediid"], "ark:/1", "user-7", "2024-03-15T00:00:00Z").await.unwrap();
        let metrics = store.get("record_metrics", "ediid", "ark:/1").await.unwrap().expect("metrics upserted");
        assert_eq!(metrics["success_get"], 1);
    }

    #[tokio::test]
    async fn failed_record_lookup_does_not_record_an_event() {
        let store = MemoryStore::new();
        store.seed("records", vec![json!({"ediid": "ark:/1"})]);
        let err = execute_record_lookup(&store, &["ediid"], "missing", "user-7", "2024-03-15T00:00:00Z")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ResourceNotFound(_)));
        assert!(store.get("record_metrics", "ediid", "missing").await.unwrap().is_none());
    }
}
