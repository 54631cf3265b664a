//! Metrics Aggregator — usage-metrics record types and the download-event
//! update path behind `/usagemetrics/*`.
//!
//! Three record kinds roll up from one event stream: a per-record
//! [`MetricsRecord`], a per-file [`FileMetricsRecord`], and a monthly
//! [`RepoMetricsRecord`]. [`UniqueUsersRecord`] tracks distinct users per
//! day so repeat downloads by the same user don't inflate `number_users`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::store::CollectionStore;

/// Current instant as an RFC 3339 string, the timestamp format every
/// metrics record and event in this module carries.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

const METRICS_COLLECTION: &str = "record_metrics";
const FILE_METRICS_COLLECTION: &str = "file_metrics";
const REPO_METRICS_COLLECTION: &str = "repo_metrics";
const UNIQUE_USERS_COLLECTION: &str = "unique_users";

/// One observed access, as reported by the access log this gateway's store
/// is ultimately populated from, or — for a single-document `/records/{id}`
/// lookup — synthesized by the executor itself (see
/// [`crate::executor::execute_record_lookup`]).
#[derive(Debug, Clone)]
pub struct DownloadEvent {
    pub pdrid: String,
    pub ediid: String,
    pub filepath: String,
    pub download_url: String,
    pub user_id: String,
    /// Distinguishes a bulk datacart export from a direct client GET, per
    /// `FileMetricsRecord.datacart_or_client` in the data model.
    pub datacart_or_client: String,
    pub size: f64,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    pub success: bool,
}

impl DownloadEvent {
    /// Build an event for a direct client download where only the record
    /// and file identity are known — `pdrid` mirrors `ediid`, as the two
    /// are parallel identifiers for the same dataset per the glossary.
    pub fn client_access(ediid: impl Into<String>, filepath: impl Into<String>, user_id: impl Into<String>, size: f64, timestamp: impl Into<String>, success: bool) -> Self {
        let ediid = ediid.into();
        DownloadEvent {
            pdrid: ediid.clone(),
            ediid,
            filepath: filepath.into(),
            download_url: String::new(),
            user_id: user_id.into(),
            datacart_or_client: "client".to_string(),
            size,
            timestamp: timestamp.into(),
            success,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub pdrid: String,
    pub ediid: String,
    pub first_time_logged: String,
    pub last_time_logged: String,
    pub total_size_download: f64,
    pub success_get: i64,
    pub number_users: i64,
    pub record_download: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetricsRecord {
    pub pdrid: String,
    pub ediid: String,
    pub filepath: String,
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    pub success_get: i64,
    pub failure_get: i64,
    pub datacart_or_client: String,
    pub number_users: i64,
    pub total_size_download: f64,
    pub first_time_logged: String,
    pub last_time_logged: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMetricsRecord {
    pub year: i32,
    pub month: u32,
    pub downloads: i64,
    pub unique_users: i64,
    pub last_updated: String,
    /// Raw client identifiers behind this month's `unique_users` count.
    /// Not for public consumption — kept out of the wire shape.
    #[serde(skip_serializing)]
    pub ip_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueUsersRecord {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub users: Vec<String>,
}

/// NaN/Inf never leave this module: every numeric field that accumulates
/// from event data is sanitized to `0.0` before it's written back, so a
/// malformed event can't poison a running total.
fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn year_of(timestamp: &str) -> i32 {
    timestamp.get(0..4).and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn month_num_of(timestamp: &str) -> u32 {
    timestamp.get(5..7).and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn month_key(timestamp: &str) -> String {
    timestamp.get(0..7).unwrap_or("unknown").to_string()
}

fn day_of(timestamp: &str) -> String {
    timestamp.get(0..10).unwrap_or("unknown").to_string()
}

async fn load<T: for<'de> Deserialize<'de>>(
    store: &dyn CollectionStore,
    collection: &str,
    key_field: &str,
    key_value: &str,
) -> Result<Option<T>> {
    let doc = store.get(collection, key_field, key_value).await?;
    Ok(doc.and_then(|v| serde_json::from_value(v).ok()))
}

async fn save<T: Serialize>(store: &dyn CollectionStore, collection: &str, key_field: &str, record: &T) -> Result<()> {
    let value: Value = serde_json::to_value(record).unwrap_or(Value::Null);
    store.put(collection, key_field, value).await
}

/// Apply one download event: updates the per-record, per-file, monthly
/// repo, and daily-unique-user rollups in the store.
pub async fn record_download_event(store: &dyn CollectionStore, event: &DownloadEvent) -> Result<()> {
    tracing::debug!(ediid = %event.ediid, filepath = %event.filepath, success = event.success, "recording download event");
    // Unique-users runs first: update_file_metrics/update_record_metrics read
    // back the distinct-user count for this ediid, and need this event's user
    // already recorded or the first event of the day undercounts by one.
    update_unique_users(store, event).await?;
    update_file_metrics(store, event).await?;
    update_record_metrics(store, event).await?;
    update_repo_metrics(store, event).await?;
    Ok(())
}

async fn update_file_metrics(store: &dyn CollectionStore, event: &DownloadEvent) -> Result<()> {
    let key = format!("{}::{}", event.ediid, event.filepath);
    let mut record = load::<FileMetricsRecord>(store, FILE_METRICS_COLLECTION, "key", &key)
        .await?
        .unwrap_or(FileMetricsRecord {
            pdrid: event.pdrid.clone(),
            ediid: event.ediid.clone(),
            filepath: event.filepath.clone(),
            download_url: event.download_url.clone(),
            success_get: 0,
            failure_get: 0,
            datacart_or_client: event.datacart_or_client.clone(),
            number_users: 0,
            total_size_download: 0.0,
            first_time_logged: event.timestamp.clone(),
            last_time_logged: event.timestamp.clone(),
        });

    if event.success {
        record.success_get += 1;
        // previous_total + event.size, not event.size * download_count:
        // the latter double counts every download after the first.
        record.total_size_download = sanitize(record.total_size_download + sanitize(event.size));
    } else {
        record.failure_get += 1;
    }
    record.last_time_logged = event.timestamp.clone();
    record.number_users = count_distinct_users(store, &event.ediid).await?;

    let mut value = serde_json::to_value(&record).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("key".to_string(), json!(key));
    }
    store.put(FILE_METRICS_COLLECTION, "key", value).await
}

async fn update_record_metrics(store: &dyn CollectionStore, event: &DownloadEvent) -> Result<()> {
    let mut record =
        load::<MetricsRecord>(store, METRICS_COLLECTION, "ediid", &event.ediid).await?.unwrap_or(MetricsRecord {
            pdrid: event.pdrid.clone(),
            ediid: event.ediid.clone(),
            first_time_logged: event.timestamp.clone(),
            last_time_logged: event.timestamp.clone(),
            total_size_download: 0.0,
            success_get: 0,
            number_users: 0,
            record_download: 0,
        });

    if event.success {
        record.success_get += 1;
        record.record_download += 1;
        record.total_size_download = sanitize(record.total_size_download + sanitize(event.size));
    }
    record.last_time_logged = event.timestamp.clone();
    record.number_users = count_distinct_users(store, &event.ediid).await?;

    save(store, METRICS_COLLECTION, "ediid", &record).await
}

/// Distinct users across every day logged for `ediid`. A day-by-day record
/// only tells you that day's uniques, so this merges all of them — a real
/// backend would run this as a single aggregation instead of scanning.
async fn count_distinct_users(store: &dyn CollectionStore, ediid: &str) -> Result<i64> {
    if store.is_empty(UNIQUE_USERS_COLLECTION).await.unwrap_or(true) {
        return Ok(0);
    }
    let filter = crate::model::Filter::Leaf {
        field: "ediid".to_string(),
        matcher: crate::model::FieldMatcher::exact(ediid),
    };
    let plan = crate::model::QueryPlan { filter: Some(filter), limit: 0, ..crate::model::QueryPlan::empty() };
    let mut seen = std::collections::HashSet::new();
    for doc in store.find(UNIQUE_USERS_COLLECTION, &plan).await? {
        if let Some(ids) = doc.get("users").and_then(|v| v.as_array()) {
            for id in ids {
                if let Some(s) = id.as_str() {
                    seen.insert(s.to_string());
                }
            }
        }
    }
    Ok(seen.len() as i64)
}

async fn update_unique_users(store: &dyn CollectionStore, event: &DownloadEvent) -> Result<()> {
    let day = day_of(&event.timestamp);
    let key = format!("{}::{}", event.ediid, day);
    let mut record = load::<UniqueUsersRecord>(store, UNIQUE_USERS_COLLECTION, "key", &key)
        .await?
        .unwrap_or(UniqueUsersRecord { date: day.clone(), users: Vec::new() });

    if !record.users.contains(&event.user_id) {
        record.users.push(event.user_id.clone());
    }

    let mut value = serde_json::to_value(&record).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("key".to_string(), json!(key));
        map.insert("ediid".to_string(), json!(event.ediid));
    }
    store.put(UNIQUE_USERS_COLLECTION, "key", value).await
}

async fn update_repo_metrics(store: &dyn CollectionStore, event: &DownloadEvent) -> Result<()> {
    let month = month_key(&event.timestamp);
    let mut record =
        load::<RepoMetricsRecord>(store, REPO_METRICS_COLLECTION, "month_key", &month).await?.unwrap_or(
            RepoMetricsRecord {
                year: year_of(&event.timestamp),
                month: month_num_of(&event.timestamp),
                downloads: 0,
                unique_users: 0,
                last_updated: event.timestamp.clone(),
                ip_list: Vec::new(),
            },
        );

    if event.success {
        record.downloads += 1;
        if !record.ip_list.contains(&event.user_id) {
            record.ip_list.push(event.user_id.clone());
        }
        record.unique_users = record.ip_list.len() as i64;
    }
    record.last_updated = event.timestamp.clone();

    let mut value = serde_json::to_value(&record).unwrap_or(Value::Null);
    // `ip_list` is skipped by `Serialize` for the public wire shape but the
    // store still needs it round-tripped, or every event after the first
    // would see an empty list and recompute `unique_users` as 1.
    if let Value::Object(map) = &mut value {
        map.insert("month_key".to_string(), json!(month));
        map.insert("ip_list".to_string(), json!(record.ip_list));
    }
    store.put(REPO_METRICS_COLLECTION, "month_key", value).await
}

/// Bare count of all-time distinct users across every record — the one
/// `/usagemetrics` endpoint that returns a number instead of an envelope.
pub async fn total_unique_users(store: &dyn CollectionStore) -> Result<u64> {
    if store.is_empty(UNIQUE_USERS_COLLECTION).await.unwrap_or(true) {
        return Ok(0);
    }
    let plan = crate::model::QueryPlan::empty();
    let mut seen = std::collections::HashSet::new();
    for doc in store.find(UNIQUE_USERS_COLLECTION, &plan).await? {
        if let Some(ids) = doc.get("users").and_then(|v| v.as_array()) {
            for id in ids {
                if let Some(s) = id.as_str() {
                    seen.insert(s.to_string());
                }
            }
        }
    }
    Ok(seen.len() as u64)
}
