//! JSON bodies for the engine types the gateway answers with.
//!
//! Field names follow the engine's own camelCase API, so a client of the
//! gateway sees the same shapes it would get from the engine directly.

use crate::models::Page;
use meilisearch_sdk::client::{ClientStats, Health, Version};
use meilisearch_sdk::indexes::{Index, IndexStats};
use meilisearch_sdk::key::Key;
use meilisearch_sdk::search::SearchResults;
use meilisearch_sdk::task_info::TaskInfo;
use meilisearch_sdk::tasks::{Task, TasksResults};
use serde_json::{json, Value};
use std::fmt::Debug;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

fn timestamp(at: &OffsetDateTime) -> Value {
    at.format(&Rfc3339).map(Value::String).unwrap_or(Value::Null)
}

fn maybe_timestamp(at: &Option<OffsetDateTime>) -> Value {
    at.as_ref().map(timestamp).unwrap_or(Value::Null)
}

/// `DocumentAdditionOrUpdate { .. }` becomes `documentAdditionOrUpdate`.
fn task_type(update_type: &impl Debug) -> String {
    let debug = format!("{:?}", update_type);
    let name: String = debug
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => name,
    }
}

pub fn task_info(info: &TaskInfo) -> Value {
    json!({
        "taskUid": info.task_uid,
        "indexUid": info.index_uid,
        "status": info.status,
        "type": task_type(&info.update_type),
        "enqueuedAt": timestamp(&info.enqueued_at),
    })
}

pub fn task(task: &Task) -> Value {
    match task {
        Task::Enqueued { content } => json!({
            "uid": content.uid,
            "indexUid": content.index_uid,
            "status": "enqueued",
            "type": task_type(&content.update_type),
            "enqueuedAt": timestamp(&content.enqueued_at),
        }),
        Task::Processing { content } => json!({
            "uid": content.uid,
            "indexUid": content.index_uid,
            "status": "processing",
            "type": task_type(&content.update_type),
            "enqueuedAt": timestamp(&content.enqueued_at),
            "startedAt": timestamp(&content.started_at),
        }),
        Task::Succeeded { content } => json!({
            "uid": content.uid,
            "indexUid": content.index_uid,
            "status": "succeeded",
            "type": task_type(&content.update_type),
            "durationMs": content.duration.as_secs_f64() * 1000.0,
            "enqueuedAt": timestamp(&content.enqueued_at),
            "startedAt": timestamp(&content.started_at),
            "finishedAt": timestamp(&content.finished_at),
        }),
        Task::Failed { content } => json!({
            "uid": content.task.uid,
            "indexUid": content.task.index_uid,
            "status": "failed",
            "type": task_type(&content.task.update_type),
            "error": {
                "message": content.error.error_message,
                "code": content.error.error_code.to_string(),
                "type": content.error.error_type.to_string(),
                "link": content.error.error_link,
            },
            "durationMs": content.task.duration.as_secs_f64() * 1000.0,
            "enqueuedAt": timestamp(&content.task.enqueued_at),
            "startedAt": timestamp(&content.task.started_at),
            "finishedAt": timestamp(&content.task.finished_at),
        }),
        #[allow(unreachable_patterns)]
        _ => json!({
            "uid": *AsRef::<u32>::as_ref(task),
            "status": "canceled",
        }),
    }
}

pub fn tasks(results: &TasksResults) -> Value {
    json!({
        "results": results.results.iter().map(task).collect::<Vec<_>>(),
        "limit": results.limit,
        "from": results.from,
        "next": results.next,
    })
}

pub fn index(index: &Index) -> Value {
    json!({
        "uid": index.uid,
        "primaryKey": index.primary_key,
        "createdAt": maybe_timestamp(&index.created_at),
        "updatedAt": maybe_timestamp(&index.updated_at),
    })
}

pub fn index_stats(stats: &IndexStats) -> Value {
    json!({
        "numberOfDocuments": stats.number_of_documents,
        "isIndexing": stats.is_indexing,
        "fieldDistribution": stats.field_distribution,
    })
}

pub fn stats(stats: &ClientStats) -> Value {
    let indexes: serde_json::Map<String, Value> = stats
        .indexes
        .iter()
        .map(|(uid, s)| (uid.clone(), index_stats(s)))
        .collect();
    json!({
        "databaseSize": stats.database_size,
        "lastUpdate": maybe_timestamp(&stats.last_update),
        "indexes": indexes,
    })
}

pub fn health(health: &Health) -> Value {
    json!({ "status": health.status })
}

pub fn version(version: &Version) -> Value {
    json!({
        "commitSha": version.commit_sha,
        "commitDate": version.commit_date,
        "pkgVersion": version.pkg_version,
    })
}

pub fn key(key: &Key) -> Value {
    json!({
        "uid": key.uid,
        "key": key.key,
        "name": key.name,
        "description": key.description,
        "actions": serde_json::to_value(&key.actions).unwrap_or(Value::Null),
        "indexes": key.indexes,
        "expiresAt": maybe_timestamp(&key.expires_at),
        "createdAt": timestamp(&key.created_at),
        "updatedAt": timestamp(&key.updated_at),
    })
}

pub fn page<T>(page: &Page<T>, render: impl Fn(&T) -> Value) -> Value {
    json!({
        "results": page.results.iter().map(render).collect::<Vec<_>>(),
        "offset": page.offset,
        "limit": page.limit,
        "total": page.total,
    })
}

/// Hits keep their document fields; highlighted or cropped copies go under
/// `_formatted`.
pub fn search(results: &SearchResults<Value>) -> Value {
    let hits: Vec<Value> = results
        .hits
        .iter()
        .map(|hit| {
            let mut document = hit.result.clone();
            if let (Some(fields), Some(formatted)) =
                (document.as_object_mut(), hit.formatted_result.as_ref())
            {
                fields.insert("_formatted".to_string(), json!(formatted));
            }
            document
        })
        .collect();

    json!({
        "hits": hits,
        "query": results.query,
        "offset": results.offset,
        "limit": results.limit,
        "estimatedTotalHits": results.estimated_total_hits,
        "processingTimeMs": results.processing_time_ms,
        "facetDistribution": results.facet_distribution,
    })
}
