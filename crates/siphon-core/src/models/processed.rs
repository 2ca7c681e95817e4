use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::UNKNOWN_SENTINEL;
use crate::hash::content_hash;

use super::IngestJob;

/// One accepted input record, ready for the idempotent upsert.
///
/// Upsert identity is the triple `(tenant_id, data_name,
/// unique_key_value)` — not the row id and not the content hash. A later
/// ingest of the same identity replaces `schema_id`, `data`,
/// `ingest_job_id` and `content_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProcessedData {
    pub tenant_id: Uuid,
    pub data_name: String,
    pub schema_id: Option<Uuid>,
    /// SHA-256 hex over the record's canonical JSON (keys sorted).
    pub content_hash: String,
    pub unique_key_value: String,
    pub data: serde_json::Value,
    pub ingest_job_id: Uuid,
}

impl ProcessedData {
    /// Build a row from a validated, normalized record.
    ///
    /// The unique key value is the record's value at `unique_field`,
    /// rendered bare (strings unquoted, scalars via their JSON
    /// rendering), or the `unknown` sentinel when the field is absent or
    /// null.
    pub fn from_record(
        record: serde_json::Value,
        job: &IngestJob,
        unique_field: Option<&str>,
    ) -> ProcessedData {
        let unique_key_value = unique_field
            .and_then(|field| record.get(field))
            .map(render_key)
            .unwrap_or_else(|| UNKNOWN_SENTINEL.to_string());

        ProcessedData {
            tenant_id: job.tenant_id,
            data_name: job
                .data_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_SENTINEL.to_string()),
            schema_id: job.schema_id,
            content_hash: content_hash(&record),
            unique_key_value,
            data: record,
            ingest_job_id: job.id,
        }
    }
}

fn render_key(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => UNKNOWN_SENTINEL.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileType, IngestJobStatus};
    use chrono::Utc;
    use serde_json::json;

    fn job() -> IngestJob {
        IngestJob {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            upload_id: Uuid::new_v4(),
            file_name: Some("orders.csv".to_string()),
            file_type: FileType::Csv,
            data_name: Some("orders".to_string()),
            schema_id: Some(Uuid::new_v4()),
            file_path: Some("raw/orders.csv".to_string()),
            content_sha256: None,
            status: IngestJobStatus::Processing,
            size_bytes: Some(42),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unique_key_renders_bare_scalars() {
        let job = job();
        let row = ProcessedData::from_record(json!({"id": 1, "name": "a"}), &job, Some("id"));
        assert_eq!(row.unique_key_value, "1");

        let row = ProcessedData::from_record(json!({"id": "u-7"}), &job, Some("id"));
        assert_eq!(row.unique_key_value, "u-7");
    }

    #[test]
    fn missing_unique_key_uses_sentinel() {
        let job = job();
        let row = ProcessedData::from_record(json!({"name": "a"}), &job, Some("id"));
        assert_eq!(row.unique_key_value, "unknown");

        let row = ProcessedData::from_record(json!({"id": null}), &job, Some("id"));
        assert_eq!(row.unique_key_value, "unknown");

        let row = ProcessedData::from_record(json!({"id": 3}), &job, None);
        assert_eq!(row.unique_key_value, "unknown");
    }

    #[test]
    fn content_hash_ignores_key_order() {
        let job = job();
        let a = ProcessedData::from_record(json!({"a": 1, "b": 2}), &job, None);
        let b = ProcessedData::from_record(json!({"b": 2, "a": 1}), &job, None);
        assert_eq!(a.content_hash, b.content_hash);
    }
}
