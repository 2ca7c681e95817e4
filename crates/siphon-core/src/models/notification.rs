use percent_encoding::percent_decode_str;
use serde::Deserialize;

use crate::error::IngestError;

/// One object-created record extracted from a storage notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub bucket: String,
    /// Decoded object key (`+` as space, percent-escapes resolved).
    pub key: String,
    pub size_bytes: Option<i64>,
    pub version_id: Option<String>,
}

/// An S3 "object created" notification, possibly wrapped in an SNS
/// envelope whose `Message` field carries the inner JSON as a string.
#[derive(Debug, Deserialize)]
pub struct UploadNotification {
    #[serde(rename = "Records")]
    records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
    size: Option<i64>,
    #[serde(rename = "versionId")]
    version_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnsEnvelope {
    #[serde(rename = "Message")]
    message: String,
}

impl UploadNotification {
    /// Parse a raw queue message body into its first object record.
    ///
    /// Bodies arrive either as the bare S3 event or wrapped in an SNS
    /// envelope; both shapes are accepted.
    pub fn parse(body: &str) -> Result<ObjectRecord, IngestError> {
        let notification: UploadNotification = match serde_json::from_str(body) {
            Ok(n) => n,
            Err(_) => {
                let envelope: SnsEnvelope = serde_json::from_str(body).map_err(|e| {
                    IngestError::MalformedNotification(format!("not an S3 event: {e}"))
                })?;
                serde_json::from_str(&envelope.message).map_err(|e| {
                    IngestError::MalformedNotification(format!("bad SNS inner message: {e}"))
                })?
            }
        };

        let record = notification
            .records
            .into_iter()
            .next()
            .ok_or_else(|| IngestError::MalformedNotification("empty Records".to_string()))?;

        Ok(ObjectRecord {
            bucket: record.s3.bucket.name,
            key: decode_key(&record.s3.object.key),
            size_bytes: record.s3.object.size,
            version_id: record.s3.object.version_id,
        })
    }
}

/// S3 notification keys are URL-encoded with `+` for spaces.
fn decode_key(raw: &str) -> String {
    let plus_as_space = raw.replace('+', " ");
    percent_decode_str(&plus_as_space)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or(plus_as_space)
}
