use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FileType;

/// Vendor extension naming the unique-key field of a schema.
pub const UNIQUE_FIELD_KEY: &str = "x-unique";

/// A tenant-defined JSON Schema, immutable per version.
///
/// The `document` is a standard JSON Schema plus the `x-unique` vendor
/// extension naming the top-level property used as natural key for
/// upserts. Compilation happens in the parser service, once per job.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DataSchema {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// The JSON Schema document itself.
    pub document: serde_json::Value,
    pub file_type: FileType,
    /// CSV field delimiter; ignored for JSON/NDJSON schemas.
    pub delimiter: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataSchema {
    /// The schema-declared unique key field, if any.
    pub fn unique_field(&self) -> Option<&str> {
        self.document.get(UNIQUE_FIELD_KEY).and_then(|v| v.as_str())
    }

    /// CSV delimiter as a single byte; falls back to `,` when the stored
    /// delimiter is empty or multi-byte.
    pub fn delimiter_byte(&self) -> u8 {
        match self.delimiter.as_bytes() {
            [b] => *b,
            _ => b',',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(document: serde_json::Value) -> DataSchema {
        DataSchema {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "orders".to_string(),
            description: None,
            document,
            file_type: FileType::Csv,
            delimiter: ",".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unique_field_reads_vendor_extension() {
        let s = schema(json!({"type": "object", "x-unique": "id"}));
        assert_eq!(s.unique_field(), Some("id"));

        let s = schema(json!({"type": "object"}));
        assert_eq!(s.unique_field(), None);
    }

    #[test]
    fn delimiter_falls_back_to_comma() {
        let mut s = schema(json!({}));
        s.delimiter = ";".to_string();
        assert_eq!(s.delimiter_byte(), b';');
        s.delimiter = String::new();
        assert_eq!(s.delimiter_byte(), b',');
    }
}
