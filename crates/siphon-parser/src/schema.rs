use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use siphon_core::{DataSchema, IngestError};

/// Temporal formats the normalizer rewrites to their canonical rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemporalFormat {
    Date,
    DateTime,
}

/// A tenant schema compiled once per job.
///
/// Undeclared properties are rejected: when the document does not set
/// `additionalProperties` itself, it is compiled with
/// `additionalProperties: false`. The `x-unique` and `x-trim` vendor
/// extensions come along from the stored document.
pub struct CompiledSchema {
    validator: jsonschema::Validator,
    unique_field: Option<String>,
    trim_strings: bool,
    temporal_fields: HashMap<String, TemporalFormat>,
}

impl CompiledSchema {
    pub fn compile(schema: &DataSchema) -> Result<CompiledSchema, IngestError> {
        let mut document = schema.document.clone();
        if let Some(object) = document.as_object_mut() {
            object
                .entry("additionalProperties")
                .or_insert(Value::Bool(false));
        }

        let validator = jsonschema::validator_for(&document)
            .map_err(|e| IngestError::SchemaCompile(e.to_string()))?;

        Ok(CompiledSchema {
            validator,
            unique_field: schema.unique_field().map(str::to_string),
            trim_strings: document
                .get("x-trim")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            temporal_fields: temporal_fields(&document),
        })
    }

    pub fn unique_field(&self) -> Option<&str> {
        self.unique_field.as_deref()
    }

    /// Normalize a record in place, then validate it.
    ///
    /// Normalization is best effort: strings are trimmed when the schema
    /// opts in, and `date`/`date-time` properties are rewritten to their
    /// canonical rendering when they parse. Values that do not parse are
    /// left for validation to judge.
    pub fn check(&self, record: &mut Value) -> Result<(), String> {
        self.normalize(record);
        self.validator
            .validate(record)
            .map_err(|e| format!("{} at {}", e, e.instance_path))
    }

    fn normalize(&self, record: &mut Value) {
        let Some(object) = record.as_object_mut() else {
            return;
        };
        for (field, value) in object.iter_mut() {
            let Value::String(text) = value else { continue };
            if self.trim_strings {
                let trimmed = text.trim();
                if trimmed.len() != text.len() {
                    *text = trimmed.to_string();
                }
            }
            if let Some(format) = self.temporal_fields.get(field) {
                if let Some(canonical) = normalize_temporal(text, *format) {
                    *text = canonical;
                }
            }
        }
    }
}

fn temporal_fields(document: &Value) -> HashMap<String, TemporalFormat> {
    let mut fields = HashMap::new();
    let Some(properties) = document.get("properties").and_then(Value::as_object) else {
        return fields;
    };
    for (name, spec) in properties {
        match spec.get("format").and_then(Value::as_str) {
            Some("date") => {
                fields.insert(name.clone(), TemporalFormat::Date);
            }
            Some("date-time") => {
                fields.insert(name.clone(), TemporalFormat::DateTime);
            }
            _ => {}
        }
    }
    fields
}

fn normalize_temporal(text: &str, format: TemporalFormat) -> Option<String> {
    match format {
        TemporalFormat::Date => {
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(text, "%Y/%m/%d"))
                .ok()?;
            Some(date.format("%Y-%m-%d").to_string())
        }
        TemporalFormat::DateTime => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(parsed.with_timezone(&Utc).to_rfc3339());
            }
            let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").ok()?;
            Some(naive.and_utc().to_rfc3339())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use siphon_core::FileType;
    use uuid::Uuid;

    fn schema(document: Value) -> DataSchema {
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

    fn orders_schema() -> DataSchema {
        schema(json!({
            "type": "object",
            "x-unique": "id",
            "properties": {
                "id": {"type": ["string", "integer"]},
                "name": {"type": "string"}
            },
            "required": ["id"]
        }))
    }

    #[test]
    fn accepts_conforming_record() {
        let compiled = CompiledSchema::compile(&orders_schema()).unwrap();
        let mut record = json!({"id": "1", "name": "a"});
        assert!(compiled.check(&mut record).is_ok());
        assert_eq!(compiled.unique_field(), Some("id"));
    }

    #[test]
    fn rejects_missing_required_field() {
        let compiled = CompiledSchema::compile(&orders_schema()).unwrap();
        let mut record = json!({"name": "a"});
        assert!(compiled.check(&mut record).is_err());
    }

    #[test]
    fn rejects_undeclared_properties_by_default() {
        let compiled = CompiledSchema::compile(&orders_schema()).unwrap();
        let mut record = json!({"id": "1", "rogue": true});
        assert!(compiled.check(&mut record).is_err());
    }

    #[test]
    fn explicit_additional_properties_wins() {
        let compiled = CompiledSchema::compile(&schema(json!({
            "type": "object",
            "additionalProperties": true,
            "properties": {"id": {"type": "string"}}
        })))
        .unwrap();
        let mut record = json!({"id": "1", "extra": 2});
        assert!(compiled.check(&mut record).is_ok());
    }

    #[test]
    fn trims_strings_when_opted_in() {
        let compiled = CompiledSchema::compile(&schema(json!({
            "type": "object",
            "x-trim": true,
            "properties": {"name": {"type": "string"}}
        })))
        .unwrap();
        let mut record = json!({"name": "  padded  "});
        compiled.check(&mut record).unwrap();
        assert_eq!(record["name"], "padded");
    }

    #[test]
    fn normalizes_date_fields() {
        let compiled = CompiledSchema::compile(&schema(json!({
            "type": "object",
            "properties": {"day": {"type": "string", "format": "date"}}
        })))
        .unwrap();
        let mut record = json!({"day": "2024/03/05"});
        compiled.check(&mut record).unwrap();
        assert_eq!(record["day"], "2024-03-05");
    }

    #[test]
    fn invalid_document_fails_compilation() {
        let result = CompiledSchema::compile(&schema(json!({"type": "nonsense"})));
        assert!(matches!(result, Err(IngestError::SchemaCompile(_))));
    }
}
