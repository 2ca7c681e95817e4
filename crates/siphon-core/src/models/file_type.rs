use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared upload format of an ingest job and its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "file_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Json,
    Ndjson,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Json => "json",
            FileType::Ndjson => "ndjson",
        }
    }

    /// MIME type used in upload metadata and sniff results.
    pub fn mime(&self) -> &'static str {
        match self {
            FileType::Csv => "text/csv",
            FileType::Json => "application/json",
            FileType::Ndjson => "application/x-ndjson",
        }
    }

    pub fn parse(s: &str) -> Option<FileType> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Some(FileType::Csv),
            "json" => Some(FileType::Json),
            "ndjson" | "jsonl" => Some(FileType::Ndjson),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_types() {
        assert_eq!(FileType::parse("csv"), Some(FileType::Csv));
        assert_eq!(FileType::parse("NDJSON"), Some(FileType::Ndjson));
        assert_eq!(FileType::parse("jsonl"), Some(FileType::Ndjson));
        assert_eq!(FileType::parse("parquet"), None);
    }

    #[test]
    fn serde_is_lowercase() {
        let s = serde_json::to_string(&FileType::Ndjson).unwrap();
        assert_eq!(s, "\"ndjson\"");
    }
}
