//! Content sniffing for uploaded files.
//!
//! The completion handler compares the declared file type of a job
//! against what the uploaded bytes actually look like. Detection is
//! extension-first, then content heuristics over a bounded prefix of the
//! object.

use serde_json::Value;

use crate::constants::SNIFF_PREFIX_BYTES;
use crate::models::FileType;

/// Result of sniffing an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedFileType {
    pub file_type: FileType,
    pub mime: &'static str,
}

/// Detect the file type from the object's filename and a content prefix.
///
/// `prefix` should be the first [`SNIFF_PREFIX_BYTES`] of the object (a
/// longer slice is truncated). Returns `None` for unsupported content.
pub fn detect_file_type(prefix: &[u8], filename: &str) -> Option<DetectedFileType> {
    let prefix = &prefix[..prefix.len().min(SNIFF_PREFIX_BYTES)];
    let truncated = prefix.len() == SNIFF_PREFIX_BYTES;
    let content = String::from_utf8_lossy(prefix);

    let ext = filename
        .rsplit('.')
        .next()
        .filter(|e| *e != filename)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let detected = if ext == "csv" || is_csv_content(&content) {
        FileType::Csv
    } else if ext == "json" || is_json_content(&content) {
        FileType::Json
    } else if ext == "ndjson" || ext == "jsonl" || is_ndjson_content(&content, truncated) {
        FileType::Ndjson
    } else {
        return None;
    };

    Some(DetectedFileType {
        file_type: detected,
        mime: detected.mime(),
    })
}

/// First line is not JSON and carries a delimiter.
fn is_csv_content(content: &str) -> bool {
    let first_line = match content.trim().lines().next() {
        Some(line) => line.trim(),
        None => return false,
    };

    if serde_json::from_str::<Value>(first_line).is_ok() {
        return false;
    }
    if first_line.starts_with('{') || first_line.starts_with('[') {
        return false;
    }

    first_line.contains(',') || first_line.contains(';')
}

/// The whole prefix parses as a single JSON document.
fn is_json_content(content: &str) -> bool {
    let trimmed = content.trim();
    (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<Value>(trimmed).is_ok()
}

/// Multi-line input whose first few non-blank lines each parse as JSON.
/// A line cut off by the prefix boundary is ignored rather than failing
/// the check.
fn is_ndjson_content(content: &str, truncated: bool) -> bool {
    let mut lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    if truncated && !content.ends_with('\n') {
        lines.pop();
    }
    if lines.is_empty() {
        return false;
    }

    let multi_line = lines.len() > 1 || content.contains('\n');
    multi_line
        && lines
            .iter()
            .take(3)
            .all(|line| serde_json::from_str::<Value>(line).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_by_content() {
        let detected = detect_file_type(b"id,name\n1,John\n", "upload.dat").unwrap();
        assert_eq!(detected.file_type, FileType::Csv);
        assert_eq!(detected.mime, "text/csv");
    }

    #[test]
    fn csv_extension_wins() {
        let detected = detect_file_type(b"one-column\n1\n2\n", "data.csv").unwrap();
        assert_eq!(detected.file_type, FileType::Csv);
    }

    #[test]
    fn json_array_by_content() {
        let detected = detect_file_type(br#"[{"id": 1}, {"id": 2}]"#, "blob").unwrap();
        assert_eq!(detected.file_type, FileType::Json);
    }

    #[test]
    fn ndjson_by_content() {
        let detected = detect_file_type(b"{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n", "blob").unwrap();
        assert_eq!(detected.file_type, FileType::Ndjson);
    }

    #[test]
    fn single_json_object_is_json_not_ndjson() {
        let detected = detect_file_type(br#"{"id": 1}"#, "blob").unwrap();
        assert_eq!(detected.file_type, FileType::Json);
    }

    #[test]
    fn unsupported_content() {
        assert!(detect_file_type(b"plain text without delimiters", "notes.txt").is_none());
        assert!(detect_file_type(b"", "empty").is_none());
    }

    #[test]
    fn declared_json_actual_csv_detects_csv() {
        // The mismatch the completion handler must catch.
        let detected = detect_file_type(b"id,name\n1,John Doe\n", "upload").unwrap();
        assert_ne!(detected.file_type, FileType::Json);
    }
}
