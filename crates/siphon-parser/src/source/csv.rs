use anyhow::{Context, Result};
use async_trait::async_trait;
use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord, Trim};
use serde_json::{Map, Number, Value};
use tokio::io::AsyncRead;

use super::RecordSource;

/// Streams CSV rows as JSON objects keyed by the header row.
///
/// Rows are trimmed, the column count is relaxed (short rows omit the
/// trailing fields, long rows drop the extras), and scalar values are
/// inferred by content: booleans and numbers become typed JSON values,
/// everything else stays a string. Unreadable rows are skipped with a
/// warning.
pub struct CsvSource<R: AsyncRead + Unpin + Send> {
    reader: AsyncReader<R>,
    headers: Vec<String>,
    row: StringRecord,
    line: u64,
}

impl<R: AsyncRead + Unpin + Send> CsvSource<R> {
    pub async fn new(input: R, delimiter: u8) -> Result<Self> {
        let mut reader = AsyncReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(Trim::All)
            .create_reader(input);

        let headers = reader
            .headers()
            .await
            .context("reading CSV header row")?
            .iter()
            // A UTF-8 BOM arrives glued to the first header name.
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        Ok(CsvSource {
            reader,
            headers,
            row: StringRecord::new(),
            line: 1,
        })
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> RecordSource for CsvSource<R> {
    async fn next_record(&mut self) -> Result<Option<Value>> {
        loop {
            self.line += 1;
            match self.reader.read_record(&mut self.row).await {
                Ok(false) => return Ok(None),
                Ok(true) => {
                    if self.row.iter().all(str::is_empty) {
                        continue;
                    }
                    let mut object = Map::with_capacity(self.headers.len());
                    for (header, field) in self.headers.iter().zip(self.row.iter()) {
                        object.insert(header.clone(), infer_scalar(field));
                    }
                    return Ok(Some(Value::Object(object)));
                }
                Err(e) => {
                    tracing::warn!(line = self.line, error = %e, "Skipping unreadable CSV row");
                }
            }
        }
    }
}

/// Content-based scalar inference, matching what a cast-enabled CSV
/// parser produces.
fn infer_scalar(field: &str) -> Value {
    if field.is_empty() {
        return Value::String(String::new());
    }
    match field {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = field.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = field.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn collect(input: &str, delimiter: u8) -> Vec<Value> {
        let mut source = CsvSource::new(input.as_bytes(), delimiter).await.unwrap();
        let mut records = Vec::new();
        while let Some(record) = source.next_record().await.unwrap() {
            records.push(record);
        }
        records
    }

    #[tokio::test]
    async fn parses_rows_with_scalar_inference() {
        let records = collect("id,name,active,score\n1,a,true,1.5\n2,b,false,\n", b',').await;
        assert_eq!(
            records,
            vec![
                json!({"id": 1, "name": "a", "active": true, "score": 1.5}),
                json!({"id": 2, "name": "b", "active": false, "score": ""}),
            ]
        );
    }

    #[tokio::test]
    async fn strips_utf8_bom_from_first_header() {
        let records = collect("\u{feff}id,name\n1,a\n", b',').await;
        assert_eq!(records, vec![json!({"id": 1, "name": "a"})]);
    }

    #[tokio::test]
    async fn relaxed_column_count() {
        let records = collect("id,name\n1\n2,b,extra\n", b',').await;
        assert_eq!(records[0], json!({"id": 1}));
        assert_eq!(records[1], json!({"id": 2, "name": "b"}));
    }

    #[tokio::test]
    async fn trims_fields_and_honors_delimiter() {
        let records = collect("id; name\n 1 ; padded value \n", b';').await;
        assert_eq!(records, vec![json!({"id": 1, "name": "padded value"})]);
    }

    #[tokio::test]
    async fn empty_file_yields_nothing() {
        assert!(collect("", b',').await.is_empty());
        assert!(collect("id,name\n", b',').await.is_empty());
    }
}
