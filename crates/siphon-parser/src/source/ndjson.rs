use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

use super::RecordSource;

/// Streams newline-delimited JSON, one record per line.
///
/// Blank lines are ignored; lines that do not parse are logged and
/// skipped, so one broken line never sinks the rest of the file.
pub struct NdjsonSource<R: AsyncRead + Unpin + Send> {
    lines: Lines<BufReader<R>>,
    line: u64,
}

impl<R: AsyncRead + Unpin + Send> NdjsonSource<R> {
    pub fn new(input: R) -> Self {
        NdjsonSource {
            lines: BufReader::new(input).lines(),
            line: 0,
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> RecordSource for NdjsonSource<R> {
    async fn next_record(&mut self) -> Result<Option<Value>> {
        loop {
            self.line += 1;
            let Some(line) = self
                .lines
                .next_line()
                .await
                .context("reading NDJSON line")?
            else {
                return Ok(None);
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str(trimmed) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => {
                    tracing::warn!(line = self.line, error = %e, "Skipping malformed NDJSON line");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn collect(input: &str) -> Vec<Value> {
        let mut source = NdjsonSource::new(input.as_bytes());
        let mut records = Vec::new();
        while let Some(record) = source.next_record().await.unwrap() {
            records.push(record);
        }
        records
    }

    #[tokio::test]
    async fn parses_one_record_per_line() {
        let records = collect("{\"id\": 1}\n{\"id\": 2}\n").await;
        assert_eq!(records, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[tokio::test]
    async fn skips_blank_and_malformed_lines() {
        let records = collect("{\"id\": 1}\n\nnot json\n{\"id\": 2}\n").await;
        assert_eq!(records, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[tokio::test]
    async fn handles_missing_trailing_newline() {
        let records = collect("{\"id\": 1}").await;
        assert_eq!(records, vec![json!({"id": 1})]);
    }
}
