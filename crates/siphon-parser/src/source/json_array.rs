use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::RecordSource;

const READ_CHUNK: usize = 8 * 1024;

/// Streams the elements of a top-level JSON array.
///
/// The document is split element by element with a small bracket/string
/// state machine, so only one element is buffered at a time. Anything
/// other than a well-formed array is a structural error that aborts the
/// job — unlike NDJSON there is no line boundary to resync on.
pub struct JsonArraySource<R: AsyncRead + Unpin + Send> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    started: bool,
    finished: bool,
    eof: bool,
}

impl<R: AsyncRead + Unpin + Send> JsonArraySource<R> {
    pub fn new(reader: R) -> Self {
        JsonArraySource {
            reader,
            buf: Vec::with_capacity(READ_CHUNK),
            pos: 0,
            started: false,
            finished: false,
            eof: false,
        }
    }

    async fn fill(&mut self) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        let mut chunk = vec![0u8; READ_CHUNK];
        let n = self
            .reader
            .read(&mut chunk)
            .await
            .context("reading JSON document")?;
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(true)
    }

    /// Next non-whitespace byte at the cursor, filling as needed.
    async fn peek_nonws(&mut self) -> Result<Option<u8>> {
        loop {
            while self.pos < self.buf.len() {
                let b = self.buf[self.pos];
                if b.is_ascii_whitespace() {
                    self.pos += 1;
                } else {
                    return Ok(Some(b));
                }
            }
            if !self.fill().await? {
                return Ok(None);
            }
        }
    }

    /// Scan one balanced value starting at the cursor (which the caller
    /// has positioned on a non-whitespace byte) and parse it.
    async fn scan_value(&mut self) -> Result<Value> {
        // Drop consumed bytes so element offsets stay small.
        self.buf.drain(..self.pos);
        self.pos = 0;

        let first = self.buf[0];
        let is_string = first == b'"';
        let is_container = first == b'{' || first == b'[';

        let mut i = 0;
        let mut depth: u32 = 0;
        let mut in_string = false;
        let mut escaped = false;

        loop {
            while i < self.buf.len() {
                let b = self.buf[i];
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if b == b'\\' {
                        escaped = true;
                    } else if b == b'"' {
                        in_string = false;
                        if is_string && depth == 0 {
                            return self.take(i + 1);
                        }
                    }
                } else {
                    match b {
                        b'"' => in_string = true,
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => {
                            if depth == 0 {
                                // The outer array's closing bracket
                                // terminates a bare scalar; leave it for
                                // the caller.
                                return self.take(i);
                            }
                            depth -= 1;
                            if depth == 0 && is_container {
                                return self.take(i + 1);
                            }
                        }
                        b',' | b' ' | b'\t' | b'\r' | b'\n'
                            if depth == 0 && !is_container && !is_string =>
                        {
                            return self.take(i);
                        }
                        _ => {}
                    }
                }
                i += 1;
            }
            if !self.fill().await? {
                bail!("unexpected end of JSON array document");
            }
        }
    }

    fn take(&mut self, end: usize) -> Result<Value> {
        let value =
            serde_json::from_slice(&self.buf[..end]).context("parsing JSON array element")?;
        self.pos = end;
        Ok(value)
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> RecordSource for JsonArraySource<R> {
    async fn next_record(&mut self) -> Result<Option<Value>> {
        if self.finished {
            return Ok(None);
        }
        if !self.started {
            match self.peek_nonws().await? {
                Some(b'[') => {
                    self.pos += 1;
                    self.started = true;
                }
                Some(other) => bail!("expected a JSON array, found {:?}", other as char),
                None => bail!("empty JSON document"),
            }
        }

        loop {
            match self.peek_nonws().await? {
                Some(b']') => {
                    self.pos += 1;
                    self.finished = true;
                    return Ok(None);
                }
                Some(b',') => self.pos += 1,
                Some(_) => break,
                None => bail!("unexpected end of JSON array document"),
            }
        }

        Ok(Some(self.scan_value().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn collect(input: &str) -> Result<Vec<Value>> {
        let mut source = JsonArraySource::new(input.as_bytes());
        let mut records = Vec::new();
        while let Some(record) = source.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }

    #[tokio::test]
    async fn splits_array_of_objects() {
        let records = collect(r#"[{"id": 1}, {"id": 2, "tags": ["a", "b"]}]"#)
            .await
            .unwrap();
        assert_eq!(
            records,
            vec![json!({"id": 1}), json!({"id": 2, "tags": ["a", "b"]})]
        );
    }

    #[tokio::test]
    async fn brackets_inside_strings_do_not_confuse_the_splitter() {
        let records = collect(r#"[{"note": "a ] tricky \" one, right?"}, {"id": 2}]"#)
            .await
            .unwrap();
        assert_eq!(records[0]["note"], "a ] tricky \" one, right?");
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn handles_scalars_and_whitespace() {
        let records = collect("[ 1 ,\n \"two\", true , null ]").await.unwrap();
        assert_eq!(records, vec![json!(1), json!("two"), json!(true), json!(null)]);
    }

    #[tokio::test]
    async fn empty_array_yields_nothing() {
        assert!(collect("[]").await.unwrap().is_empty());
        assert!(collect("  [ ]  ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_array_document_is_an_error() {
        assert!(collect(r#"{"id": 1}"#).await.is_err());
        assert!(collect("").await.is_err());
    }

    #[tokio::test]
    async fn truncated_document_is_an_error() {
        assert!(collect(r#"[{"id": 1}, {"id"#).await.is_err());
    }
}
