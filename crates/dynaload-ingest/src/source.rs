//! Record sources
//!
//! A source is a finite, read-once sequence of decoded records for one input
//! file. Any `Iterator<Item = Result<Record>> + Send` qualifies, which keeps
//! in-memory sources trivial for tests and embedding.
//!
//! Reading gzip input is blocking work; [`spawn_reader`] moves it onto the
//! blocking pool and hands records to async code through a bounded channel.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::record::Record;

/// Lazy, finite sequence of decoded records
pub trait RecordSource: Iterator<Item = Result<Record>> + Send {}

impl<T> RecordSource for T where T: Iterator<Item = Result<Record>> + Send {}

/// Newline-delimited DynamoDB JSON, one item per line
///
/// Whitespace-only lines are skipped. The first error ends the sequence.
pub struct JsonLinesSource<R> {
    path: PathBuf,
    reader: R,
    buf: String,
    line: u64,
    finished: bool,
}

/// Source over a gzip-compressed export file
pub type GzipJsonLinesSource = JsonLinesSource<BufReader<MultiGzDecoder<File>>>;

impl GzipJsonLinesSource {
    /// Open a gzip export; fails with `SourceUnavailable` if the file cannot be opened
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| IngestError::source_unavailable(path, e))?;
        debug!(path = %path.display(), "Opened export file");
        Ok(JsonLinesSource::new(path, BufReader::new(MultiGzDecoder::new(file))))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    /// Wrap an already-decompressed reader; `path` is only used in errors
    pub fn new(path: impl Into<PathBuf>, reader: R) -> Self {
        Self {
            path: path.into(),
            reader,
            buf: String::new(),
            line: 0,
            finished: false,
        }
    }

    /// Number of lines consumed so far
    pub fn lines_read(&self) -> u64 {
        self.line
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => self.finished = true,
                Ok(_) => {
                    self.line += 1;
                    let text = self.buf.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let decoded = Record::from_export_line(text, self.line);
                    self.finished = decoded.is_err();
                    return Some(decoded);
                },
                Err(e) => {
                    self.finished = true;
                    return Some(Err(IngestError::source_unavailable(self.path.clone(), e)));
                },
            }
        }
        None
    }
}

/// Drive `source` on the blocking pool, forwarding records in order
///
/// The reader stops after the first error or once the receiver is dropped.
pub fn spawn_reader<S>(source: S, capacity: usize) -> mpsc::Receiver<Result<Record>>
where
    S: RecordSource + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::task::spawn_blocking(move || {
        for next in source {
            let failed = next.is_err();
            if tx.blocking_send(next).is_err() || failed {
                break;
            }
        }
    });

    rx
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::types::AttributeValue;
    use flate2::{write::GzEncoder, Compression};
    use std::io::{Cursor, Write};

    fn line(pk: &str) -> String {
        format!(r#"{{"Item":{{"pk":{{"S":"{}"}}}}}}"#, pk)
    }

    #[test]
    fn test_reads_lines_and_skips_blank_ones() {
        let input = format!("{}\n\n   \n{}\n", line("a"), line("b"));
        let mut source = JsonLinesSource::new("mem", Cursor::new(input));

        let first = source.next().unwrap().unwrap();
        assert_eq!(first.item()["pk"], AttributeValue::S("a".to_string()));
        let second = source.next().unwrap().unwrap();
        assert_eq!(second.item()["pk"], AttributeValue::S("b".to_string()));
        assert!(source.next().is_none());
        assert_eq!(source.lines_read(), 4);
    }

    #[test]
    fn test_stops_after_first_decode_error() {
        let input = format!("{}\n{{broken\n{}\n", line("a"), line("c"));
        let mut source = JsonLinesSource::new("mem", Cursor::new(input));

        assert!(source.next().unwrap().is_ok());
        match source.next().unwrap() {
            Err(IngestError::DecodeFailed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected decode failure, got {:?}", other),
        }
        assert!(source.next().is_none());
    }

    #[test]
    fn test_open_missing_file_is_source_unavailable() {
        let err = GzipJsonLinesSource::open("/definitely/not/here.json.gz")
            .err()
            .unwrap();
        assert!(matches!(err, IngestError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_reads_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.json.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        writeln!(encoder, "{}", line("x")).unwrap();
        writeln!(encoder, "{}", line("y")).unwrap();
        encoder.finish().unwrap();

        let records: Vec<_> = GzipJsonLinesSource::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_plain_text_is_not_decompressible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.json.gz");
        std::fs::write(&path, line("x")).unwrap();

        let mut source = GzipJsonLinesSource::open(&path).unwrap();
        assert!(matches!(
            source.next(),
            Some(Err(IngestError::SourceUnavailable { .. }))
        ));
        assert!(source.next().is_none());
    }

    #[tokio::test]
    async fn test_spawn_reader_preserves_order() {
        let records: Vec<Result<Record>> = (0..50)
            .map(|i| Record::from_export_line(&line(&i.to_string()), i + 1))
            .collect();

        let mut rx = spawn_reader(records.into_iter(), 4);
        let mut seen = Vec::new();
        while let Some(next) = rx.recv().await {
            let record = next.unwrap();
            let AttributeValue::S(pk) = &record.item()["pk"] else {
                panic!("pk should be a string");
            };
            seen.push(pk.parse::<u64>().unwrap());
        }
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }
}
