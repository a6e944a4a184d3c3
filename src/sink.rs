use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::row::{NoteRow, COLUMNS};

/// Single writer for the output CSV. The header goes out with the first row,
/// every row is flushed as soon as it is written, and the underlying
/// `csv::Writer` flushes once more when dropped on an error path.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
    rows: usize,
}

impl CsvSink<File> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(CsvSink::new(file))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        CsvSink {
            writer,
            header_written: false,
            rows: 0,
        }
    }

    pub fn write(&mut self, row: &NoteRow) -> Result<()> {
        if !self.header_written {
            self.writer.write_record(COLUMNS)?;
            self.header_written = true;
        }
        self.writer.write_record(&row.record())?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush CSV output: {}", e.error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(title: &str, body: &str) -> NoteRow {
        NoteRow {
            title: title.to_string(),
            created_at: "2023-06-01T21:00:00".into(),
            publish_at: String::new(),
            price: Some(100),
            can_read_all: Some(false),
            like_count: Some(1),
            share_count: None,
            url: "https://note.com/notes/n1".into(),
            kind: "TextNote".into(),
            user: "u".into(),
            user_url: "https://note.com/u".into(),
            user_note_count: Some(2),
            user_created_at: "2020-01-01T00:00:00".into(),
            hashtags: "a, b".into(),
            remarks: String::new(),
            body: [body.to_string(), String::new(), String::new(), String::new(), String::new()],
        }
    }

    #[test]
    fn no_rows_no_header() {
        let sink = CsvSink::new(Vec::new());
        assert!(sink.finish().unwrap().is_empty());
    }

    #[test]
    fn header_then_rows_with_fixed_width() {
        let mut sink = CsvSink::new(Vec::new());
        sink.write(&row("first", "line one\nline two")).unwrap();
        sink.write(&row("second, with comma", "")).unwrap();
        assert_eq!(sink.rows(), 2);
        let bytes = sink.finish().unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), COLUMNS.to_vec());

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.len() == COLUMNS.len()));
        assert_eq!(&records[0][15], "line one\nline two");
        assert_eq!(&records[1][0], "second, with comma");
        assert_eq!(&records[1][6], "");
    }

    #[test]
    fn rows_reach_disk_before_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.csv");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.write(&row("kept", "body")).unwrap();

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.starts_with("title,createdAt,publishAt"));
        assert!(on_disk.contains("kept"));
        drop(sink);
    }
}
