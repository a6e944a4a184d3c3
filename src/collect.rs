use std::io::Write;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::api::types::{NotesPage, OrderMode};
use crate::api::NoteSource;
use crate::row::build_row;
use crate::sink::CsvSink;

/// Pagination state: keep fetching until the listing says it was the last page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Fetching { page: u32 },
    Done,
}

impl Cursor {
    pub fn start() -> Self {
        Cursor::Fetching { page: 1 }
    }

    /// Next state after `listing` has been processed.
    pub fn advance(listing: &NotesPage) -> Result<Self> {
        if listing.is_last_page {
            return Ok(Cursor::Done);
        }
        match listing.next_page {
            Some(page) => Ok(Cursor::Fetching { page }),
            None => bail!("listing is not the last page but has no next_page"),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub pages: usize,
    pub notes: usize,
    pub with_remarks: usize,
}

/// What to collect and how to render its URLs.
pub struct Job<'a> {
    pub hashtag: &'a str,
    pub order: OrderMode,
    pub site_base: &'a str,
}

/// Walk every listing page for the hashtag, fetch each note and append its row.
/// Any fetch or decode failure aborts the walk; rows already written stay in the sink.
pub async fn collect<S, W>(source: &S, job: &Job<'_>, sink: &mut CsvSink<W>) -> Result<CollectStats>
where
    S: NoteSource,
    W: Write,
{
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut stats = CollectStats::default();
    let mut seen: u64 = 0;
    let mut cursor = Cursor::start();

    while let Cursor::Fetching { page } = cursor {
        let listing = source
            .notes_page(job.hashtag, job.order, page)
            .await
            .with_context(|| format!("Failed to fetch page {} of #{}", page, job.hashtag))?;
        stats.pages += 1;
        seen += listing.notes.len() as u64;
        pb.set_length(listing.count.max(seen));
        info!(page, seen, total = listing.count, "Fetched listing page");

        for summary in &listing.notes {
            let note = source
                .note(&summary.key)
                .await
                .with_context(|| format!("Failed to fetch note {}", summary.key))?;
            let row = build_row(summary, &note, job.site_base);
            if !row.remarks.is_empty() {
                stats.with_remarks += 1;
            }
            sink.write(&row)?;
            stats.notes += 1;
            pb.inc(1);
        }

        cursor = Cursor::advance(&listing)?;
    }

    pb.finish_and_clear();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::NoteDetail;
    use crate::api::{unwrap_data, FetchError};
    use crate::row::COLUMNS;
    use serde_json::Value;
    use std::cell::RefCell;
    use std::collections::HashMap;

    fn fixture(name: &str) -> Value {
        let raw = std::fs::read_to_string(format!("tests/fixtures/{}.json", name)).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    /// Serves listing pages and notes from JSON fixtures, recording each request.
    #[derive(Default)]
    struct FixtureSource {
        pages: HashMap<u32, Value>,
        notes: HashMap<String, Value>,
        requests: RefCell<Vec<String>>,
    }

    impl FixtureSource {
        fn with_page(mut self, page: u32, name: &str) -> Self {
            self.pages.insert(page, fixture(name));
            self
        }

        fn with_note(mut self, key: &str, name: &str) -> Self {
            self.notes.insert(key.to_string(), fixture(name));
            self
        }
    }

    impl NoteSource for FixtureSource {
        async fn notes_page(
            &self,
            hashtag: &str,
            order: OrderMode,
            page: u32,
        ) -> Result<NotesPage, FetchError> {
            self.requests
                .borrow_mut()
                .push(format!("{}:{}:{}", hashtag, order.as_str(), page));
            let value = self.pages.get(&page).cloned().unwrap_or(Value::Null);
            unwrap_data("v3/hashtags/notes", value)
        }

        async fn note(&self, key: &str) -> Result<NoteDetail, FetchError> {
            self.requests.borrow_mut().push(format!("note:{}", key));
            let value = self.notes.get(key).cloned().unwrap_or(Value::Null);
            unwrap_data("v3/notes", value)
        }
    }

    fn job(order: OrderMode) -> Job<'static> {
        Job {
            hashtag: "rust",
            order,
            site_base: "https://note.com",
        }
    }

    fn read_rows(bytes: &[u8]) -> Vec<HashMap<String, String>> {
        let mut reader = csv::Reader::from_reader(bytes);
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), COLUMNS.to_vec());
        reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                headers
                    .iter()
                    .zip(r.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn cursor_transitions() {
        let last: NotesPage = serde_json::from_value(serde_json::json!({
            "notes": [], "count": 0, "is_last_page": true, "next_page": null
        }))
        .unwrap();
        assert_eq!(Cursor::advance(&last).unwrap(), Cursor::Done);

        let more: NotesPage = serde_json::from_value(serde_json::json!({
            "notes": [], "count": 40, "is_last_page": false, "next_page": 3
        }))
        .unwrap();
        assert_eq!(Cursor::advance(&more).unwrap(), Cursor::Fetching { page: 3 });

        let broken: NotesPage = serde_json::from_value(serde_json::json!({
            "notes": [], "count": 40, "is_last_page": false, "next_page": null
        }))
        .unwrap();
        assert!(Cursor::advance(&broken).is_err());
        assert_eq!(Cursor::start(), Cursor::Fetching { page: 1 });
    }

    #[tokio::test]
    async fn single_text_note() {
        let source = FixtureSource::default()
            .with_page(1, "page_single")
            .with_note("n0text", "note_text");
        let mut sink = CsvSink::new(Vec::new());

        let stats = collect(&source, &job(OrderMode::Popular), &mut sink).await.unwrap();
        assert_eq!(
            stats,
            CollectStats {
                pages: 1,
                notes: 1,
                with_remarks: 0
            }
        );

        let rows = read_rows(&sink.finish().unwrap());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["body1"], "hello");
        for col in ["body2", "body3", "body4", "body5"] {
            assert_eq!(row[col], "");
        }
        assert_eq!(row["remarks"], "");
        assert_eq!(row["type"], "TextNote");
        assert_eq!(row["canReadAll"], "true");
        assert_eq!(row["createdAt"], "2023-06-01T21:00:00");
        assert_eq!(row["hashtags"], "rust, example");
    }

    #[tokio::test]
    async fn follows_next_page_in_order() {
        let source = FixtureSource::default()
            .with_page(1, "page_first")
            .with_page(2, "page_last")
            .with_note("n0text", "note_text")
            .with_note("n1image", "note_image")
            .with_note("n2movie", "note_movie");
        let mut sink = CsvSink::new(Vec::new());

        let stats = collect(&source, &job(OrderMode::New), &mut sink).await.unwrap();
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.notes, 3);
        assert_eq!(stats.with_remarks, 1);

        assert_eq!(
            *source.requests.borrow(),
            vec![
                "rust:new:1",
                "note:n0text",
                "note:n1image",
                "rust:new:2",
                "note:n2movie",
            ]
        );

        let rows = read_rows(&sink.finish().unwrap());
        let urls: Vec<&str> = rows.iter().map(|r| r["url"].as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://note.com/notes/n0text",
                "https://note.com/notes/n1image",
                "https://note.com/notes/n2movie",
            ]
        );
        assert_eq!(rows[1]["body1"], "sunrise\n\nharbour");
        assert_eq!(rows[2]["body1"], "");
        assert_eq!(rows[2]["remarks"], "Unsupported note type: LiveNote, Empty body: LiveNote");
    }

    #[tokio::test]
    async fn failure_keeps_earlier_rows() {
        let source = FixtureSource::default()
            .with_page(1, "page_first")
            .with_note("n0text", "note_text");
        let mut sink = CsvSink::new(Vec::new());

        let err = collect(&source, &job(OrderMode::Popular), &mut sink)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("n1image"));
        assert_eq!(sink.rows(), 1);
        assert_eq!(read_rows(&sink.finish().unwrap()).len(), 1);
    }

    #[tokio::test]
    async fn empty_listing_writes_nothing() {
        let source = FixtureSource::default().with_page(1, "page_empty");
        let mut sink = CsvSink::new(Vec::new());
        let stats = collect(&source, &job(OrderMode::Popular), &mut sink).await.unwrap();
        assert_eq!(stats, CollectStats { pages: 1, ..Default::default() });
        assert!(sink.finish().unwrap().is_empty());
    }
}
