pub mod body;
pub mod html;

use tracing::warn;

use crate::api::types::{NoteDetail, NoteKind, NoteSummary};
use crate::utils::{strip_hashtag_marker, to_tokyo_local};
use body::{BodyCells, BODY_COLUMNS};

/// Header of the output file, in column order.
pub const COLUMNS: [&str; 15 + BODY_COLUMNS] = [
    "title",
    "createdAt",
    "publishAt",
    "price",
    "canReadAll",
    "likeCount",
    "shareCount",
    "url",
    "type",
    "user",
    "userUrl",
    "userNoteCount",
    "userCreatedAt",
    "hashtags",
    "remarks",
    "body1",
    "body2",
    "body3",
    "body4",
    "body5",
];

/// One flattened note, ready for the CSV sink.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteRow {
    pub title: String,
    pub created_at: String,
    pub publish_at: String,
    pub price: Option<u64>,
    pub can_read_all: Option<bool>,
    pub like_count: Option<u64>,
    pub share_count: Option<u64>,
    pub url: String,
    pub kind: String,
    pub user: String,
    pub user_url: String,
    pub user_note_count: Option<u64>,
    pub user_created_at: String,
    pub hashtags: String,
    pub remarks: String,
    pub body: [String; BODY_COLUMNS],
}

impl NoteRow {
    /// Cell values in [`COLUMNS`] order.
    pub fn record(&self) -> Vec<String> {
        let mut cells = vec![
            self.title.clone(),
            self.created_at.clone(),
            self.publish_at.clone(),
            cell(self.price),
            cell(self.can_read_all),
            cell(self.like_count),
            cell(self.share_count),
            self.url.clone(),
            self.kind.clone(),
            self.user.clone(),
            self.user_url.clone(),
            cell(self.user_note_count),
            self.user_created_at.clone(),
            self.hashtags.clone(),
            self.remarks.clone(),
        ];
        cells.extend(self.body.iter().cloned());
        cells
    }
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Non-fatal anomalies found while flattening one note.
#[derive(Debug)]
struct Remarks<'a> {
    key: &'a str,
    items: Vec<String>,
}

impl<'a> Remarks<'a> {
    fn new(key: &'a str) -> Self {
        Remarks {
            key,
            items: Vec::new(),
        }
    }

    fn add(&mut self, message: String) {
        warn!(note = self.key, "{}", message);
        self.items.push(message);
    }

    fn joined(&self) -> String {
        self.items.join(", ")
    }
}

/// Flatten a note into a row. `summary` supplies the full-read flag, which
/// only the listing carries.
pub fn build_row(summary: &NoteSummary, note: &NoteDetail, site_base: &str) -> NoteRow {
    let mut remarks = Remarks::new(&note.key);

    if let NoteKind::Unknown(tag) = &note.kind {
        remarks.add(format!("Unsupported note type: {}", tag));
    }
    if note.is_r18_confirmation_needed {
        remarks.add("R-18 note (body unavailable)".to_string());
    }

    let text = body::derive_body(note);
    if text.is_empty() {
        remarks.add(format!("Empty body: {}", note.kind));
    }
    let cells = BodyCells::fit(&text);
    if cells.truncated() {
        remarks.add(format!("Body truncated: {} chunks", cells.chunk_count));
    }

    let created_at = local_time(&note.key, "created_at", note.created_at.as_deref());
    let publish_at = local_time(&note.key, "publish_at", note.publish_at.as_deref());
    let user_created_at =
        local_time(&note.key, "user.created_at", note.user.created_at.as_deref());

    let hashtags = note
        .hashtag_notes
        .iter()
        .map(|h| strip_hashtag_marker(&h.hashtag.name))
        .collect::<Vec<_>>()
        .join(", ");

    NoteRow {
        title: note.name.clone().unwrap_or_default(),
        created_at,
        publish_at,
        price: note.price,
        can_read_all: summary.can_read_note_all,
        like_count: note.like_count,
        share_count: note.note_share_total_count,
        url: format!("{}/notes/{}", site_base, note.key),
        kind: note.kind.to_string(),
        user: note.user.nickname.clone(),
        user_url: format!("{}/{}", site_base, note.user.urlname),
        user_note_count: note.user.note_count,
        user_created_at,
        hashtags,
        remarks: remarks.joined(),
        body: cells.cells,
    }
}

/// Tokyo wall-clock time, or an empty cell when the value is absent or unparseable.
fn local_time(key: &str, field: &str, value: Option<&str>) -> String {
    let Some(raw) = value.filter(|v| !v.trim().is_empty()) else {
        return String::new();
    };
    match to_tokyo_local(raw) {
        Ok(local) => local,
        Err(e) => {
            warn!(note = key, field, "{:#}", e);
            String::new()
        }
    }
}
