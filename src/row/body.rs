use std::sync::LazyLock;

use regex::Regex;

use super::html::{decode_unicode_escapes, html_to_text};
use crate::api::types::NoteDetail;

/// Excel refuses cells longer than this many characters.
pub const CELL_CHAR_LIMIT: usize = 32767;
/// Fixed number of body columns so every row carries the same header.
pub const BODY_COLUMNS: usize = 5;

static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

type BodySource = fn(&NoteDetail) -> Option<String>;

/// Tried in order; the first source that yields text wins.
const BODY_SOURCES: &[BodySource] = &[from_html_body, from_description, from_captions];

/// Plain-text body of a note, newline-normalized.
pub fn derive_body(note: &NoteDetail) -> String {
    let raw = BODY_SOURCES
        .iter()
        .find_map(|source| source(note))
        .unwrap_or_default();
    normalize_newlines(&raw)
}

// Paid and R-18 notes come back with a null body.
fn from_html_body(note: &NoteDetail) -> Option<String> {
    let body = note.body.as_deref().filter(|b| !b.is_empty())?;
    Some(html_to_text(&decode_unicode_escapes(body)))
}

// Movie and sound notes
fn from_description(note: &NoteDetail) -> Option<String> {
    note.description
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

// Image notes
fn from_captions(note: &NoteDetail) -> Option<String> {
    let captions: Vec<&str> = note
        .pictures
        .iter()
        .map(|p| p.caption.as_deref().unwrap_or(""))
        .collect();
    Some(captions.join("\n"))
}

/// Collapse 3+ newlines to a blank line and drop leading/trailing newlines.
pub fn normalize_newlines(text: &str) -> String {
    BLANK_RUN_RE
        .replace_all(text, "\n\n")
        .trim_matches('\n')
        .to_string()
}

/// Consecutive pieces of at most `size` characters; the last holds the remainder.
pub fn split_by_chars(text: &str, size: usize) -> Vec<&str> {
    assert!(size > 0, "chunk size must be positive");
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(size)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

/// A body spread over exactly [`BODY_COLUMNS`] cells.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyCells {
    pub cells: [String; BODY_COLUMNS],
    /// Chunks the whole body needed, which may exceed the cell count.
    pub chunk_count: usize,
}

impl BodyCells {
    pub fn fit(text: &str) -> Self {
        let chunks = split_by_chars(text, CELL_CHAR_LIMIT);
        let chunk_count = chunks.len();
        let mut cells: [String; BODY_COLUMNS] = Default::default();
        for (cell, chunk) in cells.iter_mut().zip(chunks) {
            *cell = chunk.to_string();
        }
        BodyCells { cells, chunk_count }
    }

    pub fn truncated(&self) -> bool {
        self.chunk_count > BODY_COLUMNS
    }
}
