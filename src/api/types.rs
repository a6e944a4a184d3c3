use std::fmt;

use serde::{Deserialize, Deserializer};

/// Every note API response wraps its payload in `{ "data": ... }`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Listing order requested from the hashtag endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OrderMode {
    /// Popularity-ranked
    Popular,
    /// Recency-ranked
    New,
}

impl OrderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderMode::Popular => "popular",
            OrderMode::New => "new",
        }
    }
}

// ── Listing ──

#[derive(Debug, Deserialize)]
pub struct NotesPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: Vec<NoteSummary>,
    #[serde(default)]
    pub count: u64,
    pub is_last_page: bool,
    #[serde(default)]
    pub next_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteSummary {
    pub key: String,
    #[serde(default)]
    pub can_read_note_all: Option<bool>,
}

// ── Detail ──

#[derive(Debug, Deserialize)]
pub struct NoteDetail {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: NoteKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pictures: Vec<Picture>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub publish_at: Option<String>,
    #[serde(default)]
    pub price: Option<u64>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub note_share_total_count: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hashtag_notes: Vec<HashtagNote>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_r18_confirmation_needed: bool,
    pub user: NoteUser,
}

#[derive(Debug, Deserialize)]
pub struct Picture {
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HashtagNote {
    pub hashtag: Hashtag,
}

#[derive(Debug, Deserialize)]
pub struct Hashtag {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteUser {
    pub nickname: String,
    pub urlname: String,
    #[serde(default)]
    pub note_count: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Content kind of a note. Tags outside the known set are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum NoteKind {
    Text,
    Image,
    Talk,
    Sound,
    Movie,
    Unknown(String),
}

impl NoteKind {
    pub fn tag(&self) -> &str {
        match self {
            NoteKind::Text => "TextNote",
            NoteKind::Image => "ImageNote",
            NoteKind::Talk => "TalkNote",
            NoteKind::Sound => "SoundNote",
            NoteKind::Movie => "MovieNote",
            NoteKind::Unknown(tag) => tag,
        }
    }
}

impl From<String> for NoteKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "TextNote" => NoteKind::Text,
            "ImageNote" => NoteKind::Image,
            "TalkNote" => NoteKind::Talk,
            "SoundNote" => NoteKind::Sound,
            "MovieNote" => NoteKind::Movie,
            _ => NoteKind::Unknown(tag),
        }
    }
}

impl fmt::Display for NoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The API sends `null` for empty lists and flags on some note kinds.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
