pub mod types;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::settings::Settings;
use types::{Envelope, NoteDetail, NotesPage, OrderMode};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} did not return valid JSON")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected response shape from {path}")]
    Shape {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Where notes come from. The pagination driver only sees this seam.
pub trait NoteSource {
    async fn notes_page(
        &self,
        hashtag: &str,
        order: OrderMode,
        page: u32,
    ) -> Result<NotesPage, FetchError>;

    async fn note(&self, key: &str) -> Result<NoteDetail, FetchError>;
}

/// Thin client over the public note API.
pub struct NoteApi {
    client: reqwest::Client,
    base: Url,
    dump_dir: Option<PathBuf>,
}

impl NoteApi {
    /// `dump_dir` enables the raw-response snapshots.
    pub fn new(settings: &Settings, dump_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let base = Url::parse(&settings.api_base)
            .map_err(|e| anyhow::anyhow!("invalid API base {:?}: {}", settings.api_base, e))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("API base {} cannot carry a path", base);
        }
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(NoteApi {
            client,
            base,
            dump_dir,
        })
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        url
    }

    /// GET one resource and parse it as JSON. The parsed body is dumped to
    /// disk before the status check so error payloads are kept too.
    pub async fn fetch(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let url = self.endpoint(segments, query);
        debug!(%url, "GET");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        let parsed = serde_json::from_slice::<Value>(&bytes);
        if let (Some(dir), Ok(value)) = (&self.dump_dir, &parsed) {
            let path = dump_path(dir, segments, query);
            if let Err(e) = write_dump(&path, value) {
                warn!("Could not write {}: {}", path.display(), e);
            }
        }

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        parsed.map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

impl NoteSource for NoteApi {
    async fn notes_page(
        &self,
        hashtag: &str,
        order: OrderMode,
        page: u32,
    ) -> Result<NotesPage, FetchError> {
        let segments = ["v3", "hashtags", hashtag, "notes"];
        let query = [
            ("order", order.as_str().to_string()),
            ("page", page.to_string()),
            ("paid_only", "false".to_string()),
        ];
        let value = self.fetch(&segments, &query).await?;
        unwrap_data(&segments.join("/"), value)
    }

    async fn note(&self, key: &str) -> Result<NoteDetail, FetchError> {
        let segments = ["v3", "notes", key];
        let value = self.fetch(&segments, &[]).await?;
        unwrap_data(&segments.join("/"), value)
    }
}

/// Decode the `data` member of a response envelope.
pub fn unwrap_data<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, FetchError> {
    serde_json::from_value::<Envelope<T>>(value)
        .map(|envelope| envelope.data)
        .map_err(|source| FetchError::Shape {
            path: path.to_string(),
            source,
        })
}

// ── Raw dumps ──

/// `logs/v3/notes/abc.json`, or `logs/v3/hashtags/x/notes_order=popular_page=1_paid_only=false.json`
/// when the request carries a query.
pub fn dump_path(dir: &Path, segments: &[&str], query: &[(&str, String)]) -> PathBuf {
    let mut path = dir.to_path_buf();
    let Some((last, parents)) = segments.split_last() else {
        return path.join("response.json");
    };
    for segment in parents {
        path.push(file_safe(segment));
    }

    let mut name = (*last).to_string();
    if !query.is_empty() {
        let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        name.push('_');
        name.push_str(&pairs.join("_"));
    }
    path.push(format!("{}.json", file_safe(&name)));
    path
}

fn file_safe(segment: &str) -> String {
    if segment.is_empty() || segment == "." || segment == ".." {
        return "_".to_string();
    }
    segment
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn write_dump(path: &Path, value: &Value) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    fs::write(path, buf)
}
