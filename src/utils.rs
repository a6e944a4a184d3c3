use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime};

/// Asia/Tokyo has no DST, so a fixed +09:00 is exact.
const TOKYO_OFFSET_SECS: i32 = 9 * 3600;

/// Convert an ISO 8601 timestamp to Tokyo wall-clock time without an offset suffix.
/// Timestamps that carry no offset are taken to already be Tokyo time.
pub fn to_tokyo_local(timestamp: &str) -> Result<String> {
    let tokyo = FixedOffset::east_opt(TOKYO_OFFSET_SECS).ok_or_else(|| anyhow!("bad offset"))?;
    let local = match DateTime::parse_from_rfc3339(timestamp) {
        Ok(dt) => dt.with_timezone(&tokyo).naive_local(),
        Err(_) => NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .with_context(|| format!("unparseable timestamp {:?}", timestamp))?,
    };
    Ok(local.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// `#example` -> `example`. Only the first marker goes.
pub fn strip_hashtag_marker(tag: &str) -> &str {
    tag.strip_prefix('#').unwrap_or(tag)
}

pub fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
