//! Core data models for the object-storage client.
//!
//! These are plain result values: they are built from response headers or
//! listing JSON and handed to the caller, never updated in place.

pub mod account;
pub mod container;
pub mod listing;
pub mod object;

pub use account::AccountInfo;
pub use container::Container;
pub use listing::{ListingEntry, ListingPage};
pub use object::{DownloadResult, Object, ObjectExtra, UploadResult};

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::HeaderMap;

/// Parse a header as an integer, treating absent or garbled values as zero.
pub(crate) fn header_u64(headers: &HeaderMap, name: &str) -> u64 {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Accepts HTTP dates (`Tue, 15 Nov 1994 08:12:31 GMT`), RFC 3339, and the
/// zone-less ISO form used in JSON listings (`2011-03-04T15:13:31.123450`).
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc2822(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
