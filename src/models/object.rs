//! Represents an object (blob) stored in a container.

use super::{header_u64, parse_timestamp};
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, ETAG, HeaderMap, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};

const OBJECT_META_PREFIX: &str = "x-object-meta-";

/// A single object within a container.
///
/// Holds the object's metadata only, never its bytes. Re-uploading under the
/// same name yields a new `Object`; existing values are not refreshed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Object {
    pub name: String,

    /// Name of the owning container.
    pub container: String,

    /// Size in bytes.
    pub size: u64,

    /// Content digest as reported by the server (hex, usually MD5).
    pub hash: Option<String>,

    pub content_type: Option<String>,

    pub last_modified: Option<DateTime<Utc>>,

    /// User metadata, `X-Object-Meta-{key}` on the wire.
    pub meta_data: BTreeMap<String, String>,
}

impl Object {
    pub fn new(container: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container: container.into(),
            size: 0,
            hash: None,
            content_type: None,
            last_modified: None,
            meta_data: BTreeMap::new(),
        }
    }

    /// Build an object from the headers of a `HEAD` or `GET` response.
    pub fn from_headers(container: &str, name: &str, headers: &HeaderMap) -> Self {
        let text = |key| {
            headers
                .get(key)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let meta_data = headers
            .iter()
            .filter_map(|(key, value)| {
                let key = key.as_str().strip_prefix(OBJECT_META_PREFIX)?;
                Some((key.to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();

        Self {
            name: name.to_string(),
            container: container.to_string(),
            size: header_u64(headers, "content-length"),
            hash: text(ETAG),
            content_type: text(CONTENT_TYPE),
            last_modified: text(LAST_MODIFIED).as_deref().and_then(parse_timestamp),
            meta_data,
        }
    }
}

/// Optional attributes attached to an upload.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ObjectExtra {
    pub content_type: Option<String>,
    pub meta_data: BTreeMap<String, String>,
}

impl ObjectExtra {
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta_data.insert(key.into(), value.into());
        self
    }
}

/// Outcome of one PUT request.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UploadResult {
    pub object_name: String,
    pub bytes_transferred: u64,
    /// Digest computed locally while the body was streamed.
    pub local_digest: String,
    /// `ETag` returned by the server, verbatim.
    pub server_digest: Option<String>,
}

/// Outcome of a download to the local filesystem.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DownloadResult {
    pub path: PathBuf,
    pub bytes_transferred: u64,
    /// Digest of the received bytes, computed while writing them out.
    pub local_digest: String,
}
