//! Represents a container, the top-level namespace for objects.

use super::header_u64;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// A storage container within an account.
///
/// `object_count` and `size` are server-side aggregates and may lag behind
/// recent writes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Container {
    /// Unique within the account; at most 256 bytes and never contains `/`.
    pub name: String,

    pub object_count: u64,

    /// Total bytes stored.
    pub size: u64,
}

impl Container {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object_count: 0,
            size: 0,
        }
    }

    /// Build a container from the headers of a `HEAD /{container}` response.
    pub fn from_headers(name: &str, headers: &HeaderMap) -> Self {
        Self {
            name: name.to_string(),
            object_count: header_u64(headers, "x-container-object-count"),
            size: header_u64(headers, "x-container-bytes-used"),
        }
    }
}
