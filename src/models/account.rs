use super::header_u64;
use reqwest::header::HeaderMap;
use serde::Serialize;

/// Account-wide usage counters from `HEAD` on the account endpoint.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AccountInfo {
    pub container_count: u64,
    pub object_count: u64,
    pub bytes_used: u64,
}

impl AccountInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            container_count: header_u64(headers, "x-account-container-count"),
            object_count: header_u64(headers, "x-account-object-count"),
            bytes_used: header_u64(headers, "x-account-bytes-used"),
        }
    }
}
