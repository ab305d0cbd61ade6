//! Error type shared by every transfer, listing and container operation.

use reqwest::{
    StatusCode,
    header::{InvalidHeaderName, InvalidHeaderValue},
};
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("container `{0}` not found")]
    ContainerNotFound(String),
    #[error("container `{0}` already exists")]
    ContainerAlreadyExists(String),
    #[error("container `{0}` is not empty")]
    ContainerNotEmpty(String),
    #[error("container name `{name}` invalid: {reason}")]
    InvalidContainerName { name: String, reason: String },
    #[error("object `{object}` not found in container `{container}`")]
    ObjectNotFound { container: String, object: String },
    #[error("hash checksum does not match for `{object}` (expected={expected}, actual={actual})")]
    HashMismatch {
        object: String,
        expected: String,
        actual: String,
    },
    #[error("server didn't return an etag for `{object}`")]
    MissingEtag { object: String },
    #[error("server rejected the request: missing content-type header")]
    MissingContentType,
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String, body: String },
    #[error("unexpected status code: {status}")]
    UnexpectedStatus { status: StatusCode },
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    #[error("download incomplete: expected {expected} bytes, received {actual}")]
    IncompleteDownload { expected: u64, actual: u64 },
    #[error("destination `{}` already exists", path.display())]
    DestinationExists { path: PathBuf },
    #[error("request body for `{object}` was dropped before it was fully transmitted")]
    TransmissionIncomplete { object: String },
    #[error("no CDN endpoint configured")]
    CdnNotConfigured,
    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] InvalidHeaderName),
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn unexpected(status: StatusCode) -> Self {
        Self::UnexpectedStatus { status }
    }

    /// True for errors raised by local checks before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidContainerName { .. }
                | Self::InvalidChunkSize
                | Self::InvalidHeaderName(_)
                | Self::InvalidHeaderValue(_)
                | Self::DestinationExists { .. }
                | Self::CdnNotConfigured
        )
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
