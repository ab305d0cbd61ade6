//! Boundary between the transfer engine and the HTTP layer.
//!
//! Every storage operation is expressed as one [`TransportRequest`] handed
//! to a [`Transport`]. Authentication and endpoint selection live behind
//! the trait; [`HttpTransport`] is the `reqwest` implementation.

pub mod http;

use crate::errors::{StorageError, StorageResult};
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use reqwest::{
    Method, StatusCode,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde::de::DeserializeOwned;
use std::{fmt, future::Future, io};

pub use http::HttpTransport;

/// Body bytes flowing in either direction.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

pub enum RequestBody {
    Empty,
    Stream {
        body: ByteStream,
        length: Option<u64>,
    },
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Stream { length, .. } => {
                f.debug_struct("Stream").field("length", length).finish_non_exhaustive()
            }
        }
    }
}

/// One logical storage request, relative to the account endpoint.
#[derive(Debug)]
pub struct TransportRequest {
    pub method: Method,
    /// Already percent-encoded path, e.g. `/photos/2024/cat.jpg`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Send to the CDN management endpoint instead of the storage endpoint.
    pub cdn: bool,
}

impl TransportRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            cdn: false,
        }
    }

    pub fn cdn(mut self) -> Self {
        self.cdn = true;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body(mut self, body: ByteStream, length: Option<u64>) -> Self {
        self.body = RequestBody::Stream { body, length };
        self
    }
}

pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl TransportResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ByteStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Response with a fully buffered body.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let stream = futures::stream::iter((!body.is_empty()).then_some(Ok(body)));
        Self::new(status, headers, stream.boxed())
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Collect the whole body into memory.
    pub async fn bytes(self) -> StorageResult<Bytes> {
        let buf = self
            .body
            .try_fold(BytesMut::new(), |mut acc, block| async move {
                acc.extend_from_slice(&block);
                Ok(acc)
            })
            .await?;
        Ok(buf.freeze())
    }

    /// Decode a JSON body, rejecting bodies not labelled as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> StorageResult<T> {
        let content_type = self
            .header_str(CONTENT_TYPE.as_str())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase());
        let body = self.bytes().await?;

        match content_type.as_deref() {
            Some("application/json") => {}
            Some(other) => {
                return Err(StorageError::MalformedResponse {
                    reason: format!("expected application/json, got `{}`", other),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            None => {
                return Err(StorageError::MalformedResponse {
                    reason: "missing content-type header".into(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }
        }

        serde_json::from_slice(&body).map_err(|err| StorageError::MalformedResponse {
            reason: format!("failed to parse JSON: {}", err),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Issues exactly one HTTP request per call.
pub trait Transport: Send + Sync {
    fn request(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = StorageResult<TransportResponse>> + Send;
}
