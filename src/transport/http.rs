//! `reqwest`-backed transport.

use super::{ByteStream, RequestBody, Transport, TransportRequest, TransportResponse};
use crate::{
    config::ClientConfig,
    errors::{StorageError, StorageResult},
};
use futures::{StreamExt, TryStreamExt};
use reqwest::{
    Body, Client, Method,
    header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue},
};
use std::{io, time::Duration};
use tracing::debug;

const AUTH_TOKEN_HEADER: &str = "x-auth-token";
const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Talks to an already-authenticated storage endpoint
/// (e.g. `https://storage.example.com/v1/AUTH_account`).
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    cdn_endpoint: Option<String>,
    auth_token: Option<HeaderValue>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        let auth_token = config
            .auth_token
            .as_deref()
            .map(|token| {
                let mut value = HeaderValue::from_str(token)?;
                value.set_sensitive(true);
                Ok::<_, StorageError>(value)
            })
            .transpose()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            cdn_endpoint: config
                .cdn_endpoint
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
            auth_token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn cdn_endpoint(&self) -> Option<&str> {
        self.cdn_endpoint.as_deref()
    }
}

impl Transport for HttpTransport {
    async fn request(&self, request: TransportRequest) -> StorageResult<TransportResponse> {
        let TransportRequest {
            method,
            path,
            query,
            mut headers,
            body,
            cdn,
        } = request;

        let base = if cdn {
            self.cdn_endpoint
                .as_deref()
                .ok_or(StorageError::CdnNotConfigured)?
        } else {
            self.endpoint.as_str()
        };
        let url = format!("{}{}", base, path);
        if let Some(token) = &self.auth_token {
            headers.insert(AUTH_TOKEN_HEADER, token.clone());
        }
        if matches!(method, Method::PUT | Method::POST) && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .query(&[("format", "json")])
            .query(&query);

        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Stream { body, length } => {
                if let Some(length) = length {
                    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
                }
                builder.body(Body::wrap_stream(body))
            }
        };

        let response = builder.headers(headers).send().await?;
        let status = response.status();
        debug!("{} {} -> {}", method, path, status);

        let headers = response.headers().clone();
        let body: ByteStream = response.bytes_stream().map_err(io::Error::other).boxed();
        Ok(TransportResponse::new(status, headers, body))
    }
}
