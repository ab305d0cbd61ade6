//! src/services/storage_service.rs
//!
//! StorageClient: container, object and transfer operations against an
//! object-storage endpoint. Each method issues exactly one request through
//! the [`Transport`] (multipart uploads issue one per part plus the
//! manifest) and maps the response status to a result or a
//! [`StorageError`]. Nothing here retries; callers that want retries wrap
//! these calls.

use super::{
    listing::PaginatedListingCursor,
    multipart::MultipartUpload,
    naming::{container_path, encode_object_name, object_path},
};
use crate::{
    config::ClientConfig,
    errors::{StorageError, StorageResult},
    models::{AccountInfo, Container, DownloadResult, Object, ObjectExtra, UploadResult},
    transfer::{DigestAlgorithm, HashingUploadPipe, UploadSource},
    transport::{ByteStream, HttpTransport, Transport, TransportRequest, TransportResponse},
};
use futures::StreamExt;
use reqwest::{
    Method, StatusCode,
    header::{CONTENT_TYPE, ETAG, HeaderMap, HeaderName, HeaderValue},
};
use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Content type for object bodies that don't specify one.
pub const OCTET_STREAM: &str = "application/octet-stream";

const WEB_INDEX_HEADER: &str = "x-container-meta-web-index";
const WEB_ERROR_HEADER: &str = "x-container-meta-web-error";
const CDN_ENABLED_HEADER: &str = "x-cdn-enabled";
const CDN_TTL_HEADER: &str = "x-ttl";
const CDN_URI_HEADER: &str = "x-cdn-uri";

/// StorageClient provides the object-storage operations:
/// - Upload objects from files, streams or as manifest-linked parts
/// - Download objects to disk or as a byte stream
/// - List containers and objects lazily, page by page
/// - Create, inspect and delete containers and objects
pub struct StorageClient<T> {
    transport: Arc<T>,
    config: ClientConfig,
}

impl<T> Clone for StorageClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            config: self.config.clone(),
        }
    }
}

impl StorageClient<HttpTransport> {
    /// Client that talks HTTP to `config.endpoint`.
    pub fn new(config: ClientConfig) -> StorageResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> StorageClient<T> {
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn digest_algorithm(&self) -> DigestAlgorithm {
        self.config.digest
    }

    async fn send(&self, request: TransportRequest) -> StorageResult<TransportResponse> {
        self.transport.request(request).await
    }

    /// Lazily list every container in the account.
    pub fn list_containers(&self) -> PaginatedListingCursor<T, Container> {
        PaginatedListingCursor::new(self.transport.clone(), String::new(), String::new())
    }

    /// Lazily list the objects of `container`, in server order.
    pub fn list_container_objects(
        &self,
        container: &str,
    ) -> StorageResult<PaginatedListingCursor<T, Object>> {
        let path = container_path(container)?;
        Ok(PaginatedListingCursor::new(
            self.transport.clone(),
            path,
            container.to_string(),
        ))
    }

    /// `HEAD /{container}`.
    pub async fn get_container(&self, name: &str) -> StorageResult<Container> {
        let request = TransportRequest::new(Method::HEAD, container_path(name)?);
        let response = self.send(request).await?;
        match response.status {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(Container::from_headers(
                display_name(name),
                &response.headers,
            )),
            StatusCode::NOT_FOUND => Err(StorageError::ContainerNotFound(name.to_string())),
            other => Err(StorageError::unexpected(other)),
        }
    }

    /// `HEAD /{container}/{object}`.
    pub async fn get_object(&self, container: &str, name: &str) -> StorageResult<Object> {
        let request = TransportRequest::new(Method::HEAD, object_path(container, name)?);
        let response = self.send(request).await?;
        match response.status {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                Ok(Object::from_headers(container, name, &response.headers))
            }
            StatusCode::NOT_FOUND => Err(StorageError::ObjectNotFound {
                container: container.to_string(),
                object: name.to_string(),
            }),
            other => Err(StorageError::unexpected(other)),
        }
    }

    /// Create a container.
    ///
    /// The server answers 202 when the name is already taken.
    pub async fn create_container(&self, name: &str) -> StorageResult<Container> {
        let request = TransportRequest::new(Method::PUT, container_path(name)?);
        let response = self.send(request).await?;
        match response.status {
            StatusCode::CREATED => {
                info!("created container `{}`", name);
                Ok(Container::empty(display_name(name)))
            }
            StatusCode::ACCEPTED => Err(StorageError::ContainerAlreadyExists(name.to_string())),
            other => Err(StorageError::unexpected(other)),
        }
    }

    /// Delete a container. Only empty containers can be deleted.
    pub async fn delete_container(&self, name: &str) -> StorageResult<()> {
        let request = TransportRequest::new(Method::DELETE, container_path(name)?);
        let response = self.send(request).await?;
        match response.status {
            StatusCode::NO_CONTENT => {
                info!("deleted container `{}`", name);
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(StorageError::ContainerNotFound(name.to_string())),
            StatusCode::CONFLICT => Err(StorageError::ContainerNotEmpty(name.to_string())),
            other => Err(StorageError::unexpected(other)),
        }
    }

    pub async fn delete_object(&self, container: &str, name: &str) -> StorageResult<()> {
        let request = TransportRequest::new(Method::DELETE, object_path(container, name)?);
        let response = self.send(request).await?;
        match response.status {
            StatusCode::NO_CONTENT => {
                debug!("deleted object `{}/{}`", container, name);
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(StorageError::ObjectNotFound {
                container: container.to_string(),
                object: name.to_string(),
            }),
            other => Err(StorageError::unexpected(other)),
        }
    }

    /// Account-wide container/object/byte counters.
    pub async fn account_info(&self) -> StorageResult<AccountInfo> {
        let response = self
            .send(TransportRequest::new(Method::HEAD, String::new()))
            .await?;
        match response.status {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                Ok(AccountInfo::from_headers(&response.headers))
            }
            other => Err(StorageError::unexpected(other)),
        }
    }

    /// Serve `container` as a static website with `index_file` as the
    /// index page of every pseudo-directory.
    pub async fn enable_static_website(
        &self,
        container: &str,
        index_file: &str,
    ) -> StorageResult<()> {
        self.post_container_meta(container, WEB_INDEX_HEADER, index_file)
            .await
    }

    /// Object shown for missing pages of a static website.
    pub async fn set_error_page(&self, container: &str, file_name: &str) -> StorageResult<()> {
        self.post_container_meta(container, WEB_ERROR_HEADER, file_name)
            .await
    }

    async fn post_container_meta(
        &self,
        container: &str,
        header: &'static str,
        value: &str,
    ) -> StorageResult<()> {
        let request = TransportRequest::new(Method::POST, container_path(container)?)
            .header(HeaderName::from_static(header), HeaderValue::from_str(value)?);
        let response = self.send(request).await?;
        match response.status {
            StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => {
                debug!("set {} on `{}`", header, container);
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(StorageError::ContainerNotFound(container.to_string())),
            other => Err(StorageError::unexpected(other)),
        }
    }

    /// Publish `container` through the CDN, optionally with a cache TTL.
    pub async fn enable_container_cdn(
        &self,
        container: &str,
        ttl: Option<u64>,
    ) -> StorageResult<()> {
        let mut request = TransportRequest::new(Method::PUT, container_path(container)?)
            .cdn()
            .header(
                HeaderName::from_static(CDN_ENABLED_HEADER),
                HeaderValue::from_static("True"),
            );
        if let Some(ttl) = ttl {
            request = request.header(
                HeaderName::from_static(CDN_TTL_HEADER),
                HeaderValue::from(ttl),
            );
        }

        let response = self.send(request).await?;
        match response.status {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                info!("enabled CDN for container `{}`", container);
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(StorageError::ContainerNotFound(container.to_string())),
            other => Err(StorageError::unexpected(other)),
        }
    }

    /// Public CDN base URL of a CDN-enabled container.
    pub async fn get_container_cdn_url(&self, container: &str) -> StorageResult<String> {
        let request = TransportRequest::new(Method::HEAD, container_path(container)?).cdn();
        let response = self.send(request).await?;
        match response.status {
            StatusCode::OK | StatusCode::NO_CONTENT => response
                .header_str(CDN_URI_HEADER)
                .map(|uri| uri.trim_end_matches('/').to_string())
                .ok_or_else(|| StorageError::MalformedResponse {
                    reason: format!("missing {} header", CDN_URI_HEADER),
                    body: String::new(),
                }),
            StatusCode::NOT_FOUND => Err(StorageError::ContainerNotFound(container.to_string())),
            other => Err(StorageError::unexpected(other)),
        }
    }

    /// Public CDN URL of an object: its container's CDN URL plus the encoded name.
    pub async fn get_object_cdn_url(&self, obj: &Object) -> StorageResult<String> {
        let base = self.get_container_cdn_url(&obj.container).await?;
        Ok(format!("{}/{}", base, encode_object_name(&obj.name)))
    }

    /// Upload a whole file in a single request. Overwrites any existing object.
    pub async fn upload_object(
        &self,
        file_path: &Path,
        container: &str,
        object_name: &str,
        extra: &ObjectExtra,
        verify_hash: bool,
    ) -> StorageResult<Object> {
        let source = UploadSource::File(file_path.to_path_buf());
        let result = self
            .put_object(container, object_name, source, extra, HeaderMap::new(), verify_hash)
            .await?;
        Ok(uploaded_object(container, extra, &result, result.bytes_transferred))
    }

    /// Upload bytes from a caller-supplied stream of unknown length.
    pub async fn upload_object_via_stream(
        &self,
        body: ByteStream,
        container: &str,
        object_name: &str,
        extra: &ObjectExtra,
    ) -> StorageResult<Object> {
        let result = self
            .put_object(
                container,
                object_name,
                UploadSource::Stream(body),
                extra,
                HeaderMap::new(),
                self.config.verify_hash,
            )
            .await?;
        Ok(uploaded_object(container, extra, &result, result.bytes_transferred))
    }

    /// Upload a file, splitting it into `config.chunk_size` parts when it is
    /// at least that large. See [`MultipartUpload`] for the details and for
    /// recovering the names of parts left behind by a failure.
    pub async fn multipart_upload_object(
        &self,
        file_path: &Path,
        container: &str,
        object_name: &str,
        extra: ObjectExtra,
    ) -> StorageResult<Object> {
        let mut upload = MultipartUpload::new(container, object_name, file_path, self.config.chunk_size)
            .extra(extra)
            .verify_hash(self.config.verify_hash);
        upload.run(self).await
    }

    /// Stream an object's body without touching the filesystem.
    pub async fn download_object_as_stream(&self, obj: &Object) -> StorageResult<ByteStream> {
        Ok(self.get_object_body(obj).await?.body)
    }

    /// Download an object to `destination`.
    ///
    /// A directory destination gets the object's base name appended. Bytes
    /// land in a temporary sibling file that is renamed into place once the
    /// transfer completes. On failure the temporary file is removed when
    /// `delete_on_failure` is set; otherwise the partial bytes are moved to
    /// the destination path so the caller can inspect or resume them.
    pub async fn download_object(
        &self,
        obj: &Object,
        destination: &Path,
        overwrite_existing: bool,
        delete_on_failure: bool,
    ) -> StorageResult<DownloadResult> {
        let target = resolve_destination(destination, &obj.name).await;
        if !overwrite_existing && fs::try_exists(&target).await? {
            return Err(StorageError::DestinationExists { path: target });
        }

        let response = self.get_object_body(obj).await?;
        let expected = response
            .header_str("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok());

        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut tmp_name = OsString::from(".");
        tmp_name.push(target.file_name().unwrap_or_default());
        tmp_name.push(format!(".part-{}", Uuid::new_v4()));
        let tmp_path = parent.join(tmp_name);

        let written = self
            .write_body(&tmp_path, response.body, expected)
            .await;
        let (bytes_transferred, local_digest) = match written {
            Ok(done) => done,
            Err(err) => {
                if delete_on_failure {
                    let _ = fs::remove_file(&tmp_path).await;
                } else if let Err(keep_err) = fs::rename(&tmp_path, &target).await {
                    warn!(
                        "could not keep partial download at {}: {}",
                        target.display(),
                        keep_err
                    );
                    let _ = fs::remove_file(&tmp_path).await;
                } else {
                    warn!("partial download kept at {}", target.display());
                }
                return Err(err);
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &target).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&target).await?;
                fs::rename(&tmp_path, &target).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }

        info!(
            "downloaded `{}/{}` to {} ({} bytes)",
            obj.container,
            obj.name,
            target.display(),
            bytes_transferred
        );
        Ok(DownloadResult {
            path: target,
            bytes_transferred,
            local_digest,
        })
    }

    async fn get_object_body(&self, obj: &Object) -> StorageResult<TransportResponse> {
        let request = TransportRequest::new(Method::GET, object_path(&obj.container, &obj.name)?);
        let response = self.send(request).await?;
        match response.status {
            StatusCode::OK => Ok(response),
            StatusCode::NOT_FOUND => Err(StorageError::ObjectNotFound {
                container: obj.container.clone(),
                object: obj.name.clone(),
            }),
            other => Err(StorageError::unexpected(other)),
        }
    }

    /// Write a response body to `path`, hashing it on the way, and fsync.
    async fn write_body(
        &self,
        path: &Path,
        mut body: ByteStream,
        expected: Option<u64>,
    ) -> StorageResult<(u64, String)> {
        let mut file = File::create(path).await?;
        let mut digester = self.digest_algorithm().digester();
        let mut written: u64 = 0;

        while let Some(block) = body.next().await {
            let block = block?;
            digester.update(&block);
            file.write_all(&block).await?;
            written += block.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = expected {
            if expected != written {
                return Err(StorageError::IncompleteDownload {
                    expected,
                    actual: written,
                });
            }
        }
        Ok((written, digester.finalize_hex()))
    }

    /// Stream `source` into `PUT /{container}/{object_name}`, hashing as it goes.
    ///
    /// Status is checked first: 201 is success, 417 means the server wanted
    /// a content type, 404 means the container is missing. When `verify_hash`
    /// is set the server's `ETag` must then equal the local digest. The data
    /// has already been written by the time a mismatch is detected.
    pub(crate) async fn put_object(
        &self,
        container: &str,
        object_name: &str,
        source: UploadSource,
        extra: &ObjectExtra,
        extra_headers: HeaderMap,
        verify_hash: bool,
    ) -> StorageResult<UploadResult> {
        let path = object_path(container, object_name)?;
        let mut headers = object_headers(extra)?;
        headers.extend(extra_headers);

        let (body, length) = source.open().await?;
        let (pipe, receipt) = HashingUploadPipe::new(body, length, self.digest_algorithm());
        let request = TransportRequest::new(Method::PUT, path)
            .headers(headers)
            .body(pipe.boxed(), length);

        let response = self.send(request).await?;
        match response.status {
            StatusCode::CREATED => {}
            StatusCode::EXPECTATION_FAILED => return Err(StorageError::MissingContentType),
            StatusCode::NOT_FOUND => {
                return Err(StorageError::ContainerNotFound(container.to_string()));
            }
            other => return Err(StorageError::unexpected(other)),
        }
        let server_digest = response.header_str(ETAG.as_str()).map(str::to_string);

        let report = match receipt.wait().await {
            Some(report) if report.complete => report,
            _ => {
                return Err(StorageError::TransmissionIncomplete {
                    object: object_name.to_string(),
                });
            }
        };

        if verify_hash {
            let Some(server) = server_digest.as_deref() else {
                return Err(StorageError::MissingEtag {
                    object: object_name.to_string(),
                });
            };
            if !digests_match(&report.digest, server) {
                return Err(StorageError::HashMismatch {
                    object: object_name.to_string(),
                    expected: report.digest,
                    actual: server.to_string(),
                });
            }
        }

        debug!(
            "uploaded `{}/{}` ({} bytes, digest {})",
            container, object_name, report.bytes_transferred, report.digest
        );
        Ok(UploadResult {
            object_name: object_name.to_string(),
            bytes_transferred: report.bytes_transferred,
            local_digest: report.digest,
            server_digest,
        })
    }
}

/// Build the `Object` value returned to callers after an upload.
pub(crate) fn uploaded_object(
    container: &str,
    extra: &ObjectExtra,
    result: &UploadResult,
    size: u64,
) -> Object {
    Object {
        name: result.object_name.clone(),
        container: container.to_string(),
        size,
        hash: result.server_digest.clone(),
        content_type: Some(
            extra
                .content_type
                .clone()
                .unwrap_or_else(|| OCTET_STREAM.to_string()),
        ),
        last_modified: None,
        meta_data: extra.meta_data.clone(),
    }
}

/// `Content-Type` plus one `X-Object-Meta-{key}` header per metadata entry.
fn object_headers(extra: &ObjectExtra) -> StorageResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let content_type = extra.content_type.as_deref().unwrap_or(OCTET_STREAM);
    headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type)?);
    for (key, value) in &extra.meta_data {
        let name = HeaderName::from_bytes(format!("x-object-meta-{}", key).as_bytes())?;
        headers.insert(name, HeaderValue::from_str(value)?);
    }
    Ok(headers)
}

/// Compare a local hex digest with an `ETag`, ignoring quotes and case.
fn digests_match(local: &str, etag: &str) -> bool {
    etag.trim().trim_matches('"').eq_ignore_ascii_case(local)
}

/// Container name as callers see it, without the tolerated leading `/`.
fn display_name(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

async fn resolve_destination(destination: &Path, object_name: &str) -> PathBuf {
    let is_dir = fs::metadata(destination)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if is_dir {
        let base = object_name.rsplit('/').next().unwrap_or(object_name);
        destination.join(base)
    } else {
        destination.to_path_buf()
    }
}
