//! Manifest-style multipart uploads.
//!
//! A file at least `chunk_size` bytes long is cut into segments, and each
//! segment is uploaded as its own object named `{object}/{index:08}`. A final
//! zero-byte PUT to `{object}` carrying `X-Object-Manifest:
//! {container}/{object}/` tells the server to serve the concatenation of
//! every object under that prefix. Smaller files go up in one request.
//!
//! Parts are sent one at a time in index order. The first failure stops the
//! upload; parts that already succeeded stay on the server and are listed
//! by [`MultipartUpload::completed_parts`] so the caller can clean up.

use super::{
    naming::{clean_container_name, encode_object_name, manifest_prefix, part_name},
    storage_service::{OCTET_STREAM, StorageClient, uploaded_object},
};
use crate::{
    errors::{StorageError, StorageResult},
    models::{Object, ObjectExtra, UploadResult},
    transfer::{BoundedRangeReader, ChunkedFileSegmenter, UploadSource},
    transport::Transport,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

pub const MANIFEST_HEADER: &str = "x-object-manifest";

/// Progress of a [`MultipartUpload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartState {
    Idle,
    /// Sending the part with this index (or the whole file, for small ones).
    UploadingPart(u64),
    Finalizing,
    Done,
    /// Stopped by an error; `part` is the index being sent, `None` if the
    /// failure happened outside a part upload.
    Failed { part: Option<u64> },
}

#[derive(Debug)]
pub struct MultipartUpload {
    container: String,
    object_name: String,
    source: PathBuf,
    chunk_size: u64,
    extra: ObjectExtra,
    verify_hash: bool,
    state: MultipartState,
    parts: Vec<UploadResult>,
    manifest: Option<UploadResult>,
}

impl MultipartUpload {
    pub fn new(
        container: impl Into<String>,
        object_name: impl Into<String>,
        source: impl AsRef<Path>,
        chunk_size: u64,
    ) -> Self {
        Self {
            container: container.into(),
            object_name: object_name.into(),
            source: source.as_ref().to_path_buf(),
            chunk_size,
            extra: ObjectExtra::default(),
            verify_hash: true,
            state: MultipartState::Idle,
            parts: Vec::new(),
            manifest: None,
        }
    }

    /// Content type and metadata of the logical object.
    pub fn extra(mut self, extra: ObjectExtra) -> Self {
        self.extra = extra;
        self
    }

    pub fn verify_hash(mut self, verify: bool) -> Self {
        self.verify_hash = verify;
        self
    }

    pub fn state(&self) -> MultipartState {
        self.state
    }

    /// Results of the parts that were accepted by the server, in order.
    pub fn part_results(&self) -> &[UploadResult] {
        &self.parts
    }

    /// Names of the part objects written so far.
    pub fn completed_parts(&self) -> Vec<String> {
        self.parts.iter().map(|p| p.object_name.clone()).collect()
    }

    /// Result of the finalizing request, once it has succeeded.
    ///
    /// Its digest covers the empty manifest body only, not the assembled
    /// object.
    pub fn manifest_result(&self) -> Option<&UploadResult> {
        self.manifest.as_ref()
    }

    /// Run the upload from the beginning.
    ///
    /// Running again after a failure re-sends every part, overwriting the
    /// ones already on the server.
    pub async fn run<T: Transport>(&mut self, client: &StorageClient<T>) -> StorageResult<Object> {
        self.state = MultipartState::Idle;
        self.parts.clear();
        self.manifest = None;

        if self.chunk_size == 0 {
            return Err(self.fail(None, StorageError::InvalidChunkSize));
        }
        if let Err(err) = clean_container_name(&self.container) {
            return Err(self.fail(None, err));
        }
        let size = match fs::metadata(&self.source).await {
            Ok(meta) => meta.len(),
            Err(err) => return Err(self.fail(None, err.into())),
        };

        if size < self.chunk_size {
            return self.upload_single(client).await;
        }

        let segmenter = match ChunkedFileSegmenter::with_size(&self.source, size, self.chunk_size) {
            Ok(segmenter) => segmenter,
            Err(err) => return Err(self.fail(None, err)),
        };
        info!(
            "uploading `{}/{}` in {} parts of up to {} bytes",
            self.container,
            self.object_name,
            segmenter.segment_count(),
            self.chunk_size
        );

        let part_extra = ObjectExtra::default().with_content_type(OCTET_STREAM);
        for (index, segment) in segmenter.enumerate() {
            let index = index as u64;
            self.state = MultipartState::UploadingPart(index);

            let reader =
                match BoundedRangeReader::open(&self.source, segment, client.config().block_size)
                    .await
                {
                    Ok(reader) => reader,
                    Err(err) => return Err(self.fail(Some(index), err.into())),
                };
            let name = part_name(&self.object_name, index);
            let uploaded = client
                .put_object(
                    &self.container,
                    &name,
                    UploadSource::Range(reader),
                    &part_extra,
                    HeaderMap::new(),
                    self.verify_hash,
                )
                .await;
            match uploaded {
                Ok(result) => {
                    debug!("part {} of `{}` stored as `{}`", index, self.object_name, name);
                    self.parts.push(result);
                }
                Err(err) => return Err(self.fail(Some(index), err)),
            }
        }

        self.state = MultipartState::Finalizing;
        let manifest = match self.put_manifest(client).await {
            Ok(result) => result,
            Err(err) => return Err(self.fail(None, err)),
        };

        let total: u64 = self.parts.iter().map(|p| p.bytes_transferred).sum();
        let object = uploaded_object(&self.container, &self.extra, &manifest, total);
        self.manifest = Some(manifest);
        self.state = MultipartState::Done;
        info!(
            "finalized `{}/{}` from {} parts ({} bytes)",
            self.container,
            self.object_name,
            self.parts.len(),
            total
        );
        Ok(object)
    }

    async fn upload_single<T: Transport>(
        &mut self,
        client: &StorageClient<T>,
    ) -> StorageResult<Object> {
        self.state = MultipartState::UploadingPart(0);
        let uploaded = client
            .put_object(
                &self.container,
                &self.object_name,
                UploadSource::File(self.source.clone()),
                &self.extra,
                HeaderMap::new(),
                self.verify_hash,
            )
            .await;
        match uploaded {
            Ok(result) => {
                self.state = MultipartState::Done;
                Ok(uploaded_object(
                    &self.container,
                    &self.extra,
                    &result,
                    result.bytes_transferred,
                ))
            }
            Err(err) => Err(self.fail(Some(0), err)),
        }
    }

    /// Zero-byte PUT that links the parts into the logical object.
    async fn put_manifest<T: Transport>(
        &self,
        client: &StorageClient<T>,
    ) -> StorageResult<UploadResult> {
        let prefix = manifest_prefix(
            &clean_container_name(&self.container)?,
            &encode_object_name(&self.object_name),
        );
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(MANIFEST_HEADER),
            HeaderValue::from_str(&prefix)?,
        );

        client
            .put_object(
                &self.container,
                &self.object_name,
                UploadSource::empty(),
                &self.extra,
                headers,
                self.verify_hash,
            )
            .await
    }

    fn fail(&mut self, part: Option<u64>, err: StorageError) -> StorageError {
        self.state = MultipartState::Failed { part };
        if !self.parts.is_empty() {
            warn!(
                "multipart upload of `{}/{}` failed: {}; parts left on server: {:?}",
                self.container,
                self.object_name,
                err,
                self.completed_parts()
            );
        }
        err
    }
}
