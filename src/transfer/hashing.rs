//! Request bodies that hash every block on its way out.
//!
//! The pipe sits between a byte source and the transport. Each block the
//! transport pulls is fed to the digester before it is handed over, so the
//! checksum is produced in the same pass as the upload with no second read.
//! Once the transport is done with the body (end of stream or drop), the
//! byte count and hex digest are delivered through a [`PipeReceipt`].

use super::{
    digest::{DigestAlgorithm, Digester},
    range_reader::{BoundedRangeReader, DEFAULT_BLOCK_SIZE},
};
use crate::transport::ByteStream;
use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use std::{
    fmt, io,
    path::PathBuf,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::{fs::File, sync::oneshot};
use tokio_util::io::ReaderStream;

/// Where the bytes of an upload come from.
pub enum UploadSource {
    /// A whole file, streamed from the start.
    File(PathBuf),
    /// One segment of a file.
    Range(BoundedRangeReader),
    /// Caller-supplied stream of unknown length.
    Stream(ByteStream),
    /// An in-memory buffer; empty for manifest requests.
    Buffer(Bytes),
}

impl UploadSource {
    pub fn empty() -> Self {
        UploadSource::Buffer(Bytes::new())
    }

    /// Open the source and return its byte stream plus its length when known.
    pub async fn open(self) -> io::Result<(ByteStream, Option<u64>)> {
        match self {
            UploadSource::File(path) => {
                let file = File::open(&path).await?;
                let len = file.metadata().await?.len();
                let body = ReaderStream::with_capacity(file, DEFAULT_BLOCK_SIZE);
                Ok((body.boxed(), Some(len)))
            }
            UploadSource::Range(reader) => {
                let len = reader.remaining();
                Ok((reader.into_stream().boxed(), Some(len)))
            }
            UploadSource::Stream(body) => Ok((body, None)),
            UploadSource::Buffer(buf) => {
                let len = buf.len() as u64;
                let block = (!buf.is_empty()).then_some(Ok(buf));
                Ok((stream::iter(block).boxed(), Some(len)))
            }
        }
    }
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadSource::File(path) => f.debug_tuple("File").field(path).finish(),
            UploadSource::Range(reader) => f.debug_tuple("Range").field(&reader.segment()).finish(),
            UploadSource::Stream(_) => f.write_str("Stream(..)"),
            UploadSource::Buffer(buf) => f.debug_tuple("Buffer").field(&buf.len()).finish(),
        }
    }
}

/// What the pipe observed once the transport finished with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeReport {
    pub bytes_transferred: u64,
    /// Lowercase hex digest of every byte handed to the transport.
    pub digest: String,
    /// False when the body was abandoned before its last byte went out.
    pub complete: bool,
}

/// Handle for collecting the [`PipeReport`] after the request completes.
#[derive(Debug)]
pub struct PipeReceipt(oneshot::Receiver<PipeReport>);

impl PipeReceipt {
    /// Wait until the transport has released the body.
    pub async fn wait(self) -> Option<PipeReport> {
        self.0.await.ok()
    }
}

pub struct HashingUploadPipe {
    inner: ByteStream,
    digester: Option<Digester>,
    bytes: u64,
    expected_len: Option<u64>,
    report: Option<oneshot::Sender<PipeReport>>,
}

impl HashingUploadPipe {
    pub fn new(
        inner: ByteStream,
        expected_len: Option<u64>,
        algorithm: DigestAlgorithm,
    ) -> (Self, PipeReceipt) {
        let (tx, rx) = oneshot::channel();
        let pipe = Self {
            inner,
            digester: Some(algorithm.digester()),
            bytes: 0,
            expected_len,
            report: Some(tx),
        };
        (pipe, PipeReceipt(rx))
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes
    }

    fn finish(&mut self, reached_end: bool) {
        let (Some(tx), Some(digester)) = (self.report.take(), self.digester.take()) else {
            return;
        };
        let complete = reached_end || self.expected_len == Some(self.bytes);
        // The receiver may be gone if the caller stopped caring about the result.
        let _ = tx.send(PipeReport {
            bytes_transferred: self.bytes,
            digest: digester.finalize_hex(),
            complete,
        });
    }
}

impl Stream for HashingUploadPipe {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(block))) => {
                if let Some(digester) = this.digester.as_mut() {
                    digester.update(&block);
                }
                this.bytes += block.len() as u64;
                Poll::Ready(Some(Ok(block)))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
            Poll::Ready(None) => {
                this.finish(true);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl Drop for HashingUploadPipe {
    fn drop(&mut self) {
        self.finish(false);
    }
}

impl fmt::Debug for HashingUploadPipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashingUploadPipe")
            .field("bytes", &self.bytes)
            .field("expected_len", &self.expected_len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::segmenter::Segment;
    use futures::TryStreamExt;

    fn chunks(data: &[u8], size: usize) -> ByteStream {
        let blocks: Vec<io::Result<Bytes>> = data
            .chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        stream::iter(blocks).boxed()
    }

    #[tokio::test]
    async fn digest_matches_direct_hash() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 256) as u8).collect();
        for algorithm in [DigestAlgorithm::Md5, DigestAlgorithm::Sha256] {
            let (pipe, receipt) = HashingUploadPipe::new(chunks(&data, 333), None, algorithm);
            let sent: Vec<Bytes> = pipe.try_collect().await.unwrap();
            assert_eq!(sent.concat(), data);

            let report = receipt.wait().await.unwrap();
            assert!(report.complete);
            assert_eq!(report.bytes_transferred, data.len() as u64);
            assert_eq!(report.digest, algorithm.hex_digest(&data));
        }
    }

    #[tokio::test]
    async fn empty_buffer_reports_empty_digest() {
        let (body, len) = UploadSource::empty().open().await.unwrap();
        assert_eq!(len, Some(0));
        let (pipe, receipt) = HashingUploadPipe::new(body, len, DigestAlgorithm::Md5);
        let sent: Vec<Bytes> = pipe.try_collect().await.unwrap();
        assert!(sent.is_empty());

        let report = receipt.wait().await.unwrap();
        assert_eq!(report.bytes_transferred, 0);
        assert_eq!(report.digest, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[tokio::test]
    async fn abandoned_body_reports_partial_transfer() {
        let data = vec![1u8; 64];
        let (mut pipe, receipt) =
            HashingUploadPipe::new(chunks(&data, 16), Some(64), DigestAlgorithm::Md5);
        pipe.next().await.unwrap().unwrap();
        drop(pipe);

        let report = receipt.wait().await.unwrap();
        assert!(!report.complete);
        assert_eq!(report.bytes_transferred, 16);
        assert_eq!(report.digest, DigestAlgorithm::Md5.hex_digest(&data[..16]));
    }

    #[tokio::test]
    async fn body_that_stops_at_declared_length_is_complete() {
        let data = vec![9u8; 32];
        let (mut pipe, receipt) =
            HashingUploadPipe::new(chunks(&data, 16), Some(32), DigestAlgorithm::Md5);
        pipe.next().await.unwrap().unwrap();
        pipe.next().await.unwrap().unwrap();
        drop(pipe);

        let report = receipt.wait().await.unwrap();
        assert!(report.complete);
        assert_eq!(report.digest, DigestAlgorithm::Md5.hex_digest(&data));
    }

    #[tokio::test]
    async fn file_and_range_sources_report_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data: Vec<u8> = (0..50u8).collect();
        tokio::fs::write(&path, &data).await.unwrap();

        let (body, len) = UploadSource::File(path.clone()).open().await.unwrap();
        assert_eq!(len, Some(50));
        let whole: Vec<Bytes> = body.try_collect().await.unwrap();
        assert_eq!(whole.concat(), data);

        let reader = BoundedRangeReader::open(&path, Segment { start: 20, end: 30 }, 4)
            .await
            .unwrap();
        let (body, len) = UploadSource::Range(reader).open().await.unwrap();
        assert_eq!(len, Some(10));
        let part: Vec<Bytes> = body.try_collect().await.unwrap();
        assert_eq!(part.concat(), &data[20..30]);
    }
}
