//! Forward-only reader over one segment of a file.

use super::segmenter::Segment;
use bytes::{Bytes, BytesMut};
use futures::{Stream, stream};
use std::{
    io::{self, SeekFrom},
    path::Path,
};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};

/// Block size used when streaming file ranges.
pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024;

/// Reads `[start, end)` of a file in blocks of at most `block_size` bytes.
///
/// The file handle is held only while bytes remain: it is closed as soon as
/// the last block is returned, on the first I/O error, or when the reader
/// is dropped part-way through.
#[derive(Debug)]
pub struct BoundedRangeReader {
    file: Option<File>,
    segment: Segment,
    block_size: usize,
    bytes_read: u64,
}

impl BoundedRangeReader {
    /// Open `path` and position it at `segment.start`.
    pub async fn open(path: &Path, segment: Segment, block_size: usize) -> io::Result<Self> {
        if block_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "block size must be greater than zero",
            ));
        }
        let mut file = File::open(path).await?;
        file.seek(SeekFrom::Start(segment.start)).await?;
        let file = if segment.is_empty() { None } else { Some(file) };
        Ok(Self {
            file,
            segment,
            block_size,
            bytes_read: 0,
        })
    }

    pub fn segment(&self) -> Segment {
        self.segment
    }

    pub fn remaining(&self) -> u64 {
        self.segment.len().saturating_sub(self.bytes_read)
    }

    /// True while the underlying file handle is still open.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Read the next block, or `None` once the range is exhausted.
    pub async fn next_block(&mut self) -> io::Result<Option<Bytes>> {
        let want = self.remaining().min(self.block_size as u64) as usize;
        let Some(file) = self.file.as_mut() else {
            return Ok(None);
        };

        let mut buf = BytesMut::zeroed(want);
        if let Err(err) = file.read_exact(&mut buf).await {
            self.file = None;
            return Err(err);
        }
        self.bytes_read += want as u64;
        if self.remaining() == 0 {
            self.file = None;
        }
        Ok(Some(buf.freeze()))
    }

    /// Turn the reader into a byte stream suitable for a request body.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        stream::try_unfold(self, |mut reader| async move {
            let block = reader.next_block().await?;
            Ok::<_, io::Error>(block.map(|block| (block, reader)))
        })
    }
}
