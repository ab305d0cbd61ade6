//! Splits a file into contiguous byte ranges for multipart uploads.

use crate::errors::{StorageError, StorageResult};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Half-open byte range `[start, end)` over a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub end: u64,
}

impl Segment {
    /// Range `[start, end)`; an `end` before `start` yields an empty range.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lazy, finite sequence of segments covering a file exactly once.
///
/// Every segment is `chunk_size` bytes long except the last, which is
/// clipped to whatever remains. The file size is sampled once, when the
/// segmenter is opened. Once exhausted it stays exhausted; build a new
/// segmenter for another pass.
#[derive(Debug)]
pub struct ChunkedFileSegmenter {
    path: PathBuf,
    total: u64,
    chunk_size: u64,
    cursor: u64,
}

impl ChunkedFileSegmenter {
    /// Open `path` and prepare to cut it into `chunk_size` byte segments.
    pub async fn open(path: impl Into<PathBuf>, chunk_size: u64) -> StorageResult<Self> {
        let path = path.into();
        let total = fs::metadata(&path).await?.len();
        Self::with_size(path, total, chunk_size)
    }

    /// Build a segmenter for a source of known size.
    pub fn with_size(path: impl Into<PathBuf>, total: u64, chunk_size: u64) -> StorageResult<Self> {
        if chunk_size == 0 {
            return Err(StorageError::InvalidChunkSize);
        }
        Ok(Self {
            path: path.into(),
            total,
            chunk_size,
            cursor: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_size(&self) -> u64 {
        self.total
    }

    /// Number of segments a full pass yields: `ceil(total / chunk_size)`.
    pub fn segment_count(&self) -> u64 {
        self.total.div_ceil(self.chunk_size)
    }
}

impl Iterator for ChunkedFileSegmenter {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.cursor >= self.total {
            return None;
        }
        let start = self.cursor;
        let end = start.saturating_add(self.chunk_size).min(self.total);
        self.cursor = end;
        Some(Segment::new(start, end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.cursor).div_ceil(self.chunk_size) as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(total: u64, chunk: u64) -> Vec<Segment> {
        ChunkedFileSegmenter::with_size("unused", total, chunk)
            .unwrap()
            .collect()
    }

    #[test]
    fn partitions_without_gaps_or_overlap() {
        for total in [1u64, 7, 10, 25, 99, 100, 101] {
            for chunk in [1u64, 3, 10, 64, 200] {
                let segs = segments(total, chunk);
                assert_eq!(segs.len() as u64, total.div_ceil(chunk));
                assert_eq!(segs.first().unwrap().start, 0);
                assert_eq!(segs.last().unwrap().end, total);
                for pair in segs.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start);
                }
                let last_len = if total % chunk == 0 { chunk } else { total % chunk };
                assert_eq!(segs.last().unwrap().len(), last_len);
                assert!(segs.iter().all(|s| !s.is_empty()));
            }
        }
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let segs = segments(30, 10);
        assert_eq!(
            segs,
            vec![
                Segment { start: 0, end: 10 },
                Segment { start: 10, end: 20 },
                Segment { start: 20, end: 30 },
            ]
        );
    }

    #[test]
    fn inverted_range_is_empty() {
        let seg = Segment { start: 10, end: 5 };
        assert_eq!(seg.len(), 0);
        assert!(seg.is_empty());
        assert_eq!(Segment::new(10, 5), Segment { start: 10, end: 10 });
    }

    #[test]
    fn empty_file_yields_nothing() {
        assert!(segments(0, 10).is_empty());
    }

    #[test]
    fn stays_exhausted() {
        let mut segmenter = ChunkedFileSegmenter::with_size("unused", 5, 4).unwrap();
        assert_eq!(segmenter.size_hint(), (2, Some(2)));
        assert!(segmenter.next().is_some());
        assert!(segmenter.next().is_some());
        assert!(segmenter.next().is_none());
        assert!(segmenter.next().is_none());
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let err = ChunkedFileSegmenter::with_size("unused", 5, 0).unwrap_err();
        assert!(matches!(err, StorageError::InvalidChunkSize));
    }

    #[tokio::test]
    async fn open_reads_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        tokio::fs::write(&path, vec![7u8; 25]).await.unwrap();

        let segmenter = ChunkedFileSegmenter::open(&path, 10).await.unwrap();
        assert_eq!(segmenter.total_size(), 25);
        assert_eq!(segmenter.segment_count(), 3);
        assert_eq!(segmenter.path(), path.as_path());
    }
}
