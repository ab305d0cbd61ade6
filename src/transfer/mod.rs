//! Streaming building blocks for moving object bodies: file segmentation,
//! bounded range reads, and hash-while-sending request bodies.

pub mod digest;
pub mod hashing;
pub mod range_reader;
pub mod segmenter;

pub use digest::{DigestAlgorithm, Digester};
pub use hashing::{HashingUploadPipe, PipeReceipt, PipeReport, UploadSource};
pub use range_reader::{BoundedRangeReader, DEFAULT_BLOCK_SIZE};
pub use segmenter::{ChunkedFileSegmenter, Segment};
