//! Streaming client for Swift-style object storage.
//!
//! Files are uploaded with their digest computed while the body is sent,
//! large files are split into manifest-linked parts, downloads land in a
//! temporary file before being moved into place, and listings are walked
//! lazily one page at a time.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod transfer;
pub mod transport;

pub use config::ClientConfig;
pub use errors::{StorageError, StorageResult};
pub use models::{AccountInfo, Container, DownloadResult, Object, ObjectExtra, UploadResult};
pub use services::{MultipartState, MultipartUpload, PaginatedListingCursor, StorageClient};
pub use transfer::DigestAlgorithm;
pub use transport::{ByteStream, HttpTransport, Transport, TransportRequest, TransportResponse};
