//! Client-side storage operations built on a [`Transport`](crate::transport::Transport).

pub mod listing;
pub mod multipart;
pub mod naming;
pub mod storage_service;

pub use listing::PaginatedListingCursor;
pub use multipart::{MultipartState, MultipartUpload};
pub use storage_service::StorageClient;
