//! Container/object name validation and URL path encoding.

use crate::errors::{StorageError, StorageResult};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

pub const MAX_CONTAINER_NAME_LEN: usize = 256;

/// Everything except unreserved characters and `/` gets escaped.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Validate a container name and return it encoded for use in a path.
///
/// A single leading `/` is tolerated and stripped. Empty names, names that
/// still contain `/`, and names over 256 bytes are rejected before any
/// request is built.
pub fn clean_container_name(name: &str) -> StorageResult<String> {
    let trimmed = name.strip_prefix('/').unwrap_or(name);
    let invalid = |reason: &str| StorageError::InvalidContainerName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("cannot be empty"));
    }
    if trimmed.contains('/') {
        return Err(invalid("cannot contain slashes"));
    }
    if trimmed.len() > MAX_CONTAINER_NAME_LEN {
        return Err(invalid("cannot be longer than 256 bytes"));
    }

    Ok(encode_path(trimmed))
}

pub fn encode_object_name(name: &str) -> String {
    encode_path(name)
}

fn encode_path(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

/// Name of the `index`-th part of a manifest upload: `{object}/{index:08}`.
pub fn part_name(object_name: &str, index: u64) -> String {
    format!("{}/{:08}", object_name, index)
}

/// `X-Object-Manifest` value tying the parts of `object` together.
pub fn manifest_prefix(container: &str, object: &str) -> String {
    format!("{}/{}/", container, object)
}

/// Request path for an object, with both names encoded.
pub fn object_path(container: &str, object: &str) -> StorageResult<String> {
    Ok(format!(
        "/{}/{}",
        clean_container_name(container)?,
        encode_object_name(object)
    ))
}

pub fn container_path(container: &str) -> StorageResult<String> {
    Ok(format!("/{}", clean_container_name(container)?))
}
