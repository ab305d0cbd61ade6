//! Wire shapes of JSON listings and the page type the cursor produces.

use super::{Container, Object, parse_timestamp};
use serde::{Deserialize, de::DeserializeOwned};
use std::collections::BTreeMap;

/// One page of a marker-paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage<T> {
    pub entries: Vec<T>,
    /// Identity of the last entry, sent as `marker` for the next page.
    pub marker: Option<String>,
    pub exhausted: bool,
}

impl<T: ListingEntry> ListingPage<T> {
    pub fn last_page() -> Self {
        Self {
            entries: Vec::new(),
            marker: None,
            exhausted: true,
        }
    }

    pub fn from_entries(entries: Vec<T>) -> Self {
        match entries.last() {
            Some(last) => Self {
                marker: Some(last.marker().to_string()),
                entries,
                exhausted: false,
            },
            None => Self::last_page(),
        }
    }
}

/// An entity that can appear in a listing.
pub trait ListingEntry: Sized + Send + 'static {
    /// JSON element shape of one listing entry.
    type Wire: DeserializeOwned + Send;

    /// `container` is the listed container, or empty for account listings.
    fn from_wire(wire: Self::Wire, container: &str) -> Self;

    fn marker(&self) -> &str;
}

#[derive(Debug, Deserialize)]
pub struct ContainerEntry {
    pub name: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub bytes: u64,
}

#[derive(Debug, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
    #[serde(default)]
    pub bytes: u64,
    pub hash: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
}

impl ListingEntry for Container {
    type Wire = ContainerEntry;

    fn from_wire(wire: ContainerEntry, _container: &str) -> Self {
        Container {
            name: wire.name,
            object_count: wire.count,
            size: wire.bytes,
        }
    }

    fn marker(&self) -> &str {
        &self.name
    }
}

impl ListingEntry for Object {
    type Wire = ObjectEntry;

    fn from_wire(wire: ObjectEntry, container: &str) -> Self {
        Object {
            name: wire.name,
            container: container.to_string(),
            size: wire.bytes,
            hash: wire.hash,
            content_type: wire.content_type,
            last_modified: wire.last_modified.as_deref().and_then(parse_timestamp),
            meta_data: BTreeMap::new(),
        }
    }

    fn marker(&self) -> &str {
        &self.name
    }
}
