//! Marker-based pagination exposed as one lazy, ordered sequence.
//!
//! Each page is a separate request, so the sequence is a snapshot per page
//! rather than of the whole listing: objects created or deleted while a
//! cursor is being drained may be seen twice or not at all.

use crate::{
    errors::{StorageError, StorageResult},
    models::{ListingEntry, ListingPage},
    transport::{Transport, TransportRequest},
};
use futures::{Stream, stream};
use reqwest::{Method, StatusCode};
use std::{collections::VecDeque, sync::Arc};
use tracing::debug;

pub struct PaginatedListingCursor<T, E> {
    transport: Arc<T>,
    /// Encoded request path: `/{container}` or empty for the account.
    path: String,
    container: String,
    marker: Option<String>,
    exhausted: bool,
    buffered: VecDeque<E>,
    requests: usize,
}

impl<T, E> PaginatedListingCursor<T, E>
where
    T: Transport,
    E: ListingEntry,
{
    pub(crate) fn new(transport: Arc<T>, path: String, container: String) -> Self {
        Self {
            transport,
            path,
            container,
            marker: None,
            exhausted: false,
            buffered: VecDeque::new(),
            requests: 0,
        }
    }

    /// Marker that will be sent with the next page request.
    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// True once the server has signalled the end and every entry was taken.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.buffered.is_empty()
    }

    /// Number of page requests issued so far.
    pub fn requests_issued(&self) -> usize {
        self.requests
    }

    /// Forget all progress so the next read starts from the first page.
    pub fn restart(&mut self) {
        self.marker = None;
        self.exhausted = false;
        self.buffered.clear();
    }

    /// Fetch the next page from the server.
    ///
    /// Returns `None` without a request once the listing is exhausted. Pages
    /// share the cursor position with [`next`](Self::next): entries already
    /// buffered by `next` are not returned again here.
    pub async fn next_page(&mut self) -> StorageResult<Option<ListingPage<E>>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut request = TransportRequest::new(Method::GET, self.path.clone());
        if let Some(marker) = &self.marker {
            request = request.query("marker", marker.clone());
        }

        self.requests += 1;
        let response = self.transport.request(request).await?;
        let page = match response.status {
            StatusCode::NO_CONTENT => ListingPage::last_page(),
            StatusCode::OK => {
                let wire: Vec<E::Wire> = response.json().await?;
                let entries = wire
                    .into_iter()
                    .map(|entry| E::from_wire(entry, &self.container))
                    .collect();
                // An OK page with nothing in it also ends the listing.
                ListingPage::from_entries(entries)
            }
            other => return Err(StorageError::unexpected(other)),
        };

        debug!(
            "listing page for `{}`: {} entries after marker {:?}, exhausted={}",
            self.container,
            page.entries.len(),
            self.marker,
            page.exhausted
        );

        self.exhausted = page.exhausted;
        if page.marker.is_some() {
            self.marker = page.marker.clone();
        }
        Ok(Some(page))
    }

    /// Next entry in listing order, fetching another page when needed.
    pub async fn next(&mut self) -> StorageResult<Option<E>> {
        loop {
            if let Some(entry) = self.buffered.pop_front() {
                return Ok(Some(entry));
            }
            match self.next_page().await? {
                Some(page) => self.buffered.extend(page.entries),
                None => return Ok(None),
            }
        }
    }

    /// Drain the remaining listing into memory.
    pub async fn collect_all(mut self) -> StorageResult<Vec<E>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next().await? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Pull-based stream over the remaining entries; ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = StorageResult<E>> + Send
    where
        T: 'static,
    {
        stream::try_unfold(self, |mut cursor| async move {
            let entry = cursor.next().await?;
            Ok::<_, StorageError>(entry.map(|entry| (entry, cursor)))
        })
    }
}
