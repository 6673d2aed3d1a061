//! Purpose: Pull-driven iteration over paginated directory listings.
//! Exports: `Listing`, `FileListing`, `DirectoryListing`.
//! Role: Hides the continuation marker; each `files()`/`dirs()` call starts a fresh walk.
//! Invariants: A page is fetched only when the previous page's entries are exhausted.
//! Invariants: Only an absent marker ends the walk; empty pages with a marker keep paging.
//! Invariants: After an error the listing is finished and yields nothing further.
#![allow(clippy::result_large_err)]

use super::client::Client;
use super::data::{DataDirectory, DataFile, check_data};
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::path::DataPath;
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const LIST_FAILED: &str = "Error listing data directory";
const MARKER_PARAM: &str = "marker";

#[derive(Deserialize)]
pub(crate) struct ListingPage {
    #[serde(default)]
    files: Vec<FileEntry>,
    #[serde(default)]
    folders: Vec<FolderEntry>,
    #[serde(default)]
    marker: Option<String>,
}

#[derive(Deserialize)]
struct FileEntry {
    filename: String,
    last_modified: String,
    size: u64,
}

#[derive(Deserialize)]
struct FolderEntry {
    name: String,
}

type SelectEntries<E> = fn(&Client, &DataPath, ListingPage) -> ApiResult<Vec<E>>;

/// Forward-only cursor over one kind of directory entry. Not meant to be shared
/// between consumers; ask the directory for another listing instead.
pub struct Listing<E> {
    client: Client,
    directory: DataPath,
    marker: Option<String>,
    pending: VecDeque<E>,
    pages_fetched: usize,
    finished: bool,
    select: SelectEntries<E>,
}

pub type FileListing = Listing<DataFile>;
pub type DirectoryListing = Listing<DataDirectory>;

impl FileListing {
    pub(crate) fn new(client: Client, directory: DataPath) -> Self {
        Listing::start(client, directory, select_files)
    }
}

impl DirectoryListing {
    pub(crate) fn new(client: Client, directory: DataPath) -> Self {
        Listing::start(client, directory, select_folders)
    }
}

impl<E> Listing<E> {
    fn start(client: Client, directory: DataPath, select: SelectEntries<E>) -> Self {
        Self {
            client,
            directory,
            marker: None,
            pending: VecDeque::new(),
            pages_fetched: 0,
            finished: false,
            select,
        }
    }

    /// Number of pages requested so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// A page holding an entry with an invalid name or timestamp fails as a whole and
    /// finishes the listing.
    pub fn next_entry(&mut self) -> ApiResult<Option<E>> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Ok(Some(entry));
            }
            if self.finished {
                return Ok(None);
            }
            if let Err(err) = self.fetch_page() {
                self.finished = true;
                return Err(err);
            }
        }
    }

    fn fetch_page(&mut self) -> ApiResult<()> {
        let route = self.directory.route();
        let query: Vec<(&str, &str)> = match &self.marker {
            Some(marker) => vec![(MARKER_PARAM, marker.as_str())],
            None => Vec::new(),
        };
        let response = self.client.get(&route, &query)?;
        self.pages_fetched += 1;
        check_data(response.status, &response.body, LIST_FAILED, &route)?;
        let page: ListingPage = serde_json::from_slice(&response.body).map_err(|err| {
            Error::new(ErrorKind::Platform)
                .with_message("invalid directory listing json")
                .with_route(route.clone())
                .with_source(err)
        })?;

        self.marker = page.marker.clone();
        self.finished = self.marker.is_none();
        let entries = (self.select)(&self.client, &self.directory, page)?;
        tracing::debug!(
            route = %route,
            page = self.pages_fetched,
            entries = entries.len(),
            more = !self.finished,
            "fetched listing page"
        );
        self.pending.extend(entries);
        Ok(())
    }
}

impl<E> Iterator for Listing<E> {
    type Item = ApiResult<E>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

impl<E> fmt::Debug for Listing<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listing")
            .field("directory", &self.directory.as_str())
            .field("pending", &self.pending.len())
            .field("pages_fetched", &self.pages_fetched)
            .field("finished", &self.finished)
            .finish()
    }
}

fn select_files(client: &Client, directory: &DataPath, page: ListingPage) -> ApiResult<Vec<DataFile>> {
    page.files
        .into_iter()
        .map(|entry| {
            let path = directory.child(&entry.filename, true)?;
            let modified = parse_timestamp(&entry.last_modified, &path)?;
            Ok(DataFile::new(client.clone(), path).with_attributes(entry.size, modified))
        })
        .collect()
}

fn select_folders(
    client: &Client,
    directory: &DataPath,
    page: ListingPage,
) -> ApiResult<Vec<DataDirectory>> {
    page.folders
        .into_iter()
        .map(|entry| {
            let path = directory.child(&entry.name, false)?;
            Ok(DataDirectory::new(client.clone(), path))
        })
        .collect()
}

fn parse_timestamp(raw: &str, path: &DataPath) -> ApiResult<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|err| {
        Error::new(ErrorKind::Platform)
            .with_message(format!("invalid last_modified timestamp: {raw}"))
            .with_route(path.route())
            .with_source(err)
    })
}
