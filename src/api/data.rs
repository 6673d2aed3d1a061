//! Purpose: Path-addressed file and directory operations against the data API.
//! Exports: `DataFile`, `DataDirectory`.
//! Role: Whole-body reads/writes, deletes, directory creation, and ACL management.
//! Invariants: Every call runs the data-flavored status check; failures are `DataApi` or `Platform`.
//! Invariants: Directory creation is addressed to the parent route; file writes to the file's own route.
//! Invariants: Cached size/mtime are only known for files produced by a listing.
#![allow(clippy::result_large_err)]

use super::client::Client;
use super::listing::{DirectoryListing, FileListing};
use crate::core::acl::{AclWire, ReadAcl};
use crate::core::envelope::{self, CallKind, STATUS_OK};
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::path::{DATA_ROUTE_PREFIX, DataPath};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use time::OffsetDateTime;

const PUT_FAILED: &str = "Updating file failed";
const GET_FAILED: &str = "Getting file failed";
const DELETE_FAILED: &str = "Delete failed";
const CREATE_DIR_FAILED: &str = "Error creating data directory";
const DELETE_DIR_FAILED: &str = "Error deleting data directory";
const UPDATE_ACL_FAILED: &str = "Error updating data directory ACLs";
const GET_ACL_FAILED: &str = "Error getting data directory ACLs";

#[derive(Clone, Debug)]
pub struct DataFile {
    client: Client,
    path: DataPath,
    size: Option<u64>,
    last_modified: Option<OffsetDateTime>,
}

impl DataFile {
    pub(crate) fn new(client: Client, path: DataPath) -> Self {
        Self {
            client,
            path,
            size: None,
            last_modified: None,
        }
    }

    pub(crate) fn with_attributes(mut self, size: u64, last_modified: OffsetDateTime) -> Self {
        self.size = Some(size);
        self.last_modified = Some(last_modified);
        self
    }

    pub fn path(&self) -> &DataPath {
        &self.path
    }

    pub fn route(&self) -> String {
        self.path.route()
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Size in bytes as reported by a directory listing; `None` otherwise.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Modification time as reported by a directory listing; `None` otherwise.
    pub fn last_modified(&self) -> Option<OffsetDateTime> {
        self.last_modified
    }

    pub fn exists(&self) -> ApiResult<bool> {
        Ok(self.client.head(&self.route())? == STATUS_OK)
    }

    pub fn put_bytes(&self, bytes: impl Into<Vec<u8>>) -> ApiResult<&Self> {
        let route = self.route();
        let response = self.client.put(&route, bytes.into())?;
        check_data(response.status, &response.body, PUT_FAILED, &route)?;
        Ok(self)
    }

    pub fn put_string(&self, text: &str) -> ApiResult<&Self> {
        self.put_bytes(text.as_bytes())
    }

    /// Drains `reader` and uploads the contents in one request.
    pub fn put_reader(&self, mut reader: impl Read) -> ApiResult<&Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read upload source")
                .with_route(self.route())
                .with_source(err)
        })?;
        self.put_bytes(bytes)
    }

    pub fn get_bytes(&self) -> ApiResult<Vec<u8>> {
        let route = self.route();
        let response = self.client.get(&route, &[])?;
        check_data(response.status, &response.body, GET_FAILED, &route)?;
        Ok(response.body)
    }

    pub fn get_string(&self) -> ApiResult<String> {
        let route = self.route();
        String::from_utf8(self.get_bytes()?).map_err(|err| {
            Error::new(ErrorKind::Platform)
                .with_message("file contents are not valid utf-8")
                .with_route(route)
                .with_source(err)
        })
    }

    /// Downloads into an anonymous temporary file positioned at its start.
    pub fn get_file(&self) -> ApiResult<File> {
        let bytes = self.get_bytes()?;
        let io_error = |err: std::io::Error| {
            Error::new(ErrorKind::Io)
                .with_message("failed to stage download in a temporary file")
                .with_route(self.route())
                .with_source(err)
        };
        let mut file = tempfile::tempfile().map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        file.seek(SeekFrom::Start(0)).map_err(io_error)?;
        Ok(file)
    }

    pub fn delete(&self) -> ApiResult<()> {
        let route = self.route();
        let response = self.client.delete(&route, &[])?;
        check_data(response.status, &response.body, DELETE_FAILED, &route)
    }
}

#[derive(Clone, Debug)]
pub struct DataDirectory {
    client: Client,
    path: DataPath,
}

#[derive(Serialize)]
struct CreateDirectoryRequest<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    acl: Option<AclWire>,
}

#[derive(Serialize)]
struct UpdateDirectoryRequest {
    acl: AclWire,
}

#[derive(Deserialize)]
struct DataResponse {
    #[serde(default)]
    acl: Option<AclWire>,
}

impl DataDirectory {
    pub(crate) fn new(client: Client, path: DataPath) -> Self {
        Self { client, path }
    }

    pub fn path(&self) -> &DataPath {
        &self.path
    }

    pub fn route(&self) -> String {
        self.path.route()
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn parent(&self) -> &str {
        self.path.parent()
    }

    pub fn file(&self, child: &str) -> ApiResult<DataFile> {
        let path = self.path.child(child, true)?;
        Ok(DataFile::new(self.client.clone(), path))
    }

    pub fn dir(&self, child: &str) -> ApiResult<DataDirectory> {
        let path = self.path.child(child, false)?;
        Ok(DataDirectory::new(self.client.clone(), path))
    }

    pub fn exists(&self) -> ApiResult<bool> {
        Ok(self.client.head(&self.route())? == STATUS_OK)
    }

    /// POSTs `{name, acl?}` to the parent's route; the server applies its default ACL
    /// when `acl` is `None`.
    pub fn create(&self, acl: Option<ReadAcl>) -> ApiResult<&Self> {
        let parent_route = format!("{DATA_ROUTE_PREFIX}{}", self.parent());
        let payload = CreateDirectoryRequest {
            name: self.name(),
            acl: acl.map(AclWire::from),
        };
        let response = self.client.post_json(&parent_route, &payload)?;
        check_data(
            response.status,
            &response.body,
            CREATE_DIR_FAILED,
            &parent_route,
        )?;
        Ok(self)
    }

    /// Non-empty directories are only removed with `force`; the server enforces it.
    pub fn delete(&self, force: bool) -> ApiResult<&Self> {
        let route = self.route();
        let query: &[(&str, &str)] = if force { &[("force", "true")] } else { &[] };
        let response = self.client.delete(&route, query)?;
        check_data(response.status, &response.body, DELETE_DIR_FAILED, &route)?;
        Ok(self)
    }

    pub fn update_permissions(&self, acl: ReadAcl) -> ApiResult<&Self> {
        let route = self.route();
        let payload = UpdateDirectoryRequest {
            acl: AclWire::from(acl),
        };
        let response = self.client.patch_json(&route, &payload)?;
        check_data(response.status, &response.body, UPDATE_ACL_FAILED, &route)?;
        Ok(self)
    }

    /// `None` when the server reports no ACL or one outside the known presets.
    pub fn permissions(&self) -> ApiResult<Option<ReadAcl>> {
        let route = self.route();
        let response = self.client.get(&route, &[("acl", "true")])?;
        check_data(response.status, &response.body, GET_ACL_FAILED, &route)?;
        let decoded: DataResponse = serde_json::from_slice(&response.body).map_err(|err| {
            Error::new(ErrorKind::Platform)
                .with_message("invalid data response json")
                .with_route(route.clone())
                .with_source(err)
        })?;
        Ok(decoded.acl.as_ref().and_then(AclWire::decode))
    }

    /// Lazily pages through the files in this directory.
    pub fn files(&self) -> FileListing {
        FileListing::new(self.client.clone(), self.path.clone())
    }

    /// Lazily pages through the subdirectories of this directory.
    pub fn dirs(&self) -> DirectoryListing {
        DirectoryListing::new(self.client.clone(), self.path.clone())
    }
}

pub(crate) fn check_data(status: u16, body: &[u8], default_message: &str, route: &str) -> ApiResult<()> {
    envelope::check_transport_result(status, body, default_message, CallKind::Data)
        .map_err(|err| err.with_route(route))
}
