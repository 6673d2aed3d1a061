//! Purpose: Hold the immutable client configuration and hand out algorithm and data handles.
//! Exports: `Client`, `API_ADDRESS_ENV`, `DEFAULT_API_ADDRESS`.
//! Role: Entry point for callers; owns the transport and the credential.
//! Invariants: Address resolution order is explicit argument, then `ALGORITHMIA_API`, then the default.
//! Invariants: Handles share only this immutable state; no per-call state lives here.
#![allow(clippy::result_large_err)]

use super::algorithm::Algorithm;
use super::data::{DataDirectory, DataFile};
use super::transport::{HttpRequest, HttpResponse, Method, Transport, UreqTransport};
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::path::{AlgorithmReference, DataPath};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use url::Url;

pub const API_ADDRESS_ENV: &str = "ALGORITHMIA_API";
pub const DEFAULT_API_ADDRESS: &str = "https://api.algorithmia.com";

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    address: Url,
    api_key: Option<String>,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Client for the address named by `ALGORITHMIA_API`, or the public endpoint.
    pub fn new(api_key: impl Into<String>) -> ApiResult<Self> {
        Self::build(api_key.into(), None, None)
    }

    pub fn with_address(api_key: impl Into<String>, address: impl Into<String>) -> ApiResult<Self> {
        Self::build(api_key.into(), Some(address.into()), None)
    }

    /// Client that sends every request through `transport` instead of the built-in ureq agent.
    pub fn with_transport(
        api_key: impl Into<String>,
        address: Option<String>,
        transport: Arc<dyn Transport>,
    ) -> ApiResult<Self> {
        Self::build(api_key.into(), address, Some(transport))
    }

    fn build(
        api_key: String,
        address: Option<String>,
        transport: Option<Arc<dyn Transport>>,
    ) -> ApiResult<Self> {
        let env_address = std::env::var(API_ADDRESS_ENV).ok();
        let address = normalize_address(&resolve_address(address, env_address))?;
        let transport =
            transport.unwrap_or_else(|| Arc::new(UreqTransport::new(address.clone())));
        let api_key = (!api_key.is_empty()).then_some(api_key);
        tracing::debug!(address = %address, authenticated = api_key.is_some(), "client configured");
        Ok(Self {
            inner: Arc::new(ClientInner {
                address,
                api_key,
                transport,
            }),
        })
    }

    pub fn address(&self) -> &Url {
        &self.inner.address
    }

    pub fn algo(&self, reference: &str) -> ApiResult<Algorithm> {
        let reference = AlgorithmReference::parse(reference)?;
        Ok(Algorithm::new(self.clone(), reference))
    }

    pub fn file(&self, path: &str) -> ApiResult<DataFile> {
        let path = DataPath::file(path)?;
        Ok(DataFile::new(self.clone(), path))
    }

    pub fn dir(&self, path: &str) -> ApiResult<DataDirectory> {
        let path = DataPath::directory(path)?;
        Ok(DataDirectory::new(self.clone(), path))
    }

    pub(crate) fn send(&self, mut request: HttpRequest) -> ApiResult<HttpResponse> {
        request.credential = self.inner.api_key.clone();
        tracing::debug!(
            method = %request.method,
            route = %request.route,
            query_pairs = request.query.len(),
            body_len = request.body.as_ref().map_or(0, Vec::len),
            "sending request"
        );
        let response = self.inner.transport.send(&request)?;
        tracing::debug!(
            method = %request.method,
            route = %request.route,
            status = response.status,
            body_len = response.body.len(),
            "received response"
        );
        Ok(response)
    }

    pub(crate) fn head(&self, route: &str) -> ApiResult<u16> {
        self.send(HttpRequest::new(Method::Head, route))
            .map(|response| response.status)
    }

    pub(crate) fn get(&self, route: &str, query: &[(&str, &str)]) -> ApiResult<HttpResponse> {
        self.send(with_query(HttpRequest::new(Method::Get, route), query))
    }

    pub(crate) fn delete(&self, route: &str, query: &[(&str, &str)]) -> ApiResult<HttpResponse> {
        self.send(with_query(HttpRequest::new(Method::Delete, route), query))
    }

    pub(crate) fn put(&self, route: &str, body: Vec<u8>) -> ApiResult<HttpResponse> {
        self.send(HttpRequest::new(Method::Put, route).with_body(body, None))
    }

    pub(crate) fn post_json<T: Serialize>(&self, route: &str, body: &T) -> ApiResult<HttpResponse> {
        let payload = encode_json(body)?;
        self.send(HttpRequest::new(Method::Post, route).with_body(payload, Some(JSON_CONTENT_TYPE)))
    }

    pub(crate) fn patch_json<T: Serialize>(&self, route: &str, body: &T) -> ApiResult<HttpResponse> {
        let payload = encode_json(body)?;
        self.send(
            HttpRequest::new(Method::Patch, route).with_body(payload, Some(JSON_CONTENT_TYPE)),
        )
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.inner.address.as_str())
            .field("authenticated", &self.inner.api_key.is_some())
            .finish()
    }
}

fn with_query(mut request: HttpRequest, query: &[(&str, &str)]) -> HttpRequest {
    for (name, value) in query {
        request = request.with_query(*name, *value);
    }
    request
}

pub(crate) fn encode_json<T: Serialize>(body: &T) -> ApiResult<Vec<u8>> {
    serde_json::to_vec(body).map_err(|err| {
        Error::new(ErrorKind::Platform)
            .with_message("failed to encode request json")
            .with_source(err)
    })
}

fn resolve_address(explicit: Option<String>, env_address: Option<String>) -> String {
    explicit
        .or(env_address)
        .unwrap_or_else(|| DEFAULT_API_ADDRESS.to_string())
}

fn normalize_address(raw: &str) -> ApiResult<Url> {
    let mut url = Url::parse(raw).map_err(|err| {
        Error::new(ErrorKind::InvalidReference)
            .with_message(format!("invalid api address: {raw}"))
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::InvalidReference)
            .with_message("api address must use http or https scheme"));
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
