//! Purpose: Define the synchronous "send request, get status + bytes" seam and its ureq implementation.
//! Exports: `Transport`, `UreqTransport`, `HttpRequest`, `HttpResponse`, `Method`.
//! Role: The only place that touches the network; everything above it sees plain bytes.
//! Invariants: Non-2xx statuses are returned as responses, never as errors.
//! Invariants: Only connect/read failures surface as `ErrorKind::Io`.
#![allow(clippy::result_large_err)]

use crate::core::error::{ApiResult, Error, ErrorKind};
use std::fmt;
use std::io::Read;
use url::Url;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute API route such as `/v1/algo/demo/hello`.
    pub route: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
    /// Sent verbatim as `Authorization`; `None` when the client has no key.
    pub credential: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, route: impl Into<String>) -> Self {
        Self {
            method,
            route: route.into(),
            query: Vec::new(),
            body: None,
            content_type: None,
            credential: None,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>, content_type: Option<&str>) -> Self {
        self.body = Some(body);
        self.content_type = content_type.map(str::to_string);
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> ApiResult<HttpResponse>;
}

/// Blocking transport over a shared `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    base_url: Url,
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn with_agent(mut self, agent: ureq::Agent) -> Self {
        self.agent = agent;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn build_url(&self, request: &HttpRequest) -> ApiResult<Url> {
        build_url(&self.base_url, &request.route, &request.query)
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> ApiResult<HttpResponse> {
        let url = self.build_url(request)?;
        let mut call = self.agent.request(request.method.as_str(), url.as_str());
        if let Some(credential) = &request.credential {
            call = call.set("Authorization", credential);
        }
        if let Some(content_type) = &request.content_type {
            call = call.set("Content-Type", content_type);
        }
        let outcome = match &request.body {
            Some(body) => call.send_bytes(body),
            None => call.call(),
        };
        let response = match outcome {
            Ok(resp) => resp,
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(err)) => {
                return Err(Error::new(ErrorKind::Io)
                    .with_message("request failed")
                    .with_route(request.route.clone())
                    .with_source(err));
            }
        };
        let status = response.status();
        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read response body")
                .with_route(request.route.clone())
                .with_status(status)
                .with_source(err)
        })?;
        Ok(HttpResponse { status, body })
    }
}

/// Replaces the base address's path with the segments of `route`, each percent-encoded
/// so `#`, `?` and `%` in a name stay part of the path. `.` and `..` segments are dropped.
/// Query pairs are form-encoded (`?` before the first, `&` between the rest).
pub(crate) fn build_url(base_url: &Url, route: &str, query: &[(String, String)]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::InvalidReference)
                .with_message("api address cannot be a base")
                .with_route(route)
        })?;
        path.clear();
        for segment in route.split('/').filter(|segment| !segment.is_empty()) {
            path.push(segment);
        }
    }
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query {
            pairs.append_pair(name, value);
        }
    }
    Ok(url)
}
