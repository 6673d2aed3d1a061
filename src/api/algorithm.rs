//! Purpose: Compose algorithm calls and interpret their responses per output mode.
//! Exports: `Algorithm`, `AlgorithmInput`, `AlgorithmResponse`, `InvocationOptions`.
//! Role: Call flow is configure -> send -> (decoded | failed); nothing is retried.
//! Invariants: `timeout`, `stdout`, and `output` are always present in the query.
//! Invariants: Options are replaced wholesale; an `Algorithm` never shares them with siblings.
#![allow(clippy::result_large_err)]

use super::client::{Client, encode_json};
use super::transport::{HttpRequest, Method};
use crate::core::envelope::{
    self, AlgorithmOutput, CallKind, Envelope, OutputMode, ResponseMetadata,
};
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::path::AlgorithmReference;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

const TIMEOUT_OPTION: &str = "timeout";
const STDOUT_OPTION: &str = "stdout";
const OUTPUT_OPTION: &str = "output";
const CALL_FAILED: &str = "Algorithm call failed";

const JSON_CONTENT_TYPE: &str = "application/json";
const BYTES_CONTENT_TYPE: &str = "application/octet-stream";

/// Query options sent with every call. The timeout is advisory to the platform and
/// does not bound the local call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvocationOptions {
    timeout: u64,
    stdout: bool,
    output: OutputMode,
    extra: BTreeMap<String, String>,
}

impl InvocationOptions {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            stdout: false,
            output: OutputMode::Default,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_stdout(mut self, stdout: bool) -> Self {
        self.stdout = stdout;
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Extra query option. `timeout`, `stdout`, and `output` are shadowed by the typed fields.
    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    pub fn stdout(&self) -> bool {
        self.stdout
    }

    pub fn output(&self) -> OutputMode {
        self.output
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .extra
            .iter()
            .filter(|(name, _)| !is_reserved(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        pairs.push((TIMEOUT_OPTION.to_string(), self.timeout.to_string()));
        pairs.push((STDOUT_OPTION.to_string(), self.stdout.to_string()));
        pairs.push((OUTPUT_OPTION.to_string(), self.output.as_str().to_string()));
        pairs
    }
}

impl Default for InvocationOptions {
    fn default() -> Self {
        Self::new()
    }
}

fn is_reserved(name: &str) -> bool {
    matches!(name, TIMEOUT_OPTION | STDOUT_OPTION | OUTPUT_OPTION)
}

/// Call payload. Bytes go out as `application/octet-stream`, everything else as JSON.
#[derive(Clone, Debug, PartialEq)]
pub enum AlgorithmInput {
    Json(Value),
    Bytes(Vec<u8>),
}

impl AlgorithmInput {
    fn into_body(self) -> ApiResult<(Vec<u8>, &'static str)> {
        match self {
            AlgorithmInput::Bytes(bytes) => Ok((bytes, BYTES_CONTENT_TYPE)),
            AlgorithmInput::Json(value) => Ok((encode_json(&value)?, JSON_CONTENT_TYPE)),
        }
    }
}

impl From<Value> for AlgorithmInput {
    fn from(value: Value) -> Self {
        AlgorithmInput::Json(value)
    }
}

impl From<&str> for AlgorithmInput {
    fn from(value: &str) -> Self {
        AlgorithmInput::Json(Value::String(value.to_string()))
    }
}

impl From<String> for AlgorithmInput {
    fn from(value: String) -> Self {
        AlgorithmInput::Json(Value::String(value))
    }
}

impl From<Vec<u8>> for AlgorithmInput {
    fn from(value: Vec<u8>) -> Self {
        AlgorithmInput::Bytes(value)
    }
}

impl From<&[u8]> for AlgorithmInput {
    fn from(value: &[u8]) -> Self {
        AlgorithmInput::Bytes(value.to_vec())
    }
}

/// Outcome of a call. `async_tag`/`request_id` are set only for `Void` calls;
/// `metadata`/`result` only for `Default` and `Raw` calls.
#[derive(Clone, Debug, PartialEq)]
pub struct AlgorithmResponse {
    pub async_tag: Option<String>,
    pub request_id: Option<String>,
    pub metadata: Option<ResponseMetadata>,
    pub result: Option<AlgorithmOutput>,
}

impl AlgorithmResponse {
    /// Deserializes the result into `T`; raw bytes are read as JSON text.
    pub fn result_as<T: DeserializeOwned>(&self) -> ApiResult<T> {
        let decoded = match &self.result {
            None => serde_json::from_value(Value::Null),
            Some(AlgorithmOutput::Json(value)) => serde_json::from_value(value.clone()),
            Some(AlgorithmOutput::Bytes(bytes)) => serde_json::from_slice(bytes),
        };
        decoded.map_err(|err| {
            Error::new(ErrorKind::Platform)
                .with_message("algorithm result does not match the requested type")
                .with_source(err)
        })
    }

    fn from_envelope(envelope: Envelope) -> Self {
        match envelope {
            Envelope::Async {
                async_tag,
                request_id,
            } => Self {
                async_tag,
                request_id,
                metadata: None,
                result: None,
            },
            Envelope::Complete {
                metadata, result, ..
            } => Self {
                async_tag: None,
                request_id: None,
                metadata,
                result: Some(result),
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct Algorithm {
    client: Client,
    reference: AlgorithmReference,
    options: InvocationOptions,
}

impl Algorithm {
    pub(crate) fn new(client: Client, reference: AlgorithmReference) -> Self {
        Self {
            client,
            reference,
            options: InvocationOptions::new(),
        }
    }

    pub fn reference(&self) -> &AlgorithmReference {
        &self.reference
    }

    pub fn route(&self) -> String {
        self.reference.route()
    }

    pub fn options(&self) -> &InvocationOptions {
        &self.options
    }

    /// Same algorithm with `options` replacing the current ones entirely.
    pub fn with_options(mut self, options: InvocationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn pipe(&self, input: impl Into<AlgorithmInput>) -> ApiResult<AlgorithmResponse> {
        let route = self.route();
        let (body, content_type) = input.into().into_body()?;
        let mut request = HttpRequest::new(Method::Post, route.clone())
            .with_body(body, Some(content_type));
        request.query = self.options.to_query();

        let response = self.client.send(request)?;
        envelope::check_transport_result(
            response.status,
            &response.body,
            CALL_FAILED,
            CallKind::Algorithm,
        )
        .map_err(|err| err.with_route(route.clone()))?;

        let envelope = envelope::decode(response.status, &response.body, self.options.output)
            .and_then(Envelope::into_result)
            .map_err(|err| err.with_route(route))?;
        Ok(AlgorithmResponse::from_envelope(envelope))
    }
}
