// Response envelope decoding and error classification for algorithm and data calls.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

use crate::core::error::{ApiResult, Error, ErrorKind};

pub const STATUS_OK: u16 = 200;

const BINARY_CONTENT_TYPE: &str = "binary";
const UNDECODABLE_RESULT: &str = "could not decode result from the API server";

/// How the platform should shape an algorithm's output.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum OutputMode {
    /// JSON envelope with metadata and a typed result.
    #[default]
    Default,
    /// The response body is the result, untouched.
    Raw,
    /// Fire-and-forget; only an async acknowledgment comes back.
    Void,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputMode::Default => "default",
            OutputMode::Raw => "raw",
            OutputMode::Void => "void",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "default" => Ok(OutputMode::Default),
            "raw" => Ok(OutputMode::Raw),
            "void" => Ok(OutputMode::Void),
            other => Err(Error::new(ErrorKind::Platform)
                .with_message(format!("unknown output mode: {other}"))),
        }
    }
}

/// Which failure kind a non-OK status maps to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallKind {
    Algorithm,
    Data,
}

impl CallKind {
    fn error_kind(self) -> ErrorKind {
        match self {
            CallKind::Algorithm => ErrorKind::Algorithm,
            CallKind::Data => ErrorKind::DataApi,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub timing: Option<BTreeMap<String, f64>>,
}

/// Result payload of a completed call.
#[derive(Clone, Debug, PartialEq)]
pub enum AlgorithmOutput {
    Json(Value),
    Bytes(Vec<u8>),
}

impl AlgorithmOutput {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            AlgorithmOutput::Json(value) => Some(value),
            AlgorithmOutput::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AlgorithmOutput::Json(_) => None,
            AlgorithmOutput::Bytes(bytes) => Some(bytes),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }
}

/// Error object embedded in an algorithm envelope.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct RemoteAlgorithmError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stacktrace: Option<String>,
}

impl RemoteAlgorithmError {
    /// `message`, then `stacktrace: ...` on its own line when a trace is present.
    pub fn describe(&self) -> String {
        let mut text = self.message.clone().unwrap_or_default();
        if let Some(trace) = &self.stacktrace {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("stacktrace: ");
            text.push_str(trace);
        }
        text
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Envelope {
    /// Acknowledgment for a `Void` call.
    Async {
        async_tag: Option<String>,
        request_id: Option<String>,
    },
    Complete {
        metadata: Option<ResponseMetadata>,
        result: AlgorithmOutput,
        error: Option<RemoteAlgorithmError>,
    },
}

impl Envelope {
    /// Turns an envelope-carried error into an `Algorithm` failure.
    pub fn into_result(self) -> ApiResult<Self> {
        match self {
            Envelope::Complete {
                error: Some(error), ..
            } => Err(Error::new(ErrorKind::Algorithm).with_message(error.describe())),
            other => Ok(other),
        }
    }
}

#[derive(Deserialize)]
struct AsyncWire {
    #[serde(default, rename = "async")]
    async_tag: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    error: Option<RemoteAlgorithmError>,
}

#[derive(Deserialize)]
struct CompleteWire {
    #[serde(default)]
    metadata: Option<ResponseMetadata>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RemoteAlgorithmError>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Decodes a success body according to `mode`. Raw bodies are wrapped as-is.
pub fn decode(status: u16, body: &[u8], mode: OutputMode) -> ApiResult<Envelope> {
    match mode {
        OutputMode::Raw => Ok(Envelope::Complete {
            metadata: None,
            result: AlgorithmOutput::Bytes(body.to_vec()),
            error: None,
        }),
        OutputMode::Void => {
            let wire: AsyncWire = parse_body(status, body)?;
            if let Some(error) = wire.error {
                return Err(Error::new(ErrorKind::Algorithm)
                    .with_message(error.describe())
                    .with_status(status));
            }
            Ok(Envelope::Async {
                async_tag: wire.async_tag,
                request_id: wire.request_id,
            })
        }
        OutputMode::Default => {
            let wire: CompleteWire = parse_body(status, body)?;
            let result = match &wire.metadata {
                Some(metadata) if metadata.content_type == BINARY_CONTENT_TYPE => {
                    AlgorithmOutput::Bytes(decode_binary_result(status, &wire.result)?)
                }
                _ => AlgorithmOutput::Json(wire.result),
            };
            Ok(Envelope::Complete {
                metadata: wire.metadata,
                result,
                error: wire.error,
            })
        }
    }
}

/// OK passes. Otherwise the body is read as `{error:{message}}`; a message yields a
/// `call`-specific error, anything else degrades to `Platform` with `default_message`.
pub fn check_transport_result(
    status: u16,
    body: &[u8],
    default_message: &str,
    call: CallKind,
) -> ApiResult<()> {
    if status == STATUS_OK {
        return Ok(());
    }
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: Some(ErrorBody {
                message: Some(reason),
            }),
        }) => Err(Error::new(call.error_kind())
            .with_message(format!("{default_message} - reason: {reason}"))
            .with_status(status)),
        Ok(_) => Err(Error::new(ErrorKind::Platform)
            .with_message(default_message)
            .with_status(status)),
        Err(err) => {
            tracing::warn!(status, error = %err, "unreadable error body; using default message");
            Err(Error::new(ErrorKind::Platform)
                .with_message(default_message)
                .with_status(status))
        }
    }
}

fn parse_body<T>(status: u16, body: &[u8]) -> ApiResult<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_slice(body).map_err(|err| {
        Error::new(ErrorKind::Platform)
            .with_message(UNDECODABLE_RESULT)
            .with_status(status)
            .with_source(err)
    })
}

fn decode_binary_result(status: u16, result: &Value) -> ApiResult<Vec<u8>> {
    let encoded = result.as_str().ok_or_else(|| {
        Error::new(ErrorKind::Platform)
            .with_message(UNDECODABLE_RESULT)
            .with_status(status)
    })?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|err| {
            Error::new(ErrorKind::Platform)
                .with_message(UNDECODABLE_RESULT)
                .with_status(status)
                .with_source(err)
        })
}
