// Reference validation and normalization into canonical API routes.
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::error::{ApiResult, Error, ErrorKind};

pub const ALGO_ROUTE_PREFIX: &str = "/v1/algo/";
pub const DATA_ROUTE_PREFIX: &str = "/v1/data/";

const ALGO_SCHEME: &str = "algo://";
const DATA_SCHEME: &str = "data://";

static ALGO_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)/(\w+)(?:/(\w+))?$").expect("algorithm reference pattern")
});

/// An `owner/name[/version]` algorithm identifier.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AlgorithmReference {
    owner: String,
    name: String,
    version: Option<String>,
}

impl AlgorithmReference {
    /// Accepts an optional `algo://` or single leading `/` before `owner/name[/version]`.
    pub fn parse(reference: &str) -> ApiResult<Self> {
        let stripped = reference
            .strip_prefix(ALGO_SCHEME)
            .or_else(|| reference.strip_prefix('/'))
            .unwrap_or(reference);
        if stripped.is_empty() {
            return Err(Error::new(ErrorKind::InvalidReference)
                .with_message("algorithm reference must not be empty"));
        }
        let captures = ALGO_REFERENCE.captures(stripped).ok_or_else(|| {
            Error::new(ErrorKind::InvalidReference)
                .with_message(format!("invalid algorithm reference: {reference}"))
        })?;
        Ok(Self {
            owner: captures[1].to_string(),
            name: captures[2].to_string(),
            version: captures.get(3).map(|m| m.as_str().to_string()),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn route(&self) -> String {
        format!("{ALGO_ROUTE_PREFIX}{self}")
    }
}

impl fmt::Display for AlgorithmReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)?;
        if let Some(version) = &self.version {
            write!(f, "/{version}")?;
        }
        Ok(())
    }
}

/// Normalized data path: no `data://` marker, no leading or trailing slash, never empty.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DataPath(String);

impl DataPath {
    pub fn file(reference: &str) -> ApiResult<Self> {
        Self::parse(reference, true)
    }

    pub fn directory(reference: &str) -> ApiResult<Self> {
        Self::parse(reference, false)
    }

    /// The trailing-slash check for files runs before trimming, so `x/` is not a file
    /// while `x//` is a valid directory spelling of `x`.
    pub fn parse(reference: &str, is_file: bool) -> ApiResult<Self> {
        let stripped = reference
            .strip_prefix(DATA_SCHEME)
            .or_else(|| reference.strip_prefix('/'))
            .unwrap_or(reference);
        if is_file && stripped.ends_with('/') {
            return Err(Error::new(ErrorKind::InvalidReference)
                .with_message(format!("invalid file path ending: {stripped}")));
        }
        let trimmed = stripped.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(Error::new(ErrorKind::InvalidReference)
                .with_message(format!("data path cannot be empty: {reference}")));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn route(&self) -> String {
        format!("{DATA_ROUTE_PREFIX}{}", self.0)
    }

    /// Everything after the last `/`.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Everything before the last `/`; empty for a top-level entry.
    pub fn parent(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Plain `parent/child` concatenation; `/` inside `child` is not escaped.
    pub fn child(&self, child: &str, is_file: bool) -> ApiResult<Self> {
        Self::parse(&format!("{}/{child}", self.0), is_file)
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn resolve_algorithm_path(reference: &str) -> ApiResult<String> {
    AlgorithmReference::parse(reference).map(|reference| reference.route())
}

pub fn resolve_data_path(reference: &str, is_file: bool) -> ApiResult<String> {
    DataPath::parse(reference, is_file).map(|path| path.route())
}
