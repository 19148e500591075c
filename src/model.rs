//! Endpoint model and configuration set.
//!
//! These are the validated, in-memory forms of a stub definition. The YAML
//! schema that produces them lives in [`crate::config`].

use crate::error::{ConfigurationError, Result};
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use regex::bytes::Regex;
use std::path::PathBuf;

/// A value compared against request data.
///
/// Values starting with `^` are anchored regular expressions; everything
/// else is compared byte-for-byte.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Option<Regex>,
}

impl Pattern {
    /// Literal pattern, never interpreted as a regex.
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            source: value.into(),
            regex: None,
        }
    }

    /// Parse a document value, compiling it when it starts with `^`.
    pub fn parse(value: &str) -> Result<Self, regex::Error> {
        let regex = if value.starts_with('^') {
            Some(Regex::new(value)?)
        } else {
            None
        };
        Ok(Self {
            source: value.to_string(),
            regex,
        })
    }

    /// The value as written in the document.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_regex(&self) -> bool {
        self.regex.is_some()
    }

    pub fn matches(&self, input: &[u8]) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(input),
            None => self.source.as_bytes() == input,
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.is_regex() == other.is_regex()
    }
}

/// Set of HTTP verbs an endpoint answers. Empty means any verb.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodSet(Vec<Method>);

impl MethodSet {
    pub fn any() -> Self {
        Self::default()
    }

    /// Build from verb names, normalizing them to upper case.
    pub fn from_names<I, S>(names: I) -> Result<Self, axum::http::method::InvalidMethod>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut methods: Vec<Method> = Vec::new();
        for name in names {
            let method = Method::from_bytes(name.as_ref().trim().to_ascii_uppercase().as_bytes())?;
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        Ok(Self(methods))
    }

    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Method> {
        self.0.iter()
    }

    /// Case-insensitive membership; an empty set matches everything.
    pub fn matches(&self, method: &Method) -> bool {
        self.is_any()
            || self
                .0
                .iter()
                .any(|m| m.as_str().eq_ignore_ascii_case(method.as_str()))
    }
}

/// Match criteria for one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    /// Request path to match
    pub url: Pattern,
    /// Verbs to match (empty = any)
    pub method: MethodSet,
    /// Expected request body
    pub post: Option<Pattern>,
    /// File the expected body was read from
    pub file: Option<PathBuf>,
}

impl RequestSpec {
    /// Criteria matching any verb on an exact path.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Pattern::exact(url),
            method: MethodSet::any(),
            post: None,
            file: None,
        }
    }
}

/// Canned response for one endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSpec {
    /// Status code (200 when absent)
    pub status: Option<StatusCode>,
    /// Response headers, case-insensitive by construction
    pub headers: HeaderMap,
    /// Response payload (empty when absent)
    pub body: Option<Bytes>,
}

impl ResponseSpec {
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// One configured stub: criteria plus canned response.
#[derive(Debug, Clone, PartialEq)]
pub struct EndPoint {
    request: RequestSpec,
    response: ResponseSpec,
}

impl EndPoint {
    /// Validate and build an endpoint; `index` is its document position.
    pub fn try_new(index: usize, request: RequestSpec, response: ResponseSpec) -> Result<Self> {
        if request.url.as_str().is_empty() {
            return Err(ConfigurationError::endpoint(
                index,
                "request.url",
                "url cannot be empty",
            ));
        }
        if let Some(status) = response.status {
            validate_status(status)
                .map_err(|message| ConfigurationError::endpoint(index, "response.status", message))?;
        }
        Ok(Self { request, response })
    }

    pub fn request(&self) -> &RequestSpec {
        &self.request
    }

    pub fn response(&self) -> &ResponseSpec {
        &self.response
    }
}

/// Reject codes outside 100-599.
pub(crate) fn validate_status(status: StatusCode) -> Result<(), String> {
    if (100..=599).contains(&status.as_u16()) {
        Ok(())
    } else {
        Err(format!("invalid status code: {}", status.as_u16()))
    }
}

/// Ordered, immutable collection of endpoints.
///
/// Declaration order is match precedence. A set is never edited after
/// construction; a reload builds a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationSet {
    endpoints: Vec<EndPoint>,
    not_found: Option<ResponseSpec>,
}

impl ConfigurationSet {
    pub fn new(endpoints: Vec<EndPoint>) -> Self {
        Self {
            endpoints,
            not_found: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the built-in response for unmatched requests.
    pub fn with_not_found(mut self, response: ResponseSpec) -> Self {
        self.not_found = Some(response);
        self
    }

    pub fn endpoints(&self) -> &[EndPoint] {
        &self.endpoints
    }

    pub fn not_found(&self) -> Option<&ResponseSpec> {
        self.not_found.as_ref()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
