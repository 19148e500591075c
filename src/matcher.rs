//! Request matching logic.
//!
//! Selects the endpoint that answers an incoming request.

use crate::model::{ConfigurationSet, EndPoint, RequestSpec};
use axum::body::Bytes;
use axum::http::{HeaderMap, Method};

/// Transport-independent view of an incoming request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Request path, without query string
    pub path: String,
    /// Carried along for logging; not used for matching
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Outcome of matching a request against a configuration set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchResult<'a> {
    Matched {
        /// Position of the endpoint in the set
        index: usize,
        endpoint: &'a EndPoint,
    },
    NoMatch,
}

impl<'a> MatchResult<'a> {
    pub fn endpoint(&self) -> Option<&'a EndPoint> {
        match self {
            MatchResult::Matched { endpoint, .. } => Some(endpoint),
            MatchResult::NoMatch => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }
}

/// Find the first endpoint, in declaration order, that matches the request.
pub fn select<'a>(set: &'a ConfigurationSet, request: &RequestDescriptor) -> MatchResult<'a> {
    set.endpoints()
        .iter()
        .enumerate()
        .find(|(_, endpoint)| matches_request(endpoint.request(), request))
        .map(|(index, endpoint)| MatchResult::Matched { index, endpoint })
        .unwrap_or(MatchResult::NoMatch)
}

/// Whether a single endpoint's criteria accept the request.
pub fn matches_request(spec: &RequestSpec, request: &RequestDescriptor) -> bool {
    if !spec.url.matches(request.path.as_bytes()) {
        return false;
    }

    if !spec.method.matches(&request.method) {
        return false;
    }

    // A missing body compares as empty.
    if let Some(post) = &spec.post {
        let body = request.body.as_deref().unwrap_or_default();
        if !post.matches(body) {
            return false;
        }
    }

    true
}
