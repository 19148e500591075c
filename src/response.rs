//! Response synthesis.
//!
//! Replays an endpoint's canned response literally: no templating and no
//! implicit headers.

use crate::model::ResponseSpec;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// A fully resolved response, ready to be written by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcreteResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ConcreteResponse {
    /// Case-insensitive `Content-Type` lookup.
    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.headers.get(header::CONTENT_TYPE)
    }
}

/// Build the outgoing response for a response spec.
pub fn build(spec: &ResponseSpec) -> ConcreteResponse {
    ConcreteResponse {
        status: spec.status.unwrap_or(StatusCode::OK),
        headers: spec.headers.clone(),
        body: spec.body.clone().unwrap_or_default(),
    }
}

/// Built-in response for unmatched requests, used when the document defines
/// no `not_found`.
pub fn not_found() -> ConcreteResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    ConcreteResponse {
        status: StatusCode::NOT_FOUND,
        headers,
        body: Bytes::from(
            serde_json::json!({
                "error": "not_found",
                "message": "No matching stub found",
            })
            .to_string(),
        ),
    }
}

impl IntoResponse for ConcreteResponse {
    fn into_response(self) -> Response {
        // Built by hand so axum does not add a Content-Type for the body.
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
