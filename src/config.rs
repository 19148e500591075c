//! Configuration document for the stub server.
//!
//! Maps the YAML document onto the endpoint model. Every document field is
//! declared here with its default; validation happens eagerly, so a
//! [`ConfigurationSet`] built from a document is always usable.

use crate::error::{ConfigurationError, Result};
use crate::model::{
    validate_status, ConfigurationSet, EndPoint, MethodSet, Pattern, RequestSpec, ResponseSpec,
};
use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Configuration document in its mapping form.
///
/// A bare sequence of endpoints is accepted too; see [`StubDocument::parse`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StubDocument {
    /// Endpoint definitions, in precedence order
    #[serde(default)]
    pub endpoints: Vec<EndpointDefinition>,

    /// Response for requests no endpoint matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found: Option<ResponseDefinition>,
}

/// A single endpoint definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointDefinition {
    /// Request criteria
    pub request: RequestDefinition,

    /// Response to replay
    #[serde(default)]
    pub response: ResponseDefinition,
}

/// Request criteria as written in the document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RequestDefinition {
    /// Path to match (required, non-empty)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Verb or list of verbs (absent = any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<MethodField>,

    /// Expected request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<String>,

    /// File whose contents become the expected request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// `method: GET` or `method: [GET, HEAD]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodField {
    One(String),
    Many(Vec<String>),
}

impl MethodField {
    fn names(&self) -> Vec<&str> {
        match self {
            MethodField::One(name) => vec![name.as_str()],
            MethodField::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Response as written in the document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ResponseDefinition {
    /// HTTP status code (200 when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Response headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyDefinition>,
}

/// Response body: a plain scalar, or `{ base64: ... }` for binary payloads.
///
/// Numbers and booleans are taken as their YAML text.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BodyDefinition {
    Text(String),
    Base64 { base64: String },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Base64Body {
    base64: String,
}

impl<'de> Deserialize<'de> for BodyDefinition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_yaml::Value::deserialize(deserializer)? {
            serde_yaml::Value::String(text) => Ok(BodyDefinition::Text(text)),
            serde_yaml::Value::Number(number) => Ok(BodyDefinition::Text(number.to_string())),
            serde_yaml::Value::Bool(flag) => Ok(BodyDefinition::Text(flag.to_string())),
            value @ serde_yaml::Value::Mapping(_) => serde_yaml::from_value::<Base64Body>(value)
                .map(|body| BodyDefinition::Base64 {
                    base64: body.base64,
                })
                .map_err(D::Error::custom),
            _ => Err(D::Error::custom(
                "body must be a scalar or a mapping with a `base64` key",
            )),
        }
    }
}

impl BodyDefinition {
    fn to_bytes(&self) -> Result<Bytes, String> {
        match self {
            BodyDefinition::Text(content) => Ok(Bytes::from(content.clone())),
            BodyDefinition::Base64 { base64 } => base64::engine::general_purpose::STANDARD
                .decode(base64)
                .map(Bytes::from)
                .map_err(|e| format!("invalid base64: {}", e)),
        }
    }

    fn from_bytes(bytes: &Bytes) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => BodyDefinition::Text(text.to_string()),
            Err(_) => BodyDefinition::Base64 {
                base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
        }
    }
}

impl StubDocument {
    /// Parse a YAML document, either a sequence of endpoints or the mapping form.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(ConfigurationError::Parse)?;
        match value {
            serde_yaml::Value::Null => Ok(Self::default()),
            serde_yaml::Value::Sequence(_) => Ok(Self {
                endpoints: serde_yaml::from_value(value).map_err(ConfigurationError::Parse)?,
                not_found: None,
            }),
            other => serde_yaml::from_value(other).map_err(ConfigurationError::Parse),
        }
    }

    /// Validate the document and build a configuration set.
    ///
    /// Relative `request.file` paths are resolved against `base_dir`.
    pub fn into_configuration(self, base_dir: &Path) -> Result<ConfigurationSet> {
        let endpoints = self
            .endpoints
            .into_iter()
            .enumerate()
            .map(|(index, def)| def.into_endpoint(index, base_dir))
            .collect::<Result<Vec<_>>>()?;

        let mut set = ConfigurationSet::new(endpoints);
        if let Some(def) = self.not_found {
            let response = def
                .into_response()
                .map_err(|(field, message)| ConfigurationError::InvalidDefault { field, message })?;
            set = set.with_not_found(response);
        }
        Ok(set)
    }

    /// Document describing an existing configuration set.
    pub fn from_configuration(set: &ConfigurationSet) -> Self {
        Self {
            endpoints: set
                .endpoints()
                .iter()
                .map(EndpointDefinition::from_endpoint)
                .collect(),
            not_found: set.not_found().map(ResponseDefinition::from_response),
        }
    }
}

impl EndpointDefinition {
    fn into_endpoint(self, index: usize, base_dir: &Path) -> Result<EndPoint> {
        let request = self.request.into_request(index, base_dir)?;
        let response = self
            .response
            .into_response()
            .map_err(|(field, message)| ConfigurationError::endpoint(index, field, message))?;
        EndPoint::try_new(index, request, response)
    }

    fn from_endpoint(endpoint: &EndPoint) -> Self {
        Self {
            request: RequestDefinition::from_request(endpoint.request()),
            response: ResponseDefinition::from_response(endpoint.response()),
        }
    }
}

impl RequestDefinition {
    fn into_request(self, index: usize, base_dir: &Path) -> Result<RequestSpec> {
        let url = match self.url.as_deref() {
            None => return Err(ConfigurationError::endpoint(index, "request.url", "url is required")),
            Some("") => {
                return Err(ConfigurationError::endpoint(index, "request.url", "url cannot be empty"))
            }
            Some(url) => Pattern::parse(url)
                .map_err(|e| ConfigurationError::endpoint(index, "request.url", e))?,
        };

        let method = match &self.method {
            Some(field) => MethodSet::from_names(field.names())
                .map_err(|e| ConfigurationError::endpoint(index, "request.method", e))?,
            None => MethodSet::any(),
        };

        let post = self
            .post
            .as_deref()
            .map(Pattern::parse)
            .transpose()
            .map_err(|e| ConfigurationError::endpoint(index, "request.post", e))?;

        // Readable file contents take the place of `post` and are always
        // literal; an unreadable file falls back to `post`.
        let post = match &self.file {
            Some(file) => {
                let path = base_dir.join(file);
                match std::fs::read_to_string(&path) {
                    Ok(contents) => Some(Pattern::exact(contents)),
                    Err(e) => {
                        warn!(
                            endpoint = index,
                            path = %path.display(),
                            error = %e,
                            "Failed to read request file, falling back to post"
                        );
                        post
                    }
                }
            }
            None => post,
        };

        Ok(RequestSpec {
            url,
            method,
            post,
            file: self.file,
        })
    }

    fn from_request(request: &RequestSpec) -> Self {
        let names: Vec<String> = request.method.iter().map(|m| m.to_string()).collect();
        let method = match names.len() {
            0 => None,
            1 => names.into_iter().next().map(MethodField::One),
            _ => Some(MethodField::Many(names)),
        };

        Self {
            url: Some(request.url.as_str().to_string()),
            method,
            post: request.post.as_ref().map(|p| p.as_str().to_string()),
            file: request.file.clone(),
        }
    }
}

impl ResponseDefinition {
    /// Convert to a response spec; errors carry the offending field path.
    fn into_response(self) -> Result<ResponseSpec, (String, String)> {
        let status = self
            .status
            .map(parse_status)
            .transpose()
            .map_err(|message| ("response.status".to_string(), message))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let field = format!("response.headers.{}", name);
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| (field.clone(), e.to_string()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| (field.clone(), e.to_string()))?;
            if headers.contains_key(&header_name) {
                return Err((field, "duplicate header name".to_string()));
            }
            headers.insert(header_name, header_value);
        }

        let body = self
            .body
            .as_ref()
            .map(BodyDefinition::to_bytes)
            .transpose()
            .map_err(|message| ("response.body".to_string(), message))?;

        Ok(ResponseSpec {
            status,
            headers,
            body,
        })
    }

    fn from_response(response: &ResponseSpec) -> Self {
        Self {
            status: response.status.map(|s| s.as_u16()),
            headers: response
                .headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
            body: response.body.as_ref().map(BodyDefinition::from_bytes),
        }
    }
}

fn parse_status(code: u16) -> Result<StatusCode, String> {
    let status =
        StatusCode::from_u16(code).map_err(|_| format!("invalid status code: {}", code))?;
    validate_status(status)?;
    Ok(status)
}

/// Load a configuration set from document text.
///
/// Relative `request.file` paths resolve against the working directory.
pub fn load_configuration(text: &str) -> Result<ConfigurationSet> {
    StubDocument::parse(text)?.into_configuration(Path::new("."))
}

/// Load a configuration set from a YAML file.
///
/// Relative `request.file` paths resolve against the file's directory.
pub fn load_configuration_file(path: &Path) -> Result<ConfigurationSet> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    StubDocument::parse(&content)?.into_configuration(base_dir)
}

impl ConfigurationSet {
    /// Serialize back to a YAML document in the mapping form.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&StubDocument::from_configuration(self))
            .map_err(ConfigurationError::Serialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use std::io::Write;

    const BASIC_CONFIG: &str = r#"
- request:
    url: /
    method: GET
    post: name=Bob&email=bob@example.com
  response:
    status: 200
    headers:
      Content-Type: application/json
      Access-Control-Allow-Origin: "*"
      server: stubbedServer/4.2
"#;

    #[test]
    fn test_parse_sequence_document() {
        let set = load_configuration(BASIC_CONFIG).unwrap();
        assert_eq!(set.len(), 1);

        let endpoint = &set.endpoints()[0];
        assert_eq!(endpoint.request().url.as_str(), "/");
        assert!(endpoint.request().method.matches(&Method::GET));
        assert!(!endpoint.request().method.matches(&Method::POST));
        assert_eq!(
            endpoint.request().post.as_ref().map(Pattern::as_str),
            Some("name=Bob&email=bob@example.com")
        );

        let response = endpoint.response();
        assert_eq!(response.status, Some(StatusCode::OK));
        assert_eq!(response.headers.len(), 3);
        assert_eq!(response.headers["content-type"], "application/json");
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(response.headers["Server"], "stubbedServer/4.2");
        assert!(response.body.is_none());
    }

    #[test]
    fn test_parse_mapping_document() {
        let yaml = r#"
endpoints:
  - request:
      url: /users
      method: [get, post]
    response:
      status: 201
      body: '{"name":"Bob"}'
not_found:
  status: 418
  body: no stub here
"#;
        let set = load_configuration(yaml).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.endpoints()[0].request().method.iter().count(), 2);
        assert_eq!(
            set.endpoints()[0].response().body.as_deref(),
            Some(&b"{\"name\":\"Bob\"}"[..])
        );
        let not_found = set.not_found().unwrap();
        assert_eq!(not_found.status, Some(StatusCode::IM_A_TEAPOT));
    }

    #[test]
    fn test_folded_body() {
        let yaml = r#"
- request:
    url: /
  response:
    headers:
      Content-Type: application/json
    body: >
      {"name":"Bob"}
"#;
        let set = load_configuration(yaml).unwrap();
        let response = set.endpoints()[0].response();
        assert_eq!(response.status, None);
        assert_eq!(response.body.as_deref(), Some(&b"{\"name\":\"Bob\"}\n"[..]));
    }

    #[test]
    fn test_base64_body() {
        let yaml = r#"
- request:
    url: /bin
  response:
    body:
      base64: AAEC/w==
"#;
        let set = load_configuration(yaml).unwrap();
        assert_eq!(
            set.endpoints()[0].response().body.as_deref(),
            Some(&[0x00, 0x01, 0x02, 0xff][..])
        );
    }

    #[test]
    fn test_empty_document() {
        assert!(load_configuration("").unwrap().is_empty());
        assert!(load_configuration("[]").unwrap().is_empty());
        assert!(load_configuration("endpoints: []").unwrap().is_empty());
    }

    #[test]
    fn test_missing_url_names_index() {
        let yaml = r#"
- request:
    url: /ok
- request:
    method: GET
"#;
        let err = load_configuration(yaml).unwrap_err();
        assert_eq!(err.endpoint_index(), Some(1));
        assert!(err.to_string().contains("request.url"));
    }

    #[test]
    fn test_empty_url_rejected() {
        let err = load_configuration("- request:\n    url: ''\n").unwrap_err();
        assert_eq!(err.endpoint_index(), Some(0));
    }

    #[test]
    fn test_invalid_status_rejected() {
        let yaml = r#"
- request:
    url: /
  response:
    status: 600
"#;
        let err = load_configuration(yaml).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidEndpoint { index: 0, ref field, .. } if field == "response.status"
        ));

        let yaml = "- request:\n    url: /\n  response:\n    status: 99\n";
        assert!(load_configuration(yaml).is_err());
    }

    #[test]
    fn test_case_insensitive_duplicate_headers_rejected() {
        let yaml = r#"
- request:
    url: /
  response:
    headers:
      Content-Type: text/plain
      content-type: application/json
"#;
        let err = load_configuration(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate header"));
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let yaml = "- request:\n    url: /\n  response:\n    headers:\n      \"bad header\": x\n";
        let err = load_configuration(yaml).unwrap_err();
        assert!(err.to_string().contains("response.headers.bad header"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = load_configuration("- request:\n    url: '^/users/('\n").unwrap_err();
        assert!(err.to_string().contains("request.url"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "- request:\n    url: /\n    query: x\n";
        assert!(matches!(
            load_configuration(yaml),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        assert!(matches!(
            load_configuration("- request: [unclosed"),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_not_found_rejected() {
        let yaml = "endpoints: []\nnot_found:\n  status: 42\n";
        assert!(matches!(
            load_configuration(yaml),
            Err(ConfigurationError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn test_request_file_replaces_post() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("body.xml"), "<user>Bob</user>").unwrap();

        let config_path = dir.path().join("stubs.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            "- request:\n    url: /\n    method: POST\n    post: ignored\n    file: body.xml"
        )
        .unwrap();

        let set = load_configuration_file(&config_path).unwrap();
        let request = set.endpoints()[0].request();
        assert_eq!(request.post.as_ref().map(Pattern::as_str), Some("<user>Bob</user>"));
        assert_eq!(request.file.as_deref(), Some(Path::new("body.xml")));
    }

    #[test]
    fn test_unreadable_request_file_falls_back_to_post() {
        let yaml = r#"
- request:
    url: /
    method: GET
    post: name=Bob&email=bob@example.com
    file: homePageRequest.xml
  response:
    status: 200
    headers:
      Content-Type: application/json
"#;
        let set = load_configuration(yaml).unwrap();
        let request = set.endpoints()[0].request();
        assert_eq!(
            request.post.as_ref().map(Pattern::as_str),
            Some("name=Bob&email=bob@example.com")
        );
        assert_eq!(request.file.as_deref(), Some(Path::new("homePageRequest.xml")));

        let reloaded = load_configuration(&set.to_yaml().unwrap()).unwrap();
        assert_eq!(reloaded, set);
    }

    #[test]
    fn test_unreadable_request_file_without_post() {
        let set = load_configuration("- request:\n    url: /\n    file: missing.xml\n").unwrap();
        assert!(set.endpoints()[0].request().post.is_none());
    }

    #[test]
    fn test_scalar_bodies_keep_yaml_text() {
        let yaml = r#"
- request:
    url: /n
  response:
    body: 42
- request:
    url: /f
  response:
    body: 1.5
- request:
    url: /b
  response:
    body: true
"#;
        let set = load_configuration(yaml).unwrap();
        let bodies: Vec<&[u8]> = set
            .endpoints()
            .iter()
            .map(|e| e.response().body.as_deref().unwrap())
            .collect();
        assert_eq!(bodies, vec![&b"42"[..], &b"1.5"[..], &b"true"[..]]);
    }

    #[test]
    fn test_sequence_body_rejected() {
        let yaml = "- request:\n    url: /\n  response:\n    body: [1, 2]\n";
        assert!(matches!(
            load_configuration(yaml),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn test_sample_configuration_loads() {
        let set = load_configuration(include_str!("../demos/default-config.yaml")).unwrap();
        assert_eq!(set.len(), 6);
        assert!(set.not_found().is_none());
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_configuration_file(Path::new("/nonexistent/stubs.yaml")).unwrap_err();
        assert!(matches!(err, ConfigurationError::Io { .. }));
    }

    #[test]
    fn test_round_trip_preserves_order_and_fields() {
        let yaml = r#"
- request:
    url: /first
    method: [GET, HEAD]
  response:
    status: 304
    headers:
      ETag: abc
- request:
    url: ^/users/\d+$
    method: POST
    post: name=Bob
  response:
    status: 201
    headers:
      Content-Type: application/json
    body: '{"id":1}'
- request:
    url: /bin
  response:
    body:
      base64: //79
"#;
        let original = load_configuration(yaml).unwrap();
        assert_eq!(original.len(), 3);

        let serialized = original.to_yaml().unwrap();
        let reloaded = load_configuration(&serialized).unwrap();
        assert_eq!(reloaded, original);

        let urls: Vec<&str> = reloaded
            .endpoints()
            .iter()
            .map(|e| e.request().url.as_str())
            .collect();
        assert_eq!(urls, vec!["/first", r"^/users/\d+$", "/bin"]);
    }
}
