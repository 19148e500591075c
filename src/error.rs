//! Error types for configuration loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Raised while building a configuration set from a document.
///
/// Each variant is one error kind. Matching never produces one of these:
/// once an endpoint is in the active set it is structurally valid.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The configuration document could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed YAML or does not fit the schema.
    #[error("invalid configuration document: {0}")]
    Parse(#[source] serde_yaml::Error),

    /// One endpoint failed validation.
    #[error("endpoint {index}: {field}: {message}")]
    InvalidEndpoint {
        /// Position of the endpoint in the document (0-based)
        index: usize,
        /// Document field path, e.g. `request.url`
        field: String,
        message: String,
    },

    /// The configured `not_found` response failed validation.
    #[error("not_found: {field}: {message}")]
    InvalidDefault { field: String, message: String },

    /// The configuration set could not be written back out.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

impl ConfigurationError {
    pub(crate) fn endpoint(index: usize, field: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidEndpoint {
            index,
            field: field.into(),
            message: message.to_string(),
        }
    }

    /// Index of the offending endpoint, if the error concerns one.
    pub fn endpoint_index(&self) -> Option<usize> {
        match self {
            Self::InvalidEndpoint { index, .. } => Some(*index),
            _ => None,
        }
    }
}

pub type Result<T, E = ConfigurationError> = std::result::Result<T, E>;
