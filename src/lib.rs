//! Stub Server
//!
//! A configuration-driven HTTP stub server. Endpoints are declared in a
//! YAML document; each request is answered by the first endpoint whose
//! criteria match, replaying its canned response verbatim.
//!
//! # Features
//!
//! - **Request Matching**: Match by path, verb set and request body
//! - **First Match Wins**: Declaration order decides between overlapping endpoints
//! - **Literal Responses**: Status, headers and body are replayed as written
//! - **Patterns**: `url` and `post` values starting with `^` are regular expressions
//! - **Hot Reload**: The active configuration is swapped atomically on SIGHUP
//!
//! # Example Configuration
//!
//! ```yaml
//! - request:
//!     url: /hello
//!     method: GET
//!   response:
//!     status: 200
//!     headers:
//!       Content-Type: text/plain
//!     body: Hello, World!
//! ```

pub mod config;
pub mod error;
pub mod matcher;
pub mod model;
pub mod response;
pub mod server;

pub use config::{load_configuration, load_configuration_file};
pub use error::ConfigurationError;
pub use matcher::{select, MatchResult, RequestDescriptor};
pub use model::{ConfigurationSet, EndPoint, RequestSpec, ResponseSpec};
pub use response::ConcreteResponse;
pub use server::StubServer;
