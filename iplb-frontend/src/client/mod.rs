//! Clients for the remote load-balancer API.
//!
//! The reconciler only depends on the [`ApiClient`] contract:
//! - `get`: fetch a JSON document
//! - `post`: submit a JSON body and return the created document
//! - `put`: replace a document
//! - `delete`: remove a document
//!
//! [`RestClient`] implements it over HTTP.

pub mod error;
pub mod rest;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

pub use error::ApiError;
pub use rest::RestClient;

/// HTTP verbs used against the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Contract of the generic remote API client.
///
/// Paths are relative to the API root, e.g. `/ipLoadbalancing/lb-1/http/frontend`.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Fetch the document at `path`.
    async fn get(&self, path: &str) -> Result<Value, ApiError>;

    /// Submit `body` to `path` and return the document the remote created.
    async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError>;

    /// Replace the document at `path` with `body`.
    async fn put(&self, path: &str, body: Value) -> Result<(), ApiError>;

    /// Delete the document at `path`.
    async fn delete(&self, path: &str) -> Result<(), ApiError>;
}
