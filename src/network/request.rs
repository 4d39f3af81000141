//! Request and response shapes shared by every transport

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

/// Anything that can perform an HTTP request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform `request`, returning whatever status the upstream produced
    ///
    /// # Errors
    ///
    /// Returns `GolderError::Network` when no response was received at all
    async fn send(&self, request: &RequestSpec) -> Result<Response>;
}

/// Options accompanying a request, passed through to the transport untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// HTTP method
    pub method: String,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Query parameters appended to the URL
    pub query: Vec<(String, String)>,
    /// Request body
    pub body: Bytes,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            headers: Vec::new(),
            query: Vec::new(),
            body: Bytes::new(),
        }
    }
}

impl RequestOptions {
    /// Add a request header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// A request as issued by code under test
///
/// The variant also records the calling convention: `Simple` callers want
/// the body back, `WithOptions` callers want the full response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestSpec {
    /// Plain GET of a URL
    Simple(String),
    /// URL plus transport options
    WithOptions(String, RequestOptions),
}

impl RequestSpec {
    /// Target URL, used as the route key
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Simple(url) | Self::WithOptions(url, _) => url,
        }
    }

    /// Options, if the caller supplied any
    #[must_use]
    pub fn options(&self) -> Option<&RequestOptions> {
        match self {
            Self::Simple(_) => None,
            Self::WithOptions(_, options) => Some(options),
        }
    }
}

/// A complete HTTP response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers keyed by lowercased name
    ///
    /// `HttpTransport` joins repeated headers into one value: `, ` in
    /// general, `\n` for `set-cookie`.
    pub headers: BTreeMap<String, String>,
    /// Response body
    pub body: Bytes,
}

impl Response {
    /// Whether the status marks a failure worth reconciling
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status >= 400
    }
}
