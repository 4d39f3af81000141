//! HTTP transport that performs real network requests

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, SET_COOKIE};
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use super::request::{RequestOptions, RequestSpec, Response, Transport};
use crate::{GolderError, Result};

/// Pooled HTTP/1 and HTTP/2 transport for `http://` URLs
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpTransport {
    /// Create a new HTTP transport
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build_http();

        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RequestSpec) -> Result<Response> {
        let defaults = RequestOptions::default();
        let options = request.options().unwrap_or(&defaults);

        let uri = build_uri(request.url(), &options.query)?;
        debug!("Sending {} {}", options.method, uri);

        let method = options.method.parse::<Method>().map_err(|e| {
            GolderError::Network(format!("Invalid HTTP method '{}': {e}", options.method))
        })?;

        let mut request_builder = Request::builder().method(method).uri(uri);
        for (name, value) in &options.headers {
            request_builder = request_builder.header(name, value);
        }

        let http_request = request_builder
            .body(Full::new(options.body.clone()))
            .map_err(|e| GolderError::Network(format!("Failed to build request: {e}")))?;

        let response = self.client.request(http_request).await.map_err(|e| {
            warn!("Request to {} failed: {e}", request.url());
            GolderError::Network(format!("Request failed: {e}"))
        })?;

        let status = response.status().as_u16();
        let headers = flatten_headers(response.headers());

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| GolderError::Network(format!("Failed to read response body: {e}")))?
            .to_bytes();

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

/// Collapse a header map to one value per name
///
/// Repeated headers are joined with `, `, except `set-cookie`, whose values
/// may contain commas and are joined with `\n` instead.
fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match flat.get_mut(name.as_str()) {
            Some(existing) => {
                existing.push_str(if *name == SET_COOKIE { "\n" } else { ", " });
                existing.push_str(&value);
            }
            None => {
                flat.insert(name.as_str().to_string(), value.into_owned());
            }
        }
    }

    flat
}

/// Append encoded query parameters to a URL and parse it
fn build_uri(url: &str, query: &[(String, String)]) -> Result<Uri> {
    let full = if query.is_empty() {
        url.to_string()
    } else {
        let encoded: Vec<String> = query
            .iter()
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect();
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}{}", encoded.join("&"))
    };

    full.parse::<Uri>()
        .map_err(|e| GolderError::Network(format!("Invalid URI '{full}': {e}")))
}
