use crate::{FmError, Result};
use async_trait::async_trait;
use http_client::{HttpClient, Request};
use http_types::{Method, Url};
use std::sync::Arc;

const USER_AGENT: &str = concat!("scrobble-harvest/", env!("CARGO_PKG_VERSION"));

/// One GET request against the Last.fm web services endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Endpoint, e.g. `https://ws.audioscrobbler.com/2.0/`
    pub base_url: String,
    /// Query parameters in insertion order
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(base_url: impl Into<String>, query: Vec<(String, String)>) -> Self {
        Self {
            base_url: base_url.into(),
            query,
        }
    }

    /// Value of the first query parameter named `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The Last.fm method this request invokes.
    pub fn method(&self) -> &str {
        self.param("method").unwrap_or_default()
    }

    /// Full URL with a percent-encoded query string.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            return self.base_url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.base_url)
    }
}

/// Status and body of a transport response; the body is not interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request/response capability the retrieval engine runs on.
///
/// Implementations only move bytes: they must return every HTTP status as a
/// [`RawResponse`] and reserve `Err` for failures where no response arrived.
///
/// # Mocking Support
///
/// When the `mock` feature is enabled, this crate provides `MockTransport`
/// generated by `mockall`.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait Transport {
    async fn get(&self, request: &ApiRequest) -> Result<RawResponse>;
}

/// [`Transport`] backed by any [`HttpClient`] implementation.
#[derive(Clone)]
pub struct HttpTransport {
    client: Arc<dyn HttpClient + Send + Sync>,
}

impl HttpTransport {
    pub fn new(client: Box<dyn HttpClient + Send + Sync>) -> Self {
        Self {
            client: Arc::from(client),
        }
    }
}

#[async_trait(?Send)]
impl Transport for HttpTransport {
    async fn get(&self, request: &ApiRequest) -> Result<RawResponse> {
        let url = request
            .url()
            .parse::<Url>()
            .map_err(|e| FmError::Http(format!("invalid request URL: {e}")))?;

        let mut http_request = Request::new(Method::Get, url);
        http_request.insert_header("User-Agent", USER_AGENT);
        http_request.insert_header("Accept", "application/json");

        let mut response = self
            .client
            .send(http_request)
            .await
            .map_err(|e| FmError::Http(e.to_string()))?;

        let status: u16 = response.status().into();
        let body = response
            .body_string()
            .await
            .map_err(|e| FmError::Http(e.to_string()))?;

        Ok(RawResponse { status, body })
    }
}
