//! HTTP transport seam.
//!
//! Operations never talk to `reqwest` directly; they hand an [`HttpRequest`]
//! to a [`Transport`]. Production code uses [`ReqwestTransport`], built once
//! per process so the connection pool is reused. Tests substitute fakes that
//! count calls.

use crate::result::{ProviderResponse, ToolError};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Default per-request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("spoon-toolkit/", env!("CARGO_PKG_VERSION"));

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, ToolError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether repeating the call has no upstream effect.
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Status and body of a completed exchange.
pub type HttpResponse = ProviderResponse;

/// Sends requests. Implementations must enforce `HttpRequest::timeout`.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the default user agent.
    pub fn new() -> Result<Self, ToolError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| ToolError::invalid_config("http_client", e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let url = if request.query.is_empty() {
                reqwest::Url::parse(&request.url)
            } else {
                reqwest::Url::parse_with_params(&request.url, &request.query)
            }
            .map_err(|e| ToolError::invalid_argument("url", format!("{}: {e}", request.url)))?;

            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Put => reqwest::Method::PUT,
                HttpMethod::Delete => reqwest::Method::DELETE,
            };

            debug!(
                "HTTP request: {} {} (timeout {:.0}s)",
                request.method,
                url.path(),
                request.timeout.as_secs_f64()
            );

            let mut builder = self
                .client
                .request(method, url)
                .timeout(request.timeout)
                .header("Accept", "application/json");
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let start = Instant::now();
            let resp = builder
                .send()
                .await
                .map_err(|e| transport_error(e, request.timeout))?;

            let status = resp.status().as_u16();
            let retry_after = header_str(&resp, "retry-after")
                .and_then(|v| parse_retry_after(v, chrono::Utc::now()));
            let request_id = header_str(&resp, "x-request-id").map(str::to_string);
            let body = resp
                .text()
                .await
                .map_err(|e| transport_error(e, request.timeout))?;

            debug!(
                "HTTP response: {status} in {:.1}s ({} bytes)",
                start.elapsed().as_secs_f64(),
                body.len()
            );
            trace!("HTTP response body: {body}");

            Ok(ProviderResponse {
                status,
                body,
                retry_after,
                request_id,
            })
        })
    }
}

fn header_str<'a>(resp: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

/// `Retry-After` as whole seconds from `now`. Accepts delta-seconds and
/// HTTP-dates; a date in the past means retry immediately.
fn parse_retry_after(value: &str, now: chrono::DateTime<chrono::Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    Some((at.with_timezone(&chrono::Utc) - now).num_seconds().max(0) as u64)
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> ToolError {
    if e.is_timeout() {
        warn!("HTTP request timed out after {:.0}s", timeout.as_secs_f64());
        ToolError::Timeout(timeout)
    } else {
        // Without the URL: it may carry credentials in the query string.
        ToolError::Network(e.without_url().to_string())
    }
}
