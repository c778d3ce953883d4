//! HTTP transport used by every registry component
//!
//! The [`Transport`] trait is the only seam to the network. Expected HTTP
//! failures are mapped to [`CheckError`] values instead of being surfaced as
//! raw responses, so callers only ever see success bodies or tagged errors.

use async_trait::async_trait;
use cup_core::CheckError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, CheckError>;

/// A GET or HEAD request to a registry
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HeaderMap,
    /// Abort the request once this instant passes
    pub deadline: Option<Instant>,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HeaderMap::new(),
            deadline: None,
        }
    }

    /// Add a header, rejecting values that are not valid header text
    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|_| CheckError::transport(format!("invalid value for header {}", name)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Add `Authorization: Bearer {token}` when a token is present
    pub fn bearer(self, token: Option<&str>) -> Result<Self> {
        match token {
            Some(token) => self.header(AUTHORIZATION, &format!("Bearer {}", token)),
            None => Ok(self),
        }
    }

    pub fn deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// A successful (or deliberately tolerated) registry response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Empty for HEAD requests
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Header value by case-insensitive name, if present and valid text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| CheckError::invalid_response(e.to_string()))
    }
}

/// Executes registry requests.
///
/// Implementations must be safe to call from many concurrent checks and must
/// never panic on network failures.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `request`; a 401 is returned as a response when `ignore_unauthorized` is set
    async fn get(&self, request: HttpRequest, ignore_unauthorized: bool) -> Result<HttpResponse>;

    /// HEAD `request`
    async fn head(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// `{scheme}://{host}` for a registry, plain HTTP when `insecure`
pub fn registry_base(host: &str, insecure: bool) -> String {
    let scheme = if insecure { "http" } else { "https" };
    format!("{}://{}", scheme, host)
}

/// Map an HTTP status to the error taxonomy.
///
/// 404, 401 (unless ignored) and 502 get dedicated errors, any other status
/// of 400 or above is a generic request failure.
pub fn classify_status(
    method: &'static str,
    url: &str,
    status: u16,
    ignore_unauthorized: bool,
) -> Result<()> {
    let url = url.to_string();
    match status {
        404 => Err(CheckError::NotFound { method, url }),
        401 if ignore_unauthorized => Ok(()),
        401 => Err(CheckError::Unauthorized { method, url }),
        502 => Err(CheckError::RegistryUnavailable { method, url }),
        s if s >= 400 => Err(CheckError::RequestFailed {
            method,
            url,
            status: s,
        }),
        _ => Ok(()),
    }
}

/// [`Transport`] backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    /// Deadline applied to requests that carry none
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Create a transport with the given user agent
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| CheckError::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout: None,
        })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Default per-request timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn execute(
        &self,
        method: Method,
        request: HttpRequest,
        ignore_unauthorized: bool,
    ) -> Result<HttpResponse> {
        let label = if method == Method::HEAD { "HEAD" } else { "GET" };
        let HttpRequest {
            url,
            headers,
            deadline,
        } = request;
        let deadline = deadline.or_else(|| self.timeout.map(|t| Instant::now() + t));
        let client = self.client.clone();
        let target = url.clone();

        let exchange = async move {
            let response = client
                .request(method.clone(), &target)
                .headers(headers)
                .send()
                .await
                .map_err(|e| CheckError::transport(format!("{} {}: {}", label, target, e)))?;

            let status = response.status().as_u16();
            trace!("{} {} -> {}", label, target, status);
            classify_status(label, &target, status, ignore_unauthorized)?;

            let headers = response.headers().clone();
            let body = if method == Method::HEAD {
                Vec::new()
            } else {
                response
                    .bytes()
                    .await
                    .map_err(|e| CheckError::transport(format!("{} {}: {}", label, target, e)))?
                    .to_vec()
            };

            Ok::<_, CheckError>(HttpResponse {
                status,
                headers,
                body,
            })
        };

        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, exchange)
                .await
                .map_err(|_| CheckError::transport(format!("{} {}: deadline exceeded", label, url)))?,
            None => exchange.await,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: HttpRequest, ignore_unauthorized: bool) -> Result<HttpResponse> {
        self.execute(Method::GET, request, ignore_unauthorized).await
    }

    async fn head(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute(Method::HEAD, request, false).await
    }
}
