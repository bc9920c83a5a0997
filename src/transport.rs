//! # transport: bounded HTTP request execution shared by the remote providers
//!
//! [`HttpClient`] is held by value inside each HTTP-backed provider. It owns
//! the base URL, the provider's base headers and its credentials, and sends
//! every request through a [`Transport`] under a fixed 30 second timeout.
//!
//! The [`Transport`] trait is the seam to the network: [`ReqwestTransport`]
//! in production, `MockTransport` in tests.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use mockall::automock;
use tracing::{debug, error};

use crate::contract::{ProviderError, ProviderResult};
use crate::status;

/// Every request is cancelled after this long.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Patch,
    Propfind,
    Put,
    Mkcol,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Patch => "PATCH",
            Method::Propfind => "PROPFIND",
            Method::Put => "PUT",
            Method::Mkcol => "MKCOL",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully composed request, ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        status::is_success(self.status)
    }
}

/// Sends one request and returns the raw response, whatever its status.
///
/// Implementations report transport failures only (`Network`, `Timeout`,
/// `Unknown`); status handling is the caller's business.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> ProviderResult<HttpResponse>;
}

/// Production transport over a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cloudleaf/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

fn classify(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else if e.is_connect() || e.is_request() || e.is_body() || e.is_decode() {
        ProviderError::Network(e.to_string())
    } else {
        ProviderError::Unknown(e.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> ProviderResult<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| ProviderError::Unknown(e.to_string()))?;
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;
        Ok(HttpResponse { status, body })
    }
}

/// Credentials attached to every request of a client.
#[derive(Clone)]
pub enum Auth {
    Bearer(String),
    Basic { username: String, password: String },
}

impl Auth {
    fn header_value(&self) -> String {
        match self {
            Auth::Bearer(token) => format!("Bearer {token}"),
            Auth::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                format!("Basic {encoded}")
            }
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Bearer(_) => f.write_str("Auth::Bearer(..)"),
            Auth::Basic { username, .. } => write!(f, "Auth::Basic({username}, ..)"),
        }
    }
}

/// Request helper composed into the Gist and WebDAV providers.
#[derive(Clone)]
pub struct HttpClient {
    base_url: String,
    base_headers: Vec<(String, String)>,
    auth: Option<Auth>,
    transport: Arc<dyn Transport>,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.into(),
            base_headers: Vec::new(),
            auth: None,
            transport,
        }
    }

    pub fn with_base_header(mut self, name: &str, value: &str) -> Self {
        merge_header(&mut self.base_headers, name, value);
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base headers, then auth, then per-call overrides; later names win.
    pub fn compose_headers(&self, overrides: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut headers = self.base_headers.clone();
        if let Some(auth) = &self.auth {
            merge_header(&mut headers, "Authorization", &auth.header_value());
        }
        for (name, value) in overrides {
            merge_header(&mut headers, name, value);
        }
        headers
    }

    /// Sends `method` to `base_url + path`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> ProviderResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, path);
        self.request_url(method, url, body, headers).await
    }

    /// Sends `method` to an absolute `url` with this client's headers.
    pub async fn request_url(
        &self,
        method: Method,
        url: String,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> ProviderResult<HttpResponse> {
        let request = HttpRequest {
            method,
            url,
            headers: self.compose_headers(headers),
            body,
        };
        debug!(method = %request.method, url = %request.url, "[HTTP] Sending request");
        let method = request.method;
        let url = request.url.clone();

        match tokio::time::timeout(REQUEST_TIMEOUT, self.transport.send(request)).await {
            Ok(Ok(response)) => {
                debug!(%method, %url, status = response.status, "[HTTP] Response received");
                Ok(response)
            }
            Ok(Err(e)) => {
                error!(%method, %url, error = %e, "[HTTP][ERROR] Request failed");
                Err(e)
            }
            Err(_) => {
                error!(%method, %url, timeout_secs = REQUEST_TIMEOUT.as_secs(), "[HTTP][ERROR] Request timed out");
                Err(ProviderError::Timeout)
            }
        }
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .finish()
    }
}

fn merge_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(entry) => entry.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

/// Error for a non-2xx response, worded from the HTTP table.
pub fn http_error(status: u16) -> ProviderError {
    ProviderError::Http {
        status,
        message: status::http_message(status),
    }
}

/// Error for a non-2xx response, worded from the WebDAV table.
pub fn webdav_error(status: u16) -> ProviderError {
    ProviderError::Http {
        status,
        message: status::webdav_message(status),
    }
}
