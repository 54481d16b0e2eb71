//! HTTP transport seam for the fetcher.
//!
//! The fetcher talks to [`HttpTransport`] so tests can substitute a stub and
//! observe exactly how much of a body gets read.

use crate::error::FetchError;
use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use reqwest::redirect::Policy;
use tracing::info;

/// Maximum redirects followed for one logical request.
const MAX_REDIRECTS: usize = 10;

/// A single GET request.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub url: String,
    /// Query parameters appended to the URL.
    pub params: Vec<(String, String)>,
    /// Headers sent with the request, already merged with overrides.
    pub headers: Vec<(String, String)>,
}

/// Sends GET requests and hands back a streaming body.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends the request. Only the status line and headers are read.
    async fn get(&self, request: FetchRequest) -> Result<Box<dyn HttpBody>, FetchError>;
}

/// A response whose body has not been read yet.
#[async_trait]
pub trait HttpBody: Send {
    fn status(&self) -> u16;

    fn headers(&self) -> &HeaderMap;

    /// Reads the next body chunk. `None` marks the end of the body.
    async fn chunk(&mut self) -> Result<Option<Bytes>, FetchError>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build the client.
    ///
    /// With `verify_tls` off, certificate errors are ignored. Cookies are not
    /// persisted beyond one request's redirect chain.
    pub fn new(user_agent: &str, verify_tls: bool) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .danger_accept_invalid_certs(!verify_tls)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| FetchError::Connect(e.to_string()))?;

        info!(verify_tls, "HTTP fetch client initialized");

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: FetchRequest) -> Result<Box<dyn HttpBody>, FetchError> {
        let mut builder = self.client.get(&request.url);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Connect(e.to_string()))?;

        Ok(Box::new(ReqwestBody { response }))
    }
}

struct ReqwestBody {
    response: reqwest::Response,
}

#[async_trait]
impl HttpBody for ReqwestBody {
    fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    async fn chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        self.response
            .chunk()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))
    }
}
