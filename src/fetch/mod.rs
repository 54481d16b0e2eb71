//! Bounded outbound HTTP fetches triggered by chat messages.
//!
//! Every fetch is capped: responses declaring more than
//! [`MAX_CONTENT_KIB`] are dropped before their body is read, bodies without
//! a declared length are truncated at the same bound, and each request
//! carries a timeout. One oversized or stalled page must not exhaust memory
//! or hang the handler that asked for it.
//!
//! Failures never propagate to module code. They are logged and surface as
//! `None` ("no result" / "no title").

pub mod title;
pub mod transport;

pub use title::{extract_url, find_title};
pub use transport::{FetchRequest, HttpBody, HttpTransport, ReqwestTransport};

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::text::{to_display_text, trim_partial_utf8};
use bytes::{Bytes, BytesMut};
use http::HeaderMap;
use http::header::CONTENT_LENGTH;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Largest declared Content-Length, in KiB, that will be read.
pub const MAX_CONTENT_KIB: u64 = 2048;

/// User agent pinned on every request unless a caller overrides it.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.11 \
     (KHTML, like Gecko) Chrome/23.0.1271.95 Safari/537.11";

/// Limits applied to every fetch.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_content_kib: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
            max_content_kib: MAX_CONTENT_KIB,
        }
    }
}

impl From<&FetchConfig> for FetchSettings {
    fn from(config: &FetchConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_content_kib: config.max_content_kib,
        }
    }
}

impl FetchSettings {
    /// Most bytes read from a body. Anything that passes the declared-length
    /// check (integer KiB) is read in full.
    fn body_limit(&self) -> usize {
        let limit = self.max_content_kib.saturating_add(1).saturating_mul(1024) - 1;
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}

/// A parsed page: status, headers, and the capped body as display text.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

/// A response that passed the size check and has not been read yet.
pub struct FetchResponse {
    url: String,
    body: Box<dyn HttpBody>,
    limit: usize,
    timeout: Duration,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("url", &self.url)
            .field("status", &self.body.status())
            .finish_non_exhaustive()
    }
}

impl FetchResponse {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.body.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.body.headers()
    }

    /// Reads the body, truncating at the size bound.
    pub async fn bytes(self) -> Result<Bytes, FetchError> {
        let Self {
            url,
            mut body,
            limit,
            timeout,
        } = self;
        let read = async move {
            let mut buf = BytesMut::new();
            while let Some(chunk) = body.chunk().await? {
                let room = limit - buf.len();
                if chunk.len() >= room {
                    buf.extend_from_slice(&chunk[..room]);
                    let keep = trim_partial_utf8(&buf).len();
                    buf.truncate(keep);
                    debug!(url = %url, limit, kept = keep, "Body truncated at size bound");
                    break;
                }
                buf.extend_from_slice(&chunk);
            }
            Ok::<_, FetchError>(buf.freeze())
        };
        tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| FetchError::Timeout)?
    }
}

/// Bounded HTTP fetcher shared by all modules of a network.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    settings: Arc<FetchSettings>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, settings: FetchSettings) -> Self {
        Self {
            transport,
            settings: Arc::new(settings),
        }
    }

    /// Build a fetcher backed by `reqwest` from the `[fetch]` config block.
    pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(&config.user_agent, config.verify_tls)?;
        Ok(Self::new(Arc::new(transport), FetchSettings::from(config)))
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// GET a URL without reading its body.
    ///
    /// Returns `None` on an unsupported scheme, a connection failure, a
    /// timeout, or a declared Content-Length above the cap.
    pub async fn fetch(
        &self,
        url: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Option<FetchResponse> {
        match self.try_fetch(url, params, headers).await {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(url = %url, code = e.error_code(), error = %e, "Fetch failed");
                None
            }
        }
    }

    async fn try_fetch(
        &self,
        url: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<FetchResponse, FetchError> {
        if !has_http_scheme(url) {
            return Err(FetchError::InvalidScheme(url.to_string()));
        }

        let request = FetchRequest {
            url: url.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            headers: merge_headers(&self.settings.user_agent, headers),
        };

        let body = tokio::time::timeout(self.settings.timeout, self.transport.get(request))
            .await
            .map_err(|_| FetchError::Timeout)??;

        let kib = declared_length(body.headers()) / 1024;
        if kib > self.settings.max_content_kib {
            return Err(FetchError::TooLarge { kib });
        }

        Ok(FetchResponse {
            url: url.to_string(),
            body,
            limit: self.settings.body_limit(),
            timeout: self.settings.timeout,
        })
    }

    /// GET a URL and read the capped body as display text.
    pub async fn fetch_document(
        &self,
        url: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Option<Document> {
        let response = self.fetch(url, params, headers).await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, code = e.error_code(), error = %e, "Failed to read document");
                return None;
            }
        };

        Some(Document {
            url: url.to_string(),
            status,
            headers: response_headers,
            body: to_display_text(&body[..]).into_owned(),
        })
    }

    /// Fetch a page and return `"Title: …"`.
    ///
    /// `None` when the page has no usable title, answers with an HTTP error
    /// status, or fails any of the fetch bounds.
    pub async fn title_of(&self, url: &str) -> Option<String> {
        let response = self.fetch(url, &[], &[]).await?;
        let status = response.status();
        if status >= 400 {
            debug!(url = %url, code = FetchError::Status(status).error_code(), status, "No title for error response");
            return None;
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, code = e.error_code(), error = %e, "Failed to read page");
                return None;
            }
        };

        find_title(&to_display_text(&body[..])).map(|title| format!("Title: {title}"))
    }
}

fn has_http_scheme(url: &str) -> bool {
    url.split_once("://").is_some_and(|(scheme, _)| {
        scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
    })
}

/// Pinned user agent first, then caller overrides replacing same-named headers.
fn merge_headers(user_agent: &str, overrides: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut headers = vec![("User-Agent".to_string(), user_agent.to_string())];
    for (name, value) in overrides {
        headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        headers.push((name.to_string(), value.to_string()));
    }
    headers
}

/// Declared Content-Length in bytes. Missing or malformed counts as 0.
fn declared_length(headers: &HeaderMap) -> u64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use http::HeaderValue;

    struct Unreachable;

    #[async_trait]
    impl HttpTransport for Unreachable {
        async fn get(&self, request: FetchRequest) -> Result<Box<dyn HttpBody>, FetchError> {
            Err(FetchError::Connect(format!("refused: {}", request.url)))
        }
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(Arc::new(Unreachable), FetchSettings::default())
    }

    #[test]
    fn test_scheme_check() {
        assert!(has_http_scheme("http://a.test"));
        assert!(has_http_scheme("HTTPS://a.test/x"));
        assert!(!has_http_scheme("ftp://a.test"));
        assert!(!has_http_scheme("a.test"));
    }

    #[test]
    fn test_overrides_replace_user_agent_case_insensitively() {
        let headers = merge_headers("bot/1", &[("user-agent", "custom/2"), ("Accept", "text/html")]);
        assert_eq!(
            headers,
            vec![
                ("user-agent".to_string(), "custom/2".to_string()),
                ("Accept".to_string(), "text/html".to_string()),
            ]
        );
    }

    #[test]
    fn test_declared_length_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_length(&headers), 0);
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("4096"));
        assert_eq!(declared_length(&headers), 4096);
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("garbage"));
        assert_eq!(declared_length(&headers), 0);
    }

    #[test]
    fn test_body_limit_matches_kib_check() {
        let settings = FetchSettings::default();
        assert_eq!(settings.body_limit(), 2049 * 1024 - 1);
        assert_eq!(settings.body_limit() as u64 / 1024, MAX_CONTENT_KIB);
    }

    #[test]
    fn test_body_limit_saturates_for_huge_caps() {
        let settings = FetchSettings {
            max_content_kib: u64::MAX,
            ..FetchSettings::default()
        };
        assert_eq!(
            settings.body_limit(),
            usize::try_from(u64::MAX - 1).unwrap_or(usize::MAX)
        );

        let settings = FetchSettings {
            max_content_kib: u64::MAX / 1024,
            ..FetchSettings::default()
        };
        assert!(settings.body_limit() as u64 >= (u64::MAX / 1024) * 1024);
    }

    #[tokio::test]
    async fn test_invalid_scheme_is_no_result() {
        assert!(fetcher().fetch("ftp://files.test/x", &[], &[]).await.is_none());
    }

    #[tokio::test]
    async fn test_connection_error_is_no_result() {
        assert!(fetcher().fetch("http://down.test/", &[], &[]).await.is_none());
        assert!(fetcher().title_of("http://down.test/").await.is_none());
    }
}
