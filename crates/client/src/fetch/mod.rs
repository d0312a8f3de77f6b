//! HTTP fetch pipeline with SSRF protection.
//!
//! ### URL Validation
//! - HTTPS only; host resolved once and every A/AAAA answer must be public.
//! - The connection is pinned to the validated address; the HTTP client never
//!   performs its own lookup for the target host.
//!
//! ### Redirects
//! - Automatic redirects are disabled.
//! - Each `Location` is resolved against the current URL and re-validated
//!   before the next request. At most 5 redirects are followed.
//!
//! ### Safety Gates
//! - Timeout: 10s per round-trip
//! - Max body bytes: 5MB, checked against `Content-Length` and while streaming
//! - Content types: `text/html` or `text/plain` only
//! - Minimum yield: 500 characters of extracted text; output capped at 32,000

pub mod ssrf;
pub mod transport;
pub mod url;

use crate::extract::{self, ExtractedContent, MAX_CONTENT_CHARS, MIN_PAGE_CHARS};
use async_trait::async_trait;
use bytes::Bytes;
use graphvc_core::{AppConfig, Error};
use reqwest::{StatusCode, header};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use self::ssrf::{Resolve, SsrfError, StaticResolver, SystemResolver, UrlValidator, ValidatedUrl, validate_ip};
pub use self::transport::{Hop, HopBody, PinnedTransport, Transport};
pub use self::url::{UrlError, join_location, parse_https};

pub const TIMED_OUT: &str = "URL fetch timed out - try again or paste the text directly";
pub const CONNECT_FAILED: &str = "Could not connect to URL - try pasting the text instead";
pub const UNREADABLE: &str = "Couldn't read that URL - try pasting the text instead";
pub const TOO_LARGE: &str = "Page is too large to process - try pasting the text instead";

pub(crate) const ACCEPT: &str = "text/html,application/xhtml+xml,text/plain;q=0.9,*/*;q=0.8";

/// Configuration for the content fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: desktop Chrome)
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Per-request timeout (default: 10s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: graphvc_core::config::CHROME_USER_AGENT.to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_secs(10),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// Raw result of following a URL to its final response.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Response body bytes, at most `max_bytes`
    pub body: Bytes,
    /// Content-Type header
    pub content_type: Option<String>,
    /// The final URL after redirects
    pub final_url: ::url::Url,
    /// Redirects followed
    pub redirects: usize,
}

/// Source of readable page text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return its extracted text.
    async fn fetch_text(&self, url: &str) -> Result<ExtractedContent, Error>;
}

/// Redirect statuses that carry a `Location` to follow.
fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// Whether a declared content type may be passed to the text extractor.
fn is_text_content(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        let ct = ct.to_ascii_lowercase();
        ct.contains("text/html") || ct.contains("text/plain")
    })
}

/// Checks applied to the final response before its body is read.
fn check_final_head(
    status: StatusCode, content_length: Option<u64>, content_type: Option<&str>, max_bytes: usize,
) -> Result<(), Error> {
    if !status.is_success() {
        return Err(Error::ScrapeFailed(UNREADABLE.into()));
    }

    if let Some(len) = content_length
        && len > max_bytes as u64
    {
        return Err(Error::ScrapeFailed(TOO_LARGE.into()));
    }

    if !is_text_content(content_type) {
        return Err(Error::ScrapeFailed(UNREADABLE.into()));
    }

    Ok(())
}

/// Turn a final body into extracted text, enforcing yield and size limits.
fn extract_content(body: &[u8], content_type: Option<&str>) -> Result<ExtractedContent, Error> {
    let decoded = String::from_utf8_lossy(body);
    let is_plain = content_type.is_some_and(|ct| {
        let ct = ct.to_ascii_lowercase();
        ct.contains("text/plain") && !ct.contains("text/html")
    });

    let text = if is_plain { extract::plain_text(&decoded) } else { extract::extract_text(&decoded) };
    let content = ExtractedContent::new(text);

    if content.char_count < MIN_PAGE_CHARS {
        tracing::info!(chars = content.char_count, "page yielded too little text");
        return Err(Error::ScrapeFailed(UNREADABLE.into()));
    }

    Ok(content.truncate(MAX_CONTENT_CHARS))
}

/// HTTP fetcher that validates every hop against SSRF rules.
#[derive(Clone)]
pub struct ContentFetcher {
    validator: UrlValidator,
    transport: Arc<dyn Transport>,
    config: FetchConfig,
}

impl std::fmt::Debug for ContentFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentFetcher").field("config", &self.config).finish_non_exhaustive()
    }
}

impl ContentFetcher {
    pub fn new(validator: UrlValidator, config: FetchConfig) -> Self {
        let transport = Arc::new(PinnedTransport::new(config.clone()));
        Self::with_transport(validator, transport, config)
    }

    pub fn with_transport(validator: UrlValidator, transport: Arc<dyn Transport>, config: FetchConfig) -> Self {
        Self { validator, transport, config }
    }

    /// Follow `url` to its final response and read the bounded body.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, Error> {
        let start = Instant::now();
        let mut target = self.validator.validate(url).await?;
        let mut redirects = 0;

        let hop = loop {
            let hop = self.transport.send(&target).await?;
            let location = hop.header(header::LOCATION).map(str::to_string);

            match location {
                Some(location) if is_redirect(hop.status) => {
                    if redirects >= self.config.max_redirects {
                        tracing::info!(url = %target.url, redirects, "redirect limit exceeded");
                        return Err(Error::ScrapeFailed(UNREADABLE.into()));
                    }
                    let next = join_location(&target.url, &location).map_err(SsrfError::from)?;
                    target = self.validator.validate(next.as_str()).await?;
                    redirects += 1;
                }
                _ => break hop,
            }
        };

        let content_type = hop.header(header::CONTENT_TYPE).map(str::to_string);
        check_final_head(hop.status, hop.content_length, content_type.as_deref(), self.config.max_bytes)?;

        let body = self.read_body(hop.body).await?;

        tracing::debug!(
            url = %target.url,
            redirects,
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched page"
        );

        Ok(FetchResult { body, content_type, final_url: target.url, redirects })
    }

    async fn read_body(&self, mut body: Box<dyn HopBody>) -> Result<Bytes, Error> {
        let mut buf = Vec::new();
        while let Some(chunk) = body.next_chunk().await? {
            if buf.len() + chunk.len() > self.config.max_bytes {
                return Err(Error::ScrapeFailed(TOO_LARGE.into()));
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buf))
    }
}

#[async_trait]
impl PageFetcher for ContentFetcher {
    async fn fetch_text(&self, url: &str) -> Result<ExtractedContent, Error> {
        let result = self.fetch(url).await?;
        extract_content(&result.body, result.content_type.as_deref())
    }
}
