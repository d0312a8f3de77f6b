//! Single-hop HTTP transport used by the redirect loop.
//!
//! A [`Transport`] sends exactly one GET to an already validated target and
//! never follows redirects itself. [`PinnedTransport`] builds a client whose
//! only route to the target host is the validated address.

use super::{ACCEPT, CONNECT_FAILED, FetchConfig, TIMED_OUT, ValidatedUrl};
use async_trait::async_trait;
use bytes::Bytes;
use graphvc_core::Error;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode, header};

/// Streaming body of one response.
#[async_trait]
pub trait HopBody: Send {
    /// Next chunk, or `None` once the body is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error>;
}

/// One response as seen by the redirect loop.
pub struct Hop {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Declared `Content-Length`, if any
    pub content_length: Option<u64>,
    pub body: Box<dyn HopBody>,
}

impl Hop {
    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Sends one request to a validated target.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, target: &ValidatedUrl) -> Result<Hop, Error>;
}

fn map_transport_error(err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::ServiceUnavailable(TIMED_OUT.into())
    } else {
        Error::ServiceUnavailable(CONNECT_FAILED.into())
    }
}

#[async_trait]
impl HopBody for reqwest::Response {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        self.chunk().await.map_err(|e| map_transport_error(&e))
    }
}

/// reqwest transport pinned to the validated address.
#[derive(Debug, Clone)]
pub struct PinnedTransport {
    config: FetchConfig,
}

impl PinnedTransport {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    fn client(&self, target: &ValidatedUrl) -> Result<Client, Error> {
        let mut builder = Client::builder()
            .user_agent(&self.config.user_agent)
            .timeout(self.config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if target.url.domain().is_some() {
            builder = builder.resolve(&target.host, target.socket_addr());
        }

        builder
            .build()
            .map_err(|e| Error::ServiceUnavailable(format!("failed to build HTTP client: {e}")))
    }
}

#[async_trait]
impl Transport for PinnedTransport {
    async fn send(&self, target: &ValidatedUrl) -> Result<Hop, Error> {
        let response = self
            .client(target)?
            .get(target.url.clone())
            .header(header::ACCEPT, ACCEPT)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(url = %target.url, error = %e, "fetch failed");
                map_transport_error(&e)
            })?;

        Ok(Hop {
            status: response.status(),
            headers: response.headers().clone(),
            content_length: response.content_length(),
            body: Box::new(response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn target_on(host: &str, port: u16) -> ValidatedUrl {
        let url = ::url::Url::parse(&format!("https://{host}:{port}/story")).unwrap();
        let pinned = IpAddr::V4(Ipv4Addr::LOCALHOST);
        ValidatedUrl { original: url.to_string(), url, host: host.into(), addrs: vec![pinned], pinned }
    }

    #[tokio::test]
    async fn test_connection_goes_to_pinned_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            drop(stream);
            peer
        });

        let config = FetchConfig { timeout: Duration::from_secs(2), ..FetchConfig::default() };
        let transport = PinnedTransport::new(config);

        // `.invalid` never resolves, so reaching the listener proves the override was used.
        let result = transport.send(&target_on("pinned.graphvc.invalid", port)).await;
        assert!(result.is_err());

        let peer = tokio::time::timeout(Duration::from_secs(2), accepted).await.unwrap().unwrap();
        assert!(peer.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_connect_failure_maps_to_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = PinnedTransport::new(FetchConfig::default());
        let err = transport.send(&target_on("closed.graphvc.invalid", port)).await.err().unwrap();
        assert_eq!(err.slug(), "service_unavailable");
    }
}
