//! SSRF (Server-Side Request Forgery) protection.
//!
//! Validates that a URL is HTTPS and that every address its host resolves to
//! is public. The address chosen here is the one the fetcher connects to, so
//! a second DNS answer at connect time can never redirect the request.

use super::url::{UrlError, parse_https};
use async_trait::async_trait;
use graphvc_core::Error;
use ipnet::IpNet;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use url::{Host, Url};

/// Ranges rejected by name before the general public-unicast check.
pub const BLOCKED_NETWORKS: &[&str] = &[
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "127.0.0.0/8",
    // link-local, includes cloud metadata endpoints
    "169.254.0.0/16",
    "::1/128",
    "fc00::/7",
    // shared address space (RFC 6598)
    "100.64.0.0/10",
];

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error(transparent)]
    Url(#[from] UrlError),

    #[error("Could not resolve hostname")]
    DnsError(String),

    #[error("URL resolves to a blocked address")]
    BlockedIp(IpAddr),

    #[error("URL resolves to a non-public address")]
    NonPublicIp(IpAddr),
}

impl From<SsrfError> for Error {
    fn from(err: SsrfError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

fn blocked_networks() -> impl Iterator<Item = IpNet> {
    BLOCKED_NETWORKS.iter().filter_map(|net| net.parse().ok())
}

/// Whether `ip` falls in one of [`BLOCKED_NETWORKS`].
pub fn is_blocked(ip: IpAddr) -> bool {
    blocked_networks().any(|net| net.contains(&ip))
}

/// Public unicast check covering the special-purpose registries.
pub fn is_global_unicast(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_global_v4(v4),
        IpAddr::V6(v6) => is_global_v6(v6),
    }
}

fn is_global_v4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    !(a == 0
        || ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_multicast()
        || ip.is_documentation()
        || (a == 100 && (b & 0xc0) == 64)
        || (a == 192 && b == 0 && c == 0)
        || (a == 198 && (b & 0xfe) == 18)
        || a >= 240)
}

fn is_global_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = embedded_v4(ip) {
        return is_global_v4(v4);
    }

    let s = ip.segments();
    !(ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_multicast()
        || (s[0] & 0xfe00) == 0xfc00
        || (s[0] & 0xffc0) == 0xfe80
        || (s[0] & 0xffc0) == 0xfec0
        || (s[0] == 0x2001 && s[1] == 0x0db8)
        || (s[0] == 0x2001 && s[1] < 0x0200)
        || s[0] == 0x2002
        || (s[0] == 0x0100 && s[1] == 0 && s[2] == 0 && s[3] == 0))
}

/// IPv4 address carried by an IPv4-mapped (`::ffff:0:0/96`) or NAT64
/// (`64:ff9b::/96`) IPv6 address.
fn embedded_v4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return Some(v4);
    }
    let s = ip.segments();
    if s[0] == 0x0064 && s[1] == 0xff9b && s[2..6].iter().all(|&x| x == 0) {
        let [.., a, b, c, d] = ip.octets();
        return Some(Ipv4Addr::new(a, b, c, d));
    }
    None
}

/// Validate that an IP address is safe to connect to.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_blocked(ip) {
        Err(SsrfError::BlockedIp(ip))
    } else if !is_global_unicast(ip) {
        Err(SsrfError::NonPublicIp(ip))
    } else {
        Ok(())
    }
}

/// DNS resolution seam.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// All A and AAAA answers for `host`.
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the system resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl Resolve for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Fixed host table; unknown hosts fail to resolve.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    table: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, host: &str, addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        self.table.insert(host.to_lowercase(), addrs.into_iter().collect());
        self
    }
}

#[async_trait]
impl Resolve for StaticResolver {
    async fn resolve(&self, host: &str, _port: u16) -> std::io::Result<Vec<IpAddr>> {
        self.table
            .get(&host.to_lowercase())
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, format!("no entry for {host}")))
    }
}

/// A URL whose host resolved only to public addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    /// Input as submitted, trimmed.
    pub original: String,
    pub url: Url,
    pub host: String,
    /// Every address the host resolved to.
    pub addrs: Vec<IpAddr>,
    /// Address the connection must use.
    pub pinned: IpAddr,
}

impl ValidatedUrl {
    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(443)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.pinned, self.port())
    }
}

/// URL safety validator.
#[derive(Clone)]
pub struct UrlValidator {
    resolver: Arc<dyn Resolve>,
}

impl std::fmt::Debug for UrlValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlValidator").finish_non_exhaustive()
    }
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new(Arc::new(SystemResolver))
    }
}

impl UrlValidator {
    pub fn new(resolver: Arc<dyn Resolve>) -> Self {
        Self { resolver }
    }

    /// Validate `input`, resolving its host and checking every answer.
    pub async fn validate(&self, input: &str) -> Result<ValidatedUrl, SsrfError> {
        let url = parse_https(input)?;
        let port = url.port_or_known_default().unwrap_or(443);

        let (host, addrs) = match url.host() {
            Some(Host::Ipv4(ip)) => (ip.to_string(), vec![IpAddr::V4(ip)]),
            Some(Host::Ipv6(ip)) => (ip.to_string(), vec![IpAddr::V6(ip)]),
            Some(Host::Domain(domain)) => {
                let addrs = self
                    .resolver
                    .resolve(domain, port)
                    .await
                    .map_err(|e| SsrfError::DnsError(e.to_string()))?;
                (domain.to_string(), addrs)
            }
            None => return Err(UrlError::MissingHost.into()),
        };

        let Some(&pinned) = addrs.first() else {
            return Err(SsrfError::DnsError(format!("no addresses for {host}")));
        };

        for &ip in &addrs {
            if let Err(e) = validate_ip(ip) {
                tracing::warn!(host = %host, ip = %ip, "rejected fetch target");
                return Err(e);
            }
        }

        Ok(ValidatedUrl { original: input.trim().to_string(), url, host, addrs, pinned })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    fn v6(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn validator(resolver: StaticResolver) -> UrlValidator {
        UrlValidator::new(Arc::new(resolver))
    }

    #[test]
    fn test_blocked_networks_parse() {
        assert_eq!(blocked_networks().count(), BLOCKED_NETWORKS.len());
    }

    #[test]
    fn test_blocked_ranges() {
        for ip in [
            v4(10, 0, 0, 1),
            v4(172, 16, 0, 1),
            v4(172, 31, 255, 255),
            v4(192, 168, 1, 1),
            v4(127, 0, 0, 1),
            v4(169, 254, 169, 254),
            v4(100, 64, 0, 1),
            v4(100, 127, 255, 254),
            v6("::1"),
            v6("fc00::1"),
            v6("fdff::1"),
        ] {
            assert!(matches!(validate_ip(ip), Err(SsrfError::BlockedIp(_))), "{ip}");
        }
    }

    #[test]
    fn test_non_global_ranges() {
        for ip in [
            v4(0, 0, 0, 0),
            v4(0, 1, 2, 3),
            v4(255, 255, 255, 255),
            v4(224, 0, 0, 1),
            v4(192, 0, 2, 1),
            v4(198, 51, 100, 7),
            v4(203, 0, 113, 9),
            v4(198, 18, 0, 1),
            v4(240, 0, 0, 1),
            v6("::"),
            v6("fe80::1"),
            v6("ff02::1"),
            v6("2001:db8::1"),
            v6("::ffff:127.0.0.1"),
            v6("::ffff:10.1.2.3"),
            v6("64:ff9b::a9fe:a9fe"),
        ] {
            assert!(validate_ip(ip).is_err(), "{ip}");
        }
    }

    #[test]
    fn test_public_addresses() {
        for ip in [v4(93, 184, 216, 34), v4(8, 8, 8, 8), v4(100, 128, 0, 1), v6("2606:4700::6810:84e5"), v6("::ffff:1.1.1.1")]
        {
            assert!(validate_ip(ip).is_ok(), "{ip}");
        }
    }

    #[tokio::test]
    async fn test_validate_public_host() {
        let v = validator(StaticResolver::new().with("example.com", [v4(93, 184, 216, 34)]));
        let validated = v.validate(" https://example.com/a ").await.unwrap();
        assert_eq!(validated.original, "https://example.com/a");
        assert_eq!(validated.host, "example.com");
        assert_eq!(validated.pinned, v4(93, 184, 216, 34));
        assert_eq!(validated.socket_addr(), "93.184.216.34:443".parse().unwrap());
    }

    #[tokio::test]
    async fn test_validate_rejects_metadata_endpoint() {
        let v = validator(StaticResolver::new().with("metadata.example", [v4(169, 254, 169, 254)]));
        let err = v.validate("https://metadata.example/latest").await.unwrap_err();
        assert!(matches!(err, SsrfError::BlockedIp(_)));
        assert_eq!(Error::from(err).slug(), "invalid_url");
    }

    #[tokio::test]
    async fn test_validate_rejects_if_any_answer_blocked() {
        let v = validator(
            StaticResolver::new().with("mixed.example", [v4(93, 184, 216, 34), v6("2606:4700::1"), v4(10, 0, 0, 5)]),
        );
        assert!(matches!(v.validate("https://mixed.example/").await, Err(SsrfError::BlockedIp(_))));
    }

    #[tokio::test]
    async fn test_validate_ip_literal_hosts() {
        let v = validator(StaticResolver::new());
        assert!(v.validate("https://127.0.0.1/").await.is_err());
        assert!(v.validate("https://[::1]/").await.is_err());
        assert!(v.validate("https://93.184.216.34/").await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_rejects_non_https_before_resolving() {
        let v = validator(StaticResolver::new().with("example.com", [v4(93, 184, 216, 34)]));
        let err = v.validate("http://example.com").await.unwrap_err();
        assert!(matches!(err, SsrfError::Url(UrlError::UnsupportedScheme(_))));
    }

    #[tokio::test]
    async fn test_validate_dns_failure() {
        let v = validator(StaticResolver::new());
        let err = v.validate("https://nowhere.invalid/").await.unwrap_err();
        assert_eq!(err.to_string(), "Could not resolve hostname");
    }

    #[tokio::test]
    async fn test_validate_empty_answer() {
        let v = validator(StaticResolver::new().with("empty.example", []));
        assert!(matches!(v.validate("https://empty.example/").await, Err(SsrfError::DnsError(_))));
    }
}
