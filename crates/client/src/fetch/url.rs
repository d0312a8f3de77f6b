//! URL parsing for fetch targets.

use url::Url;

/// Error type for URL parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("URL is empty")]
    Empty,

    #[error("Only HTTPS URLs are accepted")]
    UnsupportedScheme(String),

    #[error("Could not parse hostname from URL")]
    MissingHost,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse a fetch target.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Require the `https` scheme (no default is assumed)
/// 3. Require a non-empty host (lowercased by the parser)
/// 4. Remove fragment (#...)
/// 5. Keep query string intact
pub fn parse_https(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(
            url::ParseError::EmptyHost
            | url::ParseError::IdnaError
            | url::ParseError::InvalidDomainCharacter
            | url::ParseError::InvalidIpv4Address
            | url::ParseError::InvalidIpv6Address,
        ) => return Err(UrlError::MissingHost),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Err(UrlError::UnsupportedScheme(String::new()));
        }
        Err(e) => return Err(UrlError::InvalidUrl(e.to_string())),
    };

    if parsed.scheme() != "https" {
        return Err(UrlError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve a redirect `Location` value against the URL that produced it.
///
/// Absolute locations replace `current` entirely; relative ones are joined.
pub fn join_location(current: &Url, location: &str) -> Result<Url, UrlError> {
    current
        .join(location.trim())
        .map_err(|e| UrlError::InvalidUrl(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let url = parse_https("https://example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_parse_lowercase_host() {
        let url = parse_https("https://EXAMPLE.COM/Path").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/Path");
    }

    #[test]
    fn test_parse_strips_fragment_keeps_query() {
        let url = parse_https("  https://example.com/a?b=1&c=2#section  ").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("b=1&c=2"));
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        for input in ["http://example.com", "ftp://example.com/file", "file:///etc/passwd", "example.com"] {
            assert!(matches!(parse_https(input), Err(UrlError::UnsupportedScheme(_))), "{input}");
        }
    }

    #[test]
    fn test_parse_missing_host() {
        assert_eq!(parse_https("https://"), Err(UrlError::MissingHost));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_https("   "), Err(UrlError::Empty));
    }

    #[test]
    fn test_scheme_message() {
        let err = parse_https("http://example.com").unwrap_err();
        assert_eq!(err.to_string(), "Only HTTPS URLs are accepted");
    }

    #[test]
    fn test_join_relative_location() {
        let current = parse_https("https://news.example.com/2025/02/story").unwrap();
        assert_eq!(
            join_location(&current, "/amp/story").unwrap().as_str(),
            "https://news.example.com/amp/story"
        );
        assert_eq!(
            join_location(&current, "story-2").unwrap().as_str(),
            "https://news.example.com/2025/02/story-2"
        );
    }

    #[test]
    fn test_join_absolute_location() {
        let current = parse_https("https://example.com/a").unwrap();
        let next = join_location(&current, "http://169.254.169.254/latest/meta-data").unwrap();
        assert_eq!(next.scheme(), "http");
        assert_eq!(next.host_str(), Some("169.254.169.254"));
    }
}
