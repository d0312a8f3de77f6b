//! Request extractors for caller identity.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use graphvc_client::{AuthError, Claims};
use graphvc_client::auth::bearer_token;
use graphvc_core::Tier;
use graphvc_core::graph::ANONYMOUS_OWNER;
use regex::Regex;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Header carrying a caller-supplied OpenAI key.
pub const BYOK_HEADER: &str = "x-openai-key";

/// Source address of the request.
///
/// The socket peer, or the first `X-Forwarded-For` entry when the deployment
/// trusts its proxy. Falls back to 127.0.0.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if state.config.trust_forwarded_for
            && let Some(ip) = forwarded_for(&parts.headers)
        {
            return Ok(Self(ip));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(Self(peer.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))))
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

fn authorization(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
}

/// Identity `POST /generate` would resolve for this request.
///
/// Anonymous access makes the token optional; otherwise it is required,
/// which in dev bypass yields the dev identity even without a token.
async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<Claims>, AuthError> {
    let token = authorization(parts);
    if state.config.allow_anonymous {
        state.verifier.verify_optional(token).await
    } else {
        state.verifier.verify(token).await.map(Some)
    }
}

/// The identity `/generate` would charge, with a missing token read as anonymous.
///
/// A supplied token that fails verification is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Claims>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await {
            Ok(claims) => Ok(Self(claims)),
            Err(AuthError::Missing) => Ok(Self(None)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Identity for `POST /generate`: required unless anonymous access is enabled.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Claims>);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve(parts, state).await?))
    }
}

/// Owner tag for graphs generated by `claims`.
pub fn owner(claims: Option<&Claims>) -> &str {
    claims.map(|c| c.sub.as_str()).unwrap_or(ANONYMOUS_OWNER)
}

/// Rate-limit identity and tier: the subject for authenticated callers, the
/// source address otherwise.
pub fn quota_key(claims: Option<&Claims>, ip: IpAddr) -> (String, Tier) {
    match claims {
        Some(c) => (c.sub.clone(), Tier::Authenticated),
        None => (ip.to_string(), Tier::Anonymous),
    }
}

/// Shape a bring-your-own key must have to be honoured.
#[derive(Debug, Clone)]
pub struct ByokPattern(Regex);

impl ByokPattern {
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let pattern = format!("^{}[A-Za-z0-9_-]{{16,}}$", regex::escape(prefix));
        Regex::new(&pattern).map(Self)
    }

    /// The trimmed key if it is well formed.
    pub fn accept<'a>(&self, raw: &'a str) -> Option<&'a str> {
        let key = raw.trim();
        self.0.is_match(key).then_some(key)
    }
}

/// Caller-supplied OpenAI key. Malformed values are treated as absent.
#[derive(Clone, Default)]
pub struct Byok(pub Option<String>);

impl std::fmt::Debug for Byok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Byok").field(&self.0.as_ref().map(|_| "<redacted>")).finish()
    }
}

impl FromRequestParts<AppState> for Byok {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(BYOK_HEADER) else {
            return Ok(Self(None));
        };

        let key = raw.to_str().ok().and_then(|v| state.byok.accept(v));
        if key.is_none() {
            tracing::info!("ignoring malformed {BYOK_HEADER} header");
        }
        Ok(Self(key.map(str::to_string)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_byok_pattern() {
        let pattern = ByokPattern::new("sk-").unwrap();
        assert_eq!(pattern.accept("sk-abcdefghijklmnop"), Some("sk-abcdefghijklmnop"));
        assert_eq!(pattern.accept("  sk-proj_ABCDEF-1234567890  "), Some("sk-proj_ABCDEF-1234567890"));
        assert_eq!(pattern.accept("sk-short"), None);
        assert_eq!(pattern.accept("sk-"), None);
        assert_eq!(pattern.accept("pk-abcdefghijklmnop"), None);
        assert_eq!(pattern.accept("sk-abcdefghijklmnop\nx"), None);
        assert_eq!(pattern.accept("sk-abcdefgh ijklmnop"), None);
    }

    #[test]
    fn test_byok_prefix_is_literal() {
        let pattern = ByokPattern::new("sk.").unwrap();
        assert!(pattern.accept("skXabcdefghijklmnop").is_none());
        assert!(pattern.accept("sk.abcdefghijklmnop").is_some());
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.2"));
        assert_eq!(forwarded_for(&headers), Some("203.0.113.7".parse().unwrap()));

        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        assert_eq!(forwarded_for(&headers), None);
    }

    #[test]
    fn test_quota_key() {
        let ip: IpAddr = "198.51.100.4".parse().unwrap();
        assert_eq!(quota_key(None, ip), ("198.51.100.4".to_string(), Tier::Anonymous));

        let claims = Claims { sub: "user_1".into(), azp: None, exp: 0, iat: None, iss: None };
        assert_eq!(quota_key(Some(&claims), ip), ("user_1".to_string(), Tier::Authenticated));
        assert_eq!(owner(Some(&claims)), "user_1");
        assert_eq!(owner(None), "anonymous");
    }
}
