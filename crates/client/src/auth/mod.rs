//! Bearer token verification.
//!
//! Tokens are RS256 JWTs signed by keys from a published, rotating key set.
//! After signature and expiry pass, the `azp` (authorized party) claim is
//! checked against the configured allow-list. The check is skipped when the
//! claim is absent or empty, or when the allow-list is empty; this permissive
//! default is kept on purpose and needs explicit sign-off before tightening.
//!
//! The development bypass returns a fixed identity without looking at the
//! credential. Configuration validation refuses it outside development.

pub mod jwks;

pub use jwks::{JwksClient, KeySource, StaticKeys};

use graphvc_core::graph::DEV_OWNER;
use graphvc_core::{AppConfig, Error};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Authorized party reported by the development bypass when none is configured.
const DEV_AUTHORIZED_PARTY: &str = "http://localhost:3000";

/// Verified token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
    #[serde(default)]
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Token verification failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization token")]
    Missing,

    #[error("Token expired")]
    Expired,

    #[error("Token claim validation failed")]
    ClaimMismatch,

    #[error("Invalid token")]
    Malformed,

    /// Signing key could not be obtained; the cause is only logged.
    #[error("Token verification failed")]
    KeyFetch(String),

    /// Any other rejection.
    #[error("Token verification failed")]
    Rejected(String),

    #[error("Authentication is not configured")]
    Misconfigured(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience | ErrorKind::InvalidSubject => {
                AuthError::ClaimMismatch
            }
            ErrorKind::ImmatureSignature | ErrorKind::MissingRequiredClaim(_) => AuthError::Rejected(err.to_string()),
            _ => AuthError::Malformed,
        }
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Misconfigured(detail) => {
                tracing::error!(detail = %detail, "token verification is not configured");
                Error::Misconfigured(AuthError::Misconfigured(detail).to_string())
            }
            AuthError::KeyFetch(ref detail) | AuthError::Rejected(ref detail) => {
                tracing::warn!(detail = %detail, "token rejected");
                Error::Unauthorized(err.to_string())
            }
            other => Error::Unauthorized(other.to_string()),
        }
    }
}

/// Extract the credential from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Bearer token verifier.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: Option<Arc<dyn KeySource>>,
    authorized_parties: Vec<String>,
    dev_bypass: bool,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("authorized_parties", &self.authorized_parties)
            .field("dev_bypass", &self.dev_bypass)
            .field("configured", &self.keys.is_some())
            .finish()
    }
}

impl TokenVerifier {
    fn build(keys: Option<Arc<dyn KeySource>>, authorized_parties: Vec<String>, dev_bypass: bool) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        validation.leeway = 0;
        Self { keys, authorized_parties, dev_bypass, validation }
    }

    /// Verifier checking tokens against `keys`.
    pub fn new(keys: Arc<dyn KeySource>, authorized_parties: Vec<String>) -> Self {
        Self::build(Some(keys), authorized_parties, false)
    }

    /// Verifier with no key source; every presented token is a configuration error.
    pub fn unconfigured(authorized_parties: Vec<String>) -> Self {
        Self::build(None, authorized_parties, false)
    }

    /// Development bypass.
    pub fn dev_bypass(authorized_parties: Vec<String>) -> Self {
        Self::build(None, authorized_parties, true)
    }

    /// Select the verifier mode from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, AuthError> {
        let parties = config.authorized_party_list();

        if config.dev_skip_auth {
            tracing::warn!("token verification disabled (dev_skip_auth)");
            return Ok(Self::dev_bypass(parties));
        }

        match config.jwks_url.as_deref() {
            Some(url) => {
                let client = JwksClient::new(url, config.timeout())?;
                Ok(Self::new(Arc::new(client), parties))
            }
            None => Ok(Self::unconfigured(parties)),
        }
    }

    pub fn is_dev_bypass(&self) -> bool {
        self.dev_bypass
    }

    fn dev_claims(&self) -> Claims {
        let azp = self
            .authorized_parties
            .first()
            .cloned()
            .unwrap_or_else(|| DEV_AUTHORIZED_PARTY.to_string());
        Claims { sub: DEV_OWNER.to_string(), azp: Some(azp), exp: 0, iat: None, iss: None }
    }

    fn check_authorized_party(&self, claims: &Claims) -> Result<(), AuthError> {
        if let Some(azp) = claims.azp.as_deref()
            && !azp.is_empty()
            && !self.authorized_parties.is_empty()
            && !self.authorized_parties.iter().any(|p| p == azp)
        {
            tracing::info!(azp = %azp, "azp not in authorized parties");
            return Err(AuthError::ClaimMismatch);
        }
        Ok(())
    }

    /// Verify a required credential.
    pub async fn verify(&self, token: Option<&str>) -> Result<Claims, AuthError> {
        if self.dev_bypass {
            return Ok(self.dev_claims());
        }

        let token = token.map(str::trim).filter(|t| !t.is_empty()).ok_or(AuthError::Missing)?;
        let keys = self
            .keys
            .as_ref()
            .ok_or_else(|| AuthError::Misconfigured("jwks_url is not set".into()))?;

        let header = jsonwebtoken::decode_header(token)?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::KeyFetch("token header has no kid".into()))?;
        let key = keys.key(&kid).await?;

        let data = jsonwebtoken::decode::<Claims>(token, &key, &self.validation)?;
        self.check_authorized_party(&data.claims)?;
        Ok(data.claims)
    }

    /// Verify a credential if one was supplied.
    ///
    /// No credential yields `None`; a supplied one is fully verified.
    pub async fn verify_optional(&self, token: Option<&str>) -> Result<Option<Claims>, AuthError> {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            None => Ok(None),
            Some(token) => self.verify(Some(token)).await.map(Some),
        }
    }
}
