//! Signing key sources for bearer token verification.

use super::AuthError;
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// Minimum pause between two refetches of the published key set.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Lookup of verification keys by key id.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn key(&self, kid: &str) -> Result<DecodingKey, AuthError>;
}

/// Build a kid → key map, skipping entries without a kid or with an
/// unsupported key type.
fn decode_set(set: &JwkSet) -> HashMap<String, DecodingKey> {
    let mut keys = HashMap::new();
    for jwk in &set.keys {
        let Some(kid) = jwk.common.key_id.clone() else {
            continue;
        };
        match DecodingKey::from_jwk(jwk) {
            Ok(key) => {
                keys.insert(kid, key);
            }
            Err(e) => tracing::warn!(kid = %kid, error = %e, "skipping unusable JWK"),
        }
    }
    keys
}

/// Published key set fetched over HTTPS and cached in memory.
///
/// An unknown key id triggers a refetch, so rotated keys are picked up
/// without a restart. Refetches are spaced by at least 30 seconds.
pub struct JwksClient {
    http: reqwest::Client,
    url: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_refresh: Mutex<Option<Instant>>,
}

impl JwksClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| AuthError::KeyFetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, url: url.into(), keys: RwLock::new(HashMap::new()), last_refresh: Mutex::new(None) })
    }

    async fn cached(&self, kid: &str) -> Option<DecodingKey> {
        self.keys.read().await.get(kid).cloned()
    }

    async fn fetch_set(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .http
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        response.json::<JwkSet>().await.map_err(|e| AuthError::KeyFetch(e.to_string()))
    }

    /// Refetch the key set unless it was refreshed recently.
    async fn refresh(&self) -> Result<(), AuthError> {
        let mut last = self.last_refresh.lock().await;
        if let Some(at) = *last
            && at.elapsed() < MIN_REFRESH_INTERVAL
        {
            return Ok(());
        }

        let set = self.fetch_set().await?;
        let keys = decode_set(&set);
        tracing::debug!(url = %self.url, keys = keys.len(), "refreshed signing keys");
        *self.keys.write().await = keys;
        *last = Some(Instant::now());
        Ok(())
    }
}

#[async_trait]
impl KeySource for JwksClient {
    async fn key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.cached(kid).await {
            return Ok(key);
        }

        self.refresh().await?;

        self.cached(kid)
            .await
            .ok_or_else(|| AuthError::KeyFetch(format!("no signing key for kid {kid}")))
    }
}

/// Fixed key table.
#[derive(Default, Clone)]
pub struct StaticKeys {
    keys: HashMap<String, DecodingKey>,
}

impl StaticKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an RSA public key given as base64url modulus and exponent.
    pub fn with_rsa(mut self, kid: &str, modulus: &str, exponent: &str) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_components(modulus, exponent).map_err(|e| AuthError::KeyFetch(e.to_string()))?;
        self.keys.insert(kid.to_string(), key);
        Ok(self)
    }
}

#[async_trait]
impl KeySource for StaticKeys {
    async fn key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyFetch(format!("no signing key for kid {kid}")))
    }
}
