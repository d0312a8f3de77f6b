//! Fixed-window request quotas.
//!
//! Two independent tiers: anonymous callers are keyed by source IP,
//! authenticated callers by subject id. Each tier allows `max_requests` per
//! fixed window (default 3 per 24h); counters reset at window boundaries
//! aligned to the unix epoch.
//!
//! [`WindowLimiter`] enforces quotas against the SQLite store.
//! [`Unlimited`] is selected when no store is configured and allows
//! everything.

pub mod windows;

pub use windows::WindowHit;

use crate::Error;
use crate::store::{self, Database};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Quota tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Anonymous,
    Authenticated,
}

impl Tier {
    fn key_prefix(self) -> &'static str {
        match self {
            Tier::Anonymous => "ratelimit:anon",
            Tier::Authenticated => "ratelimit:auth",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Anonymous => "anonymous",
            Tier::Authenticated => "authenticated",
        }
    }
}

/// Requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub max_requests: u64,
    pub window: Duration,
}

impl Default for Policy {
    fn default() -> Self {
        Self { max_requests: 3, window: Duration::from_secs(86_400) }
    }
}

impl Policy {
    /// Start of the window containing unix time `now`.
    pub fn window_start(&self, now: i64) -> i64 {
        let len = self.window.as_secs().max(1) as i64;
        now - now.rem_euclid(len)
    }

    /// Unix time at which the window containing `now` resets.
    pub fn window_reset(&self, now: i64) -> i64 {
        self.window_start(now) + self.window.as_secs().max(1) as i64
    }
}

/// Result of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Quota exhausted; seconds until the window resets (at least 1).
    Deny { retry_after: u64 },
}

/// Quota state reported by `GET /usage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub used: u64,
    pub limit: u64,
    /// Unix seconds of the next window boundary.
    pub reset: i64,
}

/// Quota enforcement.
#[async_trait]
pub trait RateLimit: Send + Sync {
    /// Count a request for `identity` and decide whether it may proceed.
    async fn check(&self, identity: &str, tier: Tier) -> Result<Decision, Error>;

    /// Report quota state without counting a request.
    async fn peek(&self, identity: &str, tier: Tier) -> Result<Usage, Error>;
}

/// Limiter used when no counter store is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

#[async_trait]
impl RateLimit for Unlimited {
    async fn check(&self, _identity: &str, _tier: Tier) -> Result<Decision, Error> {
        Ok(Decision::Allow)
    }

    async fn peek(&self, _identity: &str, _tier: Tier) -> Result<Usage, Error> {
        Ok(Usage { used: 0, limit: 0, reset: 0 })
    }
}

/// SQLite-backed fixed-window limiter.
#[derive(Debug, Clone)]
pub struct WindowLimiter {
    db: Database,
    anonymous: Policy,
    authenticated: Policy,
    timeout: Duration,
}

impl WindowLimiter {
    pub fn new(db: Database, anonymous: Policy, authenticated: Policy, timeout: Duration) -> Self {
        Self { db, anonymous, authenticated, timeout }
    }

    fn policy(&self, tier: Tier) -> Policy {
        match tier {
            Tier::Anonymous => self.anonymous,
            Tier::Authenticated => self.authenticated,
        }
    }

    fn key(tier: Tier, identity: &str) -> String {
        format!("{}:{}", tier.key_prefix(), identity)
    }

    /// Check evaluated at unix time `now`.
    pub async fn check_at(&self, identity: &str, tier: Tier, now: i64) -> Result<Decision, Error> {
        let policy = self.policy(tier);
        let key = Self::key(tier, identity);
        let start = policy.window_start(now);

        let hit = store::bounded(self.timeout, "rate limit check", self.db.hit_window(&key, start, policy.max_requests))
            .await?;

        match hit {
            WindowHit::Counted(count) => {
                tracing::debug!(tier = tier.as_str(), count, limit = policy.max_requests, "request counted");
                Ok(Decision::Allow)
            }
            WindowHit::Full => {
                let retry_after = (policy.window_reset(now) - now).max(1) as u64;
                tracing::info!(tier = tier.as_str(), retry_after, "rate limit exceeded");
                Ok(Decision::Deny { retry_after })
            }
        }
    }

    /// Peek evaluated at unix time `now`.
    pub async fn peek_at(&self, identity: &str, tier: Tier, now: i64) -> Result<Usage, Error> {
        let policy = self.policy(tier);
        let key = Self::key(tier, identity);
        let used =
            store::bounded(self.timeout, "rate limit peek", self.db.peek_window(&key, policy.window_start(now))).await?;

        Ok(Usage { used, limit: policy.max_requests, reset: policy.window_reset(now) })
    }
}

#[async_trait]
impl RateLimit for WindowLimiter {
    async fn check(&self, identity: &str, tier: Tier) -> Result<Decision, Error> {
        self.check_at(identity, tier, chrono::Utc::now().timestamp()).await
    }

    async fn peek(&self, identity: &str, tier: Tier) -> Result<Usage, Error> {
        self.peek_at(identity, tier, chrono::Utc::now().timestamp()).await
    }
}
