//! URL scrape cache.
//!
//! Extracted page text keyed by the SHA-256 of the normalized URL, with a
//! fixed TTL from insertion. Entries are never mutated, only replaced or
//! expired.
//!
//! Two implementations are selected at startup:
//! - [`StoreScrapeCache`]: SQLite-backed, used when a store is configured.
//! - [`NoScrapeCache`]: always misses and never stores.
//!
//! Store failures are logged and degrade to a miss; they never fail the
//! caller.

pub mod entries;
pub mod hash;

pub use hash::{compute_cache_key, normalize_url};

use crate::store::{self, Database};
use async_trait::async_trait;
use std::time::Duration;

/// Default entry lifetime (1 hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// A cache hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedScrape {
    pub text: String,
    /// Seconds since the entry was stored; `None` when the store has no TTL
    /// for the entry.
    pub age_seconds: Option<u64>,
}

/// Scrape cache operations used by the pipeline.
#[async_trait]
pub trait ScrapeCache: Send + Sync {
    /// Look up the text cached for `url`.
    async fn get(&self, url: &str) -> Option<CachedScrape>;

    /// Store `text` for `url`, replacing any previous entry.
    async fn put(&self, url: &str, text: &str);
}

/// Cache used when no backing store is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScrapeCache;

#[async_trait]
impl ScrapeCache for NoScrapeCache {
    async fn get(&self, _url: &str) -> Option<CachedScrape> {
        None
    }

    async fn put(&self, _url: &str, _text: &str) {}
}

/// SQLite-backed scrape cache.
#[derive(Debug, Clone)]
pub struct StoreScrapeCache {
    db: Database,
    ttl: Duration,
    timeout: Duration,
}

impl StoreScrapeCache {
    pub fn new(db: Database, ttl: Duration, timeout: Duration) -> Self {
        Self { db, ttl, timeout }
    }

    /// Lookup evaluated at unix time `now`.
    pub async fn get_at(&self, url: &str, now: i64) -> Option<CachedScrape> {
        let key = compute_cache_key(url);
        let row = match store::bounded(self.timeout, "scrape cache read", self.db.get_scrape(&key, now)).await {
            Ok(row) => row?,
            Err(e) => {
                tracing::warn!(error = %e, "scrape cache read failed; treating as miss");
                return None;
            }
        };

        let ttl = self.ttl.as_secs() as i64;
        let age_seconds = row
            .expires_at
            .map(|exp| exp - now)
            .filter(|remaining| *remaining > 0)
            .map(|remaining| (ttl - remaining).max(0) as u64);

        tracing::debug!(key = %key, age_seconds, "scrape cache hit");
        Some(CachedScrape { text: row.text, age_seconds })
    }

    /// Store evaluated at unix time `now`.
    pub async fn put_at(&self, url: &str, text: &str, now: i64) {
        let key = compute_cache_key(url);
        let expires_at = now + self.ttl.as_secs() as i64;
        if let Err(e) =
            store::bounded(self.timeout, "scrape cache write", self.db.put_scrape(&key, text, now, Some(expires_at)))
                .await
        {
            tracing::warn!(error = %e, "scrape cache write failed");
        }
    }
}

#[async_trait]
impl ScrapeCache for StoreScrapeCache {
    async fn get(&self, url: &str) -> Option<CachedScrape> {
        self.get_at(url, chrono::Utc::now().timestamp()).await
    }

    async fn put(&self, url: &str, text: &str) {
        self.put_at(url, text, chrono::Utc::now().timestamp()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn cache() -> StoreScrapeCache {
        let db = Database::open_in_memory().await.unwrap();
        StoreScrapeCache::new(db, DEFAULT_TTL, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_round_trip_within_ttl() {
        let cache = cache().await;
        cache.put_at("https://example.com/a", "article text", 10_000).await;

        let hit = cache.get_at("https://example.com/a", 10_120).await.unwrap();
        assert_eq!(hit.text, "article text");
        assert_eq!(hit.age_seconds, Some(120));
    }

    #[tokio::test]
    async fn test_hit_immediately_after_put_has_zero_age() {
        let cache = cache().await;
        cache.put_at("https://example.com/a", "t", 5_000).await;
        assert_eq!(cache.get_at("https://example.com/a", 5_000).await.unwrap().age_seconds, Some(0));
    }

    #[tokio::test]
    async fn test_miss_after_ttl() {
        let cache = cache().await;
        cache.put_at("https://example.com/a", "t", 10_000).await;
        assert!(cache.get_at("https://example.com/a", 10_000 + 3600).await.is_none());
    }

    #[tokio::test]
    async fn test_normalized_spellings_hit() {
        let cache = cache().await;
        cache.put_at("https://example.com/a", "t", 0).await;
        assert!(cache.get_at("HTTPS://EXAMPLE.COM/A/", 1).await.is_some());
        assert!(cache.get_at("  https://example.com/a  ", 1).await.is_some());
        assert!(cache.get_at("https://example.org/a", 1).await.is_none());
    }

    #[tokio::test]
    async fn test_entry_without_expiry_reports_unknown_age() {
        let db = Database::open_in_memory().await.unwrap();
        db.put_scrape(&compute_cache_key("https://example.com"), "t", 0, None).await.unwrap();
        let cache = StoreScrapeCache::new(db, DEFAULT_TTL, Duration::from_secs(5));

        let hit = cache.get_at("https://example.com", 100).await.unwrap();
        assert_eq!(hit.age_seconds, None);
    }

    #[tokio::test]
    async fn test_absent_store_always_misses() {
        let cache = NoScrapeCache;
        cache.put("https://example.com", "t").await;
        assert!(cache.get("https://example.com").await.is_none());
    }
}
