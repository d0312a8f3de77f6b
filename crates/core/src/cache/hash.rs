//! Scrape cache key generation.

use sha2::{Digest, Sha256};

/// Prefix shared by all scrape cache keys.
pub const KEY_PREFIX: &str = "scrape:";

/// Normalize a URL for cache lookup.
///
/// Trims surrounding whitespace, lowercases the whole string and removes a
/// single trailing slash, so trivially different spellings share an entry.
pub fn normalize_url(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    match lowered.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => lowered,
    }
}

/// Compute the cache key for a URL: `scrape:` followed by the hex SHA-256
/// of the normalized URL.
pub fn compute_cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(url).as_bytes());
    format!("{KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}
