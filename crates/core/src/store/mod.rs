//! SQLite-backed storage shared by the cache, rate limiter, graph store and
//! metadata log.
//!
//! Access goes through tokio-rusqlite, which runs every statement on a
//! dedicated background thread. Schema is managed by [`migrations`].

pub mod connection;
pub mod migrations;

pub use connection::Database;

use crate::Error;
use std::future::Future;
use std::time::Duration;

/// Run a store operation with an upper bound on its duration.
///
/// An elapsed timeout surfaces as `Error::ServiceUnavailable`.
pub async fn bounded<T>(
    limit: Duration, op: &'static str, fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(op, timeout_ms = limit.as_millis() as u64, "store operation timed out");
            Err(Error::ServiceUnavailable(format!("{op} timed out")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let value = bounded(Duration::from_millis(100), "noop", async { Ok::<_, Error>(7) }).await;
        assert_eq!(value.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let result = bounded(Duration::from_millis(50), "slow", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, Error>(())
        })
        .await;
        assert!(matches!(result, Err(Error::ServiceUnavailable(msg)) if msg.contains("slow")));
    }
}
