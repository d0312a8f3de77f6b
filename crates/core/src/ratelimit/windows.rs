//! Row-level access to the `rate_windows` table.

use crate::Error;
use crate::store::Database;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{OptionalExtension, TransactionBehavior};

/// Outcome of an attempted increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowHit {
    /// The request was counted; holds the count after increment.
    Counted(u64),
    /// The window is full; nothing was written.
    Full,
}

impl Database {
    /// Count one request against `key` in the window starting at
    /// `window_start`, unless the window already holds `max` requests.
    ///
    /// A row from an earlier window is reset to this window. The read and
    /// write run in one immediate transaction.
    pub async fn hit_window(&self, key: &str, window_start: i64, max: u64) -> Result<WindowHit, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<WindowHit, Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let current: Option<(i64, i64)> = tx
                    .query_row(
                        "SELECT window_start, count FROM rate_windows WHERE key = ?1",
                        params![key],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                let count = match current {
                    Some((start, count)) if start == window_start => count.max(0) as u64,
                    _ => 0,
                };

                if count >= max {
                    tx.commit()?;
                    return Ok(WindowHit::Full);
                }

                let next = count + 1;
                tx.execute(
                    "INSERT INTO rate_windows (key, window_start, count) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        window_start = excluded.window_start,
                        count = excluded.count",
                    params![key, window_start, next as i64],
                )?;
                tx.commit()?;

                Ok(WindowHit::Counted(next))
            })
            .await
            .map_err(Error::from)
    }

    /// Requests counted against `key` in the window starting at `window_start`.
    pub async fn peek_window(&self, key: &str, window_start: i64) -> Result<u64, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: Option<i64> = conn
                    .query_row(
                        "SELECT count FROM rate_windows WHERE key = ?1 AND window_start = ?2",
                        params![key, window_start],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(count.unwrap_or(0).max(0) as u64)
            })
            .await
            .map_err(Error::from)
    }
}
