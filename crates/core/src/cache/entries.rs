//! Row-level access to the `scrape_cache` table.

use crate::Error;
use crate::store::Database;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

/// A stored scrape, as read back from the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRow {
    pub text: String,
    pub stored_at: i64,
    /// Unix seconds after which the row is dead; `None` means no expiry recorded.
    pub expires_at: Option<i64>,
}

impl Database {
    /// Insert or replace the scraped text stored under `key`.
    pub async fn put_scrape(&self, key: &str, text: &str, now: i64, expires_at: Option<i64>) -> Result<(), Error> {
        let key = key.to_string();
        let text = text.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO scrape_cache (key, text, stored_at, expires_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(key) DO UPDATE SET
                        text = excluded.text,
                        stored_at = excluded.stored_at,
                        expires_at = excluded.expires_at",
                    params![key, text, now, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Read a live row. Rows whose expiry has passed are deleted and
    /// reported as absent.
    pub async fn get_scrape(&self, key: &str, now: i64) -> Result<Option<ScrapeRow>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ScrapeRow>, Error> {
                let row = conn
                    .query_row(
                        "SELECT text, stored_at, expires_at FROM scrape_cache WHERE key = ?1",
                        params![key],
                        |row| Ok(ScrapeRow { text: row.get(0)?, stored_at: row.get(1)?, expires_at: row.get(2)? }),
                    )
                    .optional()?;

                match row {
                    Some(r) if r.expires_at.is_some_and(|exp| exp <= now) => {
                        conn.execute("DELETE FROM scrape_cache WHERE key = ?1", params![key])?;
                        Ok(None)
                    }
                    other => Ok(other),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every expired row. Returns the number of rows removed.
    pub async fn purge_expired_scrapes(&self, now: i64) -> Result<usize, Error> {
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                Ok(conn.execute(
                    "DELETE FROM scrape_cache WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?)
            })
            .await
            .map_err(Error::from)
    }
}
