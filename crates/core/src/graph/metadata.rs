//! Side log of generated graphs, used for per-user history.
//!
//! Writes are fire-and-forget: callers dispatch them without awaiting and a
//! failure is only logged.

use crate::Error;
use crate::store::{self, Database};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio_rusqlite::params;

/// One row of the metadata log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphMetadata {
    pub user_id: String,
    pub title: String,
    pub source_url: Option<String>,
    pub node_count: usize,
    pub edge_count: usize,
    pub session_id: String,
}

#[async_trait]
pub trait MetadataLog: Send + Sync {
    async fn record(&self, entry: GraphMetadata) -> Result<(), Error>;
}

/// Log used when no metadata store is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetadataLog;

#[async_trait]
impl MetadataLog for NoMetadataLog {
    async fn record(&self, _entry: GraphMetadata) -> Result<(), Error> {
        Ok(())
    }
}

/// SQLite-backed metadata log.
#[derive(Debug, Clone)]
pub struct StoreMetadataLog {
    db: Database,
    timeout: Duration,
}

impl StoreMetadataLog {
    pub fn new(db: Database, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    /// Most recent entries for `user_id`, newest first.
    #[cfg(test)]
    pub(crate) async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<GraphMetadata>, Error> {
        let user_id = user_id.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<GraphMetadata>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT user_id, title, source_url, node_count, edge_count, session_id
                     FROM graph_metadata WHERE user_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![user_id, limit as i64], |row| {
                    Ok(GraphMetadata {
                        user_id: row.get(0)?,
                        title: row.get(1)?,
                        source_url: row.get(2)?,
                        node_count: row.get::<_, i64>(3)? as usize,
                        edge_count: row.get::<_, i64>(4)? as usize,
                        session_id: row.get(5)?,
                    })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl MetadataLog for StoreMetadataLog {
    async fn record(&self, entry: GraphMetadata) -> Result<(), Error> {
        let created_at = Utc::now().to_rfc3339();
        let db = self.db.clone();
        store::bounded(self.timeout, "metadata write", async move {
            db.conn
                .call(move |conn| -> Result<(), Error> {
                    conn.execute(
                        "INSERT INTO graph_metadata
                            (user_id, title, source_url, node_count, edge_count, session_id, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            entry.user_id,
                            entry.title,
                            entry.source_url,
                            entry.node_count as i64,
                            entry.edge_count as i64,
                            entry.session_id,
                            created_at,
                        ],
                    )?;
                    Ok(())
                })
                .await
                .map_err(Error::from)
        })
        .await
    }
}

/// Display title for a generated graph.
///
/// URL inputs become `"<host> · <Mon D>"` with any `www.` prefix removed;
/// text inputs become their first 60 characters, with `...` appended when
/// longer.
pub fn auto_title(raw_input: &str, is_url: bool, now: DateTime<Utc>) -> String {
    let trimmed = raw_input.trim();
    if is_url {
        let after_scheme = trimmed.split_once("://").map_or(trimmed, |(_, rest)| rest);
        let host = after_scheme.split(['/', '?', '#']).next().unwrap_or_default();
        let host = host.strip_prefix("www.").unwrap_or(host);
        format!("{host} · {}", now.format("%b %-d"))
    } else if trimmed.chars().count() > 60 {
        format!("{}...", trimmed.chars().take(60).collect::<String>())
    } else {
        trimmed.to_string()
    }
}
