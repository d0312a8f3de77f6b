//! Graph persistence.
//!
//! Nodes and edges are scoped by session id and tagged with the owner that
//! generated them. Writes for one session happen in a single transaction.
//! There is no cross-service transaction with the caller: a write that
//! completed before the request was cancelled stays in place.

use super::{EntityKind, GraphEdge, GraphNode, KnowledgeGraph, NodeProperties, RelationshipKind};
use crate::Error;
use crate::store::Database;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_rusqlite::params;

/// A persisted graph together with its owner tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredGraph {
    pub owner: String,
    pub graph: KnowledgeGraph,
}

/// Graph store collaborator.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Persist every node and edge of `graph` under `session_id`.
    async fn persist(&self, session_id: &str, owner: &str, graph: &KnowledgeGraph) -> Result<(), Error>;

    /// Load the graph stored under `session_id`, or `None` if it has no nodes.
    async fn load(&self, session_id: &str) -> Result<Option<StoredGraph>, Error>;

    /// Check connectivity.
    async fn ping(&self) -> Result<(), Error>;
}

/// SQLite graph store.
#[derive(Debug, Clone)]
pub struct SqliteGraphStore {
    db: Database,
}

impl SqliteGraphStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn persist(&self, session_id: &str, owner: &str, graph: &KnowledgeGraph) -> Result<(), Error> {
        let session_id = session_id.to_string();
        let owner = owner.to_string();
        let graph = graph.clone();
        let created_at = chrono::Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                {
                    let mut insert_node = tx.prepare(
                        "INSERT INTO graph_nodes
                            (session_id, node_id, label, kind, properties, created_by, created_at, position)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )?;
                    for (position, node) in graph.nodes.iter().enumerate() {
                        let properties = serde_json::to_string(&node.properties)
                            .map_err(|e| Error::InvalidRequest(format!("unserializable properties: {e}")))?;
                        insert_node.execute(params![
                            session_id,
                            node.id,
                            node.label,
                            node.kind.as_str(),
                            properties,
                            owner,
                            created_at,
                            position as i64,
                        ])?;
                    }

                    let mut insert_edge = tx.prepare(
                        "INSERT INTO graph_edges (session_id, source, target, relationship, position)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for (position, edge) in graph.edges.iter().enumerate() {
                        insert_edge.execute(params![
                            session_id,
                            edge.source,
                            edge.target,
                            edge.relationship.as_str(),
                            position as i64,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn load(&self, session_id: &str) -> Result<Option<StoredGraph>, Error> {
        let session_id = session_id.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<Option<StoredGraph>, Error> {
                let mut owner = None;
                let mut nodes = Vec::new();
                {
                    let mut stmt = conn.prepare(
                        "SELECT node_id, label, kind, properties, created_by
                         FROM graph_nodes WHERE session_id = ?1 ORDER BY position",
                    )?;
                    let rows = stmt.query_map(params![session_id], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    })?;

                    for row in rows {
                        let (id, label, kind, properties, created_by) = row?;
                        owner.get_or_insert(created_by);
                        let Some(kind) = EntityKind::parse(&kind) else {
                            tracing::warn!(node_id = %id, kind = %kind, "skipping node with unknown kind");
                            continue;
                        };
                        let properties: NodeProperties = serde_json::from_str(&properties).unwrap_or_default();
                        nodes.push(GraphNode { id, label, kind, properties });
                    }
                }

                let Some(owner) = owner else {
                    return Ok(None);
                };

                let mut stmt = conn.prepare(
                    "SELECT source, target, relationship
                     FROM graph_edges WHERE session_id = ?1 ORDER BY position",
                )?;
                let rows = stmt.query_map(params![session_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                })?;

                let mut edges = Vec::new();
                for row in rows {
                    let (source, target, relationship) = row?;
                    match RelationshipKind::parse(&relationship) {
                        Some(relationship) => edges.push(GraphEdge { source, target, relationship }),
                        None => tracing::warn!(relationship = %relationship, "skipping edge with unknown kind"),
                    }
                }

                Ok(Some(StoredGraph { owner, graph: KnowledgeGraph { nodes, edges } }))
            })
            .await
            .map_err(Error::from)
    }

    async fn ping(&self) -> Result<(), Error> {
        self.db.ping().await
    }
}

/// Wraps a store so each operation is retried exactly once, after a fixed
/// pause, when the first attempt fails with a transient error.
#[derive(Debug, Clone)]
pub struct RetryingGraphStore<S> {
    inner: S,
    backoff: Duration,
}

impl<S: GraphStore> RetryingGraphStore<S> {
    pub fn new(inner: S, backoff: Duration) -> Self {
        Self { inner, backoff }
    }

    async fn attempt<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, Error>
    where
        F: Fn() -> Fut + Send,
        Fut: Future<Output = Result<T, Error>> + Send,
    {
        match f().await {
            Err(e) if e.is_transient() => {
                tracing::warn!(op, error = %e, backoff_ms = self.backoff.as_millis() as u64, "graph store retrying");
                tokio::time::sleep(self.backoff).await;
                f().await.map_err(|e| {
                    tracing::error!(op, error = %e, "graph store failed after retry");
                    Error::ServiceUnavailable("Graph database unavailable - please try again".into())
                })
            }
            other => other,
        }
    }
}

#[async_trait]
impl<S: GraphStore> GraphStore for RetryingGraphStore<S> {
    async fn persist(&self, session_id: &str, owner: &str, graph: &KnowledgeGraph) -> Result<(), Error> {
        self.attempt("persist", || self.inner.persist(session_id, owner, graph)).await
    }

    async fn load(&self, session_id: &str) -> Result<Option<StoredGraph>, Error> {
        self.attempt("load", || self.inner.load(session_id)).await
    }

    async fn ping(&self) -> Result<(), Error> {
        self.attempt("ping", || self.inner.ping()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ANONYMOUS_OWNER;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_graph() -> KnowledgeGraph {
        KnowledgeGraph {
            nodes: vec![
                GraphNode {
                    id: "paradigm".into(),
                    label: "Paradigm".into(),
                    kind: EntityKind::Investor,
                    properties: NodeProperties { aum: Some("$4B".into()), ..Default::default() },
                },
                GraphNode {
                    id: "uniswap".into(),
                    label: "Uniswap".into(),
                    kind: EntityKind::Project,
                    properties: NodeProperties::default(),
                },
            ],
            edges: vec![GraphEdge {
                source: "paradigm".into(),
                target: "uniswap".into(),
                relationship: RelationshipKind::InvestedIn,
            }],
        }
    }

    async fn store() -> SqliteGraphStore {
        SqliteGraphStore::new(Database::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_persist_and_load() {
        let store = store().await;
        store.persist("sess-1", "user_abc", &sample_graph()).await.unwrap();

        let stored = store.load("sess-1").await.unwrap().unwrap();
        assert_eq!(stored.owner, "user_abc");
        assert_eq!(stored.graph, sample_graph());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = store().await;
        store.persist("sess-1", ANONYMOUS_OWNER, &sample_graph()).await.unwrap();
        store.persist("sess-2", ANONYMOUS_OWNER, &sample_graph()).await.unwrap();

        let stored = store.load("sess-2").await.unwrap().unwrap();
        assert_eq!(stored.graph.nodes.len(), 2);
        assert_eq!(stored.graph.edges.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_session() {
        let store = store().await;
        assert!(store.load("nonexistent-session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_graph_loads_as_absent() {
        let store = store().await;
        store.persist("sess-empty", "u", &KnowledgeGraph::default()).await.unwrap();
        assert!(store.load("sess-empty").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_persist_writes_nothing() {
        let store = store().await;
        let mut graph = sample_graph();
        graph.edges[0].target = "ghost".into();

        assert!(store.persist("sess-1", "u", &graph).await.is_err());
        assert!(store.load("sess-1").await.unwrap().is_none());
    }

    /// Fails with a transient error for the first `failures` calls.
    struct FlakyStore {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self { failures, calls: AtomicUsize::new(0) }
        }

        fn next(&self) -> Result<(), Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures { Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed)) } else { Ok(()) }
        }
    }

    #[async_trait]
    impl GraphStore for FlakyStore {
        async fn persist(&self, _: &str, _: &str, _: &KnowledgeGraph) -> Result<(), Error> {
            self.next()
        }

        async fn load(&self, _: &str) -> Result<Option<StoredGraph>, Error> {
            self.next().map(|_| None)
        }

        async fn ping(&self) -> Result<(), Error> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::InvalidRequest("not transient".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_once_on_transient_failure() {
        let store = RetryingGraphStore::new(FlakyStore::new(1), Duration::from_secs(1));
        store.persist("s1", "u", &sample_graph()).await.unwrap();
        assert_eq!(store.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_failure_is_fatal() {
        let store = RetryingGraphStore::new(FlakyStore::new(5), Duration::from_secs(1));
        let err = store.load("s1").await.unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable(_)));
        assert_eq!(store.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_failure_not_retried() {
        let store = RetryingGraphStore::new(FlakyStore::new(0), Duration::from_secs(1));
        assert!(matches!(store.ping().await, Err(Error::InvalidRequest(_))));
        assert_eq!(store.inner.calls.load(Ordering::SeqCst), 1);
    }
}
