//! VC knowledge graph model.
//!
//! Entity and relationship kinds form closed enumerations; anything else is
//! rejected at deserialization.

pub mod metadata;
pub mod store;

pub use metadata::{GraphMetadata, MetadataLog, NoMetadataLog, StoreMetadataLog, auto_title};
pub use store::{GraphStore, RetryingGraphStore, SqliteGraphStore, StoredGraph};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Owner tag for graphs generated without an authenticated principal.
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// Subject substituted by the development auth bypass.
pub const DEV_OWNER: &str = "dev-user";

/// Entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Investor,
    Project,
    Round,
    Narrative,
    Person,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] =
        [EntityKind::Investor, EntityKind::Project, EntityKind::Round, EntityKind::Narrative, EntityKind::Person];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Investor => "Investor",
            EntityKind::Project => "Project",
            EntityKind::Round => "Round",
            EntityKind::Narrative => "Narrative",
            EntityKind::Person => "Person",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// Relationship kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    Led,
    InvestedIn,
    CoInvested,
    Raised,
    Founded,
    PartnersAt,
    FocusesOn,
    ClassifiedAs,
}

impl RelationshipKind {
    pub const ALL: [RelationshipKind; 8] = [
        RelationshipKind::Led,
        RelationshipKind::InvestedIn,
        RelationshipKind::CoInvested,
        RelationshipKind::Raised,
        RelationshipKind::Founded,
        RelationshipKind::PartnersAt,
        RelationshipKind::FocusesOn,
        RelationshipKind::ClassifiedAs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::Led => "LED",
            RelationshipKind::InvestedIn => "INVESTED_IN",
            RelationshipKind::CoInvested => "CO_INVESTED",
            RelationshipKind::Raised => "RAISED",
            RelationshipKind::Founded => "FOUNDED",
            RelationshipKind::PartnersAt => "PARTNERS_AT",
            RelationshipKind::FocusesOn => "FOCUSES_ON",
            RelationshipKind::ClassifiedAs => "CLASSIFIED_AS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// Entity properties. Which fields apply depends on the entity kind:
///
/// - Investor: `aum`, `stage_focus`, `chain_focus`
/// - Project: `token_ticker`, `chain`, `category`
/// - Round: `amount_usd`, `stage`, `date`
/// - Person: `title`, `firm`
/// - Narrative: `description`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_focus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_focus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_usd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Lowercase-hyphenated slug, unique within a graph.
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default)]
    pub properties: NodeProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relationship: RelationshipKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl KnowledgeGraph {
    /// Keep the first node for each id and drop edges whose endpoints are
    /// not nodes of this graph.
    pub fn sanitize(mut self) -> Self {
        let mut seen = HashSet::new();
        self.nodes.retain(|n| seen.insert(n.id.clone()));

        let before = self.edges.len();
        self.edges
            .retain(|e| seen.contains(&e.source) && seen.contains(&e.target));
        let dropped = before - self.edges.len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped edges with unknown endpoints");
        }
        self
    }
}

/// Whether `caller` may read a graph owned by `owner`.
///
/// Anonymous graphs are public. Graphs of the legacy dev identity are public
/// only when `legacy_dev_public` is set.
pub fn can_read(owner: &str, caller: &str, legacy_dev_public: bool) -> bool {
    owner == caller || owner == ANONYMOUS_OWNER || (legacy_dev_public && owner == DEV_OWNER)
}
