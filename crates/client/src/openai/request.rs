//! Chat completions request types and the graph response schema.

use graphvc_core::graph::{EntityKind, RelationshipKind};
use serde::Serialize;
use serde_json::{Value, json};

/// Property names accepted on nodes, in schema order.
pub const PROPERTY_NAMES: [&str; 12] = [
    "aum",
    "stage_focus",
    "chain_focus",
    "token_ticker",
    "chain",
    "category",
    "amount_usd",
    "stage",
    "date",
    "title",
    "firm",
    "description",
];

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub json_schema: JsonSchema,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonSchema {
    pub name: &'static str,
    pub strict: bool,
    pub schema: Value,
}

impl ChatRequest {
    /// Extraction request for `content` under `system_prompt`.
    pub fn extraction(model: &str, system_prompt: &str, content: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                Message { role: "system", content: system_prompt.to_string() },
                Message { role: "user", content: content.to_string() },
            ],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchema { name: "vc_knowledge_graph", strict: true, schema: graph_schema() },
            },
        }
    }
}

/// Strict-mode JSON schema for a knowledge graph.
///
/// Strict mode requires every property to be listed as required, so optional
/// node properties are typed as nullable strings.
pub fn graph_schema() -> Value {
    let entity_kinds: Vec<&str> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
    let relationship_kinds: Vec<&str> = RelationshipKind::ALL.iter().map(|k| k.as_str()).collect();

    let properties: serde_json::Map<String, Value> = PROPERTY_NAMES
        .iter()
        .map(|name| (name.to_string(), json!({ "type": ["string", "null"] })))
        .collect();

    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["nodes", "edges"],
        "properties": {
            "nodes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["id", "label", "type", "properties"],
                    "properties": {
                        "id": {
                            "type": "string",
                            "description": "Unique slug identifier derived from entity name, e.g., 'paradigm-capital'"
                        },
                        "label": { "type": "string", "description": "Display name, e.g., 'Paradigm Capital'" },
                        "type": { "type": "string", "enum": entity_kinds },
                        "properties": {
                            "type": "object",
                            "additionalProperties": false,
                            "required": PROPERTY_NAMES,
                            "properties": properties,
                            "description": "Entity-specific properties. Investor: aum, stage_focus, chain_focus. \
                                Project: token_ticker, chain, category. Round: amount_usd, stage, date. \
                                Person: title, firm. Narrative: description."
                        }
                    }
                }
            },
            "edges": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["source", "target", "relationship"],
                    "properties": {
                        "source": { "type": "string", "description": "Source node id" },
                        "target": { "type": "string", "description": "Target node id" },
                        "relationship": { "type": "string", "enum": relationship_kinds }
                    }
                }
            }
        }
    })
}
