//! Chat completions response types.

use super::OpenAiError;
use graphvc_core::KnowledgeGraph;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub total_tokens: u64,
}

/// Graph produced by one extraction call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub graph: KnowledgeGraph,
    pub total_tokens: u64,
}

impl TryFrom<ChatResponse> for Extraction {
    type Error = OpenAiError;

    fn try_from(raw: ChatResponse) -> Result<Self, Self::Error> {
        let total_tokens = raw.usage.map(|u| u.total_tokens).unwrap_or(0);
        let message = raw
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| OpenAiError::Parse("response has no choices".into()))?;

        if let Some(refusal) = message.refusal {
            return Err(OpenAiError::Refusal(refusal));
        }

        let content = message
            .content
            .ok_or_else(|| OpenAiError::Parse("response has no content".into()))?;
        let graph: KnowledgeGraph = serde_json::from_str(&content).map_err(|e| OpenAiError::Parse(e.to_string()))?;

        Ok(Self { graph, total_tokens })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphvc_core::graph::{EntityKind, RelationshipKind};

    fn response(content: &str) -> ChatResponse {
        serde_json::from_value(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content, "refusal": null } }],
            "usage": { "prompt_tokens": 900, "completion_tokens": 334, "total_tokens": 1234 }
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_graph() {
        let content = r#"{
            "nodes": [
                {"id": "paradigm", "label": "Paradigm", "type": "Investor",
                 "properties": {"aum": "$12B", "stage_focus": null, "chain_focus": null, "token_ticker": null,
                    "chain": null, "category": null, "amount_usd": null, "stage": null, "date": null,
                    "title": null, "firm": null, "description": null}},
                {"id": "series-b-2024", "label": "Series B", "type": "Round", "properties": {"amount_usd": "$50M"}}
            ],
            "edges": [{"source": "paradigm", "target": "series-b-2024", "relationship": "LED"}]
        }"#;

        let extraction = Extraction::try_from(response(content)).unwrap();
        assert_eq!(extraction.total_tokens, 1234);
        assert_eq!(extraction.graph.nodes[0].kind, EntityKind::Investor);
        assert_eq!(extraction.graph.nodes[0].properties.aum.as_deref(), Some("$12B"));
        assert_eq!(extraction.graph.nodes[0].properties.stage, None);
        assert_eq!(extraction.graph.edges[0].relationship, RelationshipKind::Led);

        let json = serde_json::to_value(&extraction.graph.nodes[0]).unwrap();
        assert_eq!(json["properties"], serde_json::json!({"aum": "$12B"}));
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        let content = r#"{"nodes": [{"id": "x", "label": "X", "type": "Company", "properties": {}}], "edges": []}"#;
        assert!(matches!(Extraction::try_from(response(content)), Err(OpenAiError::Parse(_))));
    }

    #[test]
    fn test_refusal() {
        let raw: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "content": null, "refusal": "I can't help with that." } }]
        }))
        .unwrap();
        assert!(matches!(Extraction::try_from(raw), Err(OpenAiError::Refusal(_))));
    }

    #[test]
    fn test_no_choices() {
        let raw: ChatResponse = serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        assert!(matches!(Extraction::try_from(raw), Err(OpenAiError::Parse(_))));
    }
}
