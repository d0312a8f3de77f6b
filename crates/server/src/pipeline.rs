//! Generation pipeline: content acquisition, extraction, persistence.
//!
//! URL inputs are served from the scrape cache when possible and fetched
//! otherwise; text inputs are length-checked and capped. The graph store
//! write is not rolled back if the caller goes away afterwards, so a canceled
//! request may still leave its graph behind.

use crate::identity;
use crate::state::AppState;
use chrono::Utc;
use graphvc_client::{Claims, ExtractedContent};
use graphvc_client::extract::MAX_CONTENT_CHARS;
use graphvc_core::graph::{GraphMetadata, auto_title};
use graphvc_core::{Error, KnowledgeGraph};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// Minimum length of a raw text input, in characters.
pub const MIN_TEXT_CHARS: usize = 200;

const TOO_SHORT: &str = "Input too short - paste a full funding announcement or article for best results";

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub input: String,
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub graph: KnowledgeGraph,
    pub meta: GenerateMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateMeta {
    pub session_id: String,
    pub token_count: u64,
    pub source_type: SourceType,
    pub processing_ms: u64,
    pub cache_hit: bool,
    pub cache_age_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Url,
    Text,
}

impl SourceType {
    /// URL when the trimmed input starts with an http(s) scheme.
    ///
    /// Plain `http://` inputs are classified as URLs so that the validator
    /// rejects them rather than sending them to extraction as text.
    pub fn classify(input: &str) -> Self {
        let trimmed = input.trim_start();
        if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
            SourceType::Url
        } else {
            SourceType::Text
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Url => "url",
            SourceType::Text => "text",
        }
    }
}

struct Content {
    text: String,
    cache_hit: bool,
    cache_age_seconds: Option<u64>,
}

/// Check a raw text input and cap it.
pub fn prepare_text(input: &str) -> Result<String, Error> {
    if input.chars().count() < MIN_TEXT_CHARS {
        return Err(Error::InputTooShort(TOO_SHORT.into()));
    }
    Ok(ExtractedContent::new(input.to_string()).truncate(MAX_CONTENT_CHARS).text)
}

async fn url_content(state: &AppState, url: &str, force_refresh: bool) -> Result<Content, Error> {
    if !force_refresh && let Some(hit) = state.cache.get(url).await {
        tracing::debug!(age_seconds = hit.age_seconds, "scrape cache hit");
        return Ok(Content { text: hit.text, cache_hit: true, cache_age_seconds: hit.age_seconds });
    }

    let page = state.fetcher.fetch_text(url).await?;
    state.cache.put(url, &page.text).await;
    Ok(Content { text: page.text, cache_hit: false, cache_age_seconds: None })
}

/// Run one generation for `claims` (or an anonymous caller).
pub async fn run(
    state: &AppState, request: &GenerateRequest, claims: Option<&Claims>, byok: Option<&str>,
) -> Result<GenerateResponse, Error> {
    let start = Instant::now();
    let source_type = SourceType::classify(&request.input);
    let url = request.input.trim();

    let content = match source_type {
        SourceType::Url => url_content(state, url, request.force_refresh).await?,
        SourceType::Text => Content { text: prepare_text(&request.input)?, cache_hit: false, cache_age_seconds: None },
    };

    let extraction = state.extractor.extract(&content.text, byok).await?;
    let graph = extraction.graph.sanitize();

    let session_id = Uuid::new_v4().to_string();
    let owner = identity::owner(claims);
    state.graphs.persist(&session_id, owner, &graph).await?;

    if let Some(claims) = claims {
        let entry = GraphMetadata {
            user_id: claims.sub.clone(),
            title: auto_title(&request.input, source_type == SourceType::Url, Utc::now()),
            source_url: (source_type == SourceType::Url).then(|| url.to_string()),
            node_count: graph.nodes.len(),
            edge_count: graph.edges.len(),
            session_id: session_id.clone(),
        };
        record_metadata(state, entry);
    }

    let processing_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        session_id = %session_id,
        source_type = source_type.as_str(),
        cache_hit = content.cache_hit,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        tokens = extraction.total_tokens,
        processing_ms,
        "graph generated"
    );

    Ok(GenerateResponse {
        graph,
        meta: GenerateMeta {
            session_id,
            token_count: extraction.total_tokens,
            source_type,
            processing_ms,
            cache_hit: content.cache_hit,
            cache_age_seconds: content.cache_age_seconds,
        },
    })
}

/// Dispatch a metadata write without waiting for it.
fn record_metadata(state: &AppState, entry: GraphMetadata) {
    let log = state.metadata.clone();
    tokio::spawn(async move {
        let session_id = entry.session_id.clone();
        if let Err(e) = log.record(entry).await {
            tracing::warn!(session_id = %session_id, error = %e, "metadata log write failed");
        }
    });
}
