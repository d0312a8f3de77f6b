//! OpenAI chat completions client for knowledge graph extraction.
//!
//! ### API contract
//!
//! - **Endpoint**: `{base_url}/chat/completions`
//! - **Authentication**: `Authorization: Bearer <key>`. A valid caller key
//!   (BYOK) replaces the server key for that request and is never logged.
//! - **Output**: strict `json_schema` response format, parsed straight into
//!   [`KnowledgeGraph`](graphvc_core::KnowledgeGraph).
//! - **Errors**: 401/403 → configuration error, 429 → rate limited,
//!   400 → unprocessable input, anything else → unavailable.

pub mod error;
pub mod prompt;
pub mod request;
pub mod response;

pub use error::OpenAiError;
pub use request::{ChatRequest, graph_schema};
pub use response::{ChatResponse, Extraction};

use async_trait::async_trait;
use graphvc_core::{AppConfig, Error};
use reqwest::header;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default base URL for the OpenAI API.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model.
const DEFAULT_MODEL: &str = "gpt-4o";

/// Default request timeout; extraction of a long article can take a while.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Structured graph extraction collaborator.
#[async_trait]
pub trait GraphExtractor: Send + Sync {
    /// Extract a graph from `content`, using `api_key` instead of the
    /// server key when given.
    async fn extract(&self, content: &str, api_key: Option<&str>) -> Result<Extraction, Error>;
}

/// OpenAI client configuration.
#[derive(Clone)]
pub struct OpenAiConfig {
    /// Server key; requests without BYOK fail when absent.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl From<&AppConfig> for OpenAiConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_key: config.openai_api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.openai_model.clone(),
            ..Default::default()
        }
    }
}

/// OpenAI chat completions client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: Arc<OpenAiConfig>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, OpenAiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| OpenAiError::Network(Arc::new(e)))?;

        Ok(Self { http, config: Arc::new(config) })
    }

    fn key<'a>(&'a self, byok: Option<&'a str>) -> Result<&'a str, OpenAiError> {
        byok.or(self.config.api_key.as_deref()).ok_or(OpenAiError::MissingApiKey)
    }

    /// Run one structured extraction call.
    pub async fn complete(&self, content: &str, byok: Option<&str>) -> Result<Extraction, OpenAiError> {
        let key = self.key(byok)?;
        let start = Instant::now();
        let url = format!("{}/chat/completions", self.config.base_url);
        let request = ChatRequest::extraction(&self.config.model, prompt::SYSTEM_PROMPT, content);

        let http_response = self
            .http
            .post(&url)
            .bearer_auth(key)
            .header(header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = http_response.status();
        tracing::debug!(status = status.as_u16(), byok = byok.is_some(), "chat completions response");

        if status == 401 || status == 403 {
            return Err(OpenAiError::AuthError);
        }

        if status == 429 {
            return Err(OpenAiError::RateLimited);
        }

        if status == 400 {
            let detail = http_response.text().await.unwrap_or_default();
            return Err(OpenAiError::BadRequest(detail));
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(OpenAiError::HttpError { status: status.as_u16() });
        }

        let bytes = http_response.bytes().await?;
        let raw: ChatResponse = serde_json::from_slice(&bytes).map_err(|e| OpenAiError::Parse(e.to_string()))?;
        let extraction = Extraction::try_from(raw)?;

        tracing::debug!(
            nodes = extraction.graph.nodes.len(),
            edges = extraction.graph.edges.len(),
            tokens = extraction.total_tokens,
            llm_ms = start.elapsed().as_millis() as u64,
            "graph extracted"
        );

        Ok(extraction)
    }
}

#[async_trait]
impl GraphExtractor for OpenAiClient {
    async fn extract(&self, content: &str, api_key: Option<&str>) -> Result<Extraction, Error> {
        self.complete(content, api_key).await.map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = OpenAiConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4o");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = OpenAiConfig { api_key: Some("sk-server-secret".into()), ..Default::default() };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-server-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_key_selection() {
        let client = OpenAiClient::new(OpenAiConfig { api_key: Some("sk-server".into()), ..Default::default() }).unwrap();
        assert_eq!(client.key(None).unwrap(), "sk-server");
        assert_eq!(client.key(Some("sk-caller")).unwrap(), "sk-caller");

        let keyless = OpenAiClient::new(OpenAiConfig::default()).unwrap();
        assert!(matches!(keyless.key(None), Err(OpenAiError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_missing_key_is_misconfigured() {
        let client = OpenAiClient::new(OpenAiConfig::default()).unwrap();
        let err = client.extract("content", None).await.unwrap_err();
        assert!(matches!(err, Error::Misconfigured(_)));
    }
}
