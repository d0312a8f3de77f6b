//! Long-lived collaborators shared by every request.

use crate::identity::ByokPattern;
use anyhow::Context;
use graphvc_client::fetch::{ContentFetcher, FetchConfig, PageFetcher, UrlValidator};
use graphvc_client::{GraphExtractor, OpenAiClient, OpenAiConfig, TokenVerifier};
use graphvc_core::graph::{MetadataLog, NoMetadataLog, RetryingGraphStore, SqliteGraphStore, StoreMetadataLog};
use graphvc_core::ratelimit::Policy;
use graphvc_core::{
    AppConfig, Database, GraphStore, NoScrapeCache, RateLimit, ScrapeCache, StoreScrapeCache, Unlimited, WindowLimiter,
};
use std::sync::Arc;
use std::time::Duration;

/// Application state handed to every handler.
///
/// Optional backing stores are chosen once here; handlers never check
/// whether a store is configured.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub verifier: Arc<TokenVerifier>,
    pub byok: Arc<ByokPattern>,
    pub limiter: Arc<dyn RateLimit>,
    pub cache: Arc<dyn ScrapeCache>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub extractor: Arc<dyn GraphExtractor>,
    pub graphs: Arc<dyn GraphStore>,
    pub metadata: Arc<dyn MetadataLog>,
}

impl AppState {
    /// Build every collaborator from validated configuration.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let verifier = TokenVerifier::from_config(&config).context("token verifier")?;
        if !verifier.is_dev_bypass() && config.jwks_url.is_none() {
            tracing::warn!("jwks_url not set; bearer tokens will be rejected as misconfigured");
        }

        let byok = ByokPattern::new(&config.byok_prefix).context("byok_prefix")?;

        let (limiter, cache): (Arc<dyn RateLimit>, Arc<dyn ScrapeCache>) = match &config.store_db_path {
            Some(path) => {
                let db = Database::open(path)
                    .await
                    .with_context(|| format!("opening store database {}", path.display()))?;
                let policy = Policy {
                    max_requests: config.rate_limit_max,
                    window: Duration::from_secs(config.rate_limit_window_secs),
                };
                match db.purge_expired_scrapes(chrono::Utc::now().timestamp()).await {
                    Ok(purged) => tracing::info!(purged, "purged expired scrape cache entries"),
                    Err(e) => tracing::warn!(error = %e, "scrape cache purge failed"),
                }
                let limiter = WindowLimiter::new(db.clone(), policy, policy, config.store_timeout());
                let cache = StoreScrapeCache::new(db, Duration::from_secs(config.cache_ttl_secs), config.store_timeout());
                (Arc::new(limiter), Arc::new(cache))
            }
            None => {
                tracing::warn!("store_db_path not set; scrape cache and rate limits disabled");
                (Arc::new(Unlimited), Arc::new(NoScrapeCache))
            }
        };

        let metadata: Arc<dyn MetadataLog> = match &config.metadata_db_path {
            Some(path) => {
                let db = Database::open(path)
                    .await
                    .with_context(|| format!("opening metadata database {}", path.display()))?;
                Arc::new(StoreMetadataLog::new(db, config.store_timeout()))
            }
            None => Arc::new(NoMetadataLog),
        };

        let graph_db = Database::open(&config.graph_db_path)
            .await
            .with_context(|| format!("opening graph database {}", config.graph_db_path.display()))?;
        graph_db.ping().await.context("graph database ping")?;
        let graphs = RetryingGraphStore::new(SqliteGraphStore::new(graph_db), config.graph_retry_backoff());

        if let Err(e) = config.require_openai_api_key() {
            tracing::warn!(error = %e, "only requests with a caller key can generate");
        }
        let extractor = OpenAiClient::new(OpenAiConfig::from(&config)).context("openai client")?;

        let fetcher = ContentFetcher::new(UrlValidator::default(), FetchConfig::from(&config));

        Ok(Self {
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            byok: Arc::new(byok),
            limiter,
            cache,
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            graphs: Arc::new(graphs),
            metadata,
        })
    }
}
