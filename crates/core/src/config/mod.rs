//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (GRAPHVC_*)
//! 2. TOML config file (if GRAPHVC_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Browser identification sent with every page fetch.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Environment name under which the development auth bypass is permitted.
pub const DEVELOPMENT_ENV: &str = "development";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (GRAPHVC_*)
/// 2. TOML config file (if GRAPHVC_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Deployment environment name ("development", "staging", "production", ...).
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Skip bearer verification and substitute a synthetic identity.
    ///
    /// Refused at startup unless `environment` is "development".
    #[serde(default)]
    pub dev_skip_auth: bool,

    /// Allow unauthenticated callers on `POST /generate` (anonymous tier).
    #[serde(default = "default_true")]
    pub allow_anonymous: bool,

    /// Published key set used to verify bearer tokens.
    #[serde(default)]
    pub jwks_url: Option<String>,

    /// Comma-separated allow-list for the `azp` claim.
    ///
    /// An empty list skips the check.
    #[serde(default)]
    pub authorized_parties: String,

    /// Treat graphs owned by the legacy "dev-user" identity as public.
    #[serde(default)]
    pub legacy_dev_owner_public: bool,

    /// Use the first `X-Forwarded-For` entry as the client IP.
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Server-side OpenAI key. Callers may bring their own instead.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Model used for structured extraction.
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// OpenAI API base URL.
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// Path to the SQLite graph database.
    #[serde(default = "default_graph_db_path")]
    pub graph_db_path: PathBuf,

    /// Path to the SQLite store backing the scrape cache and rate limits.
    ///
    /// Unset disables both (always-miss cache, no enforcement).
    #[serde(default)]
    pub store_db_path: Option<PathBuf>,

    /// Path to the SQLite graph metadata log. Unset disables the log.
    #[serde(default)]
    pub metadata_db_path: Option<PathBuf>,

    /// User-Agent string for page fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Per-request fetch timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum redirects followed per fetch.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Scrape cache entry lifetime in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Requests allowed per identity per window.
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u64,

    /// Fixed window length in seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Upper bound for a single cache or rate-limit store call.
    #[serde(default = "default_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Pause between the first and second graph store attempt.
    #[serde(default = "default_graph_retry_backoff_ms")]
    pub graph_retry_backoff_ms: u64,

    /// Required prefix of a bring-your-own OpenAI key.
    #[serde(default = "default_byok_prefix")]
    pub byok_prefix: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".into()
}

fn default_environment() -> String {
    "production".into()
}

fn default_openai_model() -> String {
    "gpt-4o".into()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_graph_db_path() -> PathBuf {
    PathBuf::from("./graphvc-graph.sqlite")
}

fn default_user_agent() -> String {
    CHROME_USER_AGENT.into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_rate_limit_max() -> u64 {
    3
}

fn default_rate_limit_window_secs() -> u64 {
    86_400
}

fn default_graph_retry_backoff_ms() -> u64 {
    1000
}

fn default_byok_prefix() -> String {
    "sk-".into()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            environment: default_environment(),
            dev_skip_auth: false,
            allow_anonymous: true,
            jwks_url: None,
            authorized_parties: String::new(),
            legacy_dev_owner_public: false,
            trust_forwarded_for: false,
            openai_api_key: None,
            openai_model: default_openai_model(),
            openai_base_url: default_openai_base_url(),
            graph_db_path: default_graph_db_path(),
            store_db_path: None,
            metadata_db_path: None,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            cache_ttl_secs: default_cache_ttl_secs(),
            rate_limit_max: default_rate_limit_max(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            store_timeout_ms: default_timeout_ms(),
            graph_retry_backoff_ms: default_graph_retry_backoff_ms(),
            byok_prefix: default_byok_prefix(),
        }
    }
}

impl AppConfig {
    /// Fetch timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Store call timeout as Duration.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Graph store retry pause as Duration.
    pub fn graph_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.graph_retry_backoff_ms)
    }

    /// Whether the process runs in the development environment.
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEVELOPMENT_ENV)
    }

    /// Parsed `authorized_parties` allow-list, blanks removed.
    pub fn authorized_party_list(&self) -> Vec<String> {
        self.authorized_parties
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `GRAPHVC_`
    /// 2. TOML file from `GRAPHVC_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("GRAPHVC_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("GRAPHVC_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// Check if a server-side OpenAI key is available.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is not set.
    pub fn require_openai_api_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "openai_api_key".into(),
            hint: "Set GRAPHVC_OPENAI_API_KEY environment variable".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.environment, "production");
        assert_eq!(config.user_agent, CHROME_USER_AGENT);
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.cache_ttl_secs, 3600);
        assert_eq!(config.rate_limit_max, 3);
        assert_eq!(config.rate_limit_window_secs, 86_400);
        assert!(config.allow_anonymous);
        assert!(!config.dev_skip_auth);
        assert!(config.store_db_path.is_none());
        assert!(config.metadata_db_path.is_none());
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.store_timeout(), Duration::from_secs(10));
        assert_eq!(config.graph_retry_backoff(), Duration::from_secs(1));
    }

    #[test]
    fn test_authorized_party_list() {
        let config = AppConfig {
            authorized_parties: " https://app.example.com, ,http://localhost:3000 ".into(),
            ..Default::default()
        };
        assert_eq!(config.authorized_party_list(), vec!["https://app.example.com", "http://localhost:3000"]);

        assert!(AppConfig::default().authorized_party_list().is_empty());
    }

    #[test]
    fn test_require_openai_api_key() {
        let config = AppConfig::default();
        assert!(matches!(config.require_openai_api_key(), Err(ConfigError::Missing { .. })));

        let config = AppConfig { openai_api_key: Some("sk-server".into()), ..Default::default() };
        assert_eq!(config.require_openai_api_key().unwrap(), "sk-server");
    }

    #[test]
    fn test_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("GRAPHVC_ENVIRONMENT", "development");
            jail.set_env("GRAPHVC_RATE_LIMIT_MAX", "10");
            jail.set_env("GRAPHVC_STORE_DB_PATH", "/tmp/store.sqlite");

            let config: AppConfig = AppConfig::figment().extract()?;
            assert!(config.is_development());
            assert_eq!(config.rate_limit_max, 10);
            assert_eq!(config.store_db_path, Some(PathBuf::from("/tmp/store.sqlite")));
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_layer() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("graphvc.toml", "openai_model = \"gpt-4o-mini\"\ncache_ttl_secs = 60\n")?;
            jail.set_env("GRAPHVC_CONFIG_FILE", "graphvc.toml");
            jail.set_env("GRAPHVC_CACHE_TTL_SECS", "120");

            let config: AppConfig = AppConfig::figment().extract()?;
            assert_eq!(config.openai_model, "gpt-4o-mini");
            assert_eq!(config.cache_ttl_secs, 120);
            Ok(())
        });
    }
}
