//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `dev_skip_auth` is enabled outside the development environment
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` or `store_timeout_ms` is below 100ms or above 5 minutes
    /// - `max_redirects` exceeds 10
    /// - `rate_limit_max`, `rate_limit_window_secs` or `cache_ttl_secs` is 0
    /// - `user_agent` or `byok_prefix` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dev_skip_auth && !self.is_development() {
            return Err(ConfigError::Invalid {
                field: "dev_skip_auth".into(),
                reason: format!(
                    "auth bypass is only allowed when environment is \"development\" (got \"{}\")",
                    self.environment
                ),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        for (field, value) in [("timeout_ms", self.timeout_ms), ("store_timeout_ms", self.store_timeout_ms)] {
            if value < 100 {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be at least 100ms".into() });
            }
            if value > 300_000 {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: "must not exceed 5 minutes (300000ms)".into(),
                });
            }
        }

        if self.max_redirects > 10 {
            return Err(ConfigError::Invalid { field: "max_redirects".into(), reason: "must not exceed 10".into() });
        }

        for (field, value) in [
            ("rate_limit_max", self.rate_limit_max),
            ("rate_limit_window_secs", self.rate_limit_window_secs),
            ("cache_ttl_secs", self.cache_ttl_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be greater than 0".into() });
            }
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }
        if self.byok_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "byok_prefix".into(), reason: "must not be empty".into() });
        }

        if self.jwks_url.is_none() && !self.dev_skip_auth {
            tracing::warn!("jwks_url is not set; bearer tokens cannot be verified");
        }

        if self.authorized_party_list().is_empty() {
            tracing::warn!("authorized_parties is empty; azp claim check is disabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dev_bypass_refused_outside_development() {
        let config = AppConfig { dev_skip_auth: true, environment: "production".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "dev_skip_auth"));
    }

    #[test]
    fn test_dev_bypass_allowed_in_development() {
        let config = AppConfig { dev_skip_auth: true, environment: "Development".into(), ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_max_bytes_exceeds_limit() {
        let config = AppConfig { max_bytes: 51 * 1024 * 1024, ..Default::default() }; // 51MB
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_store_timeout_exceeds_limit() {
        let config = AppConfig { store_timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "store_timeout_ms"));
    }

    #[test]
    fn test_validate_zero_window() {
        let config = AppConfig { rate_limit_window_secs: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "rate_limit_window_secs"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { max_bytes: 1, timeout_ms: 100, max_redirects: 0, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
