//! OpenAI client error types.

use graphvc_core::Error;
use std::sync::Arc;

/// Errors from the chat completions client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OpenAiError {
    /// No server key and no caller-supplied key.
    #[error("missing API key: no server key configured and none supplied")]
    MissingApiKey,

    /// Provider rejected the key.
    #[error("authentication failed: invalid API key")]
    AuthError,

    /// Provider rate limit.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// Provider refused the request as malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Other HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Model declined to answer.
    #[error("model refused: {0}")]
    Refusal(String),
}

impl From<reqwest::Error> for OpenAiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { OpenAiError::Timeout } else { OpenAiError::Network(Arc::new(err)) }
    }
}

impl From<OpenAiError> for Error {
    fn from(err: OpenAiError) -> Self {
        match err {
            OpenAiError::RateLimited => Error::RateLimited {
                retry_after: None,
                message: "Too many requests - please try again in a moment".into(),
            },
            OpenAiError::AuthError => {
                tracing::error!("LLM provider rejected the API key");
                Error::ServiceUnavailable("AI service configuration error - please try again later".into())
            }
            OpenAiError::BadRequest(detail) => {
                tracing::info!(detail = %detail, "LLM provider rejected the request");
                Error::InvalidRequest("Input could not be processed - try shortening or rephrasing it".into())
            }
            OpenAiError::MissingApiKey => Error::Misconfigured("AI service is not configured".into()),
            other => {
                tracing::warn!(error = %other, "LLM call failed");
                Error::ServiceUnavailable("AI service unavailable - please try again".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err = Error::from(OpenAiError::RateLimited);
        assert_eq!(err.slug(), "rate_limited");
        assert!(matches!(err, Error::RateLimited { retry_after: None, .. }));

        assert_eq!(Error::from(OpenAiError::AuthError).slug(), "service_unavailable");
        assert_eq!(Error::from(OpenAiError::BadRequest("context length".into())).slug(), "invalid_request");
        assert!(matches!(Error::from(OpenAiError::MissingApiKey), Error::Misconfigured(_)));
        assert_eq!(Error::from(OpenAiError::HttpError { status: 500 }).slug(), "service_unavailable");
        assert_eq!(Error::from(OpenAiError::Timeout).slug(), "service_unavailable");
    }
}
