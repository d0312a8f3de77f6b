//! HTTP translation of the graphvc error taxonomy.
//!
//! Every failure leaves the server as `{error: <slug>, message: <text>}`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use graphvc_client::AuthError;
use graphvc_core::Error;
use serde::Serialize;

/// Error returned by route handlers.
#[derive(Debug)]
pub struct ApiError(pub Error);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidUrl(_) | Error::InputTooShort(_) | Error::InvalidRequest(_) | Error::ScrapeFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::ServiceUnavailable(_)
            | Error::Misconfigured(_)
            | Error::Database(_)
            | Error::MigrationFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected request body");
        Self(Error::InvalidRequest("Request body must be JSON with an \"input\" string".into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let err = self.0;

        match &err {
            Error::Database(_) | Error::MigrationFailed(_) | Error::Misconfigured(_) => {
                tracing::error!(error = %err, status = status.as_u16(), "request failed");
            }
            Error::ServiceUnavailable(_) => tracing::warn!(error = %err, status = status.as_u16(), "request failed"),
            _ => tracing::info!(error = %err, status = status.as_u16(), "request rejected"),
        }

        let retry_after = match &err {
            Error::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        };
        let body = ErrorBody { error: err.slug(), message: err.public_message(), retry_after };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
