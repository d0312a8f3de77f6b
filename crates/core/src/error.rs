//! Unified error types for graphvc.
//!
//! Each variant maps to one error kind of the public error envelope
//! (`{error: <slug>, message: <text>}`); the HTTP status is assigned by the
//! server crate at the transport boundary.

use tokio_rusqlite::rusqlite;

/// Unified error type shared by every graphvc component.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// URL rejected: bad scheme, unparsable host, DNS failure or blocked address.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Raw text input below the minimum length.
    #[error("INPUT_TOO_SHORT: {0}")]
    InputTooShort(String),

    /// Request could not be processed as submitted.
    #[error("INVALID_REQUEST: {0}")]
    InvalidRequest(String),

    /// Page was fetched but was unreadable, too small, too large or not text.
    #[error("SCRAPE_FAILED: {0}")]
    ScrapeFailed(String),

    /// Missing, expired, malformed or claim-mismatched credential.
    #[error("UNAUTHORIZED: {0}")]
    Unauthorized(String),

    /// Quota exceeded. `retry_after` is set when the reset time is known.
    #[error("RATE_LIMITED: {message}")]
    RateLimited { retry_after: Option<u64>, message: String },

    /// Upstream network, timeout, graph store or LLM provider failure.
    #[error("SERVICE_UNAVAILABLE: {0}")]
    ServiceUnavailable(String),

    /// A required collaborator is not configured.
    #[error("MISCONFIGURED: {0}")]
    Misconfigured(String),

    /// Session absent or not owned by the caller.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Database operation failed.
    #[error("DATABASE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("DATABASE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Machine-readable kind used in the error envelope.
    pub fn slug(&self) -> &'static str {
        match self {
            Error::InvalidUrl(_) => "invalid_url",
            Error::InputTooShort(_) => "input_too_short",
            Error::InvalidRequest(_) => "invalid_request",
            Error::ScrapeFailed(_) => "scrape_failed",
            Error::Unauthorized(_) => "unauthorized",
            Error::RateLimited { .. } => "rate_limited",
            Error::NotFound(_) => "not_found",
            Error::ServiceUnavailable(_)
            | Error::Misconfigured(_)
            | Error::Database(_)
            | Error::MigrationFailed(_) => "service_unavailable",
        }
    }

    /// Human-readable message for the error envelope.
    ///
    /// Storage errors are replaced with a generic message; their cause is
    /// only ever logged.
    pub fn public_message(&self) -> String {
        match self {
            Error::InvalidUrl(msg)
            | Error::InputTooShort(msg)
            | Error::InvalidRequest(msg)
            | Error::ScrapeFailed(msg)
            | Error::Unauthorized(msg)
            | Error::ServiceUnavailable(msg)
            | Error::Misconfigured(msg)
            | Error::NotFound(msg) => msg.clone(),
            Error::RateLimited { message, .. } => message.clone(),
            Error::Database(_) | Error::MigrationFailed(_) => {
                "Graph database unavailable - please try again".to_string()
            }
        }
    }

    /// Whether the failure is a transient storage connectivity problem worth
    /// exactly one retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Database(tokio_rusqlite::Error::ConnectionClosed) => true,
            Error::Database(tokio_rusqlite::Error::Close(_)) => true,
            Error::Database(tokio_rusqlite::Error::Error(e)) => is_transient_sqlite(e),
            _ => false,
        }
    }
}

fn is_transient_sqlite(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.code,
            rusqlite::ErrorCode::DatabaseBusy
                | rusqlite::ErrorCode::DatabaseLocked
                | rusqlite::ErrorCode::SystemIoFailure
                | rusqlite::ErrorCode::CannotOpen
        ),
        _ => false,
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
