//! Error types with HTTP status code mapping.
//!
//! [`ConfigError`] covers startup configuration failures and
//! [`SessionError`] covers everything that can go wrong between the pool
//! and a caller asking for a session. [`AppError`] folds both into the
//! single type request handlers return, mapped to a status code and a
//! structured JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "session pool exhausted: no connection available within 30s"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Settings could not be built from the environment.
///
/// Always fatal: the process must not start with a partial configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required key is absent or blank.
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    /// A key is present but its value cannot be used.
    #[error("invalid value for `{key}`: {reason}")]
    Invalid {
        /// Environment key that failed.
        key: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The fallback `.env` file exists but could not be read or parsed.
    #[error("cannot read env file {path}: {source}")]
    EnvFile {
        /// Path of the offending file.
        path: String,
        /// Underlying parser error.
        #[source]
        source: dotenvy::Error,
    },
}

/// Failures building the pool or handing out a session.
///
/// None of these are retried here; the caller owns any retry policy.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection string could not be parsed.
    #[error("malformed database url: {0}")]
    InvalidUrl(String),

    /// The connection string names a driver this build does not support.
    #[error("unsupported database scheme `{0}`")]
    UnsupportedScheme(String),

    /// No connection became available within the acquire timeout.
    #[error("session pool exhausted: no connection available in time")]
    Exhausted,

    /// The pool has been closed; no further sessions can be acquired.
    #[error("session pool is closed")]
    Closed,

    /// The store could not be reached or the connection failed.
    #[error("database unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    /// A statement issued through a session failed.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl SessionError {
    /// Classifies a driver error raised while obtaining a connection.
    #[must_use]
    pub fn from_acquire(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::Exhausted,
            sqlx::Error::PoolClosed => Self::Closed,
            other => Self::Unavailable(other),
        }
    }

    /// Classifies a driver error raised while using an acquired session.
    #[must_use]
    pub fn from_query(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
                Self::Unavailable(err)
            }
            other => Self::Query(other),
        }
    }
}

/// Application-level error returned by request handlers.
///
/// # Error Code Ranges
///
/// | Range     | Category      | HTTP Status                   |
/// |-----------|---------------|-------------------------------|
/// | 1000–1999 | Configuration | 500 Internal Server Error     |
/// | 2000–2999 | Store access  | 503 Service Unavailable       |
/// | 3000–3999 | Server        | 500 Internal Server Error     |
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration failure surfaced at runtime.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session or pool failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Config(ConfigError::Missing(_)) => 1001,
            Self::Config(ConfigError::Invalid { .. }) => 1002,
            Self::Config(ConfigError::EnvFile { .. }) => 1003,
            Self::Session(SessionError::Exhausted) => 2001,
            Self::Session(SessionError::Unavailable(_)) => 2002,
            Self::Session(SessionError::Closed) => 2003,
            Self::Session(SessionError::InvalidUrl(_)) => 2004,
            Self::Session(SessionError::UnsupportedScheme(_)) => 2005,
            Self::Session(SessionError::Query(_)) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Session(
                SessionError::Exhausted | SessionError::Unavailable(_) | SessionError::Closed,
            ) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_maps_to_exhausted() {
        let err = SessionError::from_acquire(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, SessionError::Exhausted));
    }

    #[test]
    fn pool_closed_maps_to_closed() {
        let err = SessionError::from_acquire(sqlx::Error::PoolClosed);
        assert!(matches!(err, SessionError::Closed));
    }

    #[test]
    fn row_not_found_is_a_query_error() {
        let err = SessionError::from_query(sqlx::Error::RowNotFound);
        assert!(matches!(err, SessionError::Query(_)));
    }

    #[test]
    fn store_errors_are_service_unavailable() {
        let err = AppError::from(SessionError::Exhausted);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), 2001);
    }

    #[test]
    fn config_errors_are_internal() {
        let err = AppError::from(ConfigError::Missing("DATABASE_URL"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "missing required setting `DATABASE_URL`");
    }

    #[test]
    fn into_response_carries_status() {
        let response = AppError::Session(SessionError::Closed).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
