//! Error types for backend calls.

use thiserror::Error;
use urban_common::DashboardError;

/// Errors returned by a [`crate::GeoBackend`].
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend could not be reached at all.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The backend rejected or failed the request (bad parameters, quota).
    #[error("query failed with status {status}: {message}")]
    Query { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The call did not finish within the configured timeout.
    #[error("request timed out")]
    Timeout,
}

impl BackendError {
    /// Create a Query error.
    pub fn query(status: u16, message: impl Into<String>) -> Self {
        Self::Query {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_connect() {
            BackendError::Connection(err.to_string())
        } else if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::query(err.status().map(|s| s.as_u16()).unwrap_or(0), err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

impl From<BackendError> for DashboardError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Connection(_) | BackendError::Auth(_) => {
                DashboardError::BackendConnection(err.to_string())
            }
            other => DashboardError::BackendQuery(other.to_string()),
        }
    }
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
