//! Error types for the urban layers dashboard.

use serde::Serialize;
use thiserror::Error;

use crate::LayerKind;

/// Result type alias using DashboardError.
pub type DashboardResult<T> = Result<T, DashboardError>;

/// Primary error type for dashboard operations.
#[derive(Debug, Clone, Error)]
pub enum DashboardError {
    // === Fatal ===
    #[error("Backend connection failed: {0}")]
    BackendConnection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // === Layer-scoped ===
    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: String, end: String },

    /// The configured default range falls outside the slider years.
    #[error("Date range {start}..{end} is outside the available years {min_year}-{max_year}")]
    RangeOutOfBounds {
        start: String,
        end: String,
        min_year: i32,
        max_year: i32,
    },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Backend query failed: {0}")]
    BackendQuery(String),

    #[error("Backend call timed out after {0} s")]
    Timeout(u64),

    #[error("Unknown style key '{key}' for {domain}")]
    UnknownStyleKey { domain: &'static str, key: String },

    // === Display omissions ===
    #[error("Statistic '{0}' has no value over the area of interest")]
    MissingStatistic(String),
}

impl DashboardError {
    /// Whether this error stops the whole dashboard rather than one layer.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DashboardError::BackendConnection(_) | DashboardError::Config(_)
        )
    }

    /// Whether this error indicates a programming defect rather than bad
    /// input or an unreachable backend.
    pub fn is_defect(&self) -> bool {
        matches!(self, DashboardError::UnknownStyleKey { .. })
    }

    /// Stable machine-readable code for UI rendering.
    pub fn code(&self) -> &'static str {
        match self {
            DashboardError::BackendConnection(_) => "BackendConnectionError",
            DashboardError::Config(_) | DashboardError::RangeOutOfBounds { .. } => "ConfigError",
            DashboardError::InvalidRange { .. } => "InvalidRangeError",
            DashboardError::InvalidParameter { .. } => "InvalidParameterError",
            DashboardError::BackendQuery(_) | DashboardError::Timeout(_) => "BackendQueryError",
            DashboardError::UnknownStyleKey { .. } => "UnknownStyleKeyError",
            DashboardError::MissingStatistic(_) => "MissingStatisticError",
        }
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::BackendQuery(format!("JSON error: {}", err))
    }
}

/// An error confined to a single layer of a render pass.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {error}")]
pub struct LayerFailure {
    pub kind: LayerKind,
    pub error: DashboardError,
}

impl LayerFailure {
    pub fn new(kind: LayerKind, error: DashboardError) -> Self {
        Self { kind, error }
    }
}

/// Wire form of a layer failure, shown as an inline warning next to the
/// affected control.
#[derive(Debug, Clone, Serialize)]
pub struct LayerFailureView {
    pub kind: LayerKind,
    pub code: &'static str,
    pub message: String,
}

impl From<&LayerFailure> for LayerFailureView {
    fn from(failure: &LayerFailure) -> Self {
        Self {
            kind: failure.kind,
            code: failure.error.code(),
            message: failure.error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let range = DashboardError::InvalidRange {
            start: "2023-06-01".into(),
            end: "2023-01-01".into(),
        };
        assert_eq!(range.code(), "InvalidRangeError");
        assert!(!range.is_fatal());

        assert!(DashboardError::BackendConnection("denied".into()).is_fatal());
        assert_eq!(DashboardError::Timeout(30).code(), "BackendQueryError");
        let out_of_bounds = DashboardError::RangeOutOfBounds {
            start: "2010-01-01".into(),
            end: "2020-12-31".into(),
            min_year: 2015,
            max_year: 2024,
        };
        assert_eq!(out_of_bounds.code(), "ConfigError");
        assert!(DashboardError::UnknownStyleKey {
            domain: "vegetation density",
            key: "Extreme".into()
        }
        .is_defect());
    }

    #[test]
    fn test_failure_view() {
        let failure = LayerFailure::new(
            LayerKind::Temperature,
            DashboardError::BackendQuery("quota exceeded".into()),
        );
        let view = LayerFailureView::from(&failure);
        assert_eq!(view.code, "BackendQueryError");
        assert!(view.message.contains("quota exceeded"));
    }
}
